//! crates/lattice_core/src/derivation.rs
//!
//! The three derivation stages (concepts, quiz questions, platform content)
//! built on top of the `LanguageModel` port. This module owns the prompts and
//! the parsing of the model's JSON replies; transport and retries belong to
//! the adapter behind the port.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    AnswerChoice, Concept, ContentStatus, NewConcept, NewGeneratedContent, NewQuizQuestion,
    Platform,
};
use crate::ports::{DerivationError, LanguageModel};

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\n?(.*?)```").unwrap());

//=========================================================================================
// JSON Replies
//=========================================================================================

/// Returns the body of the first fenced code block, or the whole reply
/// (trimmed) when there is none.
pub fn extract_json_payload(reply: &str) -> &str {
    match FENCED_BLOCK.captures(reply).and_then(|c| c.get(1)) {
        Some(block) => block.as_str().trim(),
        None => reply.trim(),
    }
}

/// Asks the model and parses its reply as `T`, tolerating markdown fencing.
pub async fn ask_for_json<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    system: Option<&str>,
    prompt: &str,
) -> Result<T, DerivationError> {
    let reply = model.ask(system, prompt).await?;
    parse_reply(&reply)
}

fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, DerivationError> {
    serde_json::from_str(extract_json_payload(reply))
        .map_err(|e| DerivationError::MalformedJson(e.to_string()))
}

//=========================================================================================
// Reply Shapes
//=========================================================================================

#[derive(Deserialize)]
struct ConceptReply {
    title: String,
    description: String,
}

#[derive(Deserialize)]
struct QuizReply {
    question: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct_answer: String,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize)]
struct ContentReply {
    title: String,
    body: String,
}

//=========================================================================================
// Stages
//=========================================================================================

/// Inclusive bounds on how many concepts to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConceptRange {
    pub min: u32,
    pub max: u32,
}

impl Default for ConceptRange {
    fn default() -> Self {
        Self { min: 3, max: 7 }
    }
}

#[derive(Clone)]
pub struct Deriver {
    model: Arc<dyn LanguageModel>,
    concepts: ConceptRange,
}

impl Deriver {
    pub fn new(model: Arc<dyn LanguageModel>, concepts: ConceptRange) -> Self {
        Self { model, concepts }
    }

    pub async fn extract_concepts(
        &self,
        transcript: &str,
        source_content_id: Uuid,
    ) -> Result<Vec<NewConcept>, DerivationError> {
        let system = "You are an expert educator extracting core learnable concepts from content.";
        let prompt = format!(
            "Analyze this transcript and extract {min}-{max} concepts that someone should learn.\n\n\
             For each concept:\n\
             - Title: Clear, concise name (max 100 chars)\n\
             - Description: Detailed explanation (2-4 sentences, focus on practical understanding)\n\n\
             Focus on:\n\
             - Fundamental ideas and mental models\n\
             - Actionable techniques they can apply\n\
             - Key insights worth remembering\n\n\
             Return ONLY a JSON array, no markdown formatting, no code blocks:\n\
             [{{\"title\": \"...\", \"description\": \"...\"}}]\n\n\
             Transcript:\n{transcript}",
            min = self.concepts.min,
            max = self.concepts.max,
            transcript = transcript,
        );

        let replies: Vec<ConceptReply> =
            ask_for_json(self.model.as_ref(), Some(system), &prompt).await?;

        Ok(replies
            .into_iter()
            .filter(|c| !c.title.trim().is_empty())
            .map(|c| NewConcept {
                title: c.title.trim().to_string(),
                description: c.description.trim().to_string(),
                source_content_id,
            })
            .collect())
    }

    /// Questions whose answer letter is not A-D are dropped.
    pub async fn generate_quiz(
        &self,
        concept: &Concept,
    ) -> Result<Vec<NewQuizQuestion>, DerivationError> {
        let system = "You are an expert educator creating effective quiz questions that test \
                      understanding and application, not just recall.";
        let prompt = format!(
            "Generate 2-3 quiz questions for this concept to test understanding and application.\n\n\
             Concept:\nTitle: {title}\nDescription: {description}\n\n\
             For each question:\n\
             - Question: Tests understanding or application (avoid simple recall)\n\
             - 4 options (A, B, C, D) - make them plausible\n\
             - Correct answer (A, B, C, or D)\n\
             - Explanation: Why correct answer is right and others are wrong (2-3 sentences)\n\n\
             Return ONLY a JSON array, no markdown formatting, no code blocks:\n\
             [\n  {{\n    \"question\": \"...\",\n    \"option_a\": \"...\",\n    \"option_b\": \"...\",\n    \
             \"option_c\": \"...\",\n    \"option_d\": \"...\",\n    \"correct_answer\": \"B\",\n    \
             \"explanation\": \"...\"\n  }}\n]",
            title = concept.title,
            description = concept.description,
        );

        let replies: Vec<QuizReply> =
            ask_for_json(self.model.as_ref(), Some(system), &prompt).await?;

        let mut questions = Vec::with_capacity(replies.len());
        for q in replies {
            let correct_answer = match q.correct_answer.parse::<AnswerChoice>() {
                Ok(choice) => choice,
                Err(reason) => {
                    warn!(concept_id = %concept.id, %reason, "Dropping quiz question with invalid answer");
                    continue;
                }
            };
            questions.push(NewQuizQuestion {
                concept_id: concept.id,
                question: q.question,
                options: [q.option_a, q.option_b, q.option_c, q.option_d],
                correct_answer,
                explanation: q.explanation,
            });
        }
        Ok(questions)
    }

    /// A reply that is not valid JSON is kept as the body, with a title made
    /// from the concept titles. Transport failures are still errors.
    pub async fn generate_content(
        &self,
        platform: Platform,
        concepts: &[Concept],
    ) -> Result<NewGeneratedContent, DerivationError> {
        let summary = concepts
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {}: {}\n", i + 1, c.title, c.description))
            .collect::<String>();
        let (system, prompt) = content_prompts(platform, &summary);

        let reply = self.model.ask(Some(system), &prompt).await?;
        let (title, body) = match parse_reply::<ContentReply>(&reply) {
            Ok(parsed) => (parsed.title, parsed.body),
            Err(e) => {
                warn!(%platform, error = %e, "Content reply was not JSON; using raw text as body");
                (title_from_concepts(concepts), reply)
            }
        };

        Ok(NewGeneratedContent {
            platform,
            title,
            body,
            concept_ids: concepts.iter().map(|c| c.id).collect(),
            status: ContentStatus::Draft,
        })
    }
}

/// "Generated Content" for no concepts, the first title for one, and
/// "<first> and More" otherwise.
pub fn title_from_concepts(concepts: &[Concept]) -> String {
    match concepts {
        [] => "Generated Content".to_string(),
        [only] => only.title.clone(),
        [first, ..] => format!("{} and More", first.title),
    }
}

fn content_prompts(platform: Platform, concepts: &str) -> (&'static str, String) {
    match platform {
        Platform::LinkedIn => (
            "You are a consultant writing a LinkedIn post demonstrating expertise to attract clients.",
            format!(
                "Create a LinkedIn case study post using these concepts:\n\n{concepts}\n\
                 Format:\n\
                 - Hook: Start with a relatable client problem or situation\n\
                 - Body: Show how you used these concepts to solve it (tell a story)\n\
                 - Result: Share measurable outcomes or clear benefits\n\
                 - Call-to-action: Invite discussion or connections\n\n\
                 Tone: Professional, credible, approachable (not overly salesy)\n\
                 Length: 1200-1500 characters\n\n\
                 Return as JSON:\n{{\"title\": \"...\", \"body\": \"...\"}}"
            ),
        ),
        Platform::Twitter => (
            "You are a consultant creating an engaging X (Twitter) thread to demonstrate expertise.",
            format!(
                "Create a 5-tweet thread about these concepts:\n\n{concepts}\n\
                 Structure:\n\
                 - Tweet 1: Hook - why this matters (create curiosity)\n\
                 - Tweets 2-4: Key insights from the concepts (one insight per tweet)\n\
                 - Tweet 5: Actionable takeaway + CTA\n\n\
                 Tone: Casual but authoritative, conversational\n\
                 Length: Each tweet under 280 characters\n\
                 Use line breaks for readability\n\n\
                 Return as JSON:\n\
                 {{\"title\": \"Thread title\", \"body\": \"1/\\n[tweet 1]\\n\\n2/\\n[tweet 2]\\n\\n...\"}}"
            ),
        ),
        Platform::Blog => (
            "You are a consultant writing an educational blog post to demonstrate deep expertise.",
            format!(
                "Write a comprehensive blog post tutorial using these concepts:\n\n{concepts}\n\
                 Structure:\n\
                 - Introduction: Why this matters (set context, create interest)\n\
                 - Section per concept: clear explanation, how to apply it with examples, \
                 common mistakes to avoid\n\
                 - Conclusion: Summary + next steps for the reader\n\n\
                 Tone: Teaching, detailed, actionable\n\
                 Length: 800-1200 words\n\
                 Use Markdown formatting (headings, lists, etc.)\n\n\
                 Return as JSON:\n{{\"title\": \"...\", \"body\": \"...\"}}"
            ),
        ),
        Platform::Email => (
            "You are a consultant creating valuable content to share with your network.",
            format!(
                "Create an email newsletter about these concepts:\n\n{concepts}\n\
                 Format:\n\
                 - Subject line (compelling, specific)\n\
                 - Introduction (1-2 sentences)\n\
                 - Key insights (bullet points)\n\
                 - Conclusion with CTA\n\n\
                 Tone: Friendly, professional, valuable\n\
                 Length: 400-600 words\n\n\
                 Return as JSON:\n{{\"title\": \"Subject line\", \"body\": \"Email body\"}}"
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: Result<String, fn() -> DerivationError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn ask(&self, _system: Option<&str>, prompt: &str) -> Result<String, DerivationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn concept(title: &str) -> Concept {
        Concept {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: format!("about {}", title),
            source_content_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn extracts_fenced_json_with_or_without_language_tag() {
        assert_eq!(extract_json_payload("Sure!\n```json\n[1, 2]\n```\nDone"), "[1, 2]");
        assert_eq!(extract_json_payload("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json_payload("  {\"plain\": true} "), "{\"plain\": true}");
    }

    #[tokio::test]
    async fn ask_for_json_reports_malformed_replies() {
        let model = ScriptedModel::replying("I could not do that.");
        let parsed: Result<Vec<u32>, _> = ask_for_json(model.as_ref(), None, "numbers").await;
        assert!(matches!(parsed, Err(DerivationError::MalformedJson(_))));
    }

    #[tokio::test]
    async fn concepts_carry_the_source_id_and_requested_range() {
        let model = ScriptedModel::replying(
            "```json\n[{\"title\": \" Lifetimes \", \"description\": \"Scopes of borrows.\"},\
             {\"title\": \"\", \"description\": \"dropped\"}]\n```",
        );
        let deriver = Deriver::new(model.clone(), ConceptRange { min: 2, max: 4 });
        let source_id = Uuid::new_v4();

        let concepts = deriver.extract_concepts("transcript text", source_id).await.unwrap();
        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].title, "Lifetimes");
        assert_eq!(concepts[0].source_content_id, source_id);

        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("extract 2-4 concepts"));
        assert!(prompt.ends_with("transcript text"));
    }

    #[tokio::test]
    async fn quiz_answers_are_normalised_and_invalid_ones_dropped() {
        let model = ScriptedModel::replying(
            r#"[
              {"question":"Q1","option_a":"a","option_b":"b","option_c":"c","option_d":"d","correct_answer":"c","explanation":"e"},
              {"question":"Q2","option_a":"a","option_b":"b","option_c":"c","option_d":"d","correct_answer":"E","explanation":"e"}
            ]"#,
        );
        let deriver = Deriver::new(model, ConceptRange::default());
        let c = concept("Traits");

        let questions = deriver.generate_quiz(&c).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_answer, AnswerChoice::C);
        assert_eq!(questions[0].concept_id, c.id);
        assert_eq!(questions[0].options[3], "d");
    }

    #[tokio::test]
    async fn content_falls_back_to_raw_reply() {
        let model = ScriptedModel::replying("Just a plain post.");
        let deriver = Deriver::new(model, ConceptRange::default());
        let concepts = vec![concept("Ownership"), concept("Borrowing")];

        let item = deriver.generate_content(Platform::Blog, &concepts).await.unwrap();
        assert_eq!(item.title, "Ownership and More");
        assert_eq!(item.body, "Just a plain post.");
        assert_eq!(item.status, ContentStatus::Draft);
        assert_eq!(item.concept_ids, vec![concepts[0].id, concepts[1].id]);
    }

    #[tokio::test]
    async fn content_transport_errors_are_not_swallowed() {
        let model = Arc::new(ScriptedModel {
            reply: Err(|| DerivationError::RateLimited),
            prompts: Mutex::new(Vec::new()),
        });
        let deriver = Deriver::new(model, ConceptRange::default());
        let err = deriver
            .generate_content(Platform::Twitter, &[concept("Async")])
            .await
            .unwrap_err();
        assert!(matches!(err, DerivationError::RateLimited));
    }

    #[test]
    fn synthesised_titles() {
        assert_eq!(title_from_concepts(&[]), "Generated Content");
        assert_eq!(title_from_concepts(&[concept("Solo")]), "Solo");
    }

    #[test]
    fn every_platform_has_a_json_prompt() {
        for p in [Platform::LinkedIn, Platform::Twitter, Platform::Blog, Platform::Email] {
            let (system, prompt) = content_prompts(p, "1. A: b\n");
            assert!(!system.is_empty());
            assert!(prompt.contains("1. A: b"));
            assert!(prompt.contains("Return as JSON"));
        }
    }
}
