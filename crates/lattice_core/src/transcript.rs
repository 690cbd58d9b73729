//! crates/lattice_core/src/transcript.rs
//!
//! Drives the metadata tool, the caption locator, the caption download, and
//! the decoder to turn a video url into metadata plus a plain-text transcript.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::captions::{self, CaptionEncoding, CaptionTrack, VideoDocument};
use crate::domain::{Transcript, VideoInfo, VideoMetadata, VideoReference};
use crate::ports::{AcquisitionError, CaptionFetcher, CaptionRequest, MetadataTool};

const TRANSCRIPT_LANGUAGE: &str = "en";

#[derive(Clone)]
pub struct TranscriptAcquirer {
    tool: Arc<dyn MetadataTool>,
    fetcher: Arc<dyn CaptionFetcher>,
}

impl TranscriptAcquirer {
    pub fn new(tool: Arc<dyn MetadataTool>, fetcher: Arc<dyn CaptionFetcher>) -> Self {
        Self { tool, fetcher }
    }

    /// Validates `raw`, runs the tool once, and returns the metadata together
    /// with the outcome of transcript acquisition. Only reference validation
    /// and tool failures are returned as `Err`; a missing or undecodable
    /// transcript is reported inside `VideoInfo`.
    #[instrument(skip(self))]
    pub async fn fetch_video_info(&self, raw: &str) -> Result<VideoInfo, AcquisitionError> {
        let reference = VideoReference::parse(raw)?;
        let document = self.load_document(&reference, CaptionRequest::AutoEnglish).await?;
        let metadata = document.metadata();

        let transcript = self.transcript_from_document(&document).await;
        if let Err(e) = &transcript {
            warn!(url = %reference, error = %e, "Transcript unavailable; returning metadata only");
        }

        Ok(VideoInfo { metadata, transcript })
    }

    /// Metadata only; no caption data is requested from the tool.
    pub async fn fetch_metadata(
        &self,
        reference: &VideoReference,
    ) -> Result<VideoMetadata, AcquisitionError> {
        let document = self.load_document(reference, CaptionRequest::None).await?;
        Ok(document.metadata())
    }

    pub async fn fetch_transcript(
        &self,
        reference: &VideoReference,
    ) -> Result<Transcript, AcquisitionError> {
        let document = self.load_document(reference, CaptionRequest::AutoEnglish).await?;
        self.transcript_from_document(&document).await
    }

    async fn load_document(
        &self,
        reference: &VideoReference,
        captions: CaptionRequest,
    ) -> Result<VideoDocument, AcquisitionError> {
        let stdout = self.tool.dump_json(reference, captions).await?;
        VideoDocument::from_slice(&stdout)
            .map_err(|e| AcquisitionError::MalformedMetadata(e.to_string()))
    }

    async fn transcript_from_document(
        &self,
        document: &VideoDocument,
    ) -> Result<Transcript, AcquisitionError> {
        let CaptionTrack { url, encoding } =
            captions::locate(document).ok_or(AcquisitionError::NoTranscript)?;
        info!(%encoding, "Downloading caption track");

        let payload = self.fetcher.fetch(&url).await?;
        let text = captions::clean(&decode_payload(&payload, &encoding)?);
        if text.is_empty() {
            return Err(AcquisitionError::NoTranscript);
        }

        info!(chars = text.len(), "Transcript acquired");
        Ok(Transcript {
            text,
            language: TRANSCRIPT_LANGUAGE.to_string(),
        })
    }
}

/// Dispatches on the declared encoding. The legacy `srv*` variants are tried
/// as segment JSON first and read as WebVTT when that fails; unrecognised
/// encodings are read as WebVTT.
pub fn decode_payload(payload: &[u8], encoding: &CaptionEncoding) -> Result<String, AcquisitionError> {
    match encoding {
        CaptionEncoding::Json3 => captions::decode_segment_json(payload)
            .map_err(|e| AcquisitionError::CaptionDecode(e.to_string())),
        CaptionEncoding::Srv3 | CaptionEncoding::Srv2 | CaptionEncoding::Srv1 => {
            Ok(captions::decode_segment_json(payload).unwrap_or_else(|e| {
                debug!(%encoding, error = %e, "Not segment JSON, reading as WebVTT");
                captions::decode_vtt(payload)
            }))
        }
        CaptionEncoding::Srt => Ok(captions::decode_srt(payload)),
        CaptionEncoding::Vtt | CaptionEncoding::Other(_) | CaptionEncoding::Unknown => {
            Ok(captions::decode_vtt(payload))
        }
    }
}
