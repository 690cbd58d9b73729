pub mod captions_http;
pub mod claude;
pub mod db;
pub mod ytdlp;

pub use captions_http::HttpCaptionFetcher;
pub use claude::{ClaudeAdapter, ClaudeSettings, RetryPolicy};
pub use db::DbAdapter;
pub use ytdlp::YtDlpAdapter;
