use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unexpected http status {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("api error {code}: {message}")]
    ApiError { code: i64, message: String },
}

impl ExtractorError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpError(_) | Self::JsonError(_) | Self::ApiError { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
