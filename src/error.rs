use crate::provider::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("upstream fetch failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("state lock poisoned")]
    StateLock,
}
