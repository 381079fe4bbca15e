pub mod disk;
pub mod network;
pub mod process;
pub mod resources;

use crate::providers::{ProcessError, ProviderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Process(#[from] ProcessError),
    #[error("collector task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
