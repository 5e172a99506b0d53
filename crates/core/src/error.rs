use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid subscription {id}: {reason}")]
    InvalidSubscription { id: String, reason: String },

    #[error("Subscription store error: {0}")]
    Store(String),

    #[error("An alert run is already in progress")]
    RunInProgress,

    #[error("{0}")]
    Other(String),
}
