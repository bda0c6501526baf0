#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed feed message: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("a feed subscription is already open (generation {0})")]
    AlreadyConnected(u64),

    #[error("no feed subscription is open")]
    NotConnected,

    #[error("reconnect requested before any connect")]
    NeverConnected,

    #[error("feed stream ended")]
    StreamEnded,

    #[error("failed encoding outbound message")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}
