use thiserror::Error;

/// Errors an engine implementation may report back to the core adapter
/// (§4.C, §7).
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("not linked")]
    NotLinked,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors the adapter itself can surface outside the `respCode`-carrying
/// request/response path (construction failures, shutdown races).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter is already stopped")]
    AlreadyStopped,
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("wire codec error: {0}")]
    Codec(#[from] messaging_wire::CodecError),
}
