#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("unknown storage backend '{0}' (expected \"memory\" or \"file\")")]
    UnknownStorage(String),

    #[error("{0}")]
    Engine(#[from] messenger_engine::EngineError),

    #[error("store: {0}")]
    Store(#[from] messenger_api::StoreError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
