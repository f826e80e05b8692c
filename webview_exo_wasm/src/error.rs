use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("config error: {0}")]
    Config(String),
    #[error("payload parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("page call failed: {0}")]
    Page(String),
    #[error("host callback not reachable")]
    HostUnavailable,
}
