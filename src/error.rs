/// Failures raised while talking to a cluster monitor or decoding its replies.
#[derive(Debug, thiserror::Error)]
pub enum CephError {
    /// The command could not be issued, or the monitor rejected it.
    #[error("transport error: {0}")]
    Transport(String),

    /// The reply did not have the expected JSON shape.
    #[error("decode error in `{command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source:  serde_json::Error,
    },

    /// A field or record the reply should have carried is absent.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),
}

impl CephError {
    pub fn decode(command: &str, source: serde_json::Error) -> Self {
        CephError::Decode { command: command.to_string(), source }
    }
}

pub type CephResult<T> = std::result::Result<T, CephError>;
