use crate::config::ConfigError;
use crate::source::SourceError;

#[derive(Debug)]
pub enum ReconcileError {
    Source(SourceError),
    Config(ConfigError),
    /// An operation that needs a configured source ran before `configure`
    NotConfigured,
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl ReconcileError {
    /// The one-line message shown to a user for a failed user-triggered
    /// operation. Node-reported messages win over transport wrapper text.
    pub fn summary(&self) -> String {
        match self {
            ReconcileError::Source(SourceError::Rpc { message, .. }) => message.clone(),
            ReconcileError::Source(SourceError::Transport(text)) => {
                if text.is_empty() {
                    "Unexpected error".to_string()
                } else {
                    text.clone()
                }
            }
            ReconcileError::Source(SourceError::Decode(msg))
            | ReconcileError::Source(SourceError::Unavailable(msg)) => msg.clone(),
            ReconcileError::Config(ConfigError::InvalidValue(msg)) => msg.clone(),
            ReconcileError::Config(ConfigError::MissingVariable(var)) => format!("{} is not set", var),
            ReconcileError::NotConfigured => "Connect a contract first.".to_string(),
            ReconcileError::Io(e) => e.to_string(),
            ReconcileError::Serialization(e) => e.to_string(),
        }
    }
}

impl From<SourceError> for ReconcileError {
    fn from(err: SourceError) -> Self {
        ReconcileError::Source(err)
    }
}

impl From<ConfigError> for ReconcileError {
    fn from(err: ConfigError) -> Self {
        ReconcileError::Config(err)
    }
}

impl From<std::io::Error> for ReconcileError {
    fn from(err: std::io::Error) -> Self {
        ReconcileError::Io(err)
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        ReconcileError::Serialization(err)
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::Source(e) => write!(f, "Source error: {}", e),
            ReconcileError::Config(e) => write!(f, "Config error: {}", e),
            ReconcileError::NotConfigured => write!(f, "No source configured"),
            ReconcileError::Io(e) => write!(f, "IO error: {}", e),
            ReconcileError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for ReconcileError {}
