use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Search API rejected the API key (HTTP {status})")]
    Auth { status: u16 },

    #[error("Search API rate limit exceeded")]
    RateLimited,

    #[error("Search API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No Exa API key configured")]
    MissingApiKey,

    #[error("{0}")]
    InvalidTopic(String),

    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Short label for the status line.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Auth { .. } | Self::MissingApiKey => "auth",
            Self::RateLimited | Self::Api { .. } => "api",
            Self::Parse { .. } => "parse",
            Self::Storage(_) | Self::Serialize(_) => "storage",
            Self::InvalidTopic(_) | Self::TopicNotFound(_) => "input",
            Self::Config(_) | Self::ConfigParse(_) => "config",
            Self::Io(_) | Self::Other(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
