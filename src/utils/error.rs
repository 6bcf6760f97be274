use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlackcatError {
    #[error("failed to read input: {0}")]
    Input(#[source] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("slack API {method} failed: {error}")]
    Api { method: String, error: String },

    #[error("delivery failed: {message}")]
    Transport { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{message}")]
    Config { message: String },

    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("unable to parse config file {path}: {message}")]
    ConfigParse { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Transport,
    Config,
    System,
}

impl SlackcatError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Input(_) => ErrorCategory::Input,
            Self::Http(_) | Self::Api { .. } | Self::Transport { .. } => ErrorCategory::Transport,
            Self::Config { .. }
            | Self::InvalidConfigValue { .. }
            | Self::ConfigParse { .. } => ErrorCategory::Config,
            Self::Io(_) | Self::Serialization(_) => ErrorCategory::System,
        }
    }

    /// Single-line message shown next to the program tag.
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Http(e) if e.is_timeout() => "request to slack timed out".to_string(),
            Self::Http(e) if e.is_connect() => "unable to connect to slack".to_string(),
            Self::Api { method, error } => format!("{}: {}", method, error),
            other => other.to_string().replace('\n', " "),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Api { error, .. } if error == "invalid_auth" || error == "not_authed" => {
                "the token was rejected, run slackcat --configure to add a fresh one"
            }
            Self::Api { error, .. } if error == "channel_not_found" || error == "not_in_channel" => {
                "check the channel name and that the token's user is a member"
            }
            _ => match self.category() {
                ErrorCategory::Input => "check that the input file exists and is readable",
                ErrorCategory::Transport => "check network connectivity and the slack API status",
                ErrorCategory::Config => "run slackcat --configure or fix the config file",
                ErrorCategory::System => "retry, or run with --verbose for details",
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, SlackcatError>;
