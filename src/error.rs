use std::fmt;

use thiserror::Error;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Dispatch,
    TokenGeneration,
    KeyParse,
    Signing,
    RequestBuild,
    Backend,
    Notify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Dispatch => "dispatch",
            Stage::TokenGeneration => "token-generation",
            Stage::KeyParse => "key-parse",
            Stage::Signing => "signing",
            Stage::RequestBuild => "request-build",
            Stage::Backend => "backend",
            Stage::Notify => "notify",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum VerifyError {
    // Configuration errors
    #[error("Environment variable {key} not set")]
    ConfigMissing { key: String },

    #[error("Invalid value for {key}: {message}")]
    ConfigInvalid { key: String, message: String },

    // Dispatch errors
    #[error("Invalid data packet: {message}")]
    InvalidPacket { message: String },

    #[error("Failed to send data packet to queue: receiver closed")]
    QueueClosed,

    // Credential setup errors
    #[error("error generating unique token: {source}")]
    TokenGeneration {
        #[source]
        source: rand::Error,
    },

    #[error("error parsing private key string to rsa private key: {message}")]
    KeyParse { message: String },

    #[error("error generating auth token: {message}")]
    Signing { message: String },

    // Backend errors
    #[error("error creating http client: {source}")]
    HttpClient {
        #[source]
        source: reqwest::Error,
    },

    #[error("error creating http request: {source}")]
    RequestBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("error sending request to RDS Backend API: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    // Discord errors
    #[error("error creating session: {message}")]
    SessionCreate { message: String },

    #[error("error editing original message for application {application_id}: {message}")]
    Edit {
        application_id: String,
        message: String,
    },

    #[error("error closing session: {message}")]
    SessionClose { message: String },
}

impl VerifyError {
    pub fn stage(&self) -> Stage {
        match self {
            VerifyError::ConfigMissing { .. }
            | VerifyError::ConfigInvalid { .. }
            | VerifyError::HttpClient { .. } => Stage::Config,
            VerifyError::InvalidPacket { .. } | VerifyError::QueueClosed => Stage::Dispatch,
            VerifyError::TokenGeneration { .. } => Stage::TokenGeneration,
            VerifyError::KeyParse { .. } => Stage::KeyParse,
            VerifyError::Signing { .. } => Stage::Signing,
            VerifyError::RequestBuild { .. } => Stage::RequestBuild,
            VerifyError::Transport { .. } => Stage::Backend,
            VerifyError::SessionCreate { .. }
            | VerifyError::Edit { .. }
            | VerifyError::SessionClose { .. } => Stage::Notify,
        }
    }

    /// True for failures that happen before any network round-trip
    pub fn is_credential_setup(&self) -> bool {
        matches!(
            self.stage(),
            Stage::TokenGeneration | Stage::KeyParse | Stage::Signing
        )
    }
}

impl VerifyError {
    /// True only when the backend request provably never left this process,
    /// so sending it again cannot link the same token twice
    pub fn is_retryable(&self) -> bool {
        match self {
            VerifyError::Transport { source } => source.is_connect() && !source.is_timeout(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for VerifyError {
    fn from(err: serde_json::Error) -> Self {
        VerifyError::InvalidPacket {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tags() {
        let err = VerifyError::KeyParse {
            message: "bad pem".to_string(),
        };
        assert_eq!(err.stage(), Stage::KeyParse);
        assert!(err.is_credential_setup());
        assert!(err
            .to_string()
            .contains("error parsing private key string to rsa private key"));

        let err = VerifyError::SessionClose {
            message: "close error".to_string(),
        };
        assert_eq!(err.stage(), Stage::Notify);
        assert!(!err.is_credential_setup());
        assert_eq!(err.stage().to_string(), "notify");
    }

    #[test]
    fn test_http_client_failure_is_a_startup_error() {
        let source = reqwest::Client::new()
            .get("http://localhost:1234\x7f/")
            .build()
            .unwrap_err();
        let err = VerifyError::HttpClient { source };

        assert_eq!(err.stage(), Stage::Config);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("error creating http client"));
    }

    #[test]
    fn test_only_transport_errors_can_be_retried() {
        let source = reqwest::Client::new()
            .get("http://localhost:1234\x7f/")
            .build()
            .unwrap_err();
        assert!(!VerifyError::RequestBuild { source }.is_retryable());
        assert!(!VerifyError::Signing {
            message: "bad".to_string()
        }
        .is_retryable());
    }
}
