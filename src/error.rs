use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShimError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ShimError>;

/// Failures of the upstream forwarding loop.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// A single attempt never produced an HTTP response (connect, DNS, timeout).
    #[error("{0}")]
    Transport(String),

    #[error("{last} (after {attempts} attempts)")]
    Exhausted { attempts: u32, last: String },
}

impl From<reqwest::Error> for ForwardError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest's Display hides the cause ("connection refused", "timed out").
        let mut msg = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(inner) = source {
            msg.push_str(": ");
            msg.push_str(&inner.to_string());
            source = std::error::Error::source(inner);
        }
        ForwardError::Transport(msg)
    }
}

impl ForwardError {
    /// Description of the last transport failure, without retry bookkeeping.
    pub fn last_failure(&self) -> &str {
        match self {
            ForwardError::Transport(msg) => msg,
            ForwardError::Exhausted { last, .. } => last,
        }
    }
}
