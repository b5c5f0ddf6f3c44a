//! Document byte retrieval - pure I/O, no state

use std::io::Read;
use std::time::Duration;

/// Retrieves raw document bytes for a URL.
///
/// Implementations must be cheap to call repeatedly; retry policy lives in
/// the engine, not here.
pub trait DocumentFetcher: Send {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Why a fetch failed
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches over HTTP(S) through a shared agent, or from the filesystem for
/// `file://` URLs and bare paths.
pub struct StandardFetcher {
    agent: ureq::Agent,
}

impl StandardFetcher {
    /// `timeout` bounds each HTTP request end to end; it should not exceed
    /// the engine's per-attempt load budget.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }
}

impl DocumentFetcher for StandardFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(std::fs::read(path)?);
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Ok(std::fs::read(url)?);
        }

        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FetchError::Status(code),
            other => FetchError::Transport(other.to_string()),
        })?;

        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}
