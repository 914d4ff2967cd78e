use crate::error::NetworkError;
use async_trait::async_trait;

/// Source of raw search-page HTML.
/// The pipeline only depends on this, so tests can serve fixtures instead of the network
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one page and return its body
    async fn fetch(&self, url: &str) -> Result<String, NetworkError>;

    /// Get the name of the fetcher, used in logs
    fn name(&self) -> &'static str;
}
