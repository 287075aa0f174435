//! Currency Integration
//!
//! Exchange-rate sources and a short-lived quote cache in front of them.

mod exchangerate;
mod mock;

pub use exchangerate::ExchangeRateApiClient;
pub use mock::MockRateSource;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::model::RateQuote;

/// Exchange-rate source trait (Strategy pattern)
///
/// Codes passed in are already normalized 3-letter uppercase ISO 4217.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Units of `to` per unit of `from`
    async fn rate(&self, from: &str, to: &str) -> Result<RateQuote>;

    /// Source name
    fn name(&self) -> &str;
}

/// Caches quotes per currency pair for `ttl`
pub struct CachedRateSource {
    inner: Arc<dyn RateSource>,
    ttl: Duration,
    quotes: RwLock<HashMap<(String, String), (RateQuote, Instant)>>,
}

impl CachedRateSource {
    pub fn new(inner: Arc<dyn RateSource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            quotes: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateSource for CachedRateSource {
    async fn rate(&self, from: &str, to: &str) -> Result<RateQuote> {
        let key = (from.to_string(), to.to_string());
        if let Some((quote, fetched)) = self.quotes.read().await.get(&key) {
            if fetched.elapsed() < self.ttl {
                return Ok(quote.clone());
            }
        }

        let quote = self.inner.rate(from, to).await?;
        self.quotes
            .write()
            .await
            .insert(key, (quote.clone(), Instant::now()));
        Ok(quote)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
