//! Outbound delivery
//!
//! POSTs a pending item's body and forwarded headers to the collector.
//!
//! # Example
//!
//! ```ignore
//! let client = HttpDeliveryClient::new(&DeliveryConfig {
//!     destination_url: "https://collector.example.com/api/".into(),
//!     ..Default::default()
//! })?;
//! let delivered = client.attempt(&item).await?;
//! ```

use crate::relay::item::PendingItem;
use crate::relay::types::{DeliveryConfig, RelayError, RelayResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

/// One-shot delivery of a pending item
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Try to deliver `item` once.
    ///
    /// `Ok(true)` means the destination accepted it, `Ok(false)` covers
    /// unreachable destinations, timeouts and rejecting status codes. `Err`
    /// is reserved for failures that point at a configuration defect.
    async fn attempt(&self, item: &PendingItem) -> RelayResult<bool>;
}

/// reqwest-backed delivery to a single destination URL
pub struct HttpDeliveryClient {
    client: Client,
    url: Url,
}

impl HttpDeliveryClient {
    /// Create a client for the configured destination
    ///
    /// # Errors
    /// Returns `RelayError::InvalidConfig` if the URL is malformed or not
    /// http(s), or if the HTTP client cannot be built
    pub fn new(config: &DeliveryConfig) -> RelayResult<Self> {
        let url = Url::parse(&config.destination_url).map_err(|e| {
            RelayError::InvalidConfig(format!(
                "invalid destination URL {:?}: {e}",
                config.destination_url
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::InvalidConfig(format!(
                "destination URL must be http or https, got {:?}",
                url.scheme()
            )));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RelayError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn attempt(&self, item: &PendingItem) -> RelayResult<bool> {
        let mut request = self.client.post(self.url.clone()).body(item.body().clone());

        for (name, value) in item.headers() {
            request = request.header(*name, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                debug!(
                    item_id = item.id(),
                    url = %self.url,
                    status = %status,
                    "Delivery attempt answered"
                );
                // Only an exact 200 counts; 201/202/204 are treated as rejections
                Ok(status == StatusCode::OK)
            }
            Err(e) if e.is_connect() || e.is_timeout() => {
                debug!(item_id = item.id(), url = %self.url, error = %e, "Destination unreachable");
                Ok(false)
            }
            Err(e) => Err(RelayError::Transport(format!(
                "POST {} failed: {e}",
                self.url
            ))),
        }
    }
}
