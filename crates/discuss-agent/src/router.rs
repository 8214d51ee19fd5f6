use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// Pause before retry `n` on the same slot is `n * RETRY_BACKOFF`.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// One entry in a [`ProviderRouter`] chain.
pub struct ProviderSlot {
    pub provider: Box<dyn LlmProvider>,
    /// Extra attempts on this provider before falling through to the next.
    pub max_retries: u32,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            provider,
            max_retries,
        }
    }

    /// Try this slot up to `1 + max_retries` times. A rate limit ends the
    /// slot at once.
    async fn attempt(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let name = self.provider.name();
        let mut attempt = 0;
        loop {
            let err = match self.provider.send(req).await {
                Ok(resp) => {
                    if attempt > 0 {
                        info!(provider = %name, attempt, "provider recovered on retry");
                    }
                    return Ok(resp);
                }
                Err(e) => e,
            };

            warn!(provider = %name, attempt, error = %err, "provider call failed");
            if attempt >= self.max_retries || matches!(err, ProviderError::RateLimited { .. }) {
                return Err(err);
            }

            attempt += 1;
            tokio::time::sleep(RETRY_BACKOFF * attempt).await;
        }
    }
}

/// Ordered failover across chat providers.
///
/// Slot 0 is preferred; each slot that gives up hands the request to the next.
/// The last slot's error is returned when every slot fails. This is the only
/// place completion calls are retried.
pub struct ProviderRouter {
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    pub fn new(slots: Vec<ProviderSlot>) -> Result<Self, ProviderError> {
        if slots.is_empty() {
            return Err(ProviderError::Unavailable(
                "no LLM provider configured".to_string(),
            ));
        }
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut last_err = None;
        for (index, slot) in self.slots.iter().enumerate() {
            match slot.attempt(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if index + 1 < self.slots.len() {
                        info!(provider = %slot.provider.name(), "falling through to next provider");
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::Unavailable("no provider slots".to_string())))
    }
}
