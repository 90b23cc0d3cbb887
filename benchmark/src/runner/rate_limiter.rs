//! @ai:module:intent Per-provider request rate limiting for model calls
//! @ai:module:layer infrastructure
//! @ai:module:public_api RateLimiter, RateLimiterTrait, ProviderLimiters
//! @ai:module:stateless false

use crate::runner::client::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// @ai:intent Trait for rate limiting functionality
pub trait RateLimiterTrait: Send + Sync {
    /// @ai:intent Wait until a request is allowed
    fn wait(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// @ai:intent Token bucket limiter refilled continuously at requests_per_minute
pub struct RateLimiter {
    state: Mutex<BucketState>,
    requests_per_minute: u32,
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

impl RateLimiter {
    /// @ai:intent Create a full bucket
    /// @ai:pre requests_per_minute > 0 (zero is treated as one)
    /// @ai:effects pure
    pub fn new(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        Self {
            state: Mutex::new(BucketState {
                tokens: requests_per_minute as f64,
                last_update: Instant::now(),
            }),
            requests_per_minute,
        }
    }

    /// @ai:effects state:write
    fn refill(state: &mut BucketState, rpm: u32) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update);
        let tokens_to_add = elapsed.as_secs_f64() * (rpm as f64 / 60.0);
        state.tokens = (state.tokens + tokens_to_add).min(rpm as f64);
        state.last_update = now;
    }
}

impl RateLimiterTrait for RateLimiter {
    /// @ai:intent Wait until a request is allowed
    /// @ai:effects state:write, time
    async fn wait(&self) {
        loop {
            let sleep_duration = {
                let mut state = self.state.lock().await;
                Self::refill(&mut state, self.requests_per_minute);

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }

                let tokens_needed = 1.0 - state.tokens;
                Duration::from_secs_f64(tokens_needed / (self.requests_per_minute as f64 / 60.0))
            };

            tokio::time::sleep(sleep_duration).await;
        }
    }
}

/// @ai:intent One independent bucket per provider
pub struct ProviderLimiters {
    limiters: HashMap<Provider, Arc<RateLimiter>>,
}

impl ProviderLimiters {
    /// @ai:intent Build buckets from a provider -> requests/minute table
    /// @ai:post providers missing from the table fall back to default_rpm
    /// @ai:effects pure
    pub fn new(per_provider: &HashMap<Provider, u32>, default_rpm: u32) -> Self {
        let limiters = Provider::ALL
            .iter()
            .map(|provider| {
                let rpm = per_provider.get(provider).copied().unwrap_or(default_rpm);
                (*provider, Arc::new(RateLimiter::new(rpm)))
            })
            .collect();
        Self { limiters }
    }

    /// @ai:intent Wait for the given provider's bucket
    /// @ai:effects state:write, time
    pub async fn wait(&self, provider: Provider) {
        if let Some(limiter) = self.limiters.get(&provider) {
            limiter.wait().await;
        }
    }
}
