//! @ai:module:intent Model invocation, retry and bounded-concurrency scheduling
//! @ai:module:layer infrastructure
//! @ai:module:public_api ModelInvoker, HttpModelInvoker, Provider, RetryPolicy, RateLimiter, work_pool

pub mod client;
pub mod rate_limiter;
pub mod retry;
pub mod work_pool;

pub use client::{
    HttpModelInvoker, MockModelInvoker, ModelInvoker, ModelRequest, ModelResponse, Provider,
    ScriptedModelInvoker,
};
pub use rate_limiter::{ProviderLimiters, RateLimiter, RateLimiterTrait};
pub use retry::{is_transient, parse_retry_after, RetryClassify, RetryError, RetryPolicy};
