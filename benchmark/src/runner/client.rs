//! @ai:module:intent Model invoker abstraction and the HTTP implementation used by benchmark runs
//! @ai:module:layer infrastructure
//! @ai:module:public_api Provider, ModelInvoker, ModelRequest, ModelResponse, HttpModelInvoker, MockModelInvoker, ScriptedModelInvoker
//! @ai:module:stateless false

use crate::config::ApiConfig;
use crate::error::{ConfigError, InvokeError};
use crate::runner::rate_limiter::ProviderLimiters;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// @ai:intent Model vendor; determines endpoint, auth and API key variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Openai,
    Gemini,
    Claude,
    Grok,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Openai,
        Provider::Gemini,
        Provider::Claude,
        Provider::Grok,
    ];

    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Openai => "openai",
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::Grok => "grok",
        }
    }

    /// @ai:intent Environment variable holding this provider's API key
    /// @ai:effects pure
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::Grok => "XAI_API_KEY",
        }
    }

    /// @ai:effects pure
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Openai => "https://api.openai.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Provider::Claude => "https://api.anthropic.com/v1",
            Provider::Grok => "https://api.x.ai/v1",
        }
    }

    fn uses_messages_api(&self) -> bool {
        matches!(self, Provider::Claude)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

/// @ai:intent One prompt sent to one model
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub provider: Provider,
    pub model: &'a str,
    pub prompt: &'a str,
    pub max_output_tokens: u32,
}

/// @ai:intent Model answer: full text, parsed JSON object if the text is one, raw body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    pub structured: Option<Value>,
    pub raw: String,
}

impl ModelResponse {
    /// @ai:intent Build a response from answer text, parsing it as a JSON object when possible
    /// @ai:effects pure
    pub fn from_text(text: impl Into<String>, raw: impl Into<String>) -> Self {
        let text = text.into();
        let structured = serde_json::from_str::<Value>(text.trim())
            .ok()
            .filter(Value::is_object);
        Self {
            text,
            structured,
            raw: raw.into(),
        }
    }
}

/// @ai:intent Trait for calling a language model
pub trait ModelInvoker: Send + Sync {
    /// @ai:intent Send one prompt; must give up once `budget` elapses
    /// @ai:post failures carry the status code and retry-after header when the server sent them
    fn invoke(
        &self,
        request: &ModelRequest<'_>,
        budget: Option<Duration>,
    ) -> impl Future<Output = Result<ModelResponse, InvokeError>> + Send;
}

/// @ai:intent reqwest-backed invoker: Anthropic Messages API for claude, OpenAI-compatible chat completions otherwise
pub struct HttpModelInvoker {
    client: reqwest::Client,
    base_urls: HashMap<Provider, String>,
    api_keys: HashMap<Provider, String>,
    limiters: ProviderLimiters,
}

impl HttpModelInvoker {
    /// @ai:intent Create an invoker, reading API keys from the environment
    /// @ai:post providers without a key fail per call with MissingApiKey
    /// @ai:effects env
    pub fn new(config: &ApiConfig) -> Result<Self, InvokeError> {
        let api_keys = Provider::ALL
            .iter()
            .filter_map(|p| {
                std::env::var(p.api_key_env())
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .map(|key| (*p, key))
            })
            .collect();
        Self::with_keys(config, api_keys)
    }

    /// @ai:intent Create an invoker with explicit API keys
    /// @ai:effects pure
    pub fn with_keys(config: &ApiConfig, api_keys: HashMap<Provider, String>) -> Result<Self, InvokeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| InvokeError::Transport {
                provider: "http".to_string(),
                message: e.to_string(),
            })?;

        let base_urls = Provider::ALL
            .iter()
            .map(|p| {
                let url = config
                    .base_urls
                    .get(p)
                    .cloned()
                    .unwrap_or_else(|| p.default_base_url().to_string());
                (*p, url.trim_end_matches('/').to_string())
            })
            .collect();

        Ok(Self {
            client,
            base_urls,
            api_keys,
            limiters: ProviderLimiters::new(&config.requests_per_minute, config.default_requests_per_minute),
        })
    }

    fn endpoint(&self, provider: Provider) -> String {
        let base = self
            .base_urls
            .get(&provider)
            .map(String::as_str)
            .unwrap_or_else(|| provider.default_base_url());
        if provider.uses_messages_api() {
            format!("{base}/messages")
        } else {
            format!("{base}/chat/completions")
        }
    }
}

/// @ai:intent Provider-specific JSON request body
/// @ai:effects pure
fn request_body(request: &ModelRequest<'_>) -> Value {
    let messages = json!([{ "role": "user", "content": request.prompt }]);
    if request.provider.uses_messages_api() {
        json!({
            "model": request.model,
            "max_tokens": request.max_output_tokens,
            "messages": messages,
        })
    } else {
        json!({
            "model": request.model,
            "max_tokens": request.max_output_tokens,
            "messages": messages,
            "response_format": { "type": "json_object" },
        })
    }
}

/// @ai:intent Pull the answer text out of a provider response body
/// @ai:effects pure
fn completion_text(provider: Provider, body: &Value) -> Option<String> {
    if provider.uses_messages_api() {
        let blocks = body.get("content")?.as_array()?;
        let text: Vec<&str> = blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text.join("\n"))
        }
    } else {
        body.get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
            .map(str::to_string)
    }
}

fn classify_send_error(provider: Provider, budget: Option<Duration>, err: reqwest::Error) -> InvokeError {
    if err.is_connect() {
        InvokeError::Connect {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else if let (true, Some(budget)) = (err.is_timeout(), budget) {
        InvokeError::BudgetExceeded {
            provider: provider.to_string(),
            budget,
        }
    } else {
        InvokeError::Transport {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

impl ModelInvoker for HttpModelInvoker {
    /// @ai:intent POST the prompt and return the model's text
    /// @ai:effects network
    async fn invoke(
        &self,
        request: &ModelRequest<'_>,
        budget: Option<Duration>,
    ) -> Result<ModelResponse, InvokeError> {
        let provider = request.provider;
        let api_key = self
            .api_keys
            .get(&provider)
            .ok_or(InvokeError::MissingApiKey(provider.api_key_env()))?;

        self.limiters.wait(provider).await;

        let mut builder = self
            .client
            .post(self.endpoint(provider))
            .header("content-type", "application/json")
            .json(&request_body(request));

        builder = if provider.uses_messages_api() {
            builder
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
        } else {
            builder.bearer_auth(api_key)
        };

        if let Some(budget) = budget {
            builder = builder.timeout(budget);
        }

        tracing::debug!(%provider, model = request.model, ?budget, "invoking model");

        let response = builder
            .send()
            .await
            .map_err(|e| classify_send_error(provider, budget, e))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let raw = response
            .text()
            .await
            .map_err(|e| classify_send_error(provider, budget, e))?;

        if !status.is_success() {
            return Err(InvokeError::Status {
                provider: provider.to_string(),
                status: status.as_u16(),
                retry_after,
                body: raw,
            });
        }

        let body: Value = serde_json::from_str(&raw).map_err(|e| InvokeError::Malformed {
            provider: provider.to_string(),
            message: e.to_string(),
        })?;

        let text = completion_text(provider, &body).ok_or_else(|| InvokeError::Malformed {
            provider: provider.to_string(),
            message: "response has no text content".to_string(),
        })?;

        Ok(ModelResponse::from_text(text, raw))
    }
}

/// @ai:intent Mock invoker that always answers with the same text
pub struct MockModelInvoker {
    response: String,
}

impl MockModelInvoker {
    /// @ai:intent Create a mock invoker that returns a fixed response
    /// @ai:effects pure
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl ModelInvoker for MockModelInvoker {
    /// @ai:effects pure
    async fn invoke(
        &self,
        _request: &ModelRequest<'_>,
        _budget: Option<Duration>,
    ) -> Result<ModelResponse, InvokeError> {
        Ok(ModelResponse::from_text(self.response.clone(), self.response.clone()))
    }
}

type Responder = dyn Fn(&ModelRequest<'_>, usize) -> Result<String, InvokeError> + Send + Sync;

/// @ai:intent Invoker whose answer is computed per call from the request and the call number
pub struct ScriptedModelInvoker {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedModelInvoker {
    /// @ai:intent Create an invoker from a responder; the call number starts at 0
    /// @ai:effects pure
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ModelRequest<'_>, usize) -> Result<String, InvokeError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// @ai:intent Make every call take `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// @ai:intent Number of invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelInvoker for ScriptedModelInvoker {
    /// @ai:effects time
    async fn invoke(
        &self,
        request: &ModelRequest<'_>,
        budget: Option<Duration>,
    ) -> Result<ModelResponse, InvokeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            if let Some(budget) = budget.filter(|b| *b < delay) {
                tokio::time::sleep(budget).await;
                return Err(InvokeError::BudgetExceeded {
                    provider: request.provider.to_string(),
                    budget,
                });
            }
            tokio::time::sleep(delay).await;
        }

        let text = (self.responder)(request, call)?;
        Ok(ModelResponse::from_text(text.clone(), text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(provider: Provider) -> ModelRequest<'static> {
        ModelRequest {
            provider,
            model: "test-model",
            prompt: "Find the move",
            max_output_tokens: 192,
        }
    }

    #[test]
    fn test_provider_round_trips_through_str() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
        assert!("mistral".parse::<Provider>().is_err());
        assert_eq!(" Claude ".parse::<Provider>().unwrap(), Provider::Claude);
    }

    #[test]
    fn test_request_body_shapes() {
        let claude = request_body(&request(Provider::Claude));
        assert_eq!(claude["max_tokens"], 192);
        assert!(claude.get("response_format").is_none());

        let openai = request_body(&request(Provider::Openai));
        assert_eq!(openai["response_format"]["type"], "json_object");
        assert_eq!(openai["messages"][0]["content"], "Find the move");
    }

    #[test]
    fn test_completion_text_per_provider() {
        let anthropic = json!({ "content": [{ "type": "text", "text": "{\"move\":\"e4\"}" }] });
        assert_eq!(
            completion_text(Provider::Claude, &anthropic).as_deref(),
            Some("{\"move\":\"e4\"}")
        );

        let openai = json!({ "choices": [{ "message": { "content": "Nf3" } }] });
        assert_eq!(completion_text(Provider::Grok, &openai).as_deref(), Some("Nf3"));

        assert_eq!(completion_text(Provider::Openai, &json!({})), None);
    }

    #[test]
    fn test_response_parses_json_objects_only() {
        let structured = ModelResponse::from_text(" {\"moves\": [\"e4\"]} ", "");
        assert_eq!(structured.structured, Some(json!({ "moves": ["e4"] })));

        let prose = ModelResponse::from_text("I play e4", "");
        assert_eq!(prose.structured, None);

        let array = ModelResponse::from_text("[1, 2]", "");
        assert_eq!(array.structured, None);
    }

    #[tokio::test]
    async fn test_mock_invoker() {
        let invoker = MockModelInvoker::new("{\"move\": \"Qh5#\"}");
        let response = invoker.invoke(&request(Provider::Openai), None).await.unwrap();
        assert_eq!(response.structured, Some(json!({ "move": "Qh5#" })));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_reported_before_any_request() {
        let invoker = HttpModelInvoker::with_keys(&ApiConfig::default(), HashMap::new()).unwrap();
        let err = invoker
            .invoke(&request(Provider::Grok), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::MissingApiKey("XAI_API_KEY")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_invoker_honors_budget() {
        let invoker = ScriptedModelInvoker::new(|_, call| Ok(format!("answer {call}")))
            .with_delay(Duration::from_secs(5));

        let err = invoker
            .invoke(&request(Provider::Gemini), Some(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::BudgetExceeded { .. }));

        let ok = invoker.invoke(&request(Provider::Gemini), None).await.unwrap();
        assert_eq!(ok.text, "answer 1");
        assert_eq!(invoker.calls(), 2);
    }
}
