//! @ai:module:intent Benchmark runners and the shared context they execute in
//! @ai:module:layer application
//! @ai:module:public_api BenchmarkContext, BenchmarkKind, LegalMoveRunner, PuzzleRunner, EngineMatchRunner
//! @ai:module:stateless false

pub mod engine_match;
pub mod legal_moves;
pub mod prompt;
pub mod puzzles;

pub use engine_match::EngineMatchRunner;
pub use legal_moves::LegalMoveRunner;
pub use puzzles::PuzzleRunner;

use crate::config::BenchmarkConfig;
use crate::error::BenchError;
use crate::runner::{ModelInvoker, ModelRequest, ModelResponse, Provider};
use crate::store::{update_summary, RecordStore, RecordStoreExt, SummaryLocks};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// @ai:intent The three benchmark types, named as on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkKind {
    LegalMoves,
    Puzzles,
    EngineMatch,
}

impl BenchmarkKind {
    pub const ALL: [BenchmarkKind; 3] = [
        BenchmarkKind::LegalMoves,
        BenchmarkKind::Puzzles,
        BenchmarkKind::EngineMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BenchmarkKind::LegalMoves => "legal-moves",
            BenchmarkKind::Puzzles => "puzzles",
            BenchmarkKind::EngineMatch => "engine-match",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            BenchmarkKind::LegalMoves => "Legal Moves",
            BenchmarkKind::Puzzles => "Puzzles",
            BenchmarkKind::EngineMatch => "Engine Match",
        }
    }
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenchmarkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "legal-moves" => Ok(BenchmarkKind::LegalMoves),
            "puzzles" => Ok(BenchmarkKind::Puzzles),
            "engine-match" => Ok(BenchmarkKind::EngineMatch),
            other => Err(format!("unknown benchmark: {other}")),
        }
    }
}

/// @ai:intent Everything a runner needs: model access, settings and persistence
pub struct BenchmarkContext<I> {
    pub invoker: Arc<I>,
    pub config: Arc<BenchmarkConfig>,
    pub store: Arc<dyn RecordStore>,
    pub locks: Arc<SummaryLocks>,
}

impl<I> Clone for BenchmarkContext<I> {
    fn clone(&self) -> Self {
        Self {
            invoker: self.invoker.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            locks: self.locks.clone(),
        }
    }
}

impl<I: ModelInvoker> BenchmarkContext<I> {
    /// @ai:effects pure
    pub fn new(invoker: Arc<I>, config: Arc<BenchmarkConfig>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            invoker,
            config,
            store,
            locks: Arc::new(SummaryLocks::new()),
        }
    }

    /// @ai:intent Share summary locks with other contexts writing the same store
    pub fn with_locks(mut self, locks: Arc<SummaryLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// @ai:intent Invoke a model through the retrier
    /// @ai:post timeout-exempt models retry without a deadline; all others must finish within per_item_timeout
    /// @ai:effects network, time
    pub async fn call_model(
        &self,
        provider: Provider,
        model: &str,
        prompt: &str,
    ) -> Result<ModelResponse, BenchError> {
        let request = ModelRequest {
            provider,
            model,
            prompt,
            max_output_tokens: self.config.api.max_output_tokens,
        };
        let label = format!("{provider}/{model}");
        let policy = self.config.run.retry_policy();
        let request = &request;
        let invoker = self.invoker.as_ref();

        if self.config.is_timeout_exempt(provider, model) {
            return policy
                .run(&label, move || invoker.invoke(request, None))
                .await
                .map_err(BenchError::from);
        }

        let deadline = Instant::now() + self.config.run.per_item_timeout();
        policy
            .run_with_deadline(&label, deadline, move |budget| {
                invoker.invoke(request, Some(budget))
            })
            .await
            .map_err(BenchError::from)
    }

    /// @ai:effects store:write
    pub fn save_run<T: Serialize>(&self, group: &str, id: &str, run: &T) -> Result<(), BenchError> {
        self.store.set(group, id, run)?;
        Ok(())
    }

    /// @ai:intent Merge a finished run into its summary under the summary's key lock
    /// @ai:effects store:write
    pub async fn merge_summary<T, F>(&self, group: &str, id: &str, merge: F) -> Result<T, BenchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        Ok(update_summary(self.store.as_ref(), &self.locks, group, id, merge).await?)
    }
}

/// @ai:intent Text the answer parsers should read; falls back to the structured object
/// @ai:effects pure
pub(crate) fn answer_text(response: &ModelResponse) -> String {
    match &response.structured {
        Some(value) if response.text.trim().is_empty() => value.to_string(),
        _ => response.text.clone(),
    }
}

/// Counts completions for `completed i/N` progress lines.
pub(crate) struct Progress<'a> {
    run_id: &'a str,
    total: usize,
    done: AtomicUsize,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(run_id: &'a str, total: usize) -> Self {
        Self {
            run_id,
            total,
            done: AtomicUsize::new(0),
        }
    }

    pub(crate) fn tick(&self, index: usize) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(run_id = self.run_id, index, "completed {}/{}", done, self.total);
    }
}

pub(crate) fn elapsed_ms(started: std::time::Instant) -> u64 {
    started.elapsed().as_millis() as u64
}


#[cfg(test)]
mod tests {
    use super::testing::{context, context_with};
    use super::*;
    use crate::error::InvokeError;
    use crate::runner::{MockModelInvoker, ScriptedModelInvoker};
    use std::time::Duration;

    fn unavailable() -> InvokeError {
        InvokeError::Status {
            provider: "openai".to_string(),
            status: 503,
            retry_after: None,
            body: "overloaded".to_string(),
        }
    }

    #[tokio::test]
    async fn test_call_model_returns_text() {
        let ctx = context(MockModelInvoker::new(r#"{"move": "Qh5#"}"#));
        let response = ctx.call_model(Provider::Openai, "gpt-4o", "prompt").await.unwrap();
        assert_eq!(response.structured.unwrap()["move"], "Qh5#");
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_model_retries_transient_failures() {
        let invoker = ScriptedModelInvoker::new(|_, call| {
            if call == 0 {
                Err(unavailable())
            } else {
                Ok(r#"{"moves": ["e4"]}"#.to_string())
            }
        });
        let ctx = context(invoker);

        let response = ctx.call_model(Provider::Openai, "gpt-4o", "prompt").await.unwrap();
        assert!(response.text.contains("e4"));
        assert_eq!(ctx.invoker.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_model_enforces_per_item_deadline() {
        let invoker = ScriptedModelInvoker::new(|_, _| Ok("{}".to_string())).with_delay(Duration::from_secs(60));
        let ctx = context(invoker);

        let err = ctx.call_model(Provider::Openai, "gpt-4o", "prompt").await.unwrap_err();
        assert!(matches!(
            err,
            BenchError::DeadlineExceeded(_) | BenchError::Invoke(InvokeError::BudgetExceeded { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_exempt_model_waits_past_deadline() {
        let invoker = ScriptedModelInvoker::new(|_, _| Ok(r#"{"move": "e4"}"#.to_string()))
            .with_delay(Duration::from_secs(60));
        let ctx = context_with(invoker, BenchmarkConfig::default());

        let response = ctx.call_model(Provider::Grok, "grok-4-fast", "prompt").await.unwrap();
        assert!(response.text.contains("e4"));
    }

    #[test]
    fn test_benchmark_kind_names() {
        assert_eq!("legal_moves".parse::<BenchmarkKind>().unwrap(), BenchmarkKind::LegalMoves);
        assert_eq!(BenchmarkKind::EngineMatch.to_string(), "engine-match");
        assert_eq!(serde_json::to_string(&BenchmarkKind::Puzzles).unwrap(), "\"puzzles\"");
        assert!("blitz".parse::<BenchmarkKind>().is_err());
    }

    #[test]
    fn test_answer_text_falls_back_to_structured() {
        let response = ModelResponse {
            text: String::new(),
            structured: Some(serde_json::json!({ "move": "e4" })),
            raw: String::new(),
        };
        assert!(answer_text(&response).contains("e4"));
    }
}
