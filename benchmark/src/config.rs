//! @ai:module:intent Configuration structs for the chess benchmark, loaded from TOML with environment overrides
//! @ai:module:layer infrastructure
//! @ai:module:public_api BenchmarkConfig, ApiConfig, RunConfig, EngineConfig, ProviderConfig, PathConfig, parse_positive_int
//! @ai:module:stateless true

use crate::engine::{EngineCommand, EngineTimeouts};
use crate::error::{ConfigError, EngineError};
use crate::runner::{Provider, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// @ai:intent Main configuration for the benchmark system
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default = "default_providers")]
    pub providers: HashMap<Provider, ProviderConfig>,
    /// Models benchmarked per provider by matrix runs.
    #[serde(default = "default_catalog")]
    pub catalog: BTreeMap<Provider, Vec<String>>,
    #[serde(default)]
    pub paths: PathConfig,
}

/// @ai:intent HTTP settings for the model invoker
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_rate_limit")]
    pub default_requests_per_minute: u32,
    #[serde(default)]
    pub requests_per_minute: HashMap<Provider, u32>,
    /// Overrides of the provider API roots, e.g. for a local proxy.
    #[serde(default)]
    pub base_urls: HashMap<Provider, String>,
}

/// @ai:intent Timeouts, retries and concurrency of benchmark execution
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_per_item_timeout")]
    pub per_item_timeout_ms: u64,
    #[serde(default = "default_one")]
    pub transient_retries: u32,
    #[serde(default = "default_base_backoff")]
    pub retry_base_backoff_ms: u64,
    #[serde(default = "default_one_usize")]
    pub item_concurrency: usize,
    #[serde(default = "default_one_usize")]
    pub puzzle_concurrency: usize,
    #[serde(default = "default_provider_concurrency")]
    pub provider_concurrency: usize,
    #[serde(default = "default_one_usize")]
    pub model_concurrency_per_provider: usize,
    #[serde(default = "default_one_usize")]
    pub engine_match_concurrency: usize,
    #[serde(default = "default_item_count")]
    pub position_count: usize,
    #[serde(default = "default_item_count")]
    pub puzzle_count: usize,
}

/// @ai:intent External engine binary and match rules
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
    #[serde(default)]
    pub binary_args: Vec<String>,
    #[serde(default = "default_skill_level")]
    pub skill_level: i32,
    #[serde(default = "default_think_time")]
    pub think_time_ms: u64,
    #[serde(default = "default_eval_depth")]
    pub eval_depth: u32,
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_ms: u64,
    #[serde(default = "default_max_half_moves")]
    pub max_half_moves: u32,
    #[serde(default = "default_max_illegal_attempts")]
    pub max_illegal_attempts: u32,
}

/// @ai:intent Per-provider behaviour switches
/// @ai:effects pure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Run this provider's calls without a per-item deadline.
    #[serde(default)]
    pub disable_timeout: bool,
    /// Restricts `disable_timeout` to models with one of these prefixes; empty means all models.
    #[serde(default)]
    pub timeout_exempt_prefixes: Vec<String>,
}

/// @ai:intent Path configuration for inputs and outputs
/// @ai:effects pure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub store_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub positions_file: PathBuf,
    pub puzzles_file: PathBuf,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            run: RunConfig::default(),
            engine: EngineConfig::default(),
            providers: default_providers(),
            catalog: default_catalog(),
            paths: PathConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: default_max_output_tokens(),
            connect_timeout_secs: default_connect_timeout(),
            default_requests_per_minute: default_rate_limit(),
            requests_per_minute: HashMap::new(),
            base_urls: HashMap::new(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            per_item_timeout_ms: default_per_item_timeout(),
            transient_retries: default_one(),
            retry_base_backoff_ms: default_base_backoff(),
            item_concurrency: 1,
            puzzle_concurrency: 1,
            provider_concurrency: default_provider_concurrency(),
            model_concurrency_per_provider: 1,
            engine_match_concurrency: 1,
            position_count: default_item_count(),
            puzzle_count: default_item_count(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            binary_args: Vec::new(),
            skill_level: default_skill_level(),
            think_time_ms: default_think_time(),
            eval_depth: default_eval_depth(),
            handshake_timeout_ms: default_handshake_timeout(),
            ready_timeout_ms: default_ready_timeout(),
            search_timeout_ms: default_search_timeout(),
            max_half_moves: default_max_half_moves(),
            max_illegal_attempts: default_max_illegal_attempts(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data"),
            reports_dir: PathBuf::from("reports"),
            positions_file: PathBuf::from("corpus/positions"),
            puzzles_file: PathBuf::from("corpus/puzzles"),
        }
    }
}

fn default_max_output_tokens() -> u32 {
    192
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_rate_limit() -> u32 {
    60
}

fn default_per_item_timeout() -> u64 {
    10_000
}

fn default_one() -> u32 {
    1
}

fn default_one_usize() -> usize {
    1
}

fn default_base_backoff() -> u64 {
    200
}

fn default_provider_concurrency() -> usize {
    4
}

fn default_item_count() -> usize {
    20
}

fn default_skill_level() -> i32 {
    10
}

fn default_think_time() -> u64 {
    500
}

fn default_eval_depth() -> u32 {
    15
}

fn default_handshake_timeout() -> u64 {
    5_000
}

fn default_ready_timeout() -> u64 {
    2_000
}

fn default_search_timeout() -> u64 {
    30_000
}

fn default_max_half_moves() -> u32 {
    200
}

fn default_max_illegal_attempts() -> u32 {
    3
}

fn default_providers() -> HashMap<Provider, ProviderConfig> {
    HashMap::from([(
        Provider::Grok,
        ProviderConfig {
            disable_timeout: true,
            timeout_exempt_prefixes: vec!["grok-3".to_string(), "grok-4".to_string()],
        },
    )])
}

fn default_catalog() -> BTreeMap<Provider, Vec<String>> {
    let models = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
    BTreeMap::from([
        (
            Provider::Openai,
            models(&["gpt-5-2025-08-07", "gpt-5-mini-2025-08-07", "gpt-4.1-mini-2025-04-14", "o4-mini-2025-04-16"]),
        ),
        (
            Provider::Gemini,
            models(&["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.0-flash-001"]),
        ),
        (
            Provider::Claude,
            models(&["claude-sonnet-4-5-20250929", "claude-opus-4-1-20250805", "claude-haiku-4-5-20251001"]),
        ),
        (Provider::Grok, models(&["grok-4-fast", "grok-3-mini", "grok-3"])),
    ])
}

/// @ai:intent Parse a strictly positive integer, falling back on anything else
/// @ai:effects pure
pub fn parse_positive_int<T>(value: Option<&str>, fallback: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default,
{
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .filter(|n| *n > T::default())
        .unwrap_or(fallback)
}

impl BenchmarkConfig {
    /// @ai:intent Load configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// @ai:intent Apply BENCHMARK_* and STOCKFISH_BIN_PATH from the process environment
    /// @ai:effects env
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// @ai:intent Apply overrides from any variable lookup; invalid values keep the current setting
    /// @ai:effects pure
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let run = &mut self.run;
        let get = |key: &str| lookup(key);

        run.per_item_timeout_ms =
            parse_positive_int(get("BENCHMARK_PER_ITEM_TIMEOUT_MS").as_deref(), run.per_item_timeout_ms);
        run.transient_retries =
            parse_positive_int(get("BENCHMARK_TRANSIENT_RETRIES").as_deref(), run.transient_retries);
        run.retry_base_backoff_ms =
            parse_positive_int(get("BENCHMARK_RETRY_BASE_BACKOFF_MS").as_deref(), run.retry_base_backoff_ms);
        run.item_concurrency =
            parse_positive_int(get("BENCHMARK_ITEM_CONCURRENCY").as_deref(), run.item_concurrency);
        run.puzzle_concurrency =
            parse_positive_int(get("BENCHMARK_PUZZLE_CONCURRENCY").as_deref(), run.puzzle_concurrency);
        run.provider_concurrency =
            parse_positive_int(get("BENCHMARK_PROVIDER_CONCURRENCY").as_deref(), run.provider_concurrency);
        run.model_concurrency_per_provider = parse_positive_int(
            get("BENCHMARK_MODEL_CONCURRENCY_PER_PROVIDER").as_deref(),
            run.model_concurrency_per_provider,
        );

        self.api.max_output_tokens =
            parse_positive_int(get("BENCHMARK_MAX_OUTPUT_TOKENS").as_deref(), self.api.max_output_tokens);

        for provider in Provider::ALL {
            let key = format!("BENCHMARK_{}_DISABLE_TIMEOUT", provider.as_str().to_uppercase());
            let flag = match get(&key).as_deref().map(str::trim) {
                Some("true") => true,
                Some("false") => false,
                _ => continue,
            };
            self.providers.entry(provider).or_default().disable_timeout = flag;
        }

        if let Some(path) = get("STOCKFISH_BIN_PATH").filter(|p| !p.trim().is_empty()) {
            self.engine.binary_path = Some(PathBuf::from(path));
        }
    }

    /// @ai:intent Whether calls to this model run without a per-item deadline
    /// @ai:effects pure
    pub fn is_timeout_exempt(&self, provider: Provider, model: &str) -> bool {
        self.providers
            .get(&provider)
            .filter(|p| p.disable_timeout)
            .map(|p| {
                p.timeout_exempt_prefixes.is_empty()
                    || p.timeout_exempt_prefixes.iter().any(|prefix| model.starts_with(prefix.as_str()))
            })
            .unwrap_or(false)
    }

    /// @ai:intent Models of one provider from the catalog
    /// @ai:effects pure
    pub fn models(&self, provider: Provider) -> &[String] {
        self.catalog.get(&provider).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl RunConfig {
    pub fn per_item_timeout(&self) -> Duration {
        Duration::from_millis(self.per_item_timeout_ms)
    }

    /// @ai:effects pure
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.transient_retries,
            Duration::from_millis(self.retry_base_backoff_ms),
        )
    }
}

impl EngineConfig {
    /// @ai:intent Command that starts the configured engine
    /// @ai:post Err(BinaryNotConfigured) when no path is set
    /// @ai:effects pure
    pub fn command(&self) -> Result<EngineCommand, EngineError> {
        let path = self.binary_path.as_ref().ok_or(EngineError::BinaryNotConfigured)?;
        Ok(self
            .binary_args
            .iter()
            .fold(EngineCommand::new(path), |command, arg| command.arg(arg.as_str())))
    }

    pub fn timeouts(&self) -> EngineTimeouts {
        EngineTimeouts {
            handshake: Duration::from_millis(self.handshake_timeout_ms),
            ready: Duration::from_millis(self.ready_timeout_ms),
            search: Duration::from_millis(self.search_timeout_ms),
        }
    }

    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.think_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_positive_int() {
        assert_eq!(parse_positive_int(Some("25"), 10u64), 25);
        assert_eq!(parse_positive_int(Some(" 7 "), 10u64), 7);
        assert_eq!(parse_positive_int(Some("0"), 10u64), 10);
        assert_eq!(parse_positive_int(Some("-3"), 10i32), 10);
        assert_eq!(parse_positive_int(Some("abc"), 10u64), 10);
        assert_eq!(parse_positive_int(None, 4usize), 4);
    }

    #[test]
    fn test_defaults_match_environment_defaults() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.run.per_item_timeout_ms, 10_000);
        assert_eq!(config.api.max_output_tokens, 192);
        assert_eq!(config.run.transient_retries, 1);
        assert_eq!(config.run.retry_base_backoff_ms, 200);
        assert_eq!(config.run.provider_concurrency, 4);
        assert_eq!(config.engine.max_half_moves, 200);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BenchmarkConfig::default();
        config.apply_overrides(env(&[
            ("BENCHMARK_PER_ITEM_TIMEOUT_MS", "30000"),
            ("BENCHMARK_ITEM_CONCURRENCY", "8"),
            ("BENCHMARK_PROVIDER_CONCURRENCY", "nope"),
            ("BENCHMARK_OPENAI_DISABLE_TIMEOUT", "true"),
            ("STOCKFISH_BIN_PATH", "/usr/bin/stockfish"),
        ]));

        assert_eq!(config.run.per_item_timeout_ms, 30_000);
        assert_eq!(config.run.item_concurrency, 8);
        assert_eq!(config.run.provider_concurrency, 4);
        assert!(config.is_timeout_exempt(Provider::Openai, "gpt-5"));
        assert_eq!(config.engine.binary_path, Some(PathBuf::from("/usr/bin/stockfish")));
    }

    #[test]
    fn test_grok_exemption_is_limited_to_prefixes() {
        let mut config = BenchmarkConfig::default();
        assert!(config.is_timeout_exempt(Provider::Grok, "grok-4-fast"));
        assert!(config.is_timeout_exempt(Provider::Grok, "grok-3-mini"));
        assert!(!config.is_timeout_exempt(Provider::Grok, "grok-2"));
        assert!(!config.is_timeout_exempt(Provider::Claude, "claude-sonnet-4-5-20250929"));

        config.apply_overrides(env(&[("BENCHMARK_GROK_DISABLE_TIMEOUT", "false")]));
        assert!(!config.is_timeout_exempt(Provider::Grok, "grok-4-fast"));
    }

    #[test]
    fn test_engine_command_requires_path() {
        let config = EngineConfig::default();
        assert!(matches!(config.command(), Err(EngineError::BinaryNotConfigured)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("benchmark.toml");

        let mut config = BenchmarkConfig::default();
        config.run.item_concurrency = 3;
        config.api.requests_per_minute.insert(Provider::Claude, 50);
        config.save(&path).unwrap();

        let loaded = BenchmarkConfig::load(&path).unwrap();
        assert_eq!(loaded.run, config.run);
        assert_eq!(loaded.catalog, config.catalog);
        assert_eq!(loaded.api.requests_per_minute.get(&Provider::Claude), Some(&50));
        assert!(loaded.is_timeout_exempt(Provider::Grok, "grok-4"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("benchmark.toml");
        std::fs::write(&path, "[run]\nitem_concurrency = 2\n").unwrap();

        let loaded = BenchmarkConfig::load(&path).unwrap();
        assert_eq!(loaded.run.item_concurrency, 2);
        assert_eq!(loaded.run.per_item_timeout_ms, 10_000);
        assert!(!loaded.models(Provider::Openai).is_empty());
    }
}
