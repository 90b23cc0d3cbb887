//! @ai:module:intent CLI for the chess benchmark system
//! @ai:module:layer presentation

use anyhow::{Context, Result};
use chess_bench::{
    benchmarks::{BenchmarkContext, BenchmarkKind, LegalMoveRunner, PuzzleRunner},
    config::BenchmarkConfig,
    corpus::{CorpusSource, FileCorpus, PuzzleSet, PuzzleTheme},
    engine::EngineSession,
    metrics::{LegalMoveRun, PuzzleRun},
    orchestrator::{MatrixJob, MatrixOptions, MatrixOrchestrator, MatrixReport},
    report::{Leaderboard, ReportGenerator},
    rules::START_FEN,
    runner::{HttpModelInvoker, Provider},
    store::{JsonFileStore, RecordStore},
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chess-bench")]
#[command(about = "Benchmark language models on legal moves, puzzles and engine matches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Benchmarks that can run without an embedded rules engine.
#[derive(Clone, Copy, ValueEnum)]
enum CliBenchmark {
    LegalMoves,
    Puzzles,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one benchmark for one model
    Run {
        #[arg(value_enum)]
        benchmark: CliBenchmark,

        /// Provider (openai, gemini, claude, grok)
        #[arg(short, long)]
        provider: Provider,

        /// Model id as understood by the provider
        #[arg(short, long)]
        model: String,

        /// Number of positions or puzzles (defaults to the configured count)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Puzzle theme
        #[arg(long, default_value = "mateIn1")]
        theme: PuzzleTheme,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run one benchmark for every model in the catalog
    Matrix {
        #[arg(value_enum)]
        benchmark: CliBenchmark,

        /// Also run models that already have a score for this benchmark
        #[arg(long)]
        rerun_completed: bool,

        /// Restrict to these providers (comma-separated)
        #[arg(long, value_delimiter = ',')]
        providers: Vec<Provider>,

        /// Number of positions or puzzles (defaults to the configured count)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Puzzle theme
        #[arg(long, default_value = "mateIn1")]
        theme: PuzzleTheme,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write leaderboard reports from stored summaries
    Leaderboard {
        /// legal-moves, puzzles or engine-match
        #[arg(short, long)]
        benchmark: BenchmarkKind,

        /// Output directory for reports (defaults to paths.reports_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "benchmark.toml")]
        output: PathBuf,
    },

    /// List the provider and model catalog
    Models {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Start the configured engine, evaluate the start position and shut it down
    EngineCheck {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chess_bench=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            benchmark,
            provider,
            model,
            count,
            theme,
            config,
        } => run_single(benchmark, provider, model, count, theme, config).await,
        Commands::Matrix {
            benchmark,
            rerun_completed,
            providers,
            count,
            theme,
            config,
        } => {
            let options = MatrixOptions {
                providers: (!providers.is_empty()).then_some(providers),
                rerun_completed,
            };
            run_matrix(benchmark, options, count, theme, config).await
        }
        Commands::Leaderboard {
            benchmark,
            output,
            config,
        } => write_leaderboard(benchmark, output, config),
        Commands::Init { output } => init_config(output),
        Commands::Models { config } => list_models(config),
        Commands::EngineCheck { config } => engine_check(config).await,
    }
}

/// @ai:intent Benchmark one model and print its run
/// @ai:effects network, fs:read, fs:write
async fn run_single(
    benchmark: CliBenchmark,
    provider: Provider,
    model: String,
    count: Option<usize>,
    theme: PuzzleTheme,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_or_default_config(config_path)?;
    let corpus = corpus_for(&config);
    let ctx = build_context(config)?;

    match benchmark {
        CliBenchmark::LegalMoves => {
            let positions = corpus
                .positions(count.unwrap_or(ctx.config.run.position_count))
                .context("Failed to load test positions")?;
            let run = LegalMoveRunner::new(ctx).run(provider, &model, &positions).await?;
            print_legal_move_run(&run);
        }
        CliBenchmark::Puzzles => {
            let puzzles = corpus
                .puzzles(theme, count.unwrap_or(ctx.config.run.puzzle_count))
                .context("Failed to load puzzles")?;
            let set = PuzzleSet::new(theme, puzzles);
            let run = PuzzleRunner::new(ctx).run(provider, &model, &set).await?;
            print_puzzle_run(&run);
        }
    }
    Ok(())
}

/// @ai:intent Benchmark every catalog model and print the per-model outcomes
/// @ai:effects network, fs:read, fs:write
async fn run_matrix(
    benchmark: CliBenchmark,
    options: MatrixOptions,
    count: Option<usize>,
    theme: PuzzleTheme,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_or_default_config(config_path)?;
    let corpus = corpus_for(&config);

    let job = match benchmark {
        CliBenchmark::LegalMoves => {
            let positions = corpus
                .positions(count.unwrap_or(config.run.position_count))
                .context("Failed to load test positions")?;
            MatrixJob::LegalMoves(Arc::new(positions))
        }
        CliBenchmark::Puzzles => {
            let puzzles = corpus
                .puzzles(theme, count.unwrap_or(config.run.puzzle_count))
                .context("Failed to load puzzles")?;
            MatrixJob::Puzzles(Arc::new(PuzzleSet::new(theme, puzzles)))
        }
    };

    let orchestrator = MatrixOrchestrator::new(build_context(config)?);
    let report = orchestrator.run(&job, &options).await?;
    print_matrix_report(&report);
    Ok(())
}

/// @ai:intent Rank stored summaries and write JSON, Markdown and chart reports
/// @ai:effects fs:read, fs:write
fn write_leaderboard(benchmark: BenchmarkKind, output: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_or_default_config(config_path)?;
    let store = JsonFileStore::new(&config.paths.store_dir);
    let leaderboard = Leaderboard::load(&store, benchmark)
        .with_context(|| format!("Failed to read summaries from {}", config.paths.store_dir.display()))?;

    let output_dir = output.unwrap_or(config.paths.reports_dir);
    let written = ReportGenerator::new().generate_all(&leaderboard, &output_dir)?;

    print_leaderboard(&leaderboard);
    for path in written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn init_config(output: PathBuf) -> Result<()> {
    let config = BenchmarkConfig::default();
    config.save(&output)?;
    println!("Configuration saved to {}", output.display());
    Ok(())
}

fn list_models(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_or_default_config(config_path)?;

    println!("{:<10} {:<40} {:<10}", "Provider", "Model", "Timeout");
    println!("{}", "-".repeat(62));

    for provider in Provider::ALL {
        for model in config.models(provider) {
            let timeout = if config.is_timeout_exempt(provider, model) {
                "none".to_string()
            } else {
                format!("{}ms", config.run.per_item_timeout_ms)
            };
            println!("{:<10} {:<40} {:<10}", provider.as_str(), model, timeout);
        }
    }
    Ok(())
}

/// @ai:intent Smoke test of the engine driver against the configured binary
/// @ai:effects process:spawn
async fn engine_check(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_or_default_config(config_path)?;
    let command = config.engine.command()?;

    println!("Starting {}", command.program.display());
    let mut session = EngineSession::open(&command, config.engine.timeouts())
        .await
        .context("Engine handshake failed")?;

    let result = async {
        session.set_skill_level(config.engine.skill_level).await?;
        session.evaluate(START_FEN, config.engine.eval_depth).await
    }
    .await;
    session.close().await;

    let evaluation = result.context("Engine evaluation failed")?;
    println!("Skill level: {}", config.engine.skill_level);
    println!(
        "Start position: {:+} cp, best move {}",
        evaluation.score,
        evaluation.best_move.as_deref().unwrap_or("-")
    );
    println!("Engine OK");
    Ok(())
}

fn build_context(config: BenchmarkConfig) -> Result<BenchmarkContext<HttpModelInvoker>> {
    let invoker = HttpModelInvoker::new(&config.api).context("Failed to create HTTP client")?;
    let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new(&config.paths.store_dir));
    Ok(BenchmarkContext::new(Arc::new(invoker), Arc::new(config), store))
}

fn corpus_for(config: &BenchmarkConfig) -> FileCorpus {
    FileCorpus::new(&config.paths.positions_file, &config.paths.puzzles_file)
}

/// @ai:intent Explicit path, else ./benchmark.toml, else defaults; env overrides applied last
fn load_or_default_config(path: Option<PathBuf>) -> Result<BenchmarkConfig> {
    let mut config = match path {
        Some(p) => BenchmarkConfig::load(&p)?,
        None => {
            let default_path = PathBuf::from("benchmark.toml");
            if default_path.exists() {
                BenchmarkConfig::load(&default_path)?
            } else {
                BenchmarkConfig::default()
            }
        }
    };
    config.apply_env();
    Ok(config)
}

fn print_legal_move_run(run: &LegalMoveRun) {
    println!();
    println!("Legal Moves: {} / {}", run.header.provider, run.header.model);
    println!("========================");
    println!("{:<25} {:?}", "Status:", run.header.status);
    println!("{:<25} {}", "Positions:", run.position_count);

    match &run.aggregates {
        Some(a) => {
            println!("{:<25} {}", "Scored:", a.scored_positions);
            println!("{:<25} {:>9.1}", "Average final score:", a.average_final_score);
            println!("{:<25} {:>9.1}%", "Average accuracy:", a.average_accuracy);
            println!("{:<25} {:>9.1}%", "Average penalty:", a.average_penalty);
            println!(
                "{:<25} {} correct, {} illegal, {} missed",
                "Moves:", a.total_correct_moves, a.total_illegal_moves, a.total_missed_moves
            );
        }
        None => println!("No position could be scored."),
    }

    print_errors(run.results.iter().filter_map(|r| r.error.as_deref().map(|e| (r.position_id.as_str(), e))));
}

fn print_puzzle_run(run: &PuzzleRun) {
    println!();
    println!("Puzzles ({}): {} / {}", run.theme, run.header.provider, run.header.model);
    println!("========================");
    println!("{:<25} {:?}", "Status:", run.header.status);
    println!("{:<25} {}", "Puzzles:", run.total_puzzles);
    println!("{:<25} {}", "Answered:", run.answered_count.unwrap_or(0));
    println!("{:<25} {}", "Correct:", run.correct_count.unwrap_or(0));
    println!("{:<25} {:>9.1}%", "Accuracy:", run.accuracy.unwrap_or(0.0));

    print_errors(run.results.iter().filter_map(|r| r.error.as_deref().map(|e| (r.puzzle_id.as_str(), e))));
}

fn print_errors<'a>(errors: impl Iterator<Item = (&'a str, &'a str)>) {
    let errors: Vec<_> = errors.collect();
    if errors.is_empty() {
        return;
    }
    println!();
    println!("Errors ({}):", errors.len());
    for (id, error) in errors {
        println!("  {id}: {error}");
    }
}

fn print_matrix_report(report: &MatrixReport) {
    println!();
    println!("Matrix: {}", report.benchmark.title());
    println!("========================");
    println!("{:<10} {:<40} {:<10} {}", "Provider", "Model", "Status", "Error");
    println!("{}", "-".repeat(80));

    for outcome in &report.outcomes {
        let status = outcome
            .status
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_else(|| "error".to_string());
        println!(
            "{:<10} {:<40} {:<10} {}",
            outcome.provider.as_str(),
            outcome.model,
            status,
            outcome.error.as_deref().unwrap_or("")
        );
    }

    if !report.skipped.is_empty() {
        println!();
        println!("Skipped (already scored): {}", report.skipped.join(", "));
    }
}

fn print_leaderboard(leaderboard: &Leaderboard) {
    println!();
    println!("{} Leaderboard", leaderboard.benchmark.title());
    println!("========================");
    println!("{:<5} {:<10} {:<40} {:>10} {:>6}", "Rank", "Provider", "Model", leaderboard.metric, "Runs");
    println!("{}", "-".repeat(75));

    for entry in &leaderboard.entries {
        println!(
            "{:<5} {:<10} {:<40} {:>10} {:>6}",
            entry.rank,
            entry.provider.as_str(),
            entry.model,
            entry.score.map(|s| format!("{s:.1}")).unwrap_or_else(|| "-".to_string()),
            entry.runs_completed
        );
    }
}
