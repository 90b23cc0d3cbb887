//! @ai:module:intent Run one benchmark across the provider x model matrix with two-level concurrency
//! @ai:module:layer application
//! @ai:module:public_api MatrixOrchestrator, MatrixJob, MatrixOptions, MatrixReport, LeafOutcome, BackgroundRun
//! @ai:module:stateless false

use crate::benchmarks::{BenchmarkContext, BenchmarkKind, EngineMatchRunner, LegalMoveRunner, PuzzleRunner};
use crate::corpus::{PuzzleSet, TestPosition};
use crate::error::BenchError;
use crate::metrics::{summary_id, EngineMatchSummary, LegalMoveSummary, PuzzleSummary, RunHeader, RunStatus};
use crate::rules::RulesEngine;
use crate::runner::{work_pool, ModelInvoker, Provider};
use crate::store::{groups, RecordStoreExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// @ai:intent Which benchmark to run for every model, with its shared inputs
#[derive(Clone)]
pub enum MatrixJob {
    LegalMoves(Arc<Vec<TestPosition>>),
    Puzzles(Arc<PuzzleSet>),
    EngineMatch(Arc<dyn RulesEngine>),
}

impl MatrixJob {
    pub fn kind(&self) -> BenchmarkKind {
        match self {
            MatrixJob::LegalMoves(_) => BenchmarkKind::LegalMoves,
            MatrixJob::Puzzles(_) => BenchmarkKind::Puzzles,
            MatrixJob::EngineMatch(_) => BenchmarkKind::EngineMatch,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatrixOptions {
    /// Restrict the matrix to these providers; all providers when None.
    pub providers: Option<Vec<Provider>>,
    /// Run models whose summary already has a value for this benchmark.
    pub rerun_completed: bool,
}

/// @ai:intent What happened to one (provider, model) leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafOutcome {
    pub provider: Provider,
    pub model: String,
    pub run_id: Option<String>,
    pub status: Option<RunStatus>,
    pub error: Option<String>,
}

impl LeafOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == Some(RunStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixReport {
    pub id: String,
    pub benchmark: BenchmarkKind,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Summary ids skipped because they were already scored.
    pub skipped: Vec<String>,
    pub outcomes: Vec<LeafOutcome>,
}

/// Models to run for one provider.
type ProviderPlan = (Provider, Vec<String>);

/// @ai:intent Drives BenchmarkRunners over every configured model
pub struct MatrixOrchestrator<I> {
    ctx: BenchmarkContext<I>,
}

impl<I: ModelInvoker + 'static> MatrixOrchestrator<I> {
    pub fn new(ctx: BenchmarkContext<I>) -> Self {
        Self { ctx }
    }

    /// @ai:intent Run the job for every planned model; leaf failures are logged, never propagated
    /// @ai:post Err only when the skip-completed lookup cannot read the store
    /// @ai:effects network, store:write
    pub async fn run(&self, job: &MatrixJob, options: &MatrixOptions) -> Result<MatrixReport, BenchError> {
        self.execute(uuid::Uuid::new_v4().to_string(), job, options).await
    }

    /// @ai:intent Start the matrix on the runtime and return immediately
    /// @ai:effects spawns a tokio task
    pub fn spawn(self: Arc<Self>, job: MatrixJob, options: MatrixOptions) -> BackgroundRun {
        let id = uuid::Uuid::new_v4().to_string();
        let task_id = id.clone();
        let handle = tokio::spawn(async move { self.execute(task_id, &job, &options).await });
        tracing::info!(id = %id, "matrix started in background");
        BackgroundRun { id, handle }
    }

    async fn execute(&self, id: String, job: &MatrixJob, options: &MatrixOptions) -> Result<MatrixReport, BenchError> {
        let started_at = Utc::now();
        let (plan, skipped) = self.plan(job, options)?;
        let planned: usize = plan.iter().map(|(_, models)| models.len()).sum();

        tracing::info!(
            id = %id,
            benchmark = %job.kind(),
            providers = plan.len(),
            models = planned,
            skipped = skipped.len(),
            "starting matrix"
        );

        let outcomes = work_pool::run(
            &plan,
            self.ctx.config.run.provider_concurrency,
            |entry, _| self.run_provider(job, entry),
            None,
        )
        .await
        .unwrap_or_else(|never: Infallible| match never {});
        let outcomes: Vec<LeafOutcome> = outcomes.into_iter().flatten().collect();

        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        tracing::info!(id = %id, succeeded, total = outcomes.len(), "matrix finished");

        Ok(MatrixReport {
            id,
            benchmark: job.kind(),
            started_at,
            completed_at: Utc::now(),
            skipped,
            outcomes,
        })
    }

    /// @ai:intent Providers with their models to run, and the summary ids skipped as already scored
    /// @ai:effects store:read
    pub fn plan(&self, job: &MatrixJob, options: &MatrixOptions) -> Result<(Vec<ProviderPlan>, Vec<String>), BenchError> {
        let providers = options.providers.clone().unwrap_or_else(|| Provider::ALL.to_vec());
        let mut plan = Vec::new();
        let mut skipped = Vec::new();

        for provider in providers {
            let mut models = Vec::new();
            for model in self.ctx.config.models(provider) {
                if !options.rerun_completed && self.already_scored(job, provider, model)? {
                    tracing::info!(%provider, model = %model, "skipping already scored model");
                    skipped.push(summary_id(provider, model));
                } else {
                    models.push(model.clone());
                }
            }
            if !models.is_empty() {
                plan.push((provider, models));
            }
        }
        Ok((plan, skipped))
    }

    /// @ai:intent Whether the model's summary already holds a value for this job
    fn already_scored(&self, job: &MatrixJob, provider: Provider, model: &str) -> Result<bool, BenchError> {
        let id = summary_id(provider, model);
        let store = self.ctx.store.as_ref();
        Ok(match job {
            MatrixJob::LegalMoves(_) => store
                .get::<LegalMoveSummary>(groups::LEGAL_MOVE_SUMMARIES, &id)?
                .is_some_and(|s| s.score.runs_completed > 0),
            MatrixJob::Puzzles(set) => store
                .get::<PuzzleSummary>(groups::PUZZLE_SUMMARIES, &id)?
                .is_some_and(|s| s.theme_accuracy(set.theme).is_some()),
            MatrixJob::EngineMatch(_) => store
                .get::<EngineMatchSummary>(groups::ENGINE_MATCH_SUMMARIES, &id)?
                .is_some_and(|s| s.runs_completed > 0),
        })
    }

    async fn run_provider(&self, job: &MatrixJob, entry: &ProviderPlan) -> Result<Vec<LeafOutcome>, Infallible> {
        let (provider, models) = entry;
        work_pool::run(
            models,
            self.ctx.config.run.model_concurrency_per_provider,
            |model, _| self.run_leaf(job, *provider, model),
            None,
        )
        .await
    }

    /// @ai:intent One runner call; its error becomes part of the outcome
    async fn run_leaf(&self, job: &MatrixJob, provider: Provider, model: &str) -> Result<LeafOutcome, Infallible> {
        let result: Result<RunHeader, BenchError> = match job {
            MatrixJob::LegalMoves(positions) => LegalMoveRunner::new(self.ctx.clone())
                .run(provider, model, positions)
                .await
                .map(|run| run.header),
            MatrixJob::Puzzles(set) => PuzzleRunner::new(self.ctx.clone())
                .run(provider, model, set)
                .await
                .map(|run| run.header),
            MatrixJob::EngineMatch(rules) => EngineMatchRunner::new(self.ctx.clone(), rules.clone())
                .run(provider, model)
                .await
                .map(|run| run.header),
        };

        Ok(match result {
            Ok(header) => LeafOutcome {
                provider,
                model: model.to_string(),
                run_id: Some(header.id),
                status: Some(header.status),
                error: None,
            },
            Err(e) => {
                tracing::error!(%provider, model, error = %e, "benchmark run failed");
                LeafOutcome {
                    provider,
                    model: model.to_string(),
                    run_id: None,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        })
    }
}

/// @ai:intent Handle to a matrix running on a background task
pub struct BackgroundRun {
    id: String,
    handle: JoinHandle<Result<MatrixReport, BenchError>>,
}

impl BackgroundRun {
    /// Id of the report the run will produce.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// @ai:intent Cancel the task; in-flight requests are dropped and engine processes killed on drop
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// @ai:intent Wait for the report
    /// @ai:post Err(Background) when the task panicked or was aborted
    pub async fn join(self) -> Result<MatrixReport, BenchError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(BenchError::Background {
                id: self.id,
                message: e.to_string(),
            }),
        }
    }
}
