//! @ai:module:intent Legal-move enumeration benchmark: ask for every legal move, score with F1
//! @ai:module:layer application
//! @ai:module:public_api LegalMoveRunner
//! @ai:module:stateless false

use crate::benchmarks::prompt::legal_moves_prompt;
use crate::benchmarks::{answer_text, elapsed_ms, BenchmarkContext, Progress};
use crate::corpus::TestPosition;
use crate::error::BenchError;
use crate::metrics::{aggregate_legal_moves, summary_id, LegalMoveResult, LegalMoveRun, LegalMoveSummary, RunHeader, RunStatus};
use crate::runner::{work_pool, ModelInvoker, Provider};
use crate::scoring::{extract_move_list, score_legal_moves};
use crate::store::groups;
use std::convert::Infallible;

/// @ai:intent Runs one legal-move benchmark for one model
pub struct LegalMoveRunner<I> {
    ctx: BenchmarkContext<I>,
}

impl<I: ModelInvoker> LegalMoveRunner<I> {
    /// @ai:effects pure
    pub fn new(ctx: BenchmarkContext<I>) -> Self {
        Self { ctx }
    }

    /// @ai:intent Score the model on every position, persist the run and merge the summary
    /// @ai:post per-position failures are recorded on the result; only store failures return Err
    /// @ai:effects network, store:write
    pub async fn run(
        &self,
        provider: Provider,
        model: &str,
        positions: &[TestPosition],
    ) -> Result<LegalMoveRun, BenchError> {
        let mut run = LegalMoveRun {
            header: RunHeader::start(provider, model),
            position_count: positions.len(),
            results: Vec::new(),
            aggregates: None,
        };
        let run_id = run.header.id.clone();

        tracing::info!(%provider, model, run_id = %run_id, positions = positions.len(), "starting legal move benchmark");
        self.ctx.save_run(groups::LEGAL_MOVE_RUNS, &run_id, &run)?;

        let progress = Progress::new(&run_id, positions.len());
        let on_complete = |index: usize, _: &LegalMoveResult| progress.tick(index);

        run.results = work_pool::run(
            positions,
            self.ctx.config.run.item_concurrency,
            |position, _| self.score_position(provider, model, position),
            Some(&on_complete),
        )
        .await
        .unwrap_or_else(|never: Infallible| match never {});

        run.aggregates = aggregate_legal_moves(&run.results);
        let scored = run.aggregates.as_ref().map(|a| a.scored_positions).unwrap_or(0);
        run.header.finish(scored);
        self.ctx.save_run(groups::LEGAL_MOVE_RUNS, &run_id, &run)?;

        match (&run.header.status, &run.aggregates) {
            (RunStatus::Completed, Some(aggregates)) => {
                let run_score = aggregates.average_final_score;
                let summary = self
                    .ctx
                    .merge_summary(
                        groups::LEGAL_MOVE_SUMMARIES,
                        &summary_id(provider, model),
                        |existing| LegalMoveSummary::merged(existing, provider, model, run_score),
                    )
                    .await?;
                tracing::info!(
                    %provider,
                    model,
                    run_id = %run_id,
                    final_score = run_score,
                    runs = summary.score.runs_completed,
                    "legal move benchmark completed"
                );
            }
            _ => {
                tracing::warn!(%provider, model, run_id = %run_id, "legal move benchmark failed: no position was scored");
            }
        }

        Ok(run)
    }

    /// @ai:intent One position; never fails, errors land on the result
    /// @ai:effects network
    async fn score_position(
        &self,
        provider: Provider,
        model: &str,
        position: &TestPosition,
    ) -> Result<LegalMoveResult, Infallible> {
        let prompt = legal_moves_prompt(provider, position);
        let started = std::time::Instant::now();

        let answer = self.ctx.call_model(provider, model, &prompt).await;
        let response_time_ms = elapsed_ms(started);

        let (raw_response, parsed) = match answer {
            Ok(response) => {
                let text = answer_text(&response);
                let parsed = extract_move_list(&text).map(|e| e.value).map_err(BenchError::from);
                (text, parsed)
            }
            Err(e) => (String::new(), Err(e)),
        };

        let (model_moves, error) = match parsed {
            Ok(moves) => (moves, None),
            Err(e) => {
                tracing::warn!(%provider, model, position_id = %position.id, error = %e, "position failed");
                (Vec::new(), Some(e.to_string()))
            }
        };

        Ok(LegalMoveResult {
            position_id: position.id.clone(),
            score: score_legal_moves(&position.legal_moves, &model_moves),
            model_moves,
            response_time_ms,
            raw_response,
            error,
        })
    }
}
