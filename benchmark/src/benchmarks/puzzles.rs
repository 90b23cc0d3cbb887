//! @ai:module:intent Puzzle benchmark: one best move per puzzle, compared against the solution
//! @ai:module:layer application
//! @ai:module:public_api PuzzleRunner
//! @ai:module:stateless false

use crate::benchmarks::prompt::puzzle_prompt;
use crate::benchmarks::{answer_text, elapsed_ms, BenchmarkContext, Progress};
use crate::corpus::{Puzzle, PuzzleSet, PuzzleTheme};
use crate::error::BenchError;
use crate::metrics::{summary_id, tally_puzzles, PuzzleResult, PuzzleRun, PuzzleSummary, RunHeader, RunStatus};
use crate::runner::{work_pool, ModelInvoker, Provider};
use crate::scoring::{extract_move, same_san};
use crate::store::{groups, RecordStoreExt};
use std::convert::Infallible;

/// @ai:intent Runs one puzzle set against one model
pub struct PuzzleRunner<I> {
    ctx: BenchmarkContext<I>,
}

impl<I: ModelInvoker> PuzzleRunner<I> {
    pub fn new(ctx: BenchmarkContext<I>) -> Self {
        Self { ctx }
    }

    /// @ai:intent Solve every puzzle of the set, persist the run and merge the per-theme summary
    /// @ai:post the set itself is stored once so runs can be traced back to their inputs
    /// @ai:effects network, store:write
    pub async fn run(&self, provider: Provider, model: &str, set: &PuzzleSet) -> Result<PuzzleRun, BenchError> {
        self.remember_set(set)?;

        let mut run = PuzzleRun {
            header: RunHeader::start(provider, model),
            puzzle_set_id: set.id.clone(),
            theme: set.theme,
            total_puzzles: set.puzzles.len(),
            results: Vec::new(),
            correct_count: None,
            answered_count: None,
            accuracy: None,
        };
        let run_id = run.header.id.clone();

        tracing::info!(
            %provider,
            model,
            run_id = %run_id,
            theme = set.theme.as_str(),
            puzzles = set.puzzles.len(),
            "starting puzzle benchmark"
        );
        self.ctx.save_run(groups::PUZZLE_RUNS, &run_id, &run)?;

        let progress = Progress::new(&run_id, set.puzzles.len());
        let on_complete = |index: usize, _: &PuzzleResult| progress.tick(index);

        run.results = work_pool::run(
            &set.puzzles,
            self.ctx.config.run.puzzle_concurrency,
            |puzzle, _| self.solve(provider, model, puzzle, set.theme),
            Some(&on_complete),
        )
        .await
        .unwrap_or_else(|never: Infallible| match never {});

        let tally = tally_puzzles(&run.results, run.total_puzzles);
        run.correct_count = Some(tally.correct);
        run.answered_count = Some(tally.answered);
        run.accuracy = Some(tally.accuracy);
        run.header.finish(tally.answered);
        self.ctx.save_run(groups::PUZZLE_RUNS, &run_id, &run)?;

        if run.header.status == RunStatus::Completed {
            let theme = set.theme;
            let summary = self
                .ctx
                .merge_summary(groups::PUZZLE_SUMMARIES, &summary_id(provider, model), |existing| {
                    PuzzleSummary::merged(existing, provider, model, theme, tally.accuracy)
                })
                .await?;
            tracing::info!(
                %provider,
                model,
                run_id = %run_id,
                correct = tally.correct,
                total = run.total_puzzles,
                accuracy = tally.accuracy,
                overall = ?summary.overall_accuracy,
                "puzzle benchmark completed"
            );
        } else {
            tracing::warn!(%provider, model, run_id = %run_id, "puzzle benchmark failed: no puzzle was answered");
        }

        Ok(run)
    }

    fn remember_set(&self, set: &PuzzleSet) -> Result<(), BenchError> {
        if self.ctx.store.get_value(groups::PUZZLE_SETS, &set.id)?.is_none() {
            self.ctx.store.set(groups::PUZZLE_SETS, &set.id, set)?;
        }
        Ok(())
    }

    /// @ai:effects network
    async fn solve(
        &self,
        provider: Provider,
        model: &str,
        puzzle: &Puzzle,
        theme: PuzzleTheme,
    ) -> Result<PuzzleResult, Infallible> {
        let prompt = puzzle_prompt(provider, puzzle, theme);
        let started = std::time::Instant::now();

        let answer = self.ctx.call_model(provider, model, &prompt).await;
        let response_time_ms = elapsed_ms(started);

        let mut result = PuzzleResult {
            puzzle_id: puzzle.id.clone(),
            model_move: None,
            extracted_by: None,
            correct_move: puzzle.solution_san.clone(),
            is_correct: false,
            response_time_ms,
            raw_response: String::new(),
            error: None,
        };

        let response = match answer {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%provider, model, puzzle_id = %puzzle.id, error = %e, "puzzle failed");
                result.error = Some(e.to_string());
                return Ok(result);
            }
        };

        result.raw_response = answer_text(&response);
        match extract_move(&result.raw_response, &puzzle.legal_moves) {
            Ok(extracted) => {
                result.is_correct = same_san(&extracted.value, &puzzle.solution_san);
                result.extracted_by = Some(extracted.step);
                result.model_move = Some(extracted.value);
            }
            Err(e) => {
                tracing::debug!(puzzle_id = %puzzle.id, error = %e, "no move in answer");
                result.error = Some(e.to_string());
            }
        }

        Ok(result)
    }
}
