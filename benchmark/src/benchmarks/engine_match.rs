//! @ai:module:intent Engine-match benchmark: the model plays full games against a UCI engine
//! @ai:module:layer application
//! @ai:module:public_api EngineMatchRunner
//! @ai:module:stateless false

use crate::benchmarks::prompt::{game_move_prompt, MovePrompt};
use crate::benchmarks::{answer_text, elapsed_ms, BenchmarkContext, Progress};
use crate::engine::{EngineCommand, EngineSession};
use crate::error::{BenchError, RulesError};
use crate::metrics::{
    summary_id, tally_games, EngineMatchRun, EngineMatchSummary, GameMove, GameOutcome, GameRecord, ModelSummary,
    RunHeader, RunStatus,
};
use crate::rules::{repetition_key, side_to_move, RulesEngine, Side, Termination, START_FEN};
use crate::runner::{work_pool, ModelInvoker, Provider};
use crate::scoring::{centipawn_loss, extract_move, LossTally};
use crate::store::groups;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

const REPETITION_LIMIT: u32 = 3;

/// @ai:intent Plays one game per color against the configured engine and scores the model's moves
pub struct EngineMatchRunner<I, R: ?Sized> {
    ctx: BenchmarkContext<I>,
    rules: Arc<R>,
}

/// Result of asking the model for one move.
enum AiTurn {
    Played(GameMove),
    Forfeit(String),
}

impl<I, R> EngineMatchRunner<I, R>
where
    I: ModelInvoker,
    R: RulesEngine + ?Sized,
{
    pub fn new(ctx: BenchmarkContext<I>, rules: Arc<R>) -> Self {
        Self { ctx, rules }
    }

    /// @ai:intent Play the model as white and as black, persist the run and merge its summary
    /// @ai:pre an engine binary is configured
    /// @ai:post Err only for configuration and store failures; game failures are recorded per game
    /// @ai:effects network, process:spawn, store:write
    pub async fn run(&self, provider: Provider, model: &str) -> Result<EngineMatchRun, BenchError> {
        let command = self.ctx.config.engine.command()?;
        let skill_level = self.ctx.config.engine.skill_level;

        let mut run = EngineMatchRun {
            header: RunHeader::start(provider, model),
            skill_level,
            games: Vec::new(),
            wins: 0,
            losses: 0,
            draws: 0,
            totals: LossTally::default(),
            acpl: None,
        };
        let run_id = run.header.id.clone();

        tracing::info!(%provider, model, run_id = %run_id, skill_level, "starting engine match");
        self.ctx.save_run(groups::ENGINE_MATCH_RUNS, &run_id, &run)?;

        let colors = [Side::White, Side::Black];
        let progress = Progress::new(&run_id, colors.len());
        let on_complete = |index: usize, _: &GameRecord| progress.tick(index);

        run.games = work_pool::run(
            &colors,
            self.ctx.config.run.engine_match_concurrency,
            |color, _| self.play_game(provider, model, &command, *color),
            Some(&on_complete),
        )
        .await
        .unwrap_or_else(|never: Infallible| match never {});

        let tally = tally_games(&run.games);
        run.wins = tally.wins;
        run.losses = tally.losses;
        run.draws = tally.draws;
        run.totals = tally.losses_cp;
        run.acpl = tally.acpl();
        run.header.finish(tally.finished);
        self.ctx.save_run(groups::ENGINE_MATCH_RUNS, &run_id, &run)?;

        if run.header.status == RunStatus::Completed {
            let record = (run.wins, run.losses, run.draws);
            let acpl = run.acpl;
            let summary = self
                .ctx
                .merge_summary(groups::ENGINE_MATCH_SUMMARIES, &summary_id(provider, model), |existing| {
                    EngineMatchSummary::merged(existing, provider, model, acpl, record)
                })
                .await?;
            if acpl.is_none() {
                tracing::warn!(%provider, model, run_id = %run_id, "engine match finished without a scored move; ACPL not updated");
            }
            tracing::info!(
                %provider,
                model,
                run_id = %run_id,
                acpl = ?acpl,
                wins = run.wins,
                losses = run.losses,
                draws = run.draws,
                average_acpl = ?summary.headline(),
                "engine match completed"
            );
        } else {
            tracing::warn!(%provider, model, run_id = %run_id, "engine match failed: no game finished");
        }

        Ok(run)
    }

    /// @ai:intent One game on its own engine session; the session is closed on every path
    /// @ai:effects network, process:spawn
    async fn play_game(
        &self,
        provider: Provider,
        model: &str,
        command: &EngineCommand,
        ai_color: Side,
    ) -> Result<GameRecord, Infallible> {
        let mut record = GameRecord {
            id: uuid::Uuid::new_v4().to_string(),
            ai_color,
            skill_level: self.ctx.config.engine.skill_level,
            status: RunStatus::Running,
            outcome: None,
            termination: None,
            reason: None,
            moves: Vec::new(),
            losses: LossTally::default(),
        };

        let result = match EngineSession::open(command, self.ctx.config.engine.timeouts()).await {
            Ok(mut session) => {
                let result = self.play(&mut session, provider, model, &mut record).await;
                session.close().await;
                result
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                record.status = RunStatus::Completed;
                tracing::info!(
                    %provider,
                    model,
                    ai_color = %ai_color,
                    outcome = ?record.outcome,
                    half_moves = record.moves.len(),
                    "game finished"
                );
            }
            Err(e) => {
                tracing::warn!(%provider, model, ai_color = %ai_color, error = %e, "game failed");
                record.status = RunStatus::Failed;
                record.reason = Some(e.to_string());
            }
        }
        Ok(record)
    }

    /// @ai:intent Alternate AI and engine turns until a rule ending, a forfeit or the move cap
    /// @ai:post Ok => record.outcome is set
    async fn play(
        &self,
        session: &mut EngineSession,
        provider: Provider,
        model: &str,
        record: &mut GameRecord,
    ) -> Result<(), BenchError> {
        let engine = &self.ctx.config.engine;
        session.set_skill_level(engine.skill_level).await?;

        let mut fen = START_FEN.to_string();
        let mut seen: HashMap<String, u32> = HashMap::new();
        seen.insert(repetition_key(&fen), 1);
        let mut ply = 0u32;

        loop {
            let status = self.rules.status(&fen)?;
            let to_move = side_to_move(&fen)?;

            if let Some(termination) = status.outcome {
                let outcome = match termination {
                    Termination::Checkmate if to_move == record.ai_color => GameOutcome::EngineWin,
                    Termination::Checkmate => GameOutcome::AiWin,
                    _ => GameOutcome::Draw,
                };
                conclude(record, outcome, Some(termination), None);
                return Ok(());
            }

            if ply >= engine.max_half_moves {
                conclude(record, GameOutcome::Draw, None, Some("Max moves reached".to_string()));
                return Ok(());
            }
            ply += 1;

            let played = if to_move == record.ai_color {
                match self
                    .ai_turn(session, provider, model, &fen, status.in_check, ply, record)
                    .await?
                {
                    AiTurn::Played(mv) => mv,
                    AiTurn::Forfeit(reason) => {
                        conclude(record, GameOutcome::AiIllegalMove, None, Some(reason));
                        return Ok(());
                    }
                }
            } else {
                self.engine_turn(session, &fen, ply, to_move).await?
            };

            tracing::debug!(ply, san = %played.san, by_ai = played.by_ai, "move played");
            fen = played.fen_after.clone();
            record.moves.push(played);

            let count = seen.entry(repetition_key(&fen)).or_insert(0);
            *count += 1;
            if *count >= REPETITION_LIMIT {
                conclude(record, GameOutcome::Draw, Some(Termination::Repetition), None);
                return Ok(());
            }
        }
    }

    /// @ai:intent Ask the model for a move, re-prompting after unusable answers
    /// @ai:post Forfeit after max_illegal_attempts consecutive failures
    #[allow(clippy::too_many_arguments)]
    async fn ai_turn(
        &self,
        session: &mut EngineSession,
        provider: Provider,
        model: &str,
        fen: &str,
        in_check: bool,
        ply: u32,
        record: &mut GameRecord,
    ) -> Result<AiTurn, BenchError> {
        let legal = self.rules.legal_moves(fen)?;
        let max_attempts = self.ctx.config.engine.max_illegal_attempts.max(1);
        let mut rejected: Option<String> = None;

        for attempt in 1..=max_attempts {
            let prompt = game_move_prompt(
                provider,
                &MovePrompt {
                    fen,
                    side: record.ai_color,
                    in_check,
                    legal_moves: &legal,
                    rejected: rejected.as_deref(),
                },
            );

            let started = std::time::Instant::now();
            let answer = self.ctx.call_model(provider, model, &prompt).await;
            let response_time_ms = elapsed_ms(started);

            let (raw_response, candidate) = match answer {
                Ok(response) => {
                    let text = answer_text(&response);
                    let candidate = extract_move(&text, &legal).map(|e| e.value).map_err(BenchError::from);
                    (text, candidate)
                }
                Err(e) => (String::new(), Err(e)),
            };

            let candidate = match candidate {
                Ok(candidate) => candidate,
                Err(e) => {
                    tracing::warn!(%provider, model, ply, attempt, error = %e, "no usable move in answer");
                    rejected = None;
                    continue;
                }
            };

            let applied = match self.rules.apply_move(fen, &candidate) {
                Ok(applied) => applied,
                Err(RulesError::IllegalMove { .. }) => {
                    tracing::warn!(%provider, model, ply, attempt, mv = %candidate, "illegal move");
                    rejected = Some(candidate);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let depth = self.ctx.config.engine.eval_depth;
            let before = session.evaluate(fen, depth).await?.score;
            let after = session.evaluate(&applied.fen, depth).await?.score;
            let eval_before = ai_perspective(before, fen, record.ai_color)?;
            let eval_after = ai_perspective(after, &applied.fen, record.ai_color)?;
            let loss = centipawn_loss(eval_before, eval_after);
            let classification = record.losses.record(loss);

            return Ok(AiTurn::Played(GameMove {
                ply,
                side: record.ai_color,
                by_ai: true,
                san: applied.san,
                fen_before: fen.to_string(),
                fen_after: applied.fen,
                eval_before: Some(eval_before),
                eval_after: Some(eval_after),
                centipawn_loss: Some(loss),
                classification,
                response_time_ms: Some(response_time_ms),
                raw_response: Some(raw_response),
            }));
        }

        Ok(AiTurn::Forfeit(match rejected {
            Some(mv) => format!("Too many illegal moves (last: {mv})"),
            None => "AI failed to return valid move".to_string(),
        }))
    }

    /// @ai:effects process:io
    async fn engine_turn(
        &self,
        session: &mut EngineSession,
        fen: &str,
        ply: u32,
        side: Side,
    ) -> Result<GameMove, BenchError> {
        let uci = session.best_move(fen, self.ctx.config.engine.think_time()).await?;
        let applied = self.rules.apply_move(fen, &uci)?;

        Ok(GameMove {
            ply,
            side,
            by_ai: false,
            san: applied.san,
            fen_before: fen.to_string(),
            fen_after: applied.fen,
            eval_before: None,
            eval_after: None,
            centipawn_loss: None,
            classification: None,
            response_time_ms: None,
            raw_response: None,
        })
    }
}

fn conclude(record: &mut GameRecord, outcome: GameOutcome, termination: Option<Termination>, reason: Option<String>) {
    record.outcome = Some(outcome);
    record.termination = termination;
    record.reason = reason;
}

/// Engine scores are from the side to move; flip them when that is the engine.
fn ai_perspective(score: i32, fen: &str, ai_color: Side) -> Result<i32, RulesError> {
    Ok(if side_to_move(fen)? == ai_color { score } else { -score })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::benchmarks::testing::context_with;
    use crate::config::BenchmarkConfig;
    use crate::engine::session::fake::{engine_script, COOPERATIVE};
    use crate::error::EngineError;
    use crate::rules::{AppliedMove, GameStatus};
    use crate::runner::{MockModelInvoker, ScriptedModelInvoker};
    use crate::scoring::MoveClass;
    use crate::store::RecordStoreExt;
    use tempfile::TempDir;

    /// Tiny game tree: white wins as black, loses as white.
    struct MiniatureRules;

    impl RulesEngine for MiniatureRules {
        fn legal_moves(&self, fen: &str) -> Result<Vec<String>, RulesError> {
            Ok(match fen {
                START_FEN | "p2 b - - 0 1" => vec!["e4".to_string()],
                "p1 b - - 0 1" => vec!["e5".to_string()],
                _ => vec![],
            })
        }

        fn apply_move(&self, fen: &str, mv: &str) -> Result<AppliedMove, RulesError> {
            let (san, next) = match (fen, mv) {
                (START_FEN, "e4") => ("e4", "p1 b - - 0 1"),
                (START_FEN, "e7e5") => ("e5", "p2 b - - 0 1"),
                ("p1 b - - 0 1", "e7e5") => ("e5", "end w - - 0 2"),
                ("p2 b - - 0 1", "e4") => ("e4", "end2 w - - 0 2"),
                _ => {
                    return Err(RulesError::IllegalMove {
                        fen: fen.to_string(),
                        mv: mv.to_string(),
                    })
                }
            };
            Ok(AppliedMove {
                san: san.to_string(),
                fen: next.to_string(),
            })
        }

        fn status(&self, fen: &str) -> Result<GameStatus, RulesError> {
            Ok(GameStatus {
                in_check: false,
                outcome: fen.starts_with("end").then_some(Termination::Checkmate),
            })
        }
    }

    /// Every move from the start goes to `x`, every move from `x` goes back.
    struct ShuffleRules;

    impl RulesEngine for ShuffleRules {
        fn legal_moves(&self, _fen: &str) -> Result<Vec<String>, RulesError> {
            Ok(vec!["Nf3".to_string()])
        }

        fn apply_move(&self, fen: &str, mv: &str) -> Result<AppliedMove, RulesError> {
            let next = if fen == START_FEN { "x b - - 1 1" } else { START_FEN };
            Ok(AppliedMove {
                san: mv.to_string(),
                fen: next.to_string(),
            })
        }

        fn status(&self, _fen: &str) -> Result<GameStatus, RulesError> {
            Ok(GameStatus::default())
        }
    }

    fn engine_config(dir: &TempDir, script: &str) -> BenchmarkConfig {
        let command = engine_script(dir.path(), script);
        let mut config = BenchmarkConfig::default();
        config.engine.binary_path = Some(command.program);
        config.engine.binary_args = command.args;
        config.engine.think_time_ms = 10;
        config.engine.eval_depth = 2;
        config.engine.handshake_timeout_ms = 2_000;
        config.engine.ready_timeout_ms = 2_000;
        config.engine.search_timeout_ms = 2_000;
        config
    }

    #[tokio::test]
    async fn test_match_scores_ai_moves_from_ai_perspective() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with(MockModelInvoker::new(r#"{"move": "e4"}"#), engine_config(&dir, COOPERATIVE));
        let runner = EngineMatchRunner::new(ctx.clone(), Arc::new(MiniatureRules));

        let run = runner.run(Provider::Openai, "gpt-4o").await.unwrap();

        assert_eq!(run.header.status, RunStatus::Completed);
        assert_eq!(run.games.len(), 2);

        let white = &run.games[0];
        assert_eq!(white.ai_color, Side::White);
        assert_eq!(white.outcome, Some(GameOutcome::EngineWin));
        assert_eq!(white.termination, Some(Termination::Checkmate));
        assert_eq!(white.moves.len(), 2);
        assert_eq!(white.moves[0].eval_before, Some(35));
        assert_eq!(white.moves[0].eval_after, Some(-35));
        assert_eq!(white.moves[0].centipawn_loss, Some(70));
        assert_eq!(white.moves[0].classification, Some(MoveClass::Mistake));
        assert!(!white.moves[1].by_ai);
        assert_eq!(white.moves[1].san, "e5");

        let black = &run.games[1];
        assert_eq!(black.outcome, Some(GameOutcome::AiWin));
        assert_eq!(black.moves[1].centipawn_loss, Some(70));

        assert_eq!((run.wins, run.losses, run.draws), (1, 1, 0));
        assert_eq!(run.acpl, Some(70.0));

        let summary: EngineMatchSummary = ctx
            .store
            .get(groups::ENGINE_MATCH_SUMMARIES, "openai:gpt-4o")
            .unwrap()
            .unwrap();
        assert_eq!(summary.headline(), Some(70.0));
        assert_eq!(summary.runs_completed, 1);
        assert_eq!((summary.wins, summary.losses, summary.draws), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_repeated_illegal_answers_forfeit_the_game() {
        let dir = TempDir::new().unwrap();
        let invoker = ScriptedModelInvoker::new(|_, _| Ok(r#"{"move": "Qh5"}"#.to_string()));
        let ctx = context_with(invoker, engine_config(&dir, COOPERATIVE));
        let runner = EngineMatchRunner::new(ctx.clone(), Arc::new(MiniatureRules));

        let run = runner.run(Provider::Grok, "grok-3-mini").await.unwrap();

        for game in &run.games {
            assert_eq!(game.outcome, Some(GameOutcome::AiIllegalMove));
            assert_eq!(game.reason.as_deref(), Some("Too many illegal moves (last: Qh5)"));
        }
        assert_eq!(ctx.invoker.calls(), 6);
        assert_eq!(run.losses, 2);
        assert_eq!(run.acpl, None);

        let summary: EngineMatchSummary = ctx
            .store
            .get(groups::ENGINE_MATCH_SUMMARIES, "grok:grok-3-mini")
            .unwrap()
            .unwrap();
        assert_eq!(summary.runs_completed, 1);
        assert_eq!((summary.wins, summary.losses, summary.draws), (0, 2, 0));
        assert_eq!(summary.acpl, None);
    }

    #[tokio::test]
    async fn test_unreadable_answers_forfeit_with_generic_reason() {
        let dir = TempDir::new().unwrap();
        let mut config = engine_config(&dir, COOPERATIVE);
        config.engine.max_illegal_attempts = 2;
        let ctx = context_with(MockModelInvoker::new("hmm"), config);
        let runner = EngineMatchRunner::new(ctx, Arc::new(MiniatureRules));

        let run = runner.run(Provider::Claude, "claude-haiku").await.unwrap();
        assert_eq!(run.games[0].reason.as_deref(), Some("AI failed to return valid move"));
    }

    #[tokio::test]
    async fn test_threefold_repetition_is_a_draw() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with(MockModelInvoker::new(r#"{"move": "Nf3"}"#), engine_config(&dir, COOPERATIVE));
        let runner = EngineMatchRunner::new(ctx, Arc::new(ShuffleRules));

        let run = runner.run(Provider::Openai, "gpt-4o").await.unwrap();

        let game = &run.games[0];
        assert_eq!(game.outcome, Some(GameOutcome::Draw));
        assert_eq!(game.termination, Some(Termination::Repetition));
        assert_eq!(game.moves.len(), 4);
        assert_eq!(run.draws, 2);
    }

    #[tokio::test]
    async fn test_move_cap_ends_in_draw() {
        let dir = TempDir::new().unwrap();
        let mut config = engine_config(&dir, COOPERATIVE);
        config.engine.max_half_moves = 3;
        config.run.engine_match_concurrency = 2;
        let ctx = context_with(MockModelInvoker::new(r#"{"move": "Nf3"}"#), config);
        let runner = EngineMatchRunner::new(ctx, Arc::new(ShuffleRules));

        let run = runner.run(Provider::Openai, "gpt-4o").await.unwrap();

        for game in &run.games {
            assert_eq!(game.outcome, Some(GameOutcome::Draw));
            assert_eq!(game.reason.as_deref(), Some("Max moves reached"));
            assert_eq!(game.moves.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_engine_crash_fails_games_and_run() {
        let dir = TempDir::new().unwrap();
        let script = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) exit 3 ;;
  esac
done
"#;
        let ctx = context_with(MockModelInvoker::new(r#"{"move": "e4"}"#), engine_config(&dir, script));
        let runner = EngineMatchRunner::new(ctx, Arc::new(MiniatureRules));

        let run = runner.run(Provider::Openai, "gpt-4o").await.unwrap();

        assert_eq!(run.header.status, RunStatus::Failed);
        for game in &run.games {
            assert_eq!(game.status, RunStatus::Failed);
            assert_eq!(game.outcome, None);
            assert!(game.reason.as_deref().unwrap().contains("engine exited"));
        }
    }

    #[tokio::test]
    async fn test_missing_engine_binary_is_configuration_error() {
        let ctx = context_with(MockModelInvoker::new("{}"), BenchmarkConfig::default());
        let runner = EngineMatchRunner::new(ctx, Arc::new(MiniatureRules));

        let err = runner.run(Provider::Openai, "gpt-4o").await.unwrap_err();
        assert!(matches!(err, BenchError::Engine(EngineError::BinaryNotConfigured)));
    }
}
