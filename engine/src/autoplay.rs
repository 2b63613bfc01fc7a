//! Unattended play: pick the next action for one character, and drive a game
//! to completion through the same dispatch path as manual input.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::{Command, Verb};
use crate::remote::{GameApi, RemoteError};
use crate::router::{Outcome, Report, Router};
use crate::session::{CharacterRef, GameStatus, Grid, Position, SessionState};
use crate::turn::PermissionDenied;

/// Hard ceiling on driver iterations, in case the server never resolves the game.
pub const MAX_ITERATIONS: usize = 200;

/// What a character has already spent this turn, as observed by the driver.
///
/// Server-reported budgets (`movement_remaining`, `action_available`) win; this
/// only fills in what the server leaves out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnProgress {
    pub squares_moved: u32,
    pub action_used: bool,
    pub dashed: bool,
}

impl TurnProgress {
    pub fn movement_left(&self, me: &CharacterRef) -> u32 {
        match me.movement_remaining {
            Some(feet) => feet / Grid::SQUARE_FEET,
            None => {
                let per_turn = me.speed / Grid::SQUARE_FEET;
                let budget = if self.dashed { per_turn * 2 } else { per_turn };
                budget.saturating_sub(self.squares_moved)
            }
        }
    }

    pub fn action_left(&self, me: &CharacterRef) -> bool {
        me.action_available && !self.action_used
    }

    pub fn record(&mut self, command: &Command) {
        match command.verb() {
            Verb::Move => self.squares_moved += 1,
            Verb::Dash => {
                self.squares_moved += 1;
                self.dashed = true;
                self.action_used = true;
            }
            Verb::Attack | Verb::Dodge | Verb::Disengage => self.action_used = true,
            _ => {}
        }
    }
}

/// Choose the single next command for the character owned by `controlled_owner_id`,
/// assuming nothing has been spent this turn.
pub fn next_action(session: &SessionState, controlled_owner_id: &str) -> Command {
    plan_with(session, controlled_owner_id, &TurnProgress::default())
}

/// Like [`next_action`], accounting for what the character already did this turn.
///
/// Attacks when an enemy is within reach, otherwise steps one square toward the
/// nearest living enemy, and ends the turn when neither makes progress.
pub fn plan_with(session: &SessionState, controlled_owner_id: &str, progress: &TurnProgress) -> Command {
    let Some(me) = session.roster.get(controlled_owner_id) else {
        return Command::bare(Verb::End);
    };

    // Nearest living enemy; ties go to the lowest character id.
    let Some(target) = session.living_enemies_of(&me.owner_id).min_by(|a, b| {
        let da = me.position.chebyshev(a.position);
        let db = me.position.chebyshev(b.position);
        da.cmp(&db).then_with(|| a.character_id.cmp(&b.character_id))
    }) else {
        return Command::bare(Verb::End);
    };

    let reach = me.reach_squares();
    if me.position.chebyshev(target.position) <= reach {
        if !progress.action_left(me) {
            return Command::bare(Verb::End);
        }
        let in_reach = session
            .living_enemies_of(&me.owner_id)
            .filter(|c| me.position.chebyshev(c.position) <= reach)
            .count();
        return if in_reach == 1 {
            Command::bare(Verb::Attack)
        } else {
            Command::new(Verb::Attack, vec![target.character_id.clone()])
        };
    }

    match step_toward(session, me.position, target.position) {
        Some(sq) if progress.movement_left(me) >= 1 => Command::to_square(Verb::Move, sq),
        Some(sq) if progress.action_left(me) => Command::to_square(Verb::Dash, sq),
        _ => Command::bare(Verb::End),
    }
}

/// The free in-bounds neighbor of `from` closest to `to`, ties broken by smallest
/// x then y. `None` when no neighbor is strictly closer than `from` itself.
pub fn step_toward(session: &SessionState, from: Position, to: Position) -> Option<Position> {
    from.neighbors()
        .filter(|sq| session.grid.contains(*sq) && !session.is_occupied(*sq))
        .min_by_key(|sq| (sq.chebyshev(to), sq.x, sq.y))
        .filter(|sq| sq.chebyshev(to) < from.chebyshev(to))
}

#[derive(Debug, Clone)]
pub struct AutoplayConfig {
    /// Pause after each applied action, so a watching human can follow along.
    pub step_delay: Duration,
    /// How long to wait before re-polling when it is someone else's turn.
    pub poll_interval: Duration,
    pub max_iterations: usize,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(300),
            poll_interval: Duration::from_millis(300),
            max_iterations: MAX_ITERATIONS,
        }
    }
}

/// Progress notifications from [`run`].
#[derive(Debug, Clone, PartialEq)]
pub enum AutoplayEvent {
    RoundStarted(u32),
    Acted {
        actor: String,
        command: Command,
        report: Report,
    },
    Waiting {
        active: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutoplayOutcome {
    /// The server reported the game as completed.
    Finished { winner: Option<String> },
    Aborted(AbortReason),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AbortReason {
    #[error("autoplay aborted after {0} iterations without the game finishing")]
    IterationCap(usize),
    #[error("autoplay stopped")]
    Interrupted,
    #[error("{0}")]
    Rejected(PermissionDenied),
    #[error("{0}")]
    Remote(RemoteError),
    #[error("no character to drive; join a game first")]
    NothingToDrive,
}

/// Drive the characters of `owners` until the game completes.
///
/// Each iteration refreshes state, then either waits (someone else's turn) or
/// dispatches one planned command. `stop` is checked between iterations only;
/// a dispatch in flight always runs to completion.
pub async fn run<A, S, E>(
    router: &Router<A>,
    session: &mut SessionState,
    owners: &[String],
    config: &AutoplayConfig,
    mut stop: S,
    mut on_event: E,
) -> AutoplayOutcome
where
    A: GameApi,
    S: FnMut() -> bool,
    E: FnMut(AutoplayEvent),
{
    if owners.is_empty() {
        return AutoplayOutcome::Aborted(AbortReason::NothingToDrive);
    }
    let mut last_round = 0;
    let mut turn: Option<(u32, String)> = None;
    let mut progress = TurnProgress::default();

    for iteration in 0..config.max_iterations {
        if stop() {
            info!(iteration, "autoplay interrupted");
            return AutoplayOutcome::Aborted(AbortReason::Interrupted);
        }

        match router.refresh(session, std::future::pending::<()>()).await {
            Outcome::Applied(_) => {}
            other => return abort_with(other),
        }

        if session.status == GameStatus::Completed {
            let winner = session.winner().map(|c| c.display_name.clone());
            info!(?winner, "game finished under autoplay");
            return AutoplayOutcome::Finished { winner };
        }

        let Some(active) = session
            .active_character()
            .filter(|c| owners.contains(&c.owner_id))
            .cloned()
        else {
            on_event(AutoplayEvent::Waiting {
                active: session.active_character().map(|c| c.display_name.clone()),
            });
            tokio::time::sleep(config.poll_interval).await;
            continue;
        };

        if session.round > last_round {
            last_round = session.round;
            on_event(AutoplayEvent::RoundStarted(last_round));
        }

        let key = (session.round, active.character_id.clone());
        if turn.as_ref() != Some(&key) {
            turn = Some(key);
            progress = TurnProgress::default();
        }

        session.controlled_owner_id = Some(active.owner_id.clone());
        let command = plan_with(session, &active.owner_id, &progress);
        debug!(iteration, actor = %active.display_name, command = %command, "autoplay step");

        match router
            .dispatch(session, &command, std::future::pending::<()>())
            .await
        {
            Outcome::Applied(report) => {
                progress.record(&command);
                on_event(AutoplayEvent::Acted {
                    actor: active.display_name,
                    command,
                    report,
                });
            }
            other => return abort_with(other),
        }

        tokio::time::sleep(config.step_delay).await;
    }

    warn!(cap = config.max_iterations, "autoplay hit its iteration cap");
    AutoplayOutcome::Aborted(AbortReason::IterationCap(config.max_iterations))
}

fn abort_with(outcome: Outcome) -> AutoplayOutcome {
    let reason = match outcome {
        Outcome::Rejected(denied) => AbortReason::Rejected(denied),
        Outcome::RemoteFailure(err) => AbortReason::Remote(err),
        Outcome::Cancelled | Outcome::Applied(_) => AbortReason::Interrupted,
    };
    AutoplayOutcome::Aborted(reason)
}
