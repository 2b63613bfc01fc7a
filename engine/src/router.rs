//! Command routing: validate locally, translate to a request, call the server,
//! then apply the returned snapshot in one step.
//!
//! Routing is split into three phases so a failed or abandoned call can never
//! leave the session half-updated:
//!
//! 1. `plan` resolves the command against the current session without any I/O.
//! 2. `execute` talks to the server and only *reads* the session.
//! 3. `dispatch` applies the resulting [`Snapshot`] with
//!    [`SessionState::replace`], and only once every call has succeeded.

use std::future::Future;

use tracing::{debug, info};

use crate::command::{Command, Verb};
use crate::presets::{self, PresetError};
use crate::remote::{
    ActionKind, ActionRequest, ActionResult, GameApi, GameSummary, LogEntry, RemoteError,
    RemoteResult,
};
use crate::session::{CharacterRef, GameStatus, SessionState, Snapshot};
use crate::sheet::CharacterSheet;
use crate::turn::{PermissionDenied, is_permitted};

pub const DEFAULT_GAME_NAME: &str = "CLI Arena";

/// What a successfully applied command produced, for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Created {
        game_id: String,
        message: Option<String>,
    },
    Joined {
        character_id: String,
        name: String,
        message: Option<String>,
    },
    Started {
        message: Option<String>,
        initiative: Vec<String>,
    },
    /// Session refreshed; show the status panel.
    Status,
    /// Session refreshed; show the map.
    Map,
    Summary(GameSummary),
    Log(Vec<LogEntry>),
    Action {
        command: Command,
        result: ActionResult,
    },
    Switched {
        owner_id: String,
        name: String,
    },
    /// `switch` without an argument: list the roster owners.
    Owners,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied(Report),
    Rejected(PermissionDenied),
    RemoteFailure(RemoteError),
    /// Interrupted while waiting on the server. The session is untouched.
    Cancelled,
}

enum Request {
    Create { name: String },
    Join { sheet: CharacterSheet },
    Start,
    Summary,
    Refresh { show: Report },
    Log,
    Act { command: Command, action: ActionRequest },
}

/// A resolved command: either answered locally or sent to the server.
enum Plan {
    Switch { owner_id: String },
    ListOwners,
    Remote(Request),
}

enum Effect {
    Replace(Snapshot, Report),
    Keep(Report),
}

pub struct Router<A> {
    api: A,
}

impl<A: GameApi> Router<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run one command to completion. `cancel` abandons the server round-trip
    /// when it resolves first.
    pub async fn dispatch<C>(&self, session: &mut SessionState, command: &Command, cancel: C) -> Outcome
    where
        C: Future<Output = ()>,
    {
        match self.plan(session, command) {
            Ok(Plan::ListOwners) => Outcome::Applied(Report::Owners),
            Ok(Plan::Switch { owner_id }) => {
                let name = session
                    .roster
                    .get(&owner_id)
                    .map(|c| c.display_name.clone())
                    .unwrap_or_default();
                info!(owner = %owner_id, "controlled owner switched");
                session.controlled_owner_id = Some(owner_id.clone());
                Outcome::Applied(Report::Switched { owner_id, name })
            }
            Ok(Plan::Remote(request)) => self.run(session, request, cancel).await,
            Err(denied) => {
                debug!(command = %command, reason = denied.reason(), "rejected locally");
                Outcome::Rejected(denied)
            }
        }
    }

    /// Join with a hand-built sheet (the `join custom` flow).
    pub async fn join_with<C>(&self, session: &mut SessionState, sheet: CharacterSheet, cancel: C) -> Outcome
    where
        C: Future<Output = ()>,
    {
        if let Err(denied) = is_permitted(session, &Command::bare(Verb::Join)) {
            return Outcome::Rejected(denied);
        }
        self.run(session, Request::Join { sheet }, cancel).await
    }

    /// Re-fetch the authoritative state and replace the session with it.
    pub async fn refresh<C>(&self, session: &mut SessionState, cancel: C) -> Outcome
    where
        C: Future<Output = ()>,
    {
        match refresh_request(session, Report::Status) {
            Ok(request) => self.run(session, request, cancel).await,
            Err(denied) => Outcome::Rejected(denied),
        }
    }

    fn plan(&self, session: &SessionState, command: &Command) -> Result<Plan, PermissionDenied> {
        is_permitted(session, command)?;

        let verb = command.verb();
        match verb {
            Verb::Help | Verb::Quit | Verb::Auto | Verb::Demo => {
                Err(PermissionDenied::NotRoutable(verb))
            }
            Verb::New => {
                let name = if command.args().is_empty() {
                    DEFAULT_GAME_NAME.to_string()
                } else {
                    command.args().join(" ")
                };
                Ok(Plan::Remote(Request::Create { name }))
            }
            Verb::Join => {
                let choice = command.arg(0).unwrap_or_default();
                if choice.eq_ignore_ascii_case("custom") {
                    return Err(PermissionDenied::CustomSheetRequired);
                }
                let sheet = presets::preset(choice).map_err(|e| match e {
                    PresetError::Unknown(name) => PermissionDenied::UnknownPreset(name),
                    PresetError::Malformed { name, .. } => PermissionDenied::UnknownPreset(name),
                })?;
                Ok(Plan::Remote(Request::Join { sheet }))
            }
            Verb::Start => Ok(Plan::Remote(Request::Start)),
            Verb::Games => {
                require_game(session)?;
                Ok(Plan::Remote(Request::Summary))
            }
            Verb::Log => {
                require_game(session)?;
                Ok(Plan::Remote(Request::Log))
            }
            Verb::Status => refresh_request(session, Report::Status).map(Plan::Remote),
            Verb::Map => refresh_request(session, Report::Map).map(Plan::Remote),
            Verb::Switch => match command.arg(0) {
                None => Ok(Plan::ListOwners),
                Some(owner) if session.roster.contains_key(owner) => Ok(Plan::Switch {
                    owner_id: owner.to_string(),
                }),
                Some(owner) => Err(PermissionDenied::UnknownOwner(owner.to_string())),
            },
            Verb::Move | Verb::Attack | Verb::Dodge | Verb::Dash | Verb::Disengage | Verb::End => {
                let actor = session
                    .active_character()
                    .ok_or(PermissionDenied::NoCharacter)?;
                let action = build_action(session, actor, command)?;
                Ok(Plan::Remote(Request::Act {
                    command: command.clone(),
                    action,
                }))
            }
        }
    }

    async fn run<C>(&self, session: &mut SessionState, request: Request, cancel: C) -> Outcome
    where
        C: Future<Output = ()>,
    {
        let effect = tokio::select! {
            biased;
            _ = cancel => {
                info!("request abandoned; session left as it was");
                return Outcome::Cancelled;
            }
            res = self.execute(session, request) => res,
        };

        match effect {
            Ok(Effect::Replace(snapshot, report)) => {
                session.replace(snapshot);
                Outcome::Applied(report)
            }
            Ok(Effect::Keep(report)) => Outcome::Applied(report),
            Err(err) => {
                debug!(reason = err.reason(), error = %err, "remote call failed");
                Outcome::RemoteFailure(err)
            }
        }
    }

    async fn execute(&self, session: &SessionState, request: Request) -> RemoteResult<Effect> {
        let game_id = session.game_id.clone().unwrap_or_default();
        match request {
            Request::Create { name } => {
                let created = self.api.create_game(&name).await?;
                info!(game = %created.game_id, "game created");
                let snapshot = Snapshot::lobby(created.game_id.clone());
                Ok(Effect::Replace(
                    snapshot,
                    Report::Created {
                        game_id: created.game_id,
                        message: created.message,
                    },
                ))
            }
            Request::Join { sheet } => {
                debug!(game = %game_id, name = %sheet.name, "joining");
                let receipt = self.api.join_game(&game_id, &sheet).await?;
                let state = self.api.get_state(&game_id, &receipt.character_id).await?;
                Ok(Effect::Replace(
                    state.into_snapshot(&game_id),
                    Report::Joined {
                        character_id: receipt.character_id,
                        name: sheet.name,
                        message: receipt.message,
                    },
                ))
            }
            Request::Start => {
                let receipt = self.api.start_game(&game_id).await?;
                let report = Report::Started {
                    initiative: receipt.initiative(),
                    message: receipt.message,
                };
                match session.viewer_id() {
                    Some(viewer) => {
                        let state = self.api.get_state(&game_id, viewer).await?;
                        Ok(Effect::Replace(state.into_snapshot(&game_id), report))
                    }
                    None => Ok(Effect::Keep(report)),
                }
            }
            Request::Summary => Ok(Effect::Keep(Report::Summary(
                self.api.get_game(&game_id).await?,
            ))),
            Request::Log => Ok(Effect::Keep(Report::Log(self.api.get_log(&game_id).await?))),
            Request::Refresh { show } => {
                let viewer = session.viewer_id().unwrap_or_default();
                let snapshot = self.state_or_finished(session, &game_id, viewer).await?;
                Ok(Effect::Replace(snapshot, show))
            }
            Request::Act { command, action } => {
                debug!(game = %game_id, action = ?action.action_type, character = %action.character_id, "submitting action");
                let mut result = self.api.submit_action(&game_id, &action).await?;
                if !result.success {
                    let message = result
                        .error
                        .clone()
                        .or_else(|| result.description.clone())
                        .unwrap_or_else(|| "Action failed".to_string());
                    return Err(RemoteError::Rejected {
                        status: 200,
                        message,
                    });
                }
                let mut snapshot = match result.state.take() {
                    Some(state) => state.into_snapshot(&game_id),
                    None => {
                        self.state_or_finished(session, &game_id, &action.character_id)
                            .await?
                    }
                };
                if snapshot.status == GameStatus::Completed {
                    settle_target(&mut snapshot, &action, &result);
                }
                Ok(Effect::Replace(snapshot, Report::Action { command, result }))
            }
        }
    }

    /// Fetch `viewer`'s state. A finished game may already be recycled on the
    /// server, so when that fetch fails and the game reports a winner, the
    /// session's own roster is closed out instead.
    async fn state_or_finished(
        &self,
        session: &SessionState,
        game_id: &str,
        viewer: &str,
    ) -> RemoteResult<Snapshot> {
        let err = match self.api.get_state(game_id, viewer).await {
            Ok(state) => return Ok(state.into_snapshot(game_id)),
            Err(err) => err,
        };
        match self.api.get_game(game_id).await {
            Ok(GameSummary {
                winner_id: Some(winner),
                ..
            }) => {
                info!(game = %game_id, winner = %winner, error = %err, "state gone after a win; closing out the game");
                Ok(session.finished(Some(winner)))
            }
            _ => Err(err),
        }
    }
}

/// Carry the reported hp of a struck target into a locally closed-out snapshot.
fn settle_target(snapshot: &mut Snapshot, action: &ActionRequest, result: &ActionResult) {
    let (Some(target), Some(hp)) = (action.target_id.as_deref(), result.target_hp_remaining) else {
        return;
    };
    if let Some(c) = snapshot.roster.values_mut().find(|c| c.character_id == target) {
        c.hp = (hp.max(0) as u32).min(c.max_hp);
    }
}

fn require_game(session: &SessionState) -> Result<&str, PermissionDenied> {
    session.game_id.as_deref().ok_or(PermissionDenied::NoGameYet)
}

fn refresh_request(session: &SessionState, show: Report) -> Result<Request, PermissionDenied> {
    require_game(session)?;
    if session.viewer_id().is_none() {
        return Err(PermissionDenied::NoCharacter);
    }
    Ok(Request::Refresh { show })
}

fn build_action(
    session: &SessionState,
    actor: &CharacterRef,
    command: &Command,
) -> Result<ActionRequest, PermissionDenied> {
    let mut action = ActionRequest::new(&actor.character_id, ActionKind::EndTurn);
    match command.verb() {
        Verb::Move | Verb::Dash => {
            let pos = command
                .coordinates()
                .ok_or(PermissionDenied::NotRoutable(command.verb()))?;
            action.action_type = if command.verb() == Verb::Move {
                ActionKind::Move
            } else {
                ActionKind::Dash
            };
            action.target_position = Some([pos.x, pos.y]);
        }
        Verb::Attack => {
            let target = match command.arg(0) {
                Some(name) => find_target(session, name)?,
                None => auto_target(session, actor)?,
            };
            action.action_type = ActionKind::Attack;
            action.target_id = Some(target.character_id.clone());
            action.weapon_name = command.arg(1).map(str::to_string);
        }
        Verb::Dodge => action.action_type = ActionKind::Dodge,
        Verb::Disengage => action.action_type = ActionKind::Disengage,
        _ => {}
    }
    Ok(action)
}

/// Resolve a named target: character id, owner id, or display name (case-insensitive).
pub fn find_target<'a>(session: &'a SessionState, name: &str) -> Result<&'a CharacterRef, PermissionDenied> {
    session
        .character(name)
        .or_else(|| session.roster.get(name))
        .or_else(|| {
            session
                .roster
                .values()
                .find(|c| c.display_name.eq_ignore_ascii_case(name))
        })
        .ok_or_else(|| PermissionDenied::UnknownTarget(name.to_string()))
}

/// The single living enemy within the attacker's reach, if there is exactly one.
pub fn auto_target<'a>(
    session: &'a SessionState,
    attacker: &CharacterRef,
) -> Result<&'a CharacterRef, PermissionDenied> {
    let reach = attacker.reach_squares();
    let in_reach: Vec<&CharacterRef> = session
        .living_enemies_of(&attacker.owner_id)
        .filter(|c| attacker.position.chebyshev(c.position) <= reach)
        .collect();
    match in_reach.as_slice() {
        [only] => Ok(*only),
        [] => Err(PermissionDenied::NoTargetInRange),
        many => Err(PermissionDenied::AmbiguousTarget {
            candidates: many.iter().map(|c| c.display_name.clone()).collect(),
        }),
    }
}
