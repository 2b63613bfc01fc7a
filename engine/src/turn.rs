//! Turn context: the prompt to show and whether a command may run right now.

use crate::command::{Command, Verb, VerbClass};
use crate::session::{GameStatus, SessionState};

/// Why a command was refused locally, before any request was sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionDenied {
    #[error("{}", not_your_turn_message(.active_name))]
    NotYourTurn { active_name: Option<String> },
    #[error("Combat has already started.")]
    AlreadyStarted,
    #[error("No game yet. Create one with 'new'.")]
    NoGameYet,
    #[error("No enemy within reach. Move closer or name a target.")]
    NoTargetInRange,
    #[error("More than one enemy within reach ({}). Name a target: attack TARGET.", .candidates.join(", "))]
    AmbiguousTarget { candidates: Vec<String> },
    #[error("Unknown target '{0}'.")]
    UnknownTarget(String),
    #[error("No character with owner_id '{0}'. Use 'switch' to list.")]
    UnknownOwner(String),
    #[error("No active character. Join a game first.")]
    NoCharacter,
    #[error("Unknown preset '{0}'. Options: fighter, rogue, barbarian, monk, custom")]
    UnknownPreset(String),
    #[error("Custom characters are built interactively.")]
    CustomSheetRequired,
    #[error("'{0}' is handled by the command loop.")]
    NotRoutable(Verb),
}

fn not_your_turn_message(active_name: &Option<String>) -> String {
    match active_name {
        Some(name) => format!("It's {name}'s turn, not yours. Use 'switch' to take over."),
        None => "No combat in progress.".to_string(),
    }
}

impl PermissionDenied {
    pub fn reason(&self) -> &'static str {
        match self {
            PermissionDenied::NotYourTurn { .. } => "not_your_turn",
            PermissionDenied::AlreadyStarted => "already_started",
            PermissionDenied::NoGameYet => "no_game_yet",
            PermissionDenied::NoTargetInRange => "no_target_in_range",
            PermissionDenied::AmbiguousTarget { .. } => "ambiguous_target",
            PermissionDenied::UnknownTarget(_) => "unknown_target",
            PermissionDenied::UnknownOwner(_) => "unknown_owner",
            PermissionDenied::NoCharacter => "no_character",
            PermissionDenied::UnknownPreset(_) => "unknown_preset",
            PermissionDenied::CustomSheetRequired => "custom_sheet_required",
            PermissionDenied::NotRoutable(_) => "not_routable",
        }
    }
}

/// The input prompt for the current session. Pure function of its fields.
pub fn prompt(session: &SessionState) -> String {
    let game_id = session.game_id.as_deref().unwrap_or_default();
    match session.status {
        GameStatus::Unset => "tendrils> ".to_string(),
        GameStatus::Waiting | GameStatus::Completed => format!("tendrils [{game_id}]> "),
        GameStatus::Active => {
            let name = session
                .active_character()
                .map(|c| c.display_name.as_str())
                .unwrap_or("?");
            if session.is_controlled_turn() {
                format!("[R{} — {}'s turn]> ", session.round, name)
            } else {
                format!("[R{} — {}'s turn (waiting)]> ", session.round, name)
            }
        }
    }
}

/// Whether `command` may run against `session` right now.
pub fn is_permitted(session: &SessionState, command: &Command) -> Result<(), PermissionDenied> {
    match command.verb().class() {
        VerbClass::Info => Ok(()),
        VerbClass::Combat => {
            if session.is_controlled_turn() {
                Ok(())
            } else {
                let active_name = match session.status {
                    GameStatus::Active => session.active_character().map(|c| c.display_name.clone()),
                    _ => None,
                };
                Err(PermissionDenied::NotYourTurn { active_name })
            }
        }
        VerbClass::Setup => setup_permitted(session.status, command.verb()),
    }
}

fn setup_permitted(status: GameStatus, verb: Verb) -> Result<(), PermissionDenied> {
    use GameStatus::*;
    match (verb, status) {
        (Verb::New, Active) => Err(PermissionDenied::AlreadyStarted),
        (Verb::New, _) => Ok(()),
        (Verb::Join | Verb::Start, Unset) => Err(PermissionDenied::NoGameYet),
        (Verb::Join | Verb::Start, Waiting) => Ok(()),
        (_, _) => Err(PermissionDenied::AlreadyStarted),
    }
}
