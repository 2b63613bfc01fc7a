//! Remote collaborator contract and the wire model it speaks.
//!
//! The server returns loosely shaped JSON. Everything here is deserialized into
//! typed views with defaults and aliases, then converted once into
//! [`Snapshot`] so the rest of the engine never touches raw maps.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::session::{AttackRef, CharacterRef, GameStatus, Grid, Position, Snapshot};
use crate::sheet::CharacterSheet;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server could not be reached at all.
    #[error("Cannot reach server at {url}: {detail}")]
    Connectivity { url: String, detail: String },
    /// The server answered and declined. `message` is shown to the user untouched.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected response from server: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn reason(&self) -> &'static str {
        match self {
            RemoteError::Connectivity { .. } => "connectivity",
            RemoteError::Rejected { .. } => "rejected",
            RemoteError::Decode(_) => "decode",
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Everything the client asks of the game server. One call at a time.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn ping(&self) -> RemoteResult<ServerInfo>;
    async fn create_game(&self, name: &str) -> RemoteResult<CreatedGame>;
    async fn join_game(&self, game_id: &str, sheet: &CharacterSheet) -> RemoteResult<JoinReceipt>;
    async fn start_game(&self, game_id: &str) -> RemoteResult<StartReceipt>;
    async fn get_game(&self, game_id: &str) -> RemoteResult<GameSummary>;
    async fn get_state(&self, game_id: &str, character_id: &str) -> RemoteResult<StateView>;
    async fn submit_action(&self, game_id: &str, action: &ActionRequest)
    -> RemoteResult<ActionResult>;
    async fn get_log(&self, game_id: &str) -> RemoteResult<Vec<LogEntry>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default = "default_server_name")]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_server_name() -> String {
    "Tendrils Server".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedGame {
    #[serde(alias = "id")]
    pub game_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReceipt {
    #[serde(alias = "id")]
    pub character_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub initiative_order: Vec<serde_json::Value>,
}

impl StartReceipt {
    /// Initiative entries rendered as text; the server sends ids or small objects.
    pub fn initiative(&self) -> Vec<String> {
        self.initiative_order
            .iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Object(o) => o
                    .get("name")
                    .or_else(|| o.get("character_id"))
                    .or_else(|| o.get("id"))
                    .and_then(|n| n.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| v.to_string()),
                other => other.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSummary {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub characters: Vec<SummaryCharacter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCharacter {
    #[serde(default, alias = "id")]
    pub character_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackView {
    pub name: String,
    #[serde(default = "default_reach")]
    pub reach: u32,
}

fn default_reach() -> u32 {
    5
}

fn default_speed() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterView {
    #[serde(alias = "character_id")]
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<[i32; 2]>,
    #[serde(default, alias = "hp")]
    pub current_hp: i64,
    #[serde(default)]
    pub max_hp: Option<i64>,
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default)]
    pub movement_remaining: Option<u32>,
    #[serde(default = "default_true")]
    pub action_available: bool,
    #[serde(default)]
    pub attacks: Vec<AttackView>,
}

impl CharacterView {
    fn into_ref(self) -> CharacterRef {
        let max_hp = self.max_hp.unwrap_or(self.current_hp).max(0);
        let hp = self.current_hp.clamp(0, max_hp);
        if hp != self.current_hp {
            tracing::warn!(character = %self.id, reported = self.current_hp, max_hp, "hp outside 0..=max_hp; clamped");
        }
        let [x, y] = self.position.unwrap_or_default();
        CharacterRef {
            owner_id: self.owner_id.unwrap_or_else(|| self.id.clone()),
            display_name: self.name.unwrap_or_else(|| "?".to_string()),
            character_id: self.id,
            position: Position::new(x, y),
            hp: hp as u32,
            max_hp: max_hp as u32,
            speed: self.speed,
            movement_remaining: self.movement_remaining,
            action_available: self.action_available,
            attacks: self
                .attacks
                .into_iter()
                .map(|a| AttackRef {
                    name: a.name,
                    reach: a.reach,
                })
                .collect(),
        }
    }
}

/// One viewer's picture of the game, as returned by `get_state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "round")]
    pub round_number: u32,
    #[serde(default)]
    pub is_your_turn: bool,
    #[serde(default)]
    pub your_character: Option<CharacterView>,
    #[serde(default)]
    pub visible_characters: Vec<CharacterView>,
    #[serde(
        default,
        alias = "active_character_id",
        alias = "current_character_id"
    )]
    pub current_turn_character_id: Option<String>,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub grid_width: Option<i32>,
    #[serde(default)]
    pub grid_height: Option<i32>,
}

pub fn parse_status(raw: Option<&str>, winner_id: Option<&str>) -> GameStatus {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        // Finished games are recycled to waiting; a winner means it is over.
        Some("waiting") if winner_id.is_some() => GameStatus::Completed,
        Some("waiting") => GameStatus::Waiting,
        Some("active") => GameStatus::Active,
        Some("completed") => GameStatus::Completed,
        _ => GameStatus::Unset,
    }
}

impl StateView {
    /// Convert into a full snapshot for `game_id`.
    pub fn into_snapshot(self, game_id: &str) -> Snapshot {
        let status = parse_status(self.status.as_deref(), self.winner_id.as_deref());
        let status = if status == GameStatus::Unset {
            GameStatus::Waiting
        } else {
            status
        };
        let mine_id = self.your_character.as_ref().map(|c| c.id.clone());

        let mut roster: IndexMap<String, CharacterRef> = IndexMap::new();
        for view in self.your_character.into_iter().chain(self.visible_characters) {
            if roster.values().any(|c| c.character_id == view.id) {
                continue;
            }
            let character = view.into_ref();
            if let Some(prev) = roster.insert(character.owner_id.clone(), character) {
                tracing::warn!(owner = %prev.owner_id, replaced = %prev.character_id, "owner listed twice; keeping the later character");
            }
        }

        let mut active = self.current_turn_character_id.or_else(|| {
            if self.is_your_turn {
                mine_id
            } else {
                None
            }
        });
        if let Some(id) = active.as_deref() {
            if !roster.values().any(|c| c.character_id == id) {
                tracing::warn!(active = %id, "active character not on roster; dropped");
                active = None;
            }
        }
        if status != GameStatus::Active {
            active = None;
        }

        let defaults = Grid::default();
        Snapshot {
            game_id: game_id.to_string(),
            status,
            round: self.round_number,
            roster,
            active_character_id: active,
            winner_id: self.winner_id,
            grid: Grid {
                width: self.grid_width.unwrap_or(defaults.width),
                height: self.grid_height.unwrap_or(defaults.height),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Attack,
    Dodge,
    Dash,
    Disengage,
    EndTurn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub character_id: String,
    pub action_type: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_position: Option<[i32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon_name: Option<String>,
}

impl ActionRequest {
    pub fn new(character_id: impl Into<String>, action_type: ActionKind) -> Self {
        Self {
            character_id: character_id.into(),
            action_type,
            target_position: None,
            target_id: None,
            weapon_name: None,
        }
    }
}

/// Outcome of one submitted action. The updated state may ride along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub attack_roll: Option<i32>,
    #[serde(default)]
    pub hit: bool,
    #[serde(default)]
    pub damage_dealt: Option<i32>,
    #[serde(default)]
    pub target_hp_remaining: Option<i32>,
    #[serde(default)]
    pub movement_path: Vec<[i32; 2]>,
    #[serde(default, alias = "game_state")]
    pub state: Option<StateView>,
}

impl ActionResult {
    pub fn ok(action_type: &str, description: impl Into<String>) -> Self {
        Self {
            action_type: Some(action_type.to_string()),
            success: true,
            description: Some(description.into()),
            error: None,
            attack_roll: None,
            hit: false,
            damage_dealt: None,
            target_hp_remaining: None,
            movement_path: Vec::new(),
            state: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, alias = "round")]
    pub round_number: Option<u32>,
    #[serde(default, alias = "message")]
    pub description: Option<String>,
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub hit: bool,
}
