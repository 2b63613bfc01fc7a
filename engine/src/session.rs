use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle of the mirrored game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Unset,
    Waiting,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Grid-square distance: max of the absolute column and row deltas.
    pub fn chebyshev(self, other: Position) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// The eight squares surrounding this one, in row-major order.
    pub fn neighbors(self) -> impl Iterator<Item = Position> {
        (-1..=1).flat_map(move |dy| {
            (-1..=1)
                .filter(move |dx| !(*dx == 0 && dy == 0))
                .map(move |dx| Position::new(self.x + dx, self.y + dy))
        })
    }
}

/// Bounded battle grid. Squares are 5 feet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
}

impl Grid {
    pub const SQUARE_FEET: u32 = 5;

    pub fn contains(&self, pos: Position) -> bool {
        (0..self.width).contains(&pos.x) && (0..self.height).contains(&pos.y)
    }

    /// Longest Chebyshev distance between any two squares of the grid.
    pub fn diagonal(&self) -> u32 {
        (self.width.max(self.height) - 1).max(0) as u32
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRef {
    pub name: String,
    /// Reach in feet.
    pub reach: u32,
}

impl AttackRef {
    pub fn reach_squares(&self) -> u32 {
        (self.reach / Grid::SQUARE_FEET).max(1)
    }
}

/// One roster entry as last reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRef {
    pub character_id: String,
    pub owner_id: String,
    pub display_name: String,
    pub position: Position,
    pub hp: u32, // 0..=max_hp
    pub max_hp: u32,
    /// Walking speed in feet.
    pub speed: u32,
    /// Movement left this turn in feet; `None` when the server does not track it.
    pub movement_remaining: Option<u32>,
    pub action_available: bool,
    pub attacks: Vec<AttackRef>,
}

impl CharacterRef {
    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Reach of the first-listed attack, in squares. Unarmed characters still threaten
    /// the adjacent ring.
    pub fn reach_squares(&self) -> u32 {
        self.attacks
            .first()
            .map(AttackRef::reach_squares)
            .unwrap_or(1)
    }
}

/// A complete authoritative state payload, already converted from the wire model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub game_id: String,
    pub status: GameStatus,
    pub round: u32,
    pub roster: IndexMap<String, CharacterRef>,
    pub active_character_id: Option<String>,
    pub winner_id: Option<String>,
    pub grid: Grid,
}

impl Snapshot {
    /// Freshly created game with nobody joined yet.
    pub fn lobby(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            status: GameStatus::Waiting,
            ..Self::default()
        }
    }
}

/// Client-local mirror of one game.
///
/// Everything except `controlled_owner_id` comes from the server and is
/// replaced wholesale by [`SessionState::replace`]; there is no partial merge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub game_id: Option<String>,
    pub status: GameStatus,
    pub round: u32,
    pub roster: IndexMap<String, CharacterRef>,
    pub active_character_id: Option<String>,
    pub winner_id: Option<String>,
    pub grid: Grid,
    /// The roster owner the local user is steering. Independent of whose turn it is.
    pub controlled_owner_id: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a fresh snapshot. The controlled owner survives only if it is still
    /// on the roster; otherwise the first joined owner takes over.
    pub fn replace(&mut self, snapshot: Snapshot) {
        let Snapshot {
            game_id,
            status,
            round,
            roster,
            active_character_id,
            winner_id,
            grid,
        } = snapshot;

        let controlled = self
            .controlled_owner_id
            .take()
            .filter(|owner| roster.contains_key(owner))
            .or_else(|| roster.keys().next().cloned());

        if self.status != status {
            tracing::info!(from = ?self.status, to = ?status, game = %game_id, "game status changed");
        }

        *self = Self {
            game_id: Some(game_id),
            status,
            round,
            roster,
            active_character_id,
            winner_id,
            grid,
            controlled_owner_id: controlled,
        };
    }

    pub fn character(&self, character_id: &str) -> Option<&CharacterRef> {
        self.roster
            .values()
            .find(|c| c.character_id == character_id)
    }

    pub fn active_character(&self) -> Option<&CharacterRef> {
        self.active_character_id
            .as_deref()
            .and_then(|id| self.character(id))
    }

    pub fn controlled_character(&self) -> Option<&CharacterRef> {
        self.controlled_owner_id
            .as_deref()
            .and_then(|owner| self.roster.get(owner))
    }

    /// True when combat is running and the active character belongs to the controlled owner.
    pub fn is_controlled_turn(&self) -> bool {
        self.status == GameStatus::Active
            && match (self.active_character(), self.controlled_owner_id.as_deref()) {
                (Some(active), Some(owner)) => active.owner_id == owner,
                _ => false,
            }
    }

    /// Living characters whose owner differs from `owner_id`, in join order.
    pub fn living_enemies_of<'a>(
        &'a self,
        owner_id: &str,
    ) -> impl Iterator<Item = &'a CharacterRef> {
        self.roster
            .values()
            .filter(move |c| c.owner_id != owner_id && c.is_alive())
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.roster
            .values()
            .any(|c| c.is_alive() && c.position == pos)
    }

    /// Which character's viewpoint to fetch state for: the controlled one, then the
    /// active one, then whoever joined first.
    pub fn viewer_id(&self) -> Option<&str> {
        self.controlled_character()
            .or_else(|| self.active_character())
            .or_else(|| self.roster.values().next())
            .map(|c| c.character_id.as_str())
    }

    /// This session's roster and grid as a finished game. Used when the server has
    /// already recycled the game and no longer serves per-character state.
    pub fn finished(&self, winner_id: Option<String>) -> Snapshot {
        Snapshot {
            game_id: self.game_id.clone().unwrap_or_default(),
            status: GameStatus::Completed,
            round: self.round,
            roster: self.roster.clone(),
            active_character_id: None,
            winner_id,
            grid: self.grid,
        }
    }

    pub fn winner(&self) -> Option<&CharacterRef> {
        self.winner_id
            .as_deref()
            .and_then(|id| self.character(id))
            .or_else(|| {
                if self.status == GameStatus::Completed {
                    self.roster.values().find(|c| c.is_alive())
                } else {
                    None
                }
            })
    }
}
