#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;
use tendrils_engine::remote::{
    ActionKind, ActionRequest, ActionResult, AttackView, CharacterView, CreatedGame, GameApi,
    GameSummary, JoinReceipt, LogEntry, RemoteError, RemoteResult, ServerInfo, StartReceipt,
    StateView, SummaryCharacter,
};
use tendrils_engine::session::{AttackRef, CharacterRef, GameStatus, Grid, Position};
use tendrils_engine::{CharacterSheet, SessionState, Snapshot};

pub const GAME_ID: &str = "g1";

/// One seated combatant in the in-memory arena.
#[derive(Debug, Clone)]
pub struct Fighter {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub pos: [i32; 2],
    pub hp: i64,
    pub max_hp: i64,
    pub speed: u32,
    pub reach: u32,
    pub damage: i64,
}

impl Fighter {
    pub fn new(id: &str, owner: &str, name: &str, pos: [i32; 2]) -> Self {
        Self {
            id: id.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            pos,
            hp: 20,
            max_hp: 20,
            speed: 30,
            reach: 5,
            damage: 7,
        }
    }

    fn view(&self) -> CharacterView {
        CharacterView {
            id: self.id.clone(),
            owner_id: Some(self.owner.clone()),
            name: Some(self.name.clone()),
            position: Some(self.pos),
            current_hp: self.hp,
            max_hp: Some(self.max_hp),
            speed: self.speed,
            movement_remaining: None,
            action_available: true,
            attacks: vec![AttackView {
                name: "Blade".to_string(),
                reach: self.reach,
            }],
        }
    }
}

/// A tiny rules-free server: moves teleport, attacks always hit for `damage`,
/// and the game ends once a single owner has living characters.
#[derive(Debug, Default)]
pub struct Arena {
    pub status: String,
    pub round: u32,
    pub fighters: Vec<Fighter>,
    pub turn: usize,
    pub winner: Option<String>,
    pub log: Vec<LogEntry>,
    /// Drop per-character state once someone has won, like a server that
    /// recycles finished games.
    pub forget_on_win: bool,
}

impl Arena {
    fn active(&self) -> Option<&Fighter> {
        if self.status == "active" {
            self.fighters.get(self.turn)
        } else {
            None
        }
    }

    fn advance(&mut self) {
        let n = self.fighters.len();
        for _ in 0..n {
            self.turn += 1;
            if self.turn >= n {
                self.turn = 0;
                self.round += 1;
            }
            if self.fighters[self.turn].hp > 0 {
                return;
            }
        }
    }

    fn settle(&mut self) {
        let mut owners: Vec<&str> = self
            .fighters
            .iter()
            .filter(|f| f.hp > 0)
            .map(|f| f.owner.as_str())
            .collect();
        owners.sort_unstable();
        owners.dedup();
        if owners.len() <= 1 {
            self.winner = self
                .fighters
                .iter()
                .find(|f| f.hp > 0)
                .map(|f| f.id.clone());
            // Finished games go back to the lobby, carrying the winner.
            self.status = "waiting".to_string();
        }
    }

    pub fn state_for(&self, viewer: &str) -> StateView {
        let active = self.active().map(|f| f.id.clone());
        StateView {
            status: Some(self.status.clone()),
            round_number: self.round,
            is_your_turn: active.as_deref() == Some(viewer),
            your_character: self.fighters.iter().find(|f| f.id == viewer).map(Fighter::view),
            visible_characters: self.fighters.iter().map(Fighter::view).collect(),
            current_turn_character_id: active,
            winner_id: self.winner.clone(),
            grid_width: Some(20),
            grid_height: Some(20),
        }
    }
}

pub struct FakeApi {
    arena: Mutex<Arena>,
    calls: Mutex<Vec<String>>,
    next_error: Mutex<Option<RemoteError>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::with_arena(Arena::default())
    }

    pub fn with_arena(arena: Arena) -> Self {
        Self {
            arena: Mutex::new(arena),
            calls: Mutex::new(Vec::new()),
            next_error: Mutex::new(None),
        }
    }

    /// Combat already running, `fighters[0]` to act.
    pub fn in_combat(fighters: Vec<Fighter>) -> Self {
        Self::with_arena(Arena {
            status: "active".to_string(),
            round: 1,
            fighters,
            ..Arena::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_next(&self, err: RemoteError) {
        *self.next_error.lock().unwrap() = Some(err);
    }

    pub fn arena<R>(&self, f: impl FnOnce(&mut Arena) -> R) -> R {
        f(&mut self.arena.lock().unwrap())
    }

    /// A session already synced to `viewer`'s view, controlling that viewer's owner.
    pub fn session_for(&self, viewer: &str) -> SessionState {
        let state = self.arena(|a| a.state_for(viewer));
        let mut session = SessionState::new();
        session.replace(state.into_snapshot(GAME_ID));
        if let Some(me) = session.character(viewer).map(|c| c.owner_id.clone()) {
            session.controlled_owner_id = Some(me);
        }
        session
    }

    fn record(&self, call: String) -> RemoteResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.next_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GameApi for FakeApi {
    async fn ping(&self) -> RemoteResult<ServerInfo> {
        self.record("ping".to_string())?;
        Ok(ServerInfo {
            name: "Fake Arena".to_string(),
            version: Some("0.0.1".to_string()),
            status: Some("ok".to_string()),
        })
    }

    async fn create_game(&self, name: &str) -> RemoteResult<CreatedGame> {
        self.record(format!("create_game:{name}"))?;
        self.arena(|a| {
            *a = Arena {
                status: "waiting".to_string(),
                ..Arena::default()
            }
        });
        Ok(CreatedGame {
            game_id: GAME_ID.to_string(),
            status: Some("waiting".to_string()),
            message: None,
        })
    }

    async fn join_game(&self, game_id: &str, sheet: &CharacterSheet) -> RemoteResult<JoinReceipt> {
        self.record(format!("join_game:{game_id}:{}", sheet.owner_id))?;
        let id = self.arena(|a| {
            let seat = a.fighters.len() as i32;
            let id = format!("c{}", seat + 1);
            let mut fighter = Fighter::new(&id, &sheet.owner_id, &sheet.name, [seat * 6, seat * 3]);
            fighter.hp = sheet.max_hp as i64;
            fighter.max_hp = sheet.max_hp as i64;
            fighter.speed = sheet.speed;
            if let Some(attack) = sheet.attacks.first() {
                fighter.reach = attack.reach;
                fighter.damage = attack.damage_bonus as i64 + 4;
            }
            a.fighters.push(fighter);
            id
        });
        Ok(JoinReceipt {
            character_id: id,
            message: None,
        })
    }

    async fn start_game(&self, game_id: &str) -> RemoteResult<StartReceipt> {
        self.record(format!("start_game:{game_id}"))?;
        let order = self.arena(|a| {
            a.status = "active".to_string();
            a.round = 1;
            a.turn = 0;
            a.fighters
                .iter()
                .map(|f| serde_json::Value::String(f.name.clone()))
                .collect()
        });
        Ok(StartReceipt {
            message: Some("Combat started!".to_string()),
            initiative_order: order,
        })
    }

    async fn get_game(&self, game_id: &str) -> RemoteResult<GameSummary> {
        self.record(format!("get_game:{game_id}"))?;
        Ok(self.arena(|a| GameSummary {
            status: Some(a.status.clone()),
            winner_id: a.winner.clone(),
            characters: a
                .fighters
                .iter()
                .map(|f| SummaryCharacter {
                    character_id: Some(f.id.clone()),
                    name: Some(f.name.clone()),
                })
                .collect(),
        }))
    }

    async fn get_state(&self, game_id: &str, character_id: &str) -> RemoteResult<StateView> {
        self.record(format!("get_state:{game_id}:{character_id}"))?;
        self.arena(|a| {
            if a.forget_on_win && a.winner.is_some() {
                return Err(RemoteError::Rejected {
                    status: 404,
                    message: "Character not found".to_string(),
                });
            }
            Ok(a.state_for(character_id))
        })
    }

    async fn submit_action(&self, game_id: &str, action: &ActionRequest) -> RemoteResult<ActionResult> {
        let kind = serde_json::to_value(action.action_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let target = action
            .target_id
            .clone()
            .or_else(|| action.target_position.map(|[x, y]| format!("{x},{y}")))
            .unwrap_or_default();
        self.record(format!("submit_action:{game_id}:{kind}:{}:{target}", action.character_id))?;

        self.arena(|a| {
            if a.active().map(|f| f.id.as_str()) != Some(action.character_id.as_str()) {
                return Err(RemoteError::Rejected {
                    status: 400,
                    message: "Not your turn".to_string(),
                });
            }
            let actor = a.turn;
            let mut result = ActionResult::ok(&kind, format!("{} acts", a.fighters[actor].name));
            match action.action_type {
                ActionKind::Move | ActionKind::Dash => {
                    if let Some(pos) = action.target_position {
                        a.fighters[actor].pos = pos;
                        result.movement_path = vec![pos];
                    }
                }
                ActionKind::Attack => {
                    let damage = a.fighters[actor].damage;
                    let Some(victim) = a
                        .fighters
                        .iter_mut()
                        .find(|f| Some(&f.id) == action.target_id.as_ref())
                    else {
                        return Err(RemoteError::Rejected {
                            status: 404,
                            message: "Target not found".to_string(),
                        });
                    };
                    victim.hp = (victim.hp - damage).max(0);
                    result.attack_roll = Some(15);
                    result.hit = true;
                    result.damage_dealt = Some(damage as i32);
                    result.target_hp_remaining = Some(victim.hp as i32);
                    a.settle();
                }
                ActionKind::EndTurn => a.advance(),
                ActionKind::Dodge | ActionKind::Disengage => {}
            }
            a.log.push(LogEntry {
                round_number: Some(a.round),
                description: result.description.clone(),
                action_type: Some(kind.clone()),
                hit: result.hit,
            });
            Ok(result)
        })
    }

    async fn get_log(&self, game_id: &str) -> RemoteResult<Vec<LogEntry>> {
        self.record(format!("get_log:{game_id}"))?;
        Ok(self.arena(|a| a.log.clone()))
    }
}

/// Hand-built roster entry for pure planner/turn tests.
pub fn character(id: &str, owner: &str, name: &str, x: i32, y: i32, hp: u32) -> CharacterRef {
    CharacterRef {
        character_id: id.to_string(),
        owner_id: owner.to_string(),
        display_name: name.to_string(),
        position: Position::new(x, y),
        hp,
        max_hp: 20,
        speed: 30,
        movement_remaining: None,
        action_available: true,
        attacks: vec![AttackRef {
            name: "Blade".to_string(),
            reach: 5,
        }],
    }
}

/// Active session with `roster[0]` to act and controlled.
pub fn active_session(roster: Vec<CharacterRef>) -> SessionState {
    let active = roster.first().map(|c| c.character_id.clone());
    let mut map = IndexMap::new();
    for c in roster {
        map.insert(c.owner_id.clone(), c);
    }
    let mut session = SessionState::new();
    session.replace(Snapshot {
        game_id: GAME_ID.to_string(),
        status: GameStatus::Active,
        round: 1,
        roster: map,
        active_character_id: active,
        winner_id: None,
        grid: Grid::default(),
    });
    session
}
