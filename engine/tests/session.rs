mod common;

use common::{active_session, character};
use tendrils_engine::remote::{StateView, parse_status};
use tendrils_engine::session::{GameStatus, Grid, Position};
use tendrils_engine::{SessionState, Snapshot};

fn state(json: &str) -> StateView {
    serde_json::from_str(json).expect("valid state payload")
}

#[test]
fn state_payload_becomes_a_snapshot() {
    let view = state(
        r#"{
            "status": "active",
            "round_number": 2,
            "is_your_turn": true,
            "your_character": {
                "id": "c1", "owner_id": "gronk", "name": "Gronk",
                "position": [3, 4], "current_hp": 30, "max_hp": 44, "speed": 30,
                "attacks": [{"name": "Greatsword", "reach": 5}]
            },
            "visible_characters": [
                {"id": "c1", "owner_id": "gronk", "name": "Gronk", "position": [3, 4], "current_hp": 30, "max_hp": 44},
                {"character_id": "c2", "owner_id": "shadow", "name": "Shadow", "position": [9, 9], "hp": 27, "max_hp": 27}
            ],
            "grid_width": 12,
            "grid_height": 10
        }"#,
    );
    let snap = view.into_snapshot("g7");

    assert_eq!(snap.game_id, "g7");
    assert_eq!(snap.status, GameStatus::Active);
    assert_eq!(snap.round, 2);
    assert_eq!(snap.grid, Grid { width: 12, height: 10 });
    assert_eq!(snap.roster.keys().collect::<Vec<_>>(), vec!["gronk", "shadow"]);
    // `is_your_turn` without an explicit id points at the viewer.
    assert_eq!(snap.active_character_id.as_deref(), Some("c1"));

    let gronk = &snap.roster["gronk"];
    assert_eq!(gronk.position, Position::new(3, 4));
    assert_eq!((gronk.hp, gronk.max_hp), (30, 44));
    assert_eq!(gronk.reach_squares(), 1);
    assert_eq!(snap.roster["shadow"].hp, 27);
}

#[test]
fn out_of_range_hp_is_clamped() {
    let view = state(
        r#"{"status": "active", "visible_characters": [
            {"id": "a", "owner_id": "a", "name": "Over", "current_hp": 50, "max_hp": 20},
            {"id": "b", "owner_id": "b", "name": "Under", "current_hp": -6, "max_hp": 20}
        ]}"#,
    );
    let snap = view.into_snapshot("g");
    assert_eq!(snap.roster["a"].hp, 20);
    assert_eq!(snap.roster["b"].hp, 0);
    assert!(!snap.roster["b"].is_alive());
}

#[test]
fn active_id_is_dropped_when_unknown_or_not_in_combat() {
    let unknown = state(
        r#"{"status": "active", "current_turn_character_id": "ghost",
            "visible_characters": [{"id": "a", "name": "A", "current_hp": 5}]}"#,
    );
    assert_eq!(unknown.into_snapshot("g").active_character_id, None);

    let lobby = state(
        r#"{"status": "waiting", "active_character_id": "a",
            "visible_characters": [{"id": "a", "name": "A", "current_hp": 5}]}"#,
    );
    let snap = lobby.into_snapshot("g");
    assert_eq!(snap.status, GameStatus::Waiting);
    assert_eq!(snap.active_character_id, None);
}

#[test]
fn finished_games_report_waiting_with_a_winner() {
    assert_eq!(parse_status(Some("waiting"), Some("c1")), GameStatus::Completed);
    assert_eq!(parse_status(Some("WAITING"), None), GameStatus::Waiting);
    assert_eq!(parse_status(Some("active"), None), GameStatus::Active);
    assert_eq!(parse_status(Some("completed"), None), GameStatus::Completed);
    assert_eq!(parse_status(Some("paused"), None), GameStatus::Unset);
    assert_eq!(parse_status(None, None), GameStatus::Unset);
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let snap = state(r#"{"visible_characters": [{"id": "x"}]}"#).into_snapshot("g");
    assert_eq!(snap.status, GameStatus::Waiting);
    assert_eq!(snap.grid, Grid::default());
    let x = &snap.roster["x"];
    assert_eq!(x.owner_id, "x");
    assert_eq!(x.display_name, "?");
    assert_eq!(x.speed, 30);
    assert!(x.action_available);
    assert_eq!(x.reach_squares(), 1);
}

#[test]
fn replace_keeps_the_controlled_owner_while_it_is_seated() {
    let mut session = active_session(vec![
        character("c1", "gronk", "Gronk", 0, 0, 20),
        character("c2", "shadow", "Shadow", 5, 5, 20),
    ]);
    session.controlled_owner_id = Some("shadow".to_string());

    let mut next = Snapshot {
        game_id: "g1".to_string(),
        status: GameStatus::Active,
        round: 2,
        roster: session.roster.clone(),
        active_character_id: Some("c2".to_string()),
        winner_id: None,
        grid: Grid::default(),
    };
    session.replace(next.clone());
    assert_eq!(session.controlled_owner_id.as_deref(), Some("shadow"));
    assert!(session.is_controlled_turn());
    assert_eq!(session.round, 2);

    next.roster.shift_remove("shadow");
    next.active_character_id = Some("c1".to_string());
    session.replace(next);
    assert_eq!(session.controlled_owner_id.as_deref(), Some("gronk"));
    assert_eq!(session.roster.len(), 1);
}

#[test]
fn replace_is_wholesale() {
    let mut session = active_session(vec![
        character("c1", "gronk", "Gronk", 0, 0, 20),
        character("c2", "shadow", "Shadow", 5, 5, 20),
    ]);
    session.replace(Snapshot::lobby("g2"));
    assert_eq!(session.game_id.as_deref(), Some("g2"));
    assert_eq!(session.status, GameStatus::Waiting);
    assert!(session.roster.is_empty());
    assert_eq!(session.active_character_id, None);
    assert_eq!(session.controlled_owner_id, None);
}

#[test]
fn winner_falls_back_to_the_last_one_standing() {
    let mut session = active_session(vec![
        character("c1", "gronk", "Gronk", 0, 0, 20),
        character("c2", "shadow", "Shadow", 5, 5, 0),
    ]);
    assert!(session.winner().is_none());
    session.status = GameStatus::Completed;
    assert_eq!(session.winner().map(|c| c.display_name.as_str()), Some("Gronk"));
    session.winner_id = Some("c2".to_string());
    assert_eq!(session.winner().map(|c| c.display_name.as_str()), Some("Shadow"));
}

#[test]
fn neighbors_are_row_major() {
    let around: Vec<Position> = Position::new(0, 0).neighbors().collect();
    assert_eq!(around.len(), 8);
    assert_eq!(around[0], Position::new(-1, -1));
    assert_eq!(around[7], Position::new(1, 1));
    assert_eq!(Position::new(2, 9).chebyshev(Position::new(5, 4)), 5);
}

#[test]
fn session_round_trips_through_json() {
    let session = active_session(vec![character("c1", "gronk", "Gronk", 0, 0, 20)]);
    let json = serde_json::to_string(&session).unwrap();
    let back: SessionState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, session);
}
