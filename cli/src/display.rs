//! Terminal rendering. Every `render_*` returns the text so it can be tested;
//! the `print_*` helpers write it to stdout. Colour is dropped automatically
//! when stdout is not a terminal.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use console::style;

use tendrils_engine::remote::{ActionResult, GameSummary, LogEntry, ServerInfo};
use tendrils_engine::session::CharacterRef;
use tendrils_engine::{AutoplayEvent, Report, SessionState};

const BAR_WIDTH: usize = 25;
const MAP_PADDING: i32 = 3;

pub fn print_error(msg: &str) {
    println!("{} {msg}", style("Error:").red().bold());
}

pub fn print_info(msg: &str) {
    println!("{msg}");
}

pub fn render_banner(info: &ServerInfo) -> String {
    let version = info.version.as_deref().unwrap_or("?");
    let status = info.status.as_deref().unwrap_or("unknown");
    format!(
        "==========================================\n  {}\n  v{} ({})\n==========================================",
        info.name.to_uppercase(),
        version,
        status
    )
}

pub fn render_help() -> String {
    const ROWS: &[(&str, &str)] = &[
        ("# Game Setup", ""),
        ("new / create", "Create a new game"),
        ("join <preset>", "Join as fighter, rogue, barbarian, or monk"),
        ("join custom", "Interactive character builder"),
        ("start", "Start combat"),
        ("games", "Show current game info"),
        ("# Combat", ""),
        ("move X Y", "Move to grid position"),
        ("attack", "Attack the only enemy in reach"),
        ("attack TARGET [WEAPON]", "Attack a specific target"),
        ("dodge", "Take the Dodge action"),
        ("dash X Y", "Dash to position"),
        ("disengage", "Take the Disengage action"),
        ("end / done", "End turn"),
        ("# Info", ""),
        ("status / s", "Show game state and HP"),
        ("map / m", "Show ASCII map"),
        ("log", "Show battle log"),
        ("help / h / ?", "This help"),
        ("quit / exit / q", "Exit client"),
        ("# Utility", ""),
        ("switch OWNER_ID", "Switch controlled character"),
        ("auto", "Auto-play controlled character"),
        ("demo", "Full automated demo game"),
    ];
    let mut out = String::from("Commands\n");
    for (cmd, action) in ROWS {
        match cmd.strip_prefix("# ") {
            Some(section) => {
                let _ = writeln!(out, "\n{section}");
            }
            None => {
                let _ = writeln!(out, "  {cmd:<24}{action}");
            }
        }
    }
    out
}

pub fn render_hp_line(c: &CharacterRef) -> String {
    let filled = if c.max_hp > 0 {
        (c.hp as usize * BAR_WIDTH) / c.max_hp as usize
    } else {
        0
    };
    format!(
        "  {:<22} {}{}  {}/{} HP  ({}, {})",
        c.display_name,
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        c.hp,
        c.max_hp,
        c.position.x,
        c.position.y
    )
}

pub fn render_status(session: &SessionState) -> String {
    let mut out = String::new();
    match session.active_character() {
        Some(active) if session.is_controlled_turn() => {
            let _ = writeln!(out, "Round {} — {}'s turn", session.round, active.display_name);
        }
        Some(active) => {
            let _ = writeln!(
                out,
                "Round {} — {}'s turn (waiting)",
                session.round, active.display_name
            );
        }
        None => {
            let _ = writeln!(out, "Game status: {:?}", session.status);
        }
    }
    for c in session.roster.values() {
        let _ = writeln!(out, "{}", render_hp_line(c));
    }
    out
}

/// ASCII grid zoomed to the occupied area, with a legend.
pub fn render_map(session: &SessionState) -> String {
    if session.roster.is_empty() {
        return "No characters to display.".to_string();
    }

    let mut labels: BTreeMap<(i32, i32), char> = BTreeMap::new();
    let mut used: HashSet<char> = HashSet::new();
    let mut legend = Vec::new();
    for c in session.roster.values() {
        let upper = c.display_name.to_uppercase();
        let label = upper
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .find(|ch| !used.contains(ch))
            .unwrap_or('?');
        used.insert(label);
        labels.insert((c.position.x, c.position.y), label);
        legend.push(format!("  {label} = {} ({}/{} HP)", c.display_name, c.hp, c.max_hp));
    }

    let xs = session.roster.values().map(|c| c.position.x);
    let ys = session.roster.values().map(|c| c.position.y);
    let (min_x, max_x) = (xs.clone().min().unwrap_or(0), xs.max().unwrap_or(0));
    let (min_y, max_y) = (ys.clone().min().unwrap_or(0), ys.max().unwrap_or(0));
    let grid = session.grid;
    let min_x = (min_x - MAP_PADDING).max(0);
    let max_x = (max_x + MAP_PADDING).min(grid.width - 1);
    let min_y = (min_y - MAP_PADDING).max(0);
    let max_y = (max_y + MAP_PADDING).min(grid.height - 1);

    let mut out = String::from("    ");
    for x in min_x..=max_x {
        let _ = write!(out, "{x:>4}");
    }
    out.push('\n');
    for y in min_y..=max_y {
        let _ = write!(out, "{y:>3} ");
        for x in min_x..=max_x {
            let cell = labels.get(&(x, y)).copied().unwrap_or('.');
            let _ = write!(out, "   {cell}");
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&legend.join("\n"));
    out
}

pub fn render_log(events: &[LogEntry]) -> String {
    if events.is_empty() {
        return "No events yet.".to_string();
    }
    events
        .iter()
        .map(|e| {
            let round = e
                .round_number
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".to_string());
            format!("  R{round} {}", e.description.as_deref().unwrap_or(""))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_action(result: &ActionResult) -> String {
    let desc = result.description.as_deref().unwrap_or_default();
    if !result.success {
        let reason = result.error.as_deref().unwrap_or(desc);
        return format!("  {} {reason}", style("Failed:").red());
    }
    match result.action_type.as_deref() {
        Some("attack") => {
            let mut out = format!("  {desc}");
            if result.attack_roll.is_some() {
                if result.hit {
                    let _ = write!(
                        out,
                        "\n  {} {} damage dealt",
                        style("HIT!").green().bold(),
                        result.damage_dealt.unwrap_or(0)
                    );
                    match result.target_hp_remaining {
                        Some(hp) if hp <= 0 => {
                            let _ = write!(out, " — {}", style("TARGET SLAIN!").red().bold());
                        }
                        Some(hp) => {
                            let _ = write!(out, " — Target: {hp} HP remaining");
                        }
                        None => {}
                    }
                } else {
                    let _ = write!(out, "\n  {}", style("MISS!").yellow());
                }
            }
            out
        }
        Some("move") | Some("dash") => match result.movement_path.last() {
            Some([x, y]) => format!("  {} ({x}, {y})", style("Moved to").cyan()),
            None => format!("  {desc}"),
        },
        _ => format!("  {desc}"),
    }
}

pub fn render_summary(summary: &GameSummary) -> String {
    let mut out = format!(
        "Game Status: {}",
        summary.status.as_deref().unwrap_or("?")
    );
    if let Some(winner) = &summary.winner_id {
        let _ = write!(out, "\n  Winner: {winner}");
    }
    if !summary.characters.is_empty() {
        let _ = write!(out, "\n  Characters: {}", summary.characters.len());
        for c in &summary.characters {
            let _ = write!(
                out,
                "\n    - {} (ID: {})",
                c.name.as_deref().unwrap_or("?"),
                c.character_id.as_deref().unwrap_or("?")
            );
        }
    }
    out
}

pub fn render_owners(session: &SessionState) -> String {
    let mut out = String::from("Usage: switch OWNER_ID\n  Available owners:");
    for (owner, c) in &session.roster {
        let marker = if session.controlled_owner_id.as_deref() == Some(owner.as_str()) {
            " <-- controlled"
        } else {
            ""
        };
        let _ = write!(out, "\n    {owner}: {}{marker}", c.display_name);
    }
    out
}

pub fn render_winner(session: &SessionState) -> String {
    let (name, hp, max_hp) = match session.winner() {
        Some(c) => (c.display_name.as_str(), c.hp, c.max_hp),
        None => ("Unknown", 0, 0),
    };
    format!(
        "******************************************\n  WINNER: {name}\n  Survived with {hp}/{max_hp} HP\n  {} rounds of combat\n******************************************",
        session.round
    )
}

pub fn render_round_header(round: u32) -> String {
    format!("\n══════ Round {round} ══════\n")
}

pub fn render_event(event: &AutoplayEvent) -> String {
    match event {
        AutoplayEvent::RoundStarted(round) => render_round_header(*round),
        AutoplayEvent::Acted {
            actor,
            command,
            report,
        } => match report {
            Report::Action { result, .. } => {
                format!("{actor} > {command}\n{}", render_action(result))
            }
            _ => format!("{actor} > {command}"),
        },
        AutoplayEvent::Waiting { active } => format!(
            "  Waiting for {}...",
            active.as_deref().unwrap_or("the next turn")
        ),
    }
}

/// Render the result of an applied command against the (already refreshed) session.
pub fn render_report(session: &SessionState, report: &Report) -> String {
    match report {
        Report::Created { game_id, message } => message
            .clone()
            .unwrap_or_else(|| format!("Game created: {game_id}")),
        Report::Joined {
            character_id,
            name,
            message,
        } => message
            .clone()
            .unwrap_or_else(|| format!("{name} joined! Character ID: {character_id}")),
        Report::Started {
            message,
            initiative,
        } => {
            let mut out = message
                .clone()
                .unwrap_or_else(|| "Combat started!".to_string());
            if !initiative.is_empty() {
                let _ = write!(out, "\n  Initiative: {}", initiative.join(", "));
            }
            let _ = write!(out, "\n\n{}\n{}", render_status(session), render_map(session));
            out
        }
        Report::Status => render_status(session),
        Report::Map => render_map(session),
        Report::Summary(summary) => render_summary(summary),
        Report::Log(events) => render_log(events),
        Report::Action { result, .. } => render_action(result),
        Report::Switched { name, .. } => format!("Switched to {name}"),
        Report::Owners => render_owners(session),
    }
}
