use std::fmt;

use crate::session::Position;

/// Canonical command verbs. Aliases collapse onto these during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    New,
    Join,
    Start,
    Games,
    Status,
    Map,
    Log,
    Help,
    Quit,
    Switch,
    Auto,
    Demo,
    Move,
    Attack,
    Dodge,
    Dash,
    Disengage,
    End,
}

/// Coarse grouping used by turn-context permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbClass {
    Setup,
    Combat,
    Info,
}

impl Verb {
    pub fn class(self) -> VerbClass {
        use Verb::*;
        match self {
            New | Join | Start => VerbClass::Setup,
            Move | Attack | Dodge | Dash | Disengage | End => VerbClass::Combat,
            Games | Status | Map | Log | Help | Quit | Switch | Auto | Demo => VerbClass::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        use Verb::*;
        match self {
            New => "new",
            Join => "join",
            Start => "start",
            Games => "games",
            Status => "status",
            Map => "map",
            Log => "log",
            Help => "help",
            Quit => "quit",
            Switch => "switch",
            Auto => "auto",
            Demo => "demo",
            Move => "move",
            Attack => "attack",
            Dodge => "dodge",
            Dash => "dash",
            Disengage => "disengage",
            End => "end",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many arguments a verb takes, and in what shape.
#[derive(Debug, Clone, Copy)]
enum Shape {
    Bare,
    /// Between `min` and `max` free-form tokens.
    Words { min: usize, max: usize },
    Coordinates,
}

struct Rule {
    alias: &'static str,
    /// Optional second word folded into the verb (`new game`, `end turn`).
    filler: Option<&'static str>,
    verb: Verb,
}

const GRAMMAR: &[Rule] = &[
    Rule { alias: "new", filler: Some("game"), verb: Verb::New },
    Rule { alias: "create", filler: Some("game"), verb: Verb::New },
    Rule { alias: "join", filler: None, verb: Verb::Join },
    Rule { alias: "start", filler: None, verb: Verb::Start },
    Rule { alias: "games", filler: None, verb: Verb::Games },
    Rule { alias: "game", filler: None, verb: Verb::Games },
    Rule { alias: "status", filler: None, verb: Verb::Status },
    Rule { alias: "s", filler: None, verb: Verb::Status },
    Rule { alias: "map", filler: None, verb: Verb::Map },
    Rule { alias: "m", filler: None, verb: Verb::Map },
    Rule { alias: "log", filler: None, verb: Verb::Log },
    Rule { alias: "help", filler: None, verb: Verb::Help },
    Rule { alias: "h", filler: None, verb: Verb::Help },
    Rule { alias: "?", filler: None, verb: Verb::Help },
    Rule { alias: "quit", filler: None, verb: Verb::Quit },
    Rule { alias: "exit", filler: None, verb: Verb::Quit },
    Rule { alias: "q", filler: None, verb: Verb::Quit },
    Rule { alias: "switch", filler: None, verb: Verb::Switch },
    Rule { alias: "auto", filler: None, verb: Verb::Auto },
    Rule { alias: "demo", filler: None, verb: Verb::Demo },
    Rule { alias: "move", filler: None, verb: Verb::Move },
    Rule { alias: "attack", filler: None, verb: Verb::Attack },
    Rule { alias: "dodge", filler: None, verb: Verb::Dodge },
    Rule { alias: "dash", filler: None, verb: Verb::Dash },
    Rule { alias: "disengage", filler: None, verb: Verb::Disengage },
    Rule { alias: "end", filler: Some("turn"), verb: Verb::End },
    Rule { alias: "done", filler: None, verb: Verb::End },
];

fn shape(verb: Verb) -> (Shape, &'static str) {
    use Verb::*;
    match verb {
        New => (Shape::Words { min: 0, max: usize::MAX }, "new [NAME]"),
        Join => (Shape::Words { min: 1, max: 1 }, "join <fighter|rogue|barbarian|monk|custom>"),
        Switch => (Shape::Words { min: 0, max: 1 }, "switch [OWNER_ID]"),
        Attack => (Shape::Words { min: 0, max: 2 }, "attack [TARGET [WEAPON]]"),
        Move => (Shape::Coordinates, "move X Y"),
        Dash => (Shape::Coordinates, "dash X Y"),
        Start | Games | Status | Map | Log | Help | Quit | Auto | Demo | Dodge | Disengage
        | End => (Shape::Bare, ""),
    }
}

/// A parsed, validated line of input. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: Verb,
    args: Vec<String>,
    raw: String,
}

impl Command {
    /// Build a command directly, bypassing text parsing. `raw` is synthesized.
    pub fn new(verb: Verb, args: Vec<String>) -> Self {
        let raw = std::iter::once(verb.as_str().to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        Self { verb, args, raw }
    }

    pub fn bare(verb: Verb) -> Self {
        Self::new(verb, Vec::new())
    }

    pub fn to_square(verb: Verb, pos: Position) -> Self {
        Self::new(verb, vec![pos.x.to_string(), pos.y.to_string()])
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(String::as_str)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Target square of `move`/`dash`. Always present for those verbs when parsed from text.
    pub fn coordinates(&self) -> Option<Position> {
        match self.args.as_slice() {
            [x, y] => Some(Position::new(x.parse().ok()?, y.parse().ok()?)),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("empty input")]
    Empty,
    #[error("Unknown command: '{verb}'. Type 'help' for commands.")]
    UnknownCommand { verb: String },
    #[error("Usage: {usage}")]
    Usage { usage: &'static str },
    #[error("Coordinates must be integers (got '{token}'). Usage: {usage}")]
    NotAnInteger { token: String, usage: &'static str },
}

impl ParseFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            ParseFailure::Empty => "empty",
            ParseFailure::UnknownCommand { .. } => "unknown_command",
            ParseFailure::Usage { .. } => "usage",
            ParseFailure::NotAnInteger { .. } => "not_an_integer",
        }
    }
}

/// Turn one line of user input into a [`Command`]. Never panics.
pub fn parse(raw_text: &str) -> Result<Command, ParseFailure> {
    let mut tokens = raw_text.split_whitespace();
    let Some(first) = tokens.next() else {
        return Err(ParseFailure::Empty);
    };
    let head = first.to_lowercase();
    let mut rest: Vec<&str> = tokens.collect();

    let Some(rule) = GRAMMAR.iter().find(|r| r.alias == head) else {
        return Err(ParseFailure::UnknownCommand { verb: head });
    };

    if let (Some(filler), Some(next)) = (rule.filler, rest.first()) {
        if next.eq_ignore_ascii_case(filler) {
            rest.remove(0);
        }
    }

    let verb = rule.verb;
    let (shape, usage) = shape(verb);
    let args = match shape {
        Shape::Bare => Vec::new(),
        Shape::Words { min, max } => {
            if rest.len() < min || rest.len() > max {
                return Err(ParseFailure::Usage { usage });
            }
            rest.iter().map(|t| t.to_string()).collect()
        }
        Shape::Coordinates => {
            let [x, y] = rest.as_slice() else {
                return Err(ParseFailure::Usage { usage });
            };
            vec![parse_coord(x, usage)?, parse_coord(y, usage)?]
        }
    };

    Ok(Command {
        verb,
        args,
        raw: raw_text.trim().to_string(),
    })
}

fn parse_coord(token: &str, usage: &'static str) -> Result<String, ParseFailure> {
    token
        .parse::<i32>()
        .map(|n| n.to_string())
        .map_err(|_| ParseFailure::NotAnInteger {
            token: token.to_string(),
            usage,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_word_is_only_consumed_for_its_own_alias() {
        assert_eq!(parse("end turn").unwrap().args(), &[] as &[String]);
        assert_eq!(parse("done").unwrap().verb(), Verb::End);
        assert!(matches!(parse("done turn"), Ok(c) if c.verb() == Verb::End));
    }

    #[test]
    fn coordinates_are_normalized() {
        let cmd = parse("dash +07 -0").unwrap();
        assert_eq!(cmd.args(), &["7".to_string(), "0".to_string()]);
        assert_eq!(cmd.coordinates(), Some(Position::new(7, 0)));
    }
}
