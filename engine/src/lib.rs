//! Session and command engine for the Tendrils terminal client.
//!
//! The server owns every game rule. This crate keeps a disposable local mirror
//! of one game ([`SessionState`]), turns text into [`Command`]s, decides what is
//! legal to type right now ([`turn`]), routes commands to a [`GameApi`]
//! implementation, and plans moves for unattended play ([`autoplay`]).

pub mod autoplay;
pub mod command;
pub mod presets;
pub mod remote;
pub mod router;
pub mod session;
pub mod sheet;
pub mod turn;

pub use autoplay::{AutoplayConfig, AutoplayEvent, AutoplayOutcome, next_action};
pub use command::{Command, ParseFailure, Verb, parse};
pub use remote::{GameApi, RemoteError};
pub use router::{Outcome, Report, Router};
pub use session::{CharacterRef, GameStatus, Position, SessionState, Snapshot};
pub use sheet::CharacterSheet;
pub use turn::{PermissionDenied, is_permitted, prompt};
