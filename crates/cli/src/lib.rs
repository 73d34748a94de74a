//! `lingoforge` operator CLI.
//!
//! Every command loads a JSON state snapshot, runs against the in-memory stores
//! and writes the snapshot back if it changed anything.

pub mod commands;
pub mod import;
pub mod settings;
pub mod state;

pub use commands::{Cli, Command, run};
pub use settings::Settings;
pub use state::{State, StateFile};
