// ABOUTME: Library root for bluegreen - blue/green deployment switching for compose stacks.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod inspect;
pub mod output;
pub mod runtime;
pub mod stack;
pub mod types;
pub mod watch;
