//! Inbound SMTP engine: command parsing, per-session transaction state and
//! the reply loop that hands completed messages to a [`Forward`] hook.

#![warn(clippy::pedantic)]

pub mod command;
pub mod forward;
pub mod server;
pub mod transaction;

pub use forward::{Forward, ForwardError};
pub use server::Server;
