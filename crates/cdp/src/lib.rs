//! Chrome DevTools Protocol bridge to LinkedHelper.
//!
//! The app is an Electron program started with
//! `--remote-debugging-port`. This crate talks to that port: [`api`]
//! wraps the HTTP discovery endpoints, [`client`] holds one WebSocket
//! session and evaluates expressions over it, and [`command`] is the
//! only place expression text is written. [`launcher`] and [`instance`]
//! are the two kinds of endpoint the services drive; [`discovery`]
//! finds instance ports on the local machine.

pub mod api;
pub mod bridge;
pub mod client;
pub mod command;
pub mod discovery;
pub mod error;
pub mod instance;
pub mod launcher;
pub mod messages;

pub use bridge::Bridge;
pub use command::Command;
pub use error::CdpError;
