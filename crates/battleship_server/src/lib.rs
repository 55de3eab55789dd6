//! Battleship match server: matchmaking queue, per-connection handler,
//! match driver and broadcaster. The wire protocol itself lives in
//! `battleship_common`; this crate is the game and session layer built
//! on top of it.

pub mod broadcast;
pub mod config;
pub mod credentials;
pub mod game;
pub mod handler;
pub mod queue;
pub mod server;
pub mod session;
pub mod tasks;

pub use config::{ConfigProvider, DefaultConfig};
pub use handler::AppState;
pub use server::run;
