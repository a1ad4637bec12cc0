//! Hosts one active game session at a time and exposes it to players over
//! its own listener, reporting pool transitions to the broker over a single
//! control channel (§4.8).

pub mod error;
pub mod game;
pub mod orchestrator;

pub use error::GameServerError;
pub use game::GameSession;
pub use orchestrator::GameServer;

use std::net::SocketAddr;

use structopt::StructOpt;

/// CLI parameters (§1's ambient stack): the address this game-server
/// listens on for players, and the broker's control-channel address it
/// registers with on startup.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "game-server",
    about = "Hosts one game session at a time and registers it with a broker."
)]
pub struct Params {
    /// Address this game-server listens on for players, and advertises to
    /// the broker at handshake time.
    #[structopt(long)]
    pub listen_addr: SocketAddr,
    /// The broker's game-server registration address.
    #[structopt(long, default_value = "127.0.0.1:7879")]
    pub broker_addr: SocketAddr,
}
