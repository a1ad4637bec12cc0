//! The matchmaking/bridging broker (C3-C7): accepts game-server
//! registrations and player connections, tracks pools of session handles,
//! and bridges a matched pair of transports for the life of one match.

use std::net::SocketAddr;

use structopt::StructOpt;

pub mod bridge;
pub mod chatroom;
pub mod client_handler;
pub mod error;
pub mod gameserver_handler;
pub mod registry;

/// CLI parameters for the broker binary. The core needs no flags (§6.5),
/// but a runnable binary still needs bind addresses for its two listeners.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "broker",
    about = "Matchmaking and session-bridging broker for a turn-based two-mark board game."
)]
pub struct Params {
    /// Address players connect to.
    #[structopt(long, default_value = "0.0.0.0:7878")]
    pub player_addr: SocketAddr,
    /// Address game servers connect to for registration.
    #[structopt(long, default_value = "0.0.0.0:7879")]
    pub gameserver_addr: SocketAddr,
}
