//! Interactive player client (C9): a typed stub for outgoing requests plus
//! a controller that drives one game to completion, reading both terminal
//! commands and server frames (§4.9).

use std::net::SocketAddr;

use structopt::StructOpt;

pub mod controller;
pub mod error;
pub mod stub;

pub use controller::{Controller, Outcome};
pub use error::ClientError;
pub use stub::GameStub;

/// CLI parameters: the broker's player-facing address (§6.5 names no
/// client-side flags for the core; a runnable binary still needs one).
#[derive(Debug, StructOpt)]
#[structopt(name = "client", about = "Interactive client for the matchmaking service.")]
pub struct Params {
    #[structopt(long, default_value = "127.0.0.1:7878")]
    pub broker_addr: SocketAddr,
}
