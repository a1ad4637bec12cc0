//! Wire-level building blocks shared by the broker, the game server, and the
//! player client: the length-prefixed frame format (§4.1), its codec, the
//! `Transport` type that owns a socket, and the tagged message enums
//! exchanged between processes (§6).

pub mod codec;
pub mod error;
pub mod frame;
pub mod messages;
pub mod race;
pub mod transport;

pub use codec::FrameCodec;
pub use error::TransportError;
pub use frame::Frame;
pub use messages::{GameServerControl, GameStatus, GameType, PlayerRequest, ServerControlFrame};
pub use race::{race_first, Either};
pub use transport::Transport;
