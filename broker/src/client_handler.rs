use std::sync::Arc;

use protocol::{race_first, Either, Frame, GameType, PlayerRequest, ServerControlFrame, Transport};

use crate::bridge::BridgeOutcome;
use crate::chatroom;
use crate::registry::Registry;

/// Why the pop-free-vs-abort race's abort side completed.
enum AbortReason {
    /// The player sent `change_game`: they gave up waiting in the queue.
    ChangedMind,
    /// The player's socket closed while queued.
    Disconnected,
}

/// One task per connected player (§4.7). Repeatedly waits for a
/// `start_game` frame, matches the player to a session, bridges them
/// through it, then loops to await the next `start_game` — until the
/// player's transport closes.
pub async fn run(registry: Arc<Registry>, player_transport: Arc<Transport>) {
    loop {
        let start_frame = match player_transport.receive().await {
            Ok(frame) => frame,
            Err(_) => return,
        };

        let request: PlayerRequest = match start_frame.parse() {
            Ok(request) => request,
            Err(_) => {
                tracing::warn!(
                    frame_type = start_frame.peek_type().unwrap_or("<missing type>"),
                    "expected a start_game frame, ignoring malformed frame",
                );
                continue;
            }
        };

        let (username, game_type) = match request {
            PlayerRequest::StartGame { username, game_type } => (username, game_type),
            other => {
                tracing::warn!(
                    username = other.username(),
                    "expected a start_game frame from a player awaiting a match",
                );
                continue;
            }
        };

        let handle = match registry.pop_waiting(&username).await {
            Some(handle) => handle,
            None => {
                let single = matches!(game_type, GameType::Single);
                let pop_fut = registry.pop_free(single);
                let abort_fut = wait_for_abort(&player_transport);

                match race_first(pop_fut, abort_fut).await {
                    Either::Left(handle) => handle,
                    Either::Right(AbortReason::ChangedMind) => continue,
                    Either::Right(AbortReason::Disconnected) => return,
                }
            }
        };

        let outcome = chatroom::add_player(&handle, player_transport.clone(), start_frame).await;

        match outcome {
            BridgeOutcome::ServerDisconnected => {
                let crashed = Frame::from_payload(&ServerControlFrame::ServerCrashed)
                    .expect("ServerControlFrame always serializes to an object");
                let _ = player_transport.send(crashed).await;
            }
            BridgeOutcome::PlayerDisconnected => {
                registry.to_waiting(&username, &handle).await;
                return;
            }
            BridgeOutcome::Finished => {
                registry.to_free_any(&handle).await;
            }
        }
    }
}

/// Waits for a `change_game` frame from a queued player (the "abort" side
/// of the pop-free race, §4.7 step 2), or for their transport to close.
async fn wait_for_abort(transport: &Transport) -> AbortReason {
    loop {
        match transport.receive().await {
            Ok(frame) => {
                if let Ok(PlayerRequest::ChangeGame { .. }) = frame.parse() {
                    return AbortReason::ChangedMind;
                }
                tracing::warn!(
                    frame_type = frame.peek_type().unwrap_or("<missing type>"),
                    "ignoring frame from a player still queued for a match",
                );
            }
            Err(_) => return AbortReason::Disconnected,
        }
    }
}
