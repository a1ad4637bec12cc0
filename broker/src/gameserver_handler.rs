use std::sync::Arc;

use protocol::GameServerControl;

use crate::registry::{Registry, SessionHandle};

/// One task per registered game-server (§4.6). Loops receive-frame /
/// apply-transition on `handle.control_channel` until the channel closes,
/// then unregisters the handle.
pub async fn run(registry: Arc<Registry>, handle: Arc<SessionHandle>) {
    loop {
        let frame = match handle.control_channel.receive().await {
            Ok(frame) => frame,
            Err(_) => break,
        };

        match frame.parse::<GameServerControl>() {
            Ok(GameServerControl::PutToFree) => registry.to_free_any(&handle).await,
            Ok(GameServerControl::PutToMultiFree) => registry.to_free_multi(&handle).await,
            Ok(GameServerControl::PutToWaiting { username }) => {
                registry.to_waiting(&username, &handle).await
            }
            Ok(GameServerControl::Handshake { .. }) => {
                tracing::warn!(room_id = %handle.room_id, "ignoring repeated handshake from a registered game-server");
            }
            Err(_) => {
                tracing::warn!(
                    room_id = %handle.room_id,
                    frame_type = frame.peek_type().unwrap_or("<missing type>"),
                    "ignoring unrecognized frame type from game-server",
                );
            }
        }
    }

    tracing::info!(room_id = %handle.room_id, "game-server control channel closed, unregistering");
    registry.unregister(&handle).await;
}
