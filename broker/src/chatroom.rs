use std::sync::Arc;

use protocol::{Frame, Transport};

use crate::bridge::{self, BridgeOutcome};
use crate::registry::SessionHandle;

/// Bind `player_transport` into `handle`'s game-server session for the
/// life of one match (§4.4). Opens a fresh transport to
/// `handle.listen_address`, hands the game server the start frame (this is
/// how it learns the player's username and game type), then bridges the
/// two transports until the match ends or either side disconnects.
///
/// The player-side transport is never closed here — its owning client
/// handler decides, per §4.4 step 4.
pub async fn add_player(
    handle: &SessionHandle,
    player_transport: Arc<Transport>,
    start_frame: Frame,
) -> BridgeOutcome {
    let server_transport = match Transport::connect(handle.listen_address).await {
        Ok(transport) => Arc::new(transport),
        Err(_) => return BridgeOutcome::ServerDisconnected,
    };

    if server_transport.send(start_frame).await.is_err() {
        server_transport.close();
        return BridgeOutcome::ServerDisconnected;
    }

    let outcome = bridge::run(server_transport.clone(), player_transport).await;
    server_transport.close();
    outcome
}
