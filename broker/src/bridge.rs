use std::sync::Arc;

use serde_json::Value;

use protocol::{race_first, Either, Transport};

/// Outcome of a bridge run (§4.3, §9's "exception-based control flow"
/// modeled as a sum type instead of an exception).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// An end-of-game sentinel was observed and forwarded; the match ended
    /// normally.
    Finished,
    /// The game-server side (transport *A*) closed or faulted.
    ServerDisconnected,
    /// The player side (transport *B*) closed or faulted.
    PlayerDisconnected,
}

/// Run the full-duplex bridge between `server` (transport *A*) and `player`
/// (transport *B*) until either side closes or an end-of-game sentinel is
/// observed. Returns the first-completed forwarder's outcome; the sibling
/// forwarder is dropped (and so cancelled) by [`race_first`] at that point.
pub async fn run(server: Arc<Transport>, player: Arc<Transport>) -> BridgeOutcome {
    let server_to_player = forward_server_to_player(server.clone(), player.clone());
    let player_to_server = forward_player_to_server(player, server);

    match race_first(server_to_player, player_to_server).await {
        Either::Left(outcome) | Either::Right(outcome) => outcome,
    }
}

/// A -> B. Forwards every frame received from the game server to the
/// player, in order. Stops and reports `Finished` once a frame whose
/// content carries `game_status == "finished"` has been forwarded.
async fn forward_server_to_player(server: Arc<Transport>, player: Arc<Transport>) -> BridgeOutcome {
    loop {
        let frame = match server.receive().await {
            Ok(frame) => frame,
            Err(_) => return BridgeOutcome::ServerDisconnected,
        };

        let is_end_of_game =
            frame.content.get("game_status") == Some(&Value::String("finished".to_string()));

        if player.send(frame).await.is_err() {
            return BridgeOutcome::PlayerDisconnected;
        }

        if is_end_of_game {
            return BridgeOutcome::Finished;
        }
    }
}

/// B -> A. Forwards every frame received from the player to the game
/// server, in order.
async fn forward_player_to_server(player: Arc<Transport>, server: Arc<Transport>) -> BridgeOutcome {
    loop {
        let frame = match player.receive().await {
            Ok(frame) => frame,
            Err(_) => return BridgeOutcome::PlayerDisconnected,
        };

        if server.send(frame).await.is_err() {
            return BridgeOutcome::ServerDisconnected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use protocol::Frame;
    use tokio::net::TcpListener;

    async fn connected_pair() -> (Transport, Transport) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            Transport::new(stream)
        });
        let client = Transport::connect(addr).await.unwrap();
        let server = server.await.unwrap();
        (client, server)
    }

    fn frame_with(status: &str) -> Frame {
        let mut content = Map::new();
        content.insert("type".into(), json!("show_game_status"));
        content.insert("game_status".into(), json!(status));
        Frame {
            header: Map::new(),
            content,
        }
    }

    #[tokio::test]
    async fn forwards_frames_and_stops_on_finished_sentinel() {
        let (server_near, server_far) = connected_pair().await;
        let (player_near, player_far) = connected_pair().await;

        let bridge = tokio::spawn(run(Arc::new(server_far), Arc::new(player_far)));

        server_near.send(frame_with("running")).await.unwrap();
        let relayed = player_near.receive().await.unwrap();
        assert_eq!(relayed.content["game_status"], json!("running"));

        server_near.send(frame_with("finished")).await.unwrap();
        let relayed = player_near.receive().await.unwrap();
        assert_eq!(relayed.content["game_status"], json!("finished"));

        let outcome = bridge.await.unwrap();
        assert_eq!(outcome, BridgeOutcome::Finished);
    }

    #[tokio::test]
    async fn server_disconnect_is_attributed_to_the_server_side() {
        let (server_near, server_far) = connected_pair().await;
        let (_player_near, player_far) = connected_pair().await;

        let bridge = tokio::spawn(run(Arc::new(server_far), Arc::new(player_far)));
        drop(server_near);

        let outcome = bridge.await.unwrap();
        assert_eq!(outcome, BridgeOutcome::ServerDisconnected);
    }

    #[tokio::test]
    async fn player_disconnect_is_attributed_to_the_player_side() {
        let (_server_near, server_far) = connected_pair().await;
        let (player_near, player_far) = connected_pair().await;

        let bridge = tokio::spawn(run(Arc::new(server_far), Arc::new(player_far)));
        drop(player_near);

        let outcome = bridge.await.unwrap();
        assert_eq!(outcome, BridgeOutcome::PlayerDisconnected);
    }
}
