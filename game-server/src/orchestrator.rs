use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};

use protocol::{
    race_first, Either, Frame, GameServerControl, GameStatus, GameType, PlayerRequest,
    ServerControlFrame, Transport,
};

use crate::game::{Effect, GameSession};

/// Reconnect window from `PeerClosed` (§5 "Timeouts").
const RECONNECT_WINDOW: Duration = Duration::from_secs(10);

/// How often the multiplayer queue polls for a second player (§5 "1 s
/// polling waits ... wait for second player").
const SECOND_PLAYER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One process, at most one single-player game *and* at most one
/// multiplayer game active at a time — two independent slots, not one
/// shared slot, mirroring `original_source/server/game_server.py`'s
/// `single_player_game`/`multi_player_game` fields, each gated only on
/// itself by `get_single_player_game`/`get_multiplayer_game`. Only the
/// finish path resets both together; while active they are tracked and
/// created independently.
pub struct GameServer {
    broker_control: Arc<Transport>,
    single_active: Mutex<Option<Arc<Mutex<GameSession>>>>,
    multi_active: Mutex<Option<Arc<Mutex<GameSession>>>>,
    reconnect_tasks: Mutex<HashMap<String, Arc<Notify>>>,
}

/// Why a queued multiplayer player's wait for a second player ended in
/// abandonment rather than a match (§4.8 step 3's race).
enum QueueAbortReason {
    ChangedMind,
    Disconnected,
}

impl GameServer {
    pub fn new(broker_control: Arc<Transport>) -> Arc<Self> {
        Arc::new(GameServer {
            broker_control,
            single_active: Mutex::new(None),
            multi_active: Mutex::new(None),
            reconnect_tasks: Mutex::new(HashMap::new()),
        })
    }

    /// The slot a session of `kind` lives in.
    fn slot(&self, kind: GameType) -> &Mutex<Option<Arc<Mutex<GameSession>>>> {
        match kind {
            GameType::Single => &self.single_active,
            GameType::Multi => &self.multi_active,
        }
    }

    /// Accept connections forever, spawning one task per player (§4.8).
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept a player connection");
                    continue;
                }
            };
            tracing::info!(%addr, "accepted a player connection");
            let server = self.clone();
            tokio::spawn(async move {
                let transport = Arc::new(Transport::new(stream));
                server.handle_connection(transport).await;
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, transport: Arc<Transport>) {
        let start_frame = match transport.receive().await {
            Ok(frame) => frame,
            Err(_) => return,
        };

        let request: PlayerRequest = match start_frame.parse() {
            Ok(request) => request,
            Err(_) => {
                tracing::warn!(
                    frame_type = start_frame.peek_type().unwrap_or("<missing type>"),
                    "expected a start_game frame, closing connection",
                );
                return;
            }
        };

        let (username, game_type) = match request {
            PlayerRequest::StartGame { username, game_type } => (username, game_type),
            other => {
                tracing::warn!(username = other.username(), "expected start_game as the first frame");
                return;
            }
        };

        // A user coming back within the reconnect window (§4.8 step 2).
        if let Some(notify) = self.reconnect_tasks.lock().await.remove(&username) {
            notify.notify_one();
        }

        let session = match game_type {
            GameType::Single => Some(self.acquire_single_player_session(&username).await),
            GameType::Multi => self.acquire_multi_player_session(&transport, &username).await,
        };

        let session = match session {
            Some(session) => session,
            None => return,
        };

        {
            let mut guard = session.lock().await;
            guard.add_peer(username.clone(), transport.clone());
        }

        self.run_gameplay_loop(game_type, session, username, transport).await;
    }

    async fn acquire_single_player_session(&self, username: &str) -> Arc<Mutex<GameSession>> {
        let mut active = self.single_active.lock().await;
        if active.is_none() {
            *active = Some(Arc::new(Mutex::new(GameSession::single_player(username))));
        }
        active.as_ref().unwrap().clone()
    }

    /// §4.8 step 3's multiplayer branch: create-and-queue on first arrival,
    /// bind-as-second-player on a later arrival, or race the wait for a
    /// second player against the player abandoning the queue. The
    /// read-or-create decision and the write that follows it share one
    /// `multi_active` lock acquisition so two simultaneous first arrivals
    /// can't each create a session and have the second clobber the first's
    /// registration.
    async fn acquire_multi_player_session(
        &self,
        transport: &Arc<Transport>,
        username: &str,
    ) -> Option<Arc<Mutex<GameSession>>> {
        let mut multi_active = self.multi_active.lock().await;

        if let Some(session) = multi_active.as_ref().cloned() {
            drop(multi_active);
            let awaiting = session.lock().await.is_awaiting_second_player();
            if awaiting {
                session.lock().await.join_second_player(username);
            }
            return Some(session);
        }

        let session = Arc::new(Mutex::new(GameSession::multi_player_pending(username)));
        *multi_active = Some(session.clone());
        drop(multi_active);

        let _ = self
            .broker_control
            .send(
                Frame::from_payload(&GameServerControl::PutToMultiFree)
                    .expect("GameServerControl always serializes to an object"),
            )
            .await;
        let _ = transport
            .send(
                Frame::from_payload(&ServerControlFrame::ServerAssigned { game_type: Some(GameType::Multi) })
                    .expect("ServerControlFrame always serializes to an object"),
            )
            .await;

        let waiter = wait_for_second_player(session.clone());
        let abort = wait_for_queue_abort(transport.clone());

        match race_first(waiter, abort).await {
            Either::Left(()) => Some(session),
            Either::Right(reason) => {
                if matches!(reason, QueueAbortReason::ChangedMind) {
                    let _ = transport
                        .send(
                            Frame::from_payload(&ServerControlFrame::GameChanged { game_status: GameStatus::Finished })
                                .expect("ServerControlFrame always serializes to an object"),
                        )
                        .await;
                }
                self.release_pending_session(&session).await;
                None
            }
        }
    }

    /// Clears `multi_active` if it's still this abandoned pending session,
    /// and tells the broker the slot is free again.
    async fn release_pending_session(&self, session: &Arc<Mutex<GameSession>>) {
        let mut active = self.multi_active.lock().await;
        if matches!(active.as_ref(), Some(current) if Arc::ptr_eq(current, session)) {
            *active = None;
        }
        drop(active);

        let _ = self
            .broker_control
            .send(
                Frame::from_payload(&GameServerControl::PutToFree)
                    .expect("GameServerControl always serializes to an object"),
            )
            .await;
    }

    /// Clears `kind`'s slot the first time any peer loop observes this
    /// session finished, and sends `put_to_free` exactly once regardless of
    /// how many peer loops race to call this.
    async fn teardown_after_finish(&self, kind: GameType, session: &Arc<Mutex<GameSession>>) {
        let mut active = self.slot(kind).lock().await;
        let was_active = matches!(active.as_ref(), Some(current) if Arc::ptr_eq(current, session));
        if was_active {
            *active = None;
        }
        drop(active);

        if was_active {
            let _ = self
                .broker_control
                .send(
                    Frame::from_payload(&GameServerControl::PutToFree)
                        .expect("GameServerControl always serializes to an object"),
                )
                .await;
        }
    }

    /// §4.8 step 4: broadcast on change, auto-move the computer without
    /// awaiting input, otherwise await and dispatch one frame from this
    /// player.
    async fn run_gameplay_loop(
        &self,
        kind: GameType,
        session: Arc<Mutex<GameSession>>,
        username: String,
        transport: Arc<Transport>,
    ) {
        loop {
            let broadcasts = session.lock().await.pending_broadcasts();
            for (peer, payload) in broadcasts {
                let frame = Frame::from_payload(&payload).expect("ServerControlFrame always serializes to an object");
                let _ = peer.send(frame).await;
            }

            if session.lock().await.is_finished() {
                self.teardown_after_finish(kind, &session).await;
                return;
            }

            if session.lock().await.try_place_computer_mark() {
                continue;
            }

            match transport.receive().await {
                Ok(frame) => self.dispatch_player_frame(&session, frame).await,
                Err(_) => {
                    self.handle_disconnect(kind, &session, &username).await;
                    return;
                }
            }
        }
    }

    async fn dispatch_player_frame(&self, session: &Arc<Mutex<GameSession>>, frame: Frame) {
        let request: PlayerRequest = match frame.parse() {
            Ok(request) => request,
            Err(_) => {
                tracing::warn!(
                    frame_type = frame.peek_type().unwrap_or("<missing type>"),
                    "ignoring malformed in-game frame",
                );
                return;
            }
        };

        let effect = session.lock().await.apply(&request);
        if let Effect::RelayChat { sender, text_message } = effect {
            let peers = session.lock().await.peers_except(&sender);
            let payload = ServerControlFrame::Chat { text_message };
            for peer in peers {
                let frame = Frame::from_payload(&payload).expect("ServerControlFrame always serializes to an object");
                let _ = peer.send(frame).await;
            }
        }
    }

    /// §4.8 step 5. Skips the reconnect wait for a session that's already
    /// finished (step 6 owns that wind-down) or whose peer asked to cancel.
    async fn handle_disconnect(&self, kind: GameType, session: &Arc<Mutex<GameSession>>, username: &str) {
        let (finished, aborted) = {
            let mut guard = session.lock().await;
            guard.remove_peer(username);
            (guard.is_finished(), guard.abort_requested())
        };

        if finished {
            self.teardown_after_finish(kind, session).await;
            return;
        }

        let reconnected = if aborted { false } else { self.wait_for_reconnect(username).await };

        if !reconnected {
            let remaining = session.lock().await.all_peers();
            let payload = ServerControlFrame::OpponentEscaped { game_status: GameStatus::Finished };
            for peer in remaining {
                let frame = Frame::from_payload(&payload).expect("ServerControlFrame always serializes to an object");
                let _ = peer.send(frame).await;
            }
            self.teardown_after_finish(kind, session).await;
        }
    }

    async fn wait_for_reconnect(&self, username: &str) -> bool {
        let notify = Arc::new(Notify::new());
        self.reconnect_tasks.lock().await.insert(username.to_string(), notify.clone());

        let _ = self
            .broker_control
            .send(
                Frame::from_payload(&GameServerControl::PutToWaiting { username: username.to_string() })
                    .expect("GameServerControl always serializes to an object"),
            )
            .await;

        let reconnected = tokio::select! {
            _ = notify.notified() => true,
            _ = tokio::time::sleep(RECONNECT_WINDOW) => false,
        };

        self.reconnect_tasks.lock().await.remove(username);
        reconnected
    }
}

async fn wait_for_second_player(session: Arc<Mutex<GameSession>>) {
    loop {
        if !session.lock().await.is_awaiting_second_player() {
            return;
        }
        tokio::time::sleep(SECOND_PLAYER_POLL_INTERVAL).await;
    }
}

async fn wait_for_queue_abort(transport: Arc<Transport>) -> QueueAbortReason {
    loop {
        match transport.receive().await {
            Ok(frame) => {
                if let Ok(PlayerRequest::ChangeGame { .. }) = frame.parse() {
                    return QueueAbortReason::ChangedMind;
                }
                tracing::warn!(
                    frame_type = frame.peek_type().unwrap_or("<missing type>"),
                    "ignoring frame from a player still queued for a second player",
                );
            }
            Err(_) => return QueueAbortReason::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{GameType, ServerControlFrame};
    use tokio::net::TcpListener as TokioTcpListener;

    async fn connected_pair() -> (Transport, Transport) {
        let listener = TokioTcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            Transport::new(stream)
        });
        let client = Transport::connect(addr).await.unwrap();
        let server = server.await.unwrap();
        (client, server)
    }

    async fn new_game_server() -> (Arc<GameServer>, Transport) {
        let (broker_near, broker_far) = connected_pair().await;
        (GameServer::new(Arc::new(broker_far)), broker_near)
    }

    #[tokio::test]
    async fn single_player_game_plays_to_completion() {
        let (game_server, _broker_near) = new_game_server().await;
        let listener = TokioTcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(game_server.clone().serve(listener));

        let player = Transport::connect(addr).await.unwrap();
        let start = PlayerRequest::StartGame { username: "alice".into(), game_type: GameType::Single };
        player.send(Frame::from_payload(&start).unwrap()).await.unwrap();

        // alice always takes the lowest-index empty cell on her turn, same
        // rule the computer uses on its own — this fills the board via the
        // main diagonal landing on alice, a deterministic finish.
        loop {
            let frame = player.receive().await.unwrap();
            let status: ServerControlFrame = frame.parse().unwrap();
            match status {
                ServerControlFrame::ShowGameStatus { game_status: GameStatus::Finished, winner, .. } => {
                    assert_eq!(winner, Some(1));
                    break;
                }
                ServerControlFrame::ShowGameStatus { game_status: GameStatus::Running, current_user: 1, game_board, .. } => {
                    let (row, col) = first_empty_cell(&game_board).expect("a move must be available while running");
                    let place = PlayerRequest::PlaceMark { username: "alice".into(), row, col };
                    player.send(Frame::from_payload(&place).unwrap()).await.unwrap();
                }
                ServerControlFrame::ShowGameStatus { .. } => continue,
                _ => panic!("unexpected frame from game-server"),
            }
        }
    }

    fn first_empty_cell(board: &[[u8; 3]; 3]) -> Option<(usize, usize)> {
        for row in 0..3 {
            for col in 0..3 {
                if board[row][col] == 0 {
                    return Some((row, col));
                }
            }
        }
        None
    }

    #[tokio::test]
    async fn multiplayer_queue_abort_frees_the_slot() {
        let (game_server, _broker_near) = new_game_server().await;
        let listener = TokioTcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(game_server.clone().serve(listener));

        let player = Transport::connect(addr).await.unwrap();
        let start = PlayerRequest::StartGame { username: "alice".into(), game_type: GameType::Multi };
        player.send(Frame::from_payload(&start).unwrap()).await.unwrap();

        let assigned = player.receive().await.unwrap();
        assert_eq!(assigned.peek_type(), Some("server_assigned"));

        let abort = PlayerRequest::ChangeGame { username: "alice".into() };
        player.send(Frame::from_payload(&abort).unwrap()).await.unwrap();

        let changed = player.receive().await.unwrap();
        assert_eq!(changed.peek_type(), Some("game_changed"));

        assert!(game_server.multi_active.lock().await.is_none());
    }

    #[tokio::test]
    async fn single_and_multi_sessions_occupy_independent_slots() {
        let (game_server, _broker_near) = new_game_server().await;
        let listener = TokioTcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(game_server.clone().serve(listener));

        let single_player = Transport::connect(addr).await.unwrap();
        let start_single = PlayerRequest::StartGame { username: "alice".into(), game_type: GameType::Single };
        single_player.send(Frame::from_payload(&start_single).unwrap()).await.unwrap();
        // Wait for alice's first broadcast, proving her single-player session exists.
        let first = single_player.receive().await.unwrap();
        assert_eq!(first.peek_type(), Some("show_game_status"));

        let multi_player = Transport::connect(addr).await.unwrap();
        let start_multi = PlayerRequest::StartGame { username: "bob".into(), game_type: GameType::Multi };
        multi_player.send(Frame::from_payload(&start_multi).unwrap()).await.unwrap();

        let assigned = multi_player.receive().await.unwrap();
        assert_eq!(assigned.peek_type(), Some("server_assigned"));

        assert!(game_server.single_active.lock().await.is_some());
        assert!(game_server.multi_active.lock().await.is_some());
    }
}
