use std::collections::HashMap;
use std::sync::Arc;

use board::Board;
use protocol::{GameStatus, PlayerRequest, ServerControlFrame, Transport};

/// Special username assigned mark 2 in a single-player session; the "first
/// empty cell" opponent named in §1's non-goals.
pub const COMPUTER: &str = "computer";

/// A side effect of [`GameSession::apply`] that the orchestrator must carry
/// out asynchronously (a chat relay, concretely) once the session's lock is
/// released. Grounded on `original_source/server/game.py`'s
/// `_handle_client_message`, whose `chat` arm is the only dispatch case
/// that does I/O of its own rather than just mutating state.
pub enum Effect {
    None,
    RelayChat { sender: String, text_message: String },
}

/// Game-server-side session state (§3): the board plus a username->peer
/// mapping plus the `has_new_change`/`abort_requested` flags. `board` is
/// `None` for a multiplayer session still waiting for its second player.
pub struct GameSession {
    board: Option<Board>,
    user1: String,
    user2: Option<String>,
    peers: HashMap<String, Arc<Transport>>,
    has_new_change: bool,
    abort_requested: bool,
    finished_announced: bool,
}

impl GameSession {
    /// A single-player session: `username` is mark 1, `"computer"` is
    /// mark 2, and the board exists immediately.
    pub fn single_player(username: impl Into<String>) -> Self {
        let username = username.into();
        GameSession {
            board: Some(Board::new(username.clone(), COMPUTER)),
            user1: username,
            user2: Some(COMPUTER.to_string()),
            peers: HashMap::new(),
            has_new_change: true,
            abort_requested: false,
            finished_announced: false,
        }
    }

    /// A multiplayer session awaiting its second player; `board` stays
    /// `None` until [`GameSession::join_second_player`] is called.
    pub fn multi_player_pending(user1: impl Into<String>) -> Self {
        GameSession {
            board: None,
            user1: user1.into(),
            user2: None,
            peers: HashMap::new(),
            has_new_change: true,
            abort_requested: false,
            finished_announced: false,
        }
    }

    pub fn is_awaiting_second_player(&self) -> bool {
        self.board.is_none()
    }

    pub fn user1(&self) -> &str {
        &self.user1
    }

    /// Binds `user2` and creates the board. A no-op once the board already
    /// exists, or if `user2` is this session's own `user1` reconnecting
    /// while still in the waiting state.
    pub fn join_second_player(&mut self, user2: impl Into<String>) {
        if self.board.is_some() {
            return;
        }
        let user2 = user2.into();
        if user2 == self.user1 {
            return;
        }
        self.board = Some(Board::new(self.user1.clone(), user2.clone()));
        self.user2 = Some(user2);
        self.has_new_change = true;
    }

    pub fn add_peer(&mut self, username: String, transport: Arc<Transport>) {
        self.peers.insert(username, transport);
        self.has_new_change = true;
    }

    pub fn remove_peer(&mut self, username: &str) {
        self.peers.remove(username);
    }

    pub fn has_peer(&self, username: &str) -> bool {
        self.peers.contains_key(username)
    }

    pub fn is_finished(&self) -> bool {
        self.board.as_ref().map(Board::finished).unwrap_or(false)
    }

    pub fn abort_requested(&self) -> bool {
        self.abort_requested
    }

    /// Apply a gameplay-loop request (§4.8 step 4 dispatch). `place_mark`
    /// failures (`InvalidMove`) are swallowed per §7: an illegal move
    /// leaves the session untouched and the next broadcast reflects
    /// unchanged state.
    pub fn apply(&mut self, request: &PlayerRequest) -> Effect {
        match request {
            PlayerRequest::PlaceMark { username, row, col } => {
                if let Some(board) = self.board.as_mut() {
                    if board.place(username, *row, *col).is_ok() {
                        self.has_new_change = true;
                    }
                }
                Effect::None
            }
            PlayerRequest::CancelGame { .. } => {
                self.abort_requested = true;
                Effect::None
            }
            PlayerRequest::Reconnect { .. } => {
                self.has_new_change = true;
                Effect::None
            }
            PlayerRequest::Chat { username, text_message } => Effect::RelayChat {
                sender: username.clone(),
                text_message: text_message.clone(),
            },
            PlayerRequest::StartGame { .. } | PlayerRequest::ChangeGame { .. } => Effect::None,
        }
    }

    /// If it's the computer's turn, place its mark on the first empty cell
    /// in row-major order (§4.8 step 4, §1 non-goals: no search beyond
    /// that). Returns whether a move was made.
    pub fn try_place_computer_mark(&mut self) -> bool {
        let board = match self.board.as_mut() {
            Some(board) => board,
            None => return false,
        };
        if board.mark_of(COMPUTER) != Some(board.current_mark()) {
            return false;
        }
        for row in 0..3 {
            for col in 0..3 {
                if board.cells()[row][col] == 0 {
                    let _ = board.place(COMPUTER, row, col);
                    self.has_new_change = true;
                    return true;
                }
            }
        }
        false
    }

    /// Peers other than `sender`, for chat relay (§6.3: "echoed to the
    /// other peer", §9 open question (c): non-senders only).
    pub fn peers_except(&self, sender: &str) -> Vec<Arc<Transport>> {
        self.peers
            .iter()
            .filter(|(username, _)| username.as_str() != sender)
            .map(|(_, transport)| transport.clone())
            .collect()
    }

    /// Every currently connected peer, for the `opponent_escaped` broadcast
    /// (§4.8 step 5), which names no sender to exclude.
    pub fn all_peers(&self) -> Vec<Arc<Transport>> {
        self.peers.values().cloned().collect()
    }

    /// Computes the status broadcasts due right now, clearing
    /// `has_new_change` and marking the end-of-game announcement sent so a
    /// finished session's last frame is emitted exactly once per peer loop
    /// that observes it (§4.8 step 4: "always emit when finished ... once,
    /// to each peer"). Returns `(peer_transport, frame_payload)` pairs for
    /// the caller to send outside this session's lock.
    pub fn pending_broadcasts(&mut self) -> Vec<(Arc<Transport>, ServerControlFrame)> {
        let board = match self.board.as_ref() {
            Some(board) => board,
            None => return Vec::new(),
        };
        let finished = board.finished();
        let should_announce_finish = finished && !self.finished_announced;
        if !self.has_new_change && !should_announce_finish {
            return Vec::new();
        }
        self.has_new_change = false;
        if should_announce_finish {
            self.finished_announced = true;
        }

        self.peers
            .iter()
            .map(|(username, transport)| {
                let your_mark = self.mark_of(username).unwrap_or(0);
                let opponent_mark = Board::opponent_mark(your_mark.max(1));
                let payload = ServerControlFrame::ShowGameStatus {
                    game_status: if finished { GameStatus::Finished } else { GameStatus::Running },
                    game_board: board.cells(),
                    your_mark,
                    opponent_mark,
                    current_user: board.current_mark(),
                    winner: if finished { Some(board.winner()) } else { None },
                };
                (transport.clone(), payload)
            })
            .collect()
    }

    fn mark_of(&self, username: &str) -> Option<u8> {
        self.board.as_ref().and_then(|board| board.mark_of(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_player_session_has_a_board_from_the_start() {
        let session = GameSession::single_player("alice");
        assert!(!session.is_awaiting_second_player());
    }

    #[test]
    fn multi_player_session_waits_until_joined() {
        let mut session = GameSession::multi_player_pending("alice");
        assert!(session.is_awaiting_second_player());
        session.join_second_player("bob");
        assert!(!session.is_awaiting_second_player());
    }

    #[test]
    fn join_second_player_ignores_the_session_owner_rejoining() {
        let mut session = GameSession::multi_player_pending("alice");
        session.join_second_player("alice");
        assert!(session.is_awaiting_second_player());
    }

    #[test]
    fn computer_plays_first_empty_cell_in_row_major_order() {
        let mut session = GameSession::single_player("alice");
        // alice has mark 1 and moves first; force it to be the computer's turn.
        session.apply(&PlayerRequest::PlaceMark { username: "alice".into(), row: 1, col: 1 });
        assert!(session.try_place_computer_mark());
        assert!(!session.try_place_computer_mark());
    }

    #[test]
    fn cancel_game_sets_abort_requested() {
        let mut session = GameSession::single_player("alice");
        assert!(!session.abort_requested());
        session.apply(&PlayerRequest::CancelGame { username: "alice".into() });
        assert!(session.abort_requested());
    }

    #[test]
    fn pending_broadcasts_emits_the_finished_frame_exactly_once() {
        let mut session = GameSession::multi_player_pending("alice");
        session.join_second_player("bob");

        // Drive straight to a finish: alice wins the top row.
        for (user, row, col) in [("alice", 0, 0), ("bob", 1, 0), ("alice", 0, 1), ("bob", 1, 1), ("alice", 0, 2)] {
            session.apply(&PlayerRequest::PlaceMark { username: user.into(), row, col });
        }
        assert!(session.is_finished());

        let first = session.pending_broadcasts();
        assert!(!first.is_empty());
        let second = session.pending_broadcasts();
        assert!(second.is_empty());
    }
}
