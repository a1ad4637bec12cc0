use serde::{Deserialize, Serialize};

/// The two kinds of game a player may request (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Single,
    Multi,
}

/// Whether a game is still accepting moves or has concluded (§6.1, §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Running,
    Finished,
}

/// Frames a player client sends to a game server (§6.2). A player's
/// `username` rides along on every request so the game server can attribute
/// it without a separate session lookup, mirroring
/// `GameClient.send`'s `content['username'] = self.username` in
/// `original_source/client/game_client.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerRequest {
    StartGame { username: String, game_type: GameType },
    PlaceMark { username: String, row: usize, col: usize },
    Chat { username: String, text_message: String },
    CancelGame { username: String },
    ChangeGame { username: String },
    Reconnect { username: String },
}

impl PlayerRequest {
    pub fn username(&self) -> &str {
        match self {
            PlayerRequest::StartGame { username, .. }
            | PlayerRequest::PlaceMark { username, .. }
            | PlayerRequest::Chat { username, .. }
            | PlayerRequest::CancelGame { username }
            | PlayerRequest::ChangeGame { username }
            | PlayerRequest::Reconnect { username } => username,
        }
    }
}

/// Frames a game server sends to a player client (§6.1, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerControlFrame {
    ShowGameStatus {
        game_status: GameStatus,
        game_board: [[u8; 3]; 3],
        your_mark: u8,
        opponent_mark: u8,
        current_user: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<u8>,
    },
    ServerAssigned {
        #[serde(skip_serializing_if = "Option::is_none")]
        game_type: Option<GameType>,
    },
    ServerCrashed,
    OpponentEscaped {
        game_status: GameStatus,
    },
    GameChanged {
        game_status: GameStatus,
    },
    Chat {
        text_message: String,
    },
}

/// Frames a game server sends to the broker over its persistent control
/// channel (§6.4). The broker never inspects game semantics; this is the
/// entirety of what it understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameServerControl {
    Handshake { host: String, port: u16 },
    PutToFree,
    PutToMultiFree,
    PutToWaiting { username: String },
}
