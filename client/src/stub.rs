use protocol::{Frame, GameType, PlayerRequest, Transport};

use crate::error::ClientError;

/// Typed send operations over a player's transport (§4.9's "stub"),
/// grounded on `original_source/client/game_stub.py`'s `GameStub`: every
/// method just builds the matching `PlayerRequest` and sends it.
pub struct GameStub {
    username: String,
    transport: Transport,
}

impl GameStub {
    pub fn new(username: impl Into<String>, transport: Transport) -> Self {
        GameStub { username: username.into(), transport }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub async fn start_game(&self, game_type: GameType) -> Result<(), ClientError> {
        self.send(PlayerRequest::StartGame { username: self.username.clone(), game_type }).await
    }

    pub async fn place_mark(&self, row: usize, col: usize) -> Result<(), ClientError> {
        self.send(PlayerRequest::PlaceMark { username: self.username.clone(), row, col }).await
    }

    pub async fn chat(&self, text_message: impl Into<String>) -> Result<(), ClientError> {
        self.send(PlayerRequest::Chat { username: self.username.clone(), text_message: text_message.into() }).await
    }

    pub async fn cancel_game(&self) -> Result<(), ClientError> {
        self.send(PlayerRequest::CancelGame { username: self.username.clone() }).await
    }

    pub async fn change_game(&self) -> Result<(), ClientError> {
        self.send(PlayerRequest::ChangeGame { username: self.username.clone() }).await
    }

    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.send(PlayerRequest::Reconnect { username: self.username.clone() }).await
    }

    async fn send(&self, request: PlayerRequest) -> Result<(), ClientError> {
        let frame = Frame::from_payload(&request)?;
        self.transport.send(frame).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn place_mark_sends_a_place_mark_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            Transport::new(stream)
        });
        let client = Transport::connect(addr).await.unwrap();
        let server = server.await.unwrap();

        let stub = GameStub::new("alice", client);
        stub.place_mark(1, 2).await.unwrap();

        let frame = server.receive().await.unwrap();
        assert_eq!(frame.peek_type(), Some("place_mark"));
        let request: PlayerRequest = frame.parse().unwrap();
        assert!(matches!(request, PlayerRequest::PlaceMark { row: 1, col: 2, .. }));
    }
}
