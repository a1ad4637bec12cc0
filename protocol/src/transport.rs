use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::codec::FrameCodec;
use crate::error::TransportError;
use crate::frame::Frame;

/// One stream socket's exclusive owner. `send` and `receive` are
/// independent of each other (separate locks over separate halves) but each
/// serializes concurrent callers of itself, per §4.1.
#[derive(Debug)]
pub struct Transport {
    reader: Mutex<FramedRead<OwnedReadHalf, FrameCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>,
    closed: AtomicBool,
}

impl Transport {
    pub fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Transport {
            reader: Mutex::new(FramedRead::new(read_half, FrameCodec::new())),
            writer: Mutex::new(FramedWrite::new(write_half, FrameCodec::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Connect to `addr` with no retry.
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Transport::new(stream))
    }

    /// Connect to `addr`, retrying after each of `schedule`'s delays
    /// (e.g. `[1s, 3s, 10s]`, per §5) until the schedule is exhausted, at
    /// which point the final attempt's error is returned.
    pub async fn connect_with_backoff(
        addr: SocketAddr,
        schedule: &[Duration],
    ) -> Result<Self, TransportError> {
        let mut attempts = schedule.iter();
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => return Ok(Transport::new(stream)),
                Err(e) => match attempts.next() {
                    Some(delay) => sleep(*delay).await,
                    None => return Err(e.into()),
                },
            }
        }
    }

    /// Send a frame. Closing is checked first so a caller can't race a
    /// `close()` into a half-written socket.
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::PeerClosed);
        }
        let mut writer = self.writer.lock().await;
        writer.send(frame).await.map_err(|e| {
            self.closed.store(true, Ordering::Release);
            e
        })
    }

    /// Receive the next frame. EOF (zero-byte read) surfaces as
    /// [`TransportError::PeerClosed`], per §4.1.
    pub async fn receive(&self) -> Result<Frame, TransportError> {
        let mut reader = self.reader.lock().await;
        match reader.next().await {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(e)) => {
                self.closed.store(true, Ordering::Release);
                Err(e)
            }
            None => {
                self.closed.store(true, Ordering::Release);
                Err(TransportError::PeerClosed)
            }
        }
    }

    /// Idempotent. Safe to call from any exit path, including after
    /// cancellation of a task that owned this transport.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use tokio::net::TcpListener;

    fn frame(n: u64) -> Frame {
        let mut content = Map::new();
        content.insert("type".into(), json!("ping"));
        content.insert("n".into(), json!(n));
        Frame {
            header: Map::new(),
            content,
        }
    }

    #[tokio::test]
    async fn send_then_receive_round_trips_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            Transport::new(stream)
        });

        let client = Transport::connect(addr).await.unwrap();
        let server = server.await.unwrap();

        client.send(frame(1)).await.unwrap();
        client.send(frame(2)).await.unwrap();

        let first = server.receive().await.unwrap();
        let second = server.receive().await.unwrap();
        assert_eq!(first.content["n"], json!(1));
        assert_eq!(second.content["n"], json!(2));
    }

    #[tokio::test]
    async fn receive_after_peer_drop_is_peer_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            Transport::new(stream)
        });

        let client = Transport::connect(addr).await.unwrap();
        let server = server.await.unwrap();
        drop(client);

        let err = server.receive().await.unwrap_err();
        assert!(matches!(err, TransportError::PeerClosed));
    }
}
