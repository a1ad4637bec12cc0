use bytes::{Buf, BytesMut};
use serde_json::{Map, Value};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TransportError;
use crate::frame::Frame;

const HEADER_LENGTH_FIELD: usize = 2;

/// Decoder state across `decode` calls: frames arrive as three length-
/// delimited sections and a single `poll_read` may hand us anywhere from
/// zero to many bytes of any of them.
#[derive(Debug)]
enum State {
    ReadingHeaderLen,
    ReadingHeader { header_len: usize },
    ReadingContent { header: Map<String, Value>, content_len: usize },
}

/// Length-prefixed JSON-header/JSON-content codec (§4.1 of the spec): a
/// 2-byte big-endian header length, the header object (which must carry
/// `content-length`), then the content object.
#[derive(Debug)]
pub struct FrameCodec {
    state: State,
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec {
            state: State::ReadingHeaderLen,
        }
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, TransportError> {
        loop {
            match &self.state {
                State::ReadingHeaderLen => {
                    if src.len() < HEADER_LENGTH_FIELD {
                        return Ok(None);
                    }
                    let header_len = u16::from_be_bytes([src[0], src[1]]) as usize;
                    src.advance(HEADER_LENGTH_FIELD);
                    self.state = State::ReadingHeader { header_len };
                }
                State::ReadingHeader { header_len } => {
                    let header_len = *header_len;
                    if src.len() < header_len {
                        return Ok(None);
                    }
                    let header_bytes = src.split_to(header_len);
                    let header: Map<String, Value> = serde_json::from_slice(&header_bytes)
                        .map_err(|e| {
                            TransportError::Protocol(format!("malformed JSON header: {}", e))
                        })?;

                    let content_len = header
                        .get("content-length")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| {
                            TransportError::Protocol(
                                "header is missing required field 'content-length'".into(),
                            )
                        })? as usize;

                    self.state = State::ReadingContent { header, content_len };
                }
                State::ReadingContent { content_len, .. } => {
                    let content_len = *content_len;
                    if src.len() < content_len {
                        return Ok(None);
                    }
                    let content_bytes = src.split_to(content_len);
                    let content: Map<String, Value> = serde_json::from_slice(&content_bytes)
                        .map_err(|e| {
                            TransportError::Protocol(format!("malformed JSON content: {}", e))
                        })?;

                    let State::ReadingContent { header, .. } =
                        std::mem::replace(&mut self.state, State::ReadingHeaderLen)
                    else {
                        unreachable!()
                    };

                    return Ok(Some(Frame { header, content }));
                }
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), TransportError> {
        let content_bytes = serde_json::to_vec(&frame.content)?;

        let mut header = frame.header;
        header.insert(
            "content-length".to_string(),
            Value::from(content_bytes.len()),
        );
        let header_bytes = serde_json::to_vec(&header)?;

        if header_bytes.len() > u16::MAX as usize {
            return Err(TransportError::Protocol(format!(
                "encoded header is {} bytes, exceeds the {}-byte addressable length field",
                header_bytes.len(),
                u16::MAX
            )));
        }

        dst.reserve(HEADER_LENGTH_FIELD + header_bytes.len() + content_bytes.len());
        dst.extend_from_slice(&(header_bytes.len() as u16).to_be_bytes());
        dst.extend_from_slice(&header_bytes);
        dst.extend_from_slice(&content_bytes);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_frame() -> Frame {
        let mut content = Map::new();
        content.insert("type".into(), json!("ping"));
        content.insert("n".into(), json!(7));
        Frame {
            header: Map::new(),
            content,
        }
    }

    #[test]
    fn encode_then_decode_round_trips() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(sample_frame(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().expect("a full frame");
        assert_eq!(decoded.content, sample_frame().content);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_returns_none_on_partial_input() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(sample_frame(), &mut buf).unwrap();

        let mut partial = buf.split_to(buf.len() - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn decode_rejects_missing_content_length() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let header_bytes = b"{}";
        buf.extend_from_slice(&(header_bytes.len() as u16).to_be_bytes());
        buf.extend_from_slice(header_bytes);
        buf.extend_from_slice(b"{}");

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn back_to_back_frames_preserve_order() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let mut first = sample_frame();
        first.content.insert("n".into(), json!(1));
        let mut second = sample_frame();
        second.content.insert("n".into(), json!(2));

        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        let decoded_first = codec.decode(&mut buf).unwrap().unwrap();
        let decoded_second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded_first.content, first.content);
        assert_eq!(decoded_second.content, second.content);
    }
}
