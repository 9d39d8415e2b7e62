//! JSON-RPC framing for the editor connection.
//!
//! Messages travel as `Content-Length: N\r\n\r\n{json}` over stdin/stdout.
//! [`FrameReader`] yields incoming editor messages, [`FrameWriter`] emits
//! responses and notifications.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Maximum frame size (16 MiB). Full-sync `didChange` carries whole files.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("connection I/O failed")]
    Io(#[from] std::io::Error),
    #[error("unexpected EOF while reading headers")]
    TruncatedHeaders,
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length value {0:?}")]
    InvalidContentLength(String),
    #[error("Content-Length {0} exceeds maximum {max}", max = MAX_FRAME_BYTES)]
    Oversized(usize),
    #[error("malformed JSON body")]
    Json(#[from] serde_json::Error),
}

pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message from the editor.
    ///
    /// Returns `Ok(None)` when the editor closes the stream between frames.
    /// A [`CodecError::Json`] body is consumed in full, so reading may go on.
    pub async fn read_frame(&mut self) -> Result<Option<serde_json::Value>, CodecError> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        if content_length > MAX_FRAME_BYTES {
            return Err(CodecError::Oversized(content_length));
        }

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    async fn read_headers(&mut self) -> Result<Option<usize>, CodecError> {
        let mut content_length = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                // EOF is clean only before the first header byte.
                if started {
                    return Err(CodecError::TruncatedHeaders);
                }
                return Ok(None);
            }
            started = true;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }

            if let Some((key, value)) = trimmed.split_once(':')
                && key.trim().eq_ignore_ascii_case("Content-Length")
            {
                let value = value.trim();
                content_length = Some(
                    value
                        .parse()
                        .map_err(|_| CodecError::InvalidContentLength(value.to_string()))?,
                );
            }
        }

        content_length
            .map(Some)
            .ok_or(CodecError::MissingContentLength)
    }
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<(), CodecError> {
        let body = serde_json::to_string(msg)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());
        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(body.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(body: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{body}", body.len())
    }

    #[tokio::test]
    async fn test_reads_initialize_request() {
        let input = frame(r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#);
        let mut reader = FrameReader::new(input.as_bytes());
        let msg = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(msg["method"], "initialize");
        assert_eq!(msg["id"], 0);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reads_consecutive_notifications() {
        let input = format!(
            "{}{}",
            frame(r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#),
            frame(r#"{"jsonrpc":"2.0","method":"exit"}"#),
        );
        let mut reader = FrameReader::new(input.as_bytes());
        assert_eq!(reader.read_frame().await.unwrap().unwrap()["method"], "initialized");
        assert_eq!(reader.read_frame().await.unwrap().unwrap()["method"], "exit");
    }

    #[tokio::test]
    async fn test_content_type_header_and_case() {
        let body = r#"{"jsonrpc":"2.0","method":"exit"}"#;
        let input = format!(
            "Content-Type: application/vscode-jsonrpc; charset=utf-8\r\ncontent-length: {}\r\n\r\n{body}",
            body.len()
        );
        let mut reader = FrameReader::new(input.as_bytes());
        assert_eq!(reader.read_frame().await.unwrap().unwrap()["method"], "exit");
    }

    #[tokio::test]
    async fn test_length_counts_bytes() {
        let body = r#"{"text":"contract Café {}"}"#;
        let input = frame(body);
        let mut reader = FrameReader::new(input.as_bytes());
        let msg = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(msg["text"], "contract Café {}");
    }

    #[tokio::test]
    async fn test_header_errors() {
        let mut reader = FrameReader::new(&b"Content-Type: x\r\n\r\n{}"[..]);
        assert!(matches!(
            reader.read_frame().await,
            Err(CodecError::MissingContentLength)
        ));

        let mut reader = FrameReader::new(&b"Content-Length: 10\r\n"[..]);
        assert!(matches!(
            reader.read_frame().await,
            Err(CodecError::TruncatedHeaders)
        ));

        let mut reader = FrameReader::new(&b"Content-Length: ten\r\n\r\n"[..]);
        assert!(matches!(
            reader.read_frame().await,
            Err(CodecError::InvalidContentLength(v)) if v == "ten"
        ));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let input = format!("Content-Length: {}\r\n\r\n", MAX_FRAME_BYTES + 1);
        let mut reader = FrameReader::new(input.as_bytes());
        assert!(matches!(
            reader.read_frame().await,
            Err(CodecError::Oversized(_))
        ));
    }

    #[tokio::test]
    async fn test_body_errors() {
        let mut reader = FrameReader::new(&b"Content-Length: 100\r\n\r\n{}"[..]);
        assert!(matches!(reader.read_frame().await, Err(CodecError::Io(_))));

        let input = frame("not json");
        let mut reader = FrameReader::new(input.as_bytes());
        assert!(matches!(reader.read_frame().await, Err(CodecError::Json(_))));
    }

    #[tokio::test]
    async fn test_reading_continues_after_malformed_body() {
        let input = format!(
            "{}{}",
            frame("{not json"),
            frame(r#"{"jsonrpc":"2.0","method":"exit"}"#),
        );
        let mut reader = FrameReader::new(input.as_bytes());
        assert!(matches!(reader.read_frame().await, Err(CodecError::Json(_))));
        assert_eq!(reader.read_frame().await.unwrap().unwrap()["method"], "exit");
    }

    #[test]
    fn test_error_display_leaves_cause_to_source() {
        use std::error::Error;

        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CodecError::from(cause);
        assert_eq!(err.to_string(), "malformed JSON body");
        assert!(err.source().is_some());
    }

    #[tokio::test]
    async fn test_writes_publish_notification() {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": { "uri": "file:///ws/Café.sol", "diagnostics": [] }
        });
        let mut buf = Vec::new();
        FrameWriter::new(&mut buf).write_frame(&msg).await.unwrap();

        let body = serde_json::to_string(&msg).unwrap();
        let written = String::from_utf8(buf).unwrap();
        assert_eq!(written, format!("Content-Length: {}\r\n\r\n{body}", body.len()));

        let mut reader = FrameReader::new(written.as_bytes());
        assert_eq!(reader.read_frame().await.unwrap().unwrap(), msg);
    }
}
