//! Message framing for the daemon's stdio channel.
//!
//! The daemon speaks JSON-RPC with LSP base-protocol framing:
//! `Content-Length: N\r\n\r\n{json}`. [`MessageReader`] and [`MessageWriter`]
//! move whole JSON values across that boundary.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Largest accepted message body.
///
/// An `initial-compile` response carries the compiled output of every file in
/// the project, so this is far above what a language server would need.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

/// Parse one header line. Returns the length if it is a `Content-Length` header.
fn parse_header_line(line: &str) -> Result<Option<usize>> {
    let Some((key, value)) = line.split_once(':') else {
        return Ok(None);
    };
    if !key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
        return Ok(None);
    }
    let len = value
        .trim()
        .parse()
        .with_context(|| format!("invalid {CONTENT_LENGTH} value {:?}", value.trim()))?;
    Ok(Some(len))
}

/// Reads framed JSON messages from the daemon's stdout.
pub struct MessageReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Read the next message.
    ///
    /// `Ok(None)` means the stream closed cleanly between messages.
    pub async fn read_message(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(len) = self.read_header_block().await? else {
            return Ok(None);
        };
        if len > MAX_MESSAGE_BYTES {
            bail!("{CONTENT_LENGTH} {len} exceeds maximum {MAX_MESSAGE_BYTES}");
        }

        let mut body = vec![0u8; len];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading message body")?;
        serde_json::from_slice(&body)
            .map(Some)
            .context("parsing JSON-RPC message")
    }

    async fn read_header_block(&mut self) -> Result<Option<usize>> {
        let mut content_length = None;
        let mut started = false;

        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .await
                .context("reading header line")?;
            if read == 0 {
                if started {
                    bail!("stream closed inside a header block");
                }
                return Ok(None);
            }
            started = true;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some(len) = parse_header_line(trimmed)? {
                content_length = Some(len);
            }
        }

        content_length
            .map(Some)
            .with_context(|| format!("header block without {CONTENT_LENGTH}"))
    }
}

/// Writes framed JSON messages to the daemon's stdin.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_message(&mut self, message: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(message).context("serializing JSON-RPC message")?;
        let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("writing message header")?;
        self.writer
            .write_all(&body)
            .await
            .context("writing message body")?;
        self.writer.flush().await.context("flushing message")
    }
}
