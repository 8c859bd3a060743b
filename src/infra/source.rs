//! Message sources feeding the ingestion pipeline.

use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::application::ingest::{MessageStream, SourceError};

const DRAIN_CHUNK_BYTES: u64 = 64 * 1024;

/// Newline-delimited payloads from `reader`, one message per non-blank line.
///
/// Lines longer than `max_message_bytes` are skipped without being buffered
/// and reported as [`SourceError::TooLarge`]. A read error ends the stream
/// after it is reported.
pub fn ndjson<'a, R>(reader: R, max_message_bytes: usize) -> MessageStream<'a>
where
    R: AsyncBufRead + Unpin + Send + 'a,
{
    stream! {
        let mut reader = reader;
        let mut line = Vec::new();
        loop {
            match read_line(&mut reader, max_message_bytes, &mut line).await {
                Ok(Line::Eof) => break,
                Ok(Line::Message) => {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    yield Ok(Bytes::copy_from_slice(&line));
                }
                Ok(Line::Oversized { size }) => {
                    yield Err(SourceError::TooLarge { size, limit: max_message_bytes });
                }
                Err(err) => {
                    yield Err(SourceError::Io(err));
                    break;
                }
            }
        }
    }
    .boxed()
}

enum Line {
    Eof,
    Message,
    Oversized { size: usize },
}

async fn read_line<R>(reader: &mut R, limit: usize, line: &mut Vec<u8>) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    // Room for the payload plus a CRLF terminator.
    let cap = u64::try_from(limit.saturating_add(2)).unwrap_or(u64::MAX);
    let read = (&mut *reader).take(cap).read_until(b'\n', line).await?;
    if read == 0 {
        return Ok(Line::Eof);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.len() <= limit {
            return Ok(Line::Message);
        }
        let size = line.len();
        line.clear();
        return Ok(Line::Oversized { size });
    }
    if line.len() <= limit {
        return Ok(Line::Message);
    }

    let mut size = line.len();
    let mut pending_cr = line.last() == Some(&b'\r');
    loop {
        line.clear();
        let read = (&mut *reader)
            .take(DRAIN_CHUNK_BYTES)
            .read_until(b'\n', line)
            .await?;
        if read == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            size += line.len();
            if line.last().map_or(pending_cr, |byte| *byte == b'\r') {
                size -= 1;
            }
            break;
        }
        size += read;
        pending_cr = line.last() == Some(&b'\r');
    }
    line.clear();
    Ok(Line::Oversized { size })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("ingest queue is full")]
    Full,
    #[error("ingest queue is closed")]
    Closed,
}

/// Producer half of the in-process ingest queue.
#[derive(Clone)]
pub struct IngressSender {
    tx: mpsc::Sender<Bytes>,
}

impl IngressSender {
    /// Queues a payload without waiting for capacity.
    pub fn try_enqueue(&self, payload: Bytes) -> Result<(), EnqueueError> {
        self.tx.try_send(payload).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

/// Bounded in-process queue. The stream ends once every sender is dropped.
pub fn channel(capacity: usize) -> (IngressSender, MessageStream<'static>) {
    let (tx, mut rx) = mpsc::channel::<Bytes>(capacity.max(1));
    let messages = stream! {
        while let Some(payload) = rx.recv().await {
            yield Ok(payload);
        }
        debug!("Ingest queue closed");
    }
    .boxed();
    (IngressSender { tx }, messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(messages: MessageStream<'_>) -> Vec<Result<String, String>> {
        messages
            .map(|message| {
                message
                    .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                    .map_err(|err| err.to_string())
            })
            .collect()
            .await
    }

    #[tokio::test]
    async fn ndjson_splits_lines_and_skips_blanks() {
        let input: &[u8] = b"{\"a\":1}\n\n  \r\n{\"b\":2}\r\n{\"c\":3}";
        let lines = collect(ndjson(input, 1024)).await;
        assert_eq!(
            lines,
            vec![
                Ok("{\"a\":1}".to_string()),
                Ok("{\"b\":2}".to_string()),
                Ok("{\"c\":3}".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn ndjson_reports_oversized_lines_and_resynchronises() {
        let long = "x".repeat(50);
        let input = format!("short\n{long}\nafter\n");
        let lines = collect(ndjson(input.as_bytes(), 10)).await;
        assert_eq!(
            lines,
            vec![
                Ok("short".to_string()),
                Err("message of 50 bytes exceeds the 10-byte limit".to_string()),
                Ok("after".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn ndjson_accepts_lines_exactly_at_the_limit() {
        let lines = collect(ndjson(&b"0123456789\n"[..], 10)).await;
        assert_eq!(lines, vec![Ok("0123456789".to_string())]);
    }

    #[tokio::test]
    async fn ndjson_limit_excludes_the_crlf_terminator() {
        let input: &[u8] = b"0123456789\r\n0123456789A\r\n0123456789A\nok\n";
        let lines = collect(ndjson(input, 10)).await;
        assert_eq!(
            lines,
            vec![
                Ok("0123456789".to_string()),
                Err("message of 11 bytes exceeds the 10-byte limit".to_string()),
                Err("message of 11 bytes exceeds the 10-byte limit".to_string()),
                Ok("ok".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn ndjson_accepts_the_largest_configurable_limit() {
        let input: &[u8] = b"{\"a\":1}\n{\"b\":2}\n";
        let lines = collect(ndjson(input, usize::MAX)).await;
        assert_eq!(
            lines,
            vec![Ok("{\"a\":1}".to_string()), Ok("{\"b\":2}".to_string())]
        );
    }

    #[tokio::test]
    async fn channel_reports_full_queue_and_ends_when_senders_drop() {
        let (sender, messages) = channel(1);
        sender
            .try_enqueue(Bytes::from_static(b"one"))
            .expect("first payload fits");
        assert_eq!(
            sender.try_enqueue(Bytes::from_static(b"two")),
            Err(EnqueueError::Full)
        );
        drop(sender);

        assert_eq!(collect(messages).await, vec![Ok("one".to_string())]);
    }

    #[tokio::test]
    async fn channel_reports_closed_queue() {
        let (sender, messages) = channel(4);
        drop(messages);
        assert_eq!(
            sender.try_enqueue(Bytes::from_static(b"late")),
            Err(EnqueueError::Closed)
        );
    }
}
