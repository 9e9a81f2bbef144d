use crate::errors::AppError;
use log::{debug, trace, warn};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;

#[inline]
fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{FEFF}').unwrap_or(s)
}

/// Feed responses from a capture file, or stdin when `path` is `None`.
pub async fn stream_lines(path: Option<&Path>, tx: Sender<String>) -> Result<usize, AppError> {
    match path {
        Some(p) => {
            let file = File::open(p)
                .await
                .map_err(|e| AppError::IO(format!("open {}: {}", p.display(), e)))?;
            forward_lines(BufReader::new(file), tx).await
        }
        None => forward_lines(BufReader::new(tokio::io::stdin()), tx).await,
    }
}

/// The scanner ends responses with `\r`; captures often use `\n` or both.
/// Either terminator ends a response and blank pieces are skipped. Bytes
/// that are not UTF-8 (line noise) become U+FFFD.
pub async fn forward_lines<R: AsyncBufRead + Unpin>(reader: R, tx: Sender<String>) -> Result<usize, AppError> {
    let mut segments = reader.split(b'\n');
    let mut sent: usize = 0;

    while let Some(segment) = segments.next_segment().await? {
        let line = String::from_utf8_lossy(&segment);
        for piece in strip_bom(&line).split('\r') {
            if piece.trim().is_empty() {
                continue;
            }
            trace!("source: {:?}", piece);
            if tx.send(piece.to_string()).await.is_err() {
                warn!("source: downstream closed; stopping");
                return Ok(sent);
            }
            sent += 1;
        }
    }

    debug!("source: end of stream after {} responses", sent);
    Ok(sent)
}
