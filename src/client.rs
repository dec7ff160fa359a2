//! Consumer side of the sample stream
//!
//! Buffers partial reads and yields one [`Sample`] per complete line. Malformed lines and lines
//! longer than [`MAX_RECORD_LEN`] are skipped; end of stream is reported as `None`.

use std::path::Path;

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    net::UnixStream,
};
use tracing::{debug, trace};

use crate::{
    Sample,
    codec::{LINE_TERMINATOR, decode_line},
};

/// Upper bound on one record, terminator included. Real records are well under 4 KiB.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

pub struct StreamClient<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
    skipped: u64,
    /// Inside an over-long record, dropping input up to its terminator
    oversized: bool,
}

impl StreamClient<UnixStream> {
    pub async fn connect(socket_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let socket_path = socket_path.as_ref();
        if !socket_path.exists() {
            anyhow::bail!(
                "socket not found: {} (is sysmon-server running?)",
                socket_path.display()
            );
        }

        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("failed to connect to {}", socket_path.display()))?;
        debug!("connected to {}", socket_path.display());

        Ok(Self::new(stream))
    }
}

impl<R: AsyncRead + Unpin> StreamClient<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
            skipped: 0,
            oversized: false,
        }
    }

    /// Number of malformed or over-long lines discarded so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Next complete sample, or `None` once the server has gone away.
    ///
    /// A trailing fragment without a terminator at end of stream is discarded.
    pub async fn next_sample(&mut self) -> std::io::Result<Option<Sample>> {
        loop {
            self.line.clear();
            let read = (&mut self.reader)
                .take(MAX_RECORD_LEN as u64)
                .read_until(LINE_TERMINATOR, &mut self.line)
                .await?;

            if read == 0 {
                return Ok(None);
            }

            if self.line.last() != Some(&LINE_TERMINATOR) {
                if read < MAX_RECORD_LEN {
                    // end of stream inside a record
                    return Ok(None);
                }
                self.oversized = true;
                continue;
            }

            if std::mem::take(&mut self.oversized) {
                self.skipped += 1;
                debug!("discarded record longer than {MAX_RECORD_LEN} bytes");
                continue;
            }

            match decode_line(&self.line) {
                Ok(sample) => return Ok(Some(sample)),
                Err(e) => {
                    self.skipped += 1;
                    trace!("discarding malformed line: {e}");
                }
            }
        }
    }
}
