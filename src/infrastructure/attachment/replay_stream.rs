//! Byte stream with bounded mark/replay for multi-pass decoders.
//!
//! A [`ReplayableStream`] owns one underlying reader (typically a response
//! body) and lets a single consumer rewind to a previously marked position
//! without a second fetch. Bytes read after a mark are recorded; after a
//! reset they are served again before reading resumes on the live source.

use std::io::{self, Read};

use tracing::trace;

/// Limit for marks that should never expire by size.
pub const UNBOUNDED: usize = usize::MAX;

/// Handle for a recorded mark position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkToken {
    id: u64,
    offset: u64,
}

impl MarkToken {
    /// Logical stream offset the mark was taken at.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }
}

#[derive(Debug, Default)]
enum MarkState {
    #[default]
    NoMark,
    Buffering {
        mark: MarkToken,
        bytes: Vec<u8>,
        limit: usize,
    },
    /// Serving recorded bytes. `rewound` is false when the bytes are only
    /// the pending head carried over into a fresh mark.
    Replaying {
        mark: MarkToken,
        bytes: Vec<u8>,
        offset: usize,
        limit: usize,
        rewound: bool,
    },
}

/// Single-consumer reader supporting one outstanding mark.
pub struct ReplayableStream<R> {
    inner: Option<R>,
    state: MarkState,
    expire_marks: bool,
    position: u64,
    next_mark_id: u64,
}

impl<R> ReplayableStream<R> {
    /// Number of bytes currently held for replay.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        match &self.state {
            MarkState::NoMark => 0,
            MarkState::Buffering { bytes, .. } | MarkState::Replaying { bytes, .. } => bytes.len(),
        }
    }

    const fn state_name(&self) -> &'static str {
        match self.state {
            MarkState::NoMark => "no-mark",
            MarkState::Buffering { .. } => "buffering",
            MarkState::Replaying { .. } => "replaying",
        }
    }
}

impl<R> std::fmt::Debug for ReplayableStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayableStream")
            .field("state", &self.state_name())
            .field("position", &self.position)
            .field("buffered", &self.buffered_len())
            .field("closed", &self.inner.is_none())
            .finish()
    }
}

impl<R: Read> ReplayableStream<R> {
    /// Wraps `inner`. Marks are retained until replaced by default.
    #[must_use]
    pub const fn new(inner: R) -> Self {
        Self {
            inner: Some(inner),
            state: MarkState::NoMark,
            expire_marks: false,
            position: 0,
            next_mark_id: 0,
        }
    }

    /// Starts recording at the current position, keeping at most `limit`
    /// bytes. Reading past the limit invalidates the mark.
    ///
    /// Any prior mark is discarded. Bytes still pending replay are kept and
    /// become the start of the new window.
    pub fn mark(&mut self, limit: usize) -> MarkToken {
        self.next_mark_id += 1;
        let mark = MarkToken {
            id: self.next_mark_id,
            offset: self.position,
        };

        self.state = match std::mem::take(&mut self.state) {
            MarkState::Replaying {
                mut bytes, offset, ..
            } => {
                bytes.drain(..offset);
                MarkState::Replaying {
                    mark,
                    bytes,
                    offset: 0,
                    limit,
                    rewound: false,
                }
            }
            MarkState::NoMark | MarkState::Buffering { .. } => MarkState::Buffering {
                mark,
                bytes: Vec::new(),
                limit,
            },
        };

        trace!(offset = mark.offset, limit, "Stream marked");
        mark
    }

    /// Rewinds to `token`. Subsequent reads serve the recorded bytes first.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the mark was superseded, expired, or
    /// overran its limit.
    pub fn reset(&mut self, token: MarkToken) -> io::Result<()> {
        match std::mem::take(&mut self.state) {
            MarkState::Buffering { mark, bytes, limit }
            | MarkState::Replaying {
                mark, bytes, limit, ..
            } if mark == token => {
                self.state = MarkState::Replaying {
                    mark,
                    bytes,
                    offset: 0,
                    limit,
                    rewound: true,
                };
            }
            other => {
                self.state = other;
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "mark is no longer valid",
                ));
            }
        }

        self.position = token.offset;
        trace!(offset = token.offset, buffered = self.buffered_len(), "Stream reset to mark");
        self.finish_replay_if_drained();
        Ok(())
    }

    /// When `true`, the recorded bytes are released once a replay started by
    /// [`Self::reset`] has been fully drained. When `false`, the mark stays
    /// valid for further resets.
    pub fn allow_marks_to_expire(&mut self, expire: bool) {
        self.expire_marks = expire;
    }

    /// Logical read position.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Releases the underlying source and every buffer.
    pub fn close(&mut self) {
        self.inner = None;
        self.state = MarkState::NoMark;
    }

    fn finish_replay_if_drained(&mut self) {
        let drained = matches!(
            &self.state,
            MarkState::Replaying { bytes, offset, .. } if *offset >= bytes.len()
        );
        if !drained {
            return;
        }

        if let MarkState::Replaying {
            mark,
            bytes,
            limit,
            rewound,
            ..
        } = std::mem::take(&mut self.state)
        {
            if self.expire_marks && rewound {
                trace!(released = bytes.len(), "Replay drained, mark expired");
            } else {
                self.state = MarkState::Buffering { mark, bytes, limit };
            }
        }
    }

    fn read_live(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream closed"))?;
        let n = inner.read(buf)?;

        let overflowed = match &mut self.state {
            MarkState::Buffering { bytes, limit, .. } => {
                if bytes.len().saturating_add(n) > *limit {
                    true
                } else {
                    bytes.extend_from_slice(&buf[..n]);
                    false
                }
            }
            MarkState::NoMark | MarkState::Replaying { .. } => false,
        };
        if overflowed {
            trace!("Mark limit exceeded, mark invalidated");
            self.state = MarkState::NoMark;
        }
        Ok(n)
    }
}

impl<R: Read> Read for ReplayableStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.inner.is_none() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "stream closed"));
        }

        let n = if let MarkState::Replaying { bytes, offset, .. } = &mut self.state {
            let pending = &bytes[*offset..];
            let n = pending.len().min(buf.len());
            buf[..n].copy_from_slice(&pending[..n]);
            *offset += n;
            n
        } else {
            self.read_live(buf)?
        };

        self.position += n as u64;
        self.finish_replay_if_drained();
        Ok(n)
    }
}
