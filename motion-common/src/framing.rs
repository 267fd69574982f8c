//! Stream framing for scanner output
//!
//! The scanner writes JSON documents into the serial stream with no length
//! prefix or delimiter, interleaved with boot banners and line noise. A frame
//! starts at a fixed anchor (the literal document prefix) and ends at the
//! brace that balances the anchor's opening brace.
//!
//! Bytes are fed one at a time; the extractor never blocks and never fails.

use tracing::{debug, warn};

use crate::{Error, Result};

/// Default anchor: the literal prefix of a telemetry document
pub const DEFAULT_ANCHOR: &str = "{\"message-type\":3070";

/// Default cap on a single frame, in bytes
pub const DEFAULT_MAX_FRAME_LEN: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Matching the anchor byte-by-byte
    Seeking,
    /// Inside a frame, counting braces
    Capturing,
}

/// Byte-at-a-time frame extractor
#[derive(Debug)]
pub struct FrameExtractor {
    anchor: Vec<u8>,
    anchor_depth: usize,
    max_frame_len: usize,
    state: ScanState,
    cursor: usize,
    depth: usize,
    buffer: Vec<u8>,
    frames_emitted: u64,
    frames_aborted: u64,
}

impl FrameExtractor {
    /// Create an extractor for `anchor`, aborting frames longer than `max_frame_len`
    ///
    /// The anchor must leave at least one brace open, otherwise there is no
    /// closing brace to look for.
    pub fn new(anchor: &str, max_frame_len: usize) -> Result<Self> {
        let anchor = anchor.as_bytes().to_vec();
        if anchor.is_empty() {
            return Err(Error::Config("frame anchor must not be empty".to_string()));
        }

        let opens = anchor.iter().filter(|&&b| b == b'{').count();
        let closes = anchor.iter().filter(|&&b| b == b'}').count();
        if opens <= closes {
            return Err(Error::Config(format!(
                "frame anchor {:?} must leave an opening brace unmatched",
                String::from_utf8_lossy(&anchor)
            )));
        }

        if max_frame_len < anchor.len() {
            return Err(Error::Config(format!(
                "max frame length {} is shorter than the anchor ({} bytes)",
                max_frame_len,
                anchor.len()
            )));
        }

        Ok(Self {
            anchor_depth: opens - closes,
            anchor,
            max_frame_len,
            state: ScanState::Seeking,
            cursor: 0,
            depth: 0,
            buffer: Vec::with_capacity(max_frame_len),
            frames_emitted: 0,
            frames_aborted: 0,
        })
    }

    /// Feed one byte; returns a complete candidate document when one closes
    pub fn push(&mut self, byte: u8) -> Option<String> {
        match self.state {
            ScanState::Seeking => {
                if byte == self.anchor[self.cursor] {
                    self.cursor += 1;
                    if self.cursor == self.anchor.len() {
                        self.begin_frame();
                    }
                } else {
                    // No partial-prefix retry: the byte is not re-tested against anchor[0].
                    self.cursor = 0;
                }
                None
            }
            ScanState::Capturing => {
                self.buffer.push(byte);
                match byte {
                    b'{' => self.depth += 1,
                    b'}' => self.depth -= 1,
                    _ => {}
                }

                if self.buffer.len() > self.max_frame_len {
                    warn!(
                        "Framing error: frame exceeded {} bytes without closing, discarding",
                        self.max_frame_len
                    );
                    self.frames_aborted += 1;
                    self.reset();
                    return None;
                }

                if self.depth == 0 {
                    let frame = String::from_utf8_lossy(&self.buffer).into_owned();
                    debug!("Frame complete ({} bytes)", frame.len());
                    self.frames_emitted += 1;
                    self.reset();
                    return Some(frame);
                }
                None
            }
        }
    }

    /// Feed a slice of bytes, collecting every frame that closes within it
    pub fn push_slice(&mut self, bytes: &[u8]) -> Vec<String> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }

    /// True while inside a frame
    pub fn is_capturing(&self) -> bool {
        self.state == ScanState::Capturing
    }

    /// Bytes currently held for an unfinished frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Frames emitted since creation
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Frames discarded for exceeding the length cap
    pub fn frames_aborted(&self) -> u64 {
        self.frames_aborted
    }

    fn begin_frame(&mut self) {
        self.state = ScanState::Capturing;
        self.buffer.clear();
        self.buffer.extend_from_slice(&self.anchor);
        self.depth = self.anchor_depth;
    }

    fn reset(&mut self) {
        self.state = ScanState::Seeking;
        self.cursor = 0;
        self.depth = 0;
        self.buffer.clear();
    }
}

impl Default for FrameExtractor {
    fn default() -> Self {
        Self {
            anchor: DEFAULT_ANCHOR.as_bytes().to_vec(),
            anchor_depth: 1,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            state: ScanState::Seeking,
            cursor: 0,
            depth: 0,
            buffer: Vec::with_capacity(DEFAULT_MAX_FRAME_LEN),
            frames_emitted: 0,
            frames_aborted: 0,
        }
    }
}
