//! Serial ingest task
//!
//! Reads the scanner one byte at a time and drives framing → filtering →
//! registry update in arrival order. Runs on a blocking thread; the read
//! timeout bounds every read so the shutdown flag is checked at least once
//! per timeout.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::time::Instant;

use motion_common::config::{FramingConfig, SerialConfig};
use motion_common::{extract_motion_flags, FrameExtractor};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::state::SharedState;

/// Open the scanner port: 8 data bits, no parity, one stop bit
pub fn open_port(config: &SerialConfig) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(config.port.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(config.read_timeout())
        .open()?;
    Ok(port)
}

/// Ask the scanner to start reporting
pub fn activate<W: Write + ?Sized>(port: &mut W, command: &str) -> Result<()> {
    info!("Starting scanning");
    port.write_all(command.as_bytes()).map_err(Error::Transport)?;
    port.flush().map_err(Error::Transport)?;
    Ok(())
}

/// Byte-stream consumer feeding the tag registry
pub struct Ingest {
    extractor: FrameExtractor,
    state: Arc<SharedState>,
}

impl Ingest {
    pub fn new(framing: &FramingConfig, state: Arc<SharedState>) -> Result<Self> {
        let extractor = FrameExtractor::new(&framing.anchor, framing.max_frame_len)?;
        Ok(Self { extractor, state })
    }

    /// Process one byte received at `now`
    pub fn feed(&mut self, byte: u8, now: Instant) {
        if let Some(frame) = self.extractor.push(byte) {
            let flags = extract_motion_flags(&frame);
            if !flags.is_empty() {
                self.state.registry.apply(&flags, now);
            }
        }
    }

    /// Read until end of stream, shutdown, or a transport failure
    pub fn read_stream<R: Read + ?Sized>(
        &mut self,
        reader: &mut R,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<()> {
        let mut byte = [0u8; 1];
        loop {
            // A dropped sender means the owner is gone
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                info!("Ingest stopping on shutdown");
                return Ok(());
            }

            match reader.read(&mut byte) {
                Ok(0) => {
                    warn!("Serial stream ended");
                    return Ok(());
                }
                Ok(_) => self.feed(byte[0], Instant::now()),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    debug!("Serial read timed out");
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Transport(e)),
            }
        }
    }

    pub fn extractor(&self) -> &FrameExtractor {
        &self.extractor
    }
}

/// Open the port, activate the scanner and ingest until shutdown
///
/// Blocking; run it with `tokio::task::spawn_blocking`. Any transport error
/// ends the task.
pub fn run(
    serial: &SerialConfig,
    framing: &FramingConfig,
    state: Arc<SharedState>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut ingest = Ingest::new(framing, state)?;

    let mut port = open_port(serial)?;
    info!("Listening on {} at {} baud", serial.port, serial.baud_rate);

    std::thread::sleep(serial.activation_delay());
    activate(port.as_mut(), &serial.activation_command)?;

    let result = ingest.read_stream(port.as_mut(), &shutdown);
    info!(
        "Ingest finished: {} frames, {} discarded",
        ingest.extractor().frames_emitted(),
        ingest.extractor().frames_aborted()
    );
    result
}
