//! # Motion Relay Common Library
//!
//! Scanner-independent core of the motion relay:
//! - Frame extraction from the raw serial byte stream
//! - Telemetry message filtering
//! - Per-tag motion debounce and the tag registry
//! - Published snapshot bookkeeping
//! - Configuration loading

pub mod config;
pub mod error;
pub mod framing;
pub mod message;
pub mod registry;
pub mod snapshot;
pub mod tag;

pub use config::RelayConfig;
pub use error::{Error, Result};
pub use framing::FrameExtractor;
pub use message::{extract_motion_flags, MotionFlags};
pub use registry::TagRegistry;
pub use snapshot::{PublishedSnapshot, TagChange, TagStatus};
pub use tag::TagState;
