//! # Motion Relay Library (motion-relay)
//!
//! Bridges a serial proximity-tag scanner to downstream consumers.
//!
//! **Tasks:**
//! - ingest: serial bytes → frames → motion flags → tag registry
//! - dispatch: periodic debounced-state reconciliation, SSE + UDP notification
//! - serve: HTTP viewer, snapshot query and SSE push channel

pub mod api;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod state;
pub mod udp;

pub use dispatch::ChangeDispatcher;
pub use error::{Error, Result};
pub use state::SharedState;
pub use udp::UdpNotifier;
