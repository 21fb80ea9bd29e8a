//! # shmif-bridge
//!
//! Toolkit driver bridge for the Arcan shared-memory segment protocol.
//!
//! A windowing/multimedia toolkit drives this crate through a fixed table of
//! driver callbacks ([`driver::VideoDriver`], [`driver::AudioDriver`]). The
//! bridge turns those into segment negotiations, outbound protocol events
//! and buffer writes, and turns the compositor's event stream back into
//! toolkit events.
//!
//! # Architecture
//!
//! ```text
//! shmif-bridge
//!   ├─> Connection Bootstrap (one primary segment, shared by audio and video)
//!   │     └─> Shared Connection State (mutex, refcount, registry, pending queue)
//!   ├─> Segment Registry (8 window slots, SEGREQ → NEWSEGMENT / REQFAIL)
//!   ├─> Event Translator (IO / TARGET → toolkit events, mouse aggregation)
//!   ├─> Audio Transfer Engine (mix buffer → audio ring, signal on full)
//!   ├─> GL Context Bridge (contexts per segment, default FBO redirect)
//!   └─> Cursor (labels, bitmap cursor segment, relative mode hints)
//! ```
//!
//! # Data Flow
//!
//! **Input Path:** Compositor → Segment poll → Event Translator → Toolkit
//!
//! **Output Path:** Toolkit → Video/Audio device → Segment enqueue / buffers → Compositor
//!
//! The [`transport`] module is the seam to the client library; its
//! [`loopback`](transport::loopback) implementation runs a compositor
//! in-process.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Audio output device and ring transfer
pub mod audio;

/// Configuration
pub mod config;

/// Connection bootstrap and shared state
pub mod connection;

/// Cursor management
pub mod cursor;

/// Host driver tables
pub mod driver;

/// Error classification
pub mod error;

/// Protocol to toolkit event translation
pub mod events;

/// GL context bridge
pub mod gl;

/// Typed protocol events and constants
pub mod protocol;

/// Secondary segment registry
pub mod registry;

/// Client library seam and loopback transport
pub mod transport;

/// Identifiers shared across modules
pub mod types;

/// Diagnostics and error formatting
pub mod utils;

/// Video device
pub mod video;

pub use error::ErrorKind;
