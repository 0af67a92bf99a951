//! Wire types for the miniapp remote-debug channel.
//!
//! The debugged runtime speaks a binary protocol: every WebSocket frame is one
//! protobuf-encoded [`DebugEnvelope`]. The envelope carries a category tag and an
//! opaque, optionally compressed `data` buffer whose layout depends on that tag.
//!
//! ```text
//! ┌──────────────────────── DebugEnvelope ────────────────────────┐
//! │ seq │ delay │ category │ data │ compress_algo │ original_size │
//! └────────────────────────────┬──────────────────────────────────┘
//!                              │ wrap / unwrap
//!                     ┌────────▼────────┐
//!                     │ DevtoolsPayload │  op_id, payload (CDP text), jscontext_id
//!                     └─────────────────┘
//! ```
//!
//! Only the two devtools categories are interpreted; everything else is
//! surfaced as [`MessageData::Opaque`] so callers can log and drop it.

pub mod envelope;
pub mod error;
pub mod payload;

pub use envelope::{CATEGORY_DEVTOOLS, CATEGORY_DEVTOOLS_RESULT, DebugEnvelope, decode, encode};
pub use error::{CodecError, Result};
pub use payload::{
	Compression, DevtoolsPayload, MessageData, UnwrappedMessage, Wrapped, is_devtools_category,
	unwrap, wrap,
};
