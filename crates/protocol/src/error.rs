//! Codec error type.

use thiserror::Error;

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors produced while encoding or decoding debug envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
	/// The frame is not a valid envelope.
	#[error("malformed envelope: {0}")]
	Envelope(#[source] prost::DecodeError),

	/// The envelope decoded but its inner payload did not.
	#[error("malformed {category} payload: {source}")]
	Payload {
		category: String,
		#[source]
		source: prost::DecodeError,
	},

	/// No wire layout is known for this category.
	#[error("no payload layout for category '{0}'")]
	UnknownCategory(String),

	#[error("unsupported compression algorithm {0}")]
	UnsupportedCompression(u32),

	#[error("failed to inflate payload: {0}")]
	Inflate(#[source] std::io::Error),

	#[error("failed to deflate payload: {0}")]
	Deflate(#[source] std::io::Error),

	/// `original_size` disagrees with the inflated length.
	#[error("payload size mismatch: envelope declares {expected} bytes, got {actual}")]
	SizeMismatch { expected: u32, actual: usize },

	/// Payloads are sized with a `u32` on the wire.
	#[error("payload of {0} bytes does not fit in an envelope")]
	TooLarge(usize),
}
