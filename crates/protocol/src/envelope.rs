//! The outer debug envelope and its frame codec.

use prost::Message;

use crate::error::{CodecError, Result};
use crate::payload::{Compression, Wrapped};

/// Category of inspector-protocol commands sent to the device.
pub const CATEGORY_DEVTOOLS: &str = "chromeDevtools";

/// Category of inspector-protocol responses and events coming from the device.
pub const CATEGORY_DEVTOOLS_RESULT: &str = "chromeDevtoolsResult";

/// One frame on the device-facing socket.
///
/// `seq` is assigned by the sender and increases by one per outbound envelope.
/// `data` is the wrapped inner payload, compressed according to `compress_algo`;
/// `original_size` is its length before compression.
#[derive(Clone, PartialEq, Message)]
pub struct DebugEnvelope {
	#[prost(uint32, tag = "1")]
	pub seq: u32,
	/// Delivery delay hint. Carried through unchanged; zero for envelopes we build.
	#[prost(uint32, tag = "2")]
	pub delay: u32,
	#[prost(string, tag = "3")]
	pub category: String,
	#[prost(bytes = "vec", tag = "4")]
	pub data: Vec<u8>,
	#[prost(uint32, tag = "5")]
	pub compress_algo: u32,
	#[prost(uint32, tag = "6")]
	pub original_size: u32,
}

impl DebugEnvelope {
	/// Builds an envelope around an already wrapped payload.
	pub fn new(seq: u32, category: impl Into<String>, wrapped: Wrapped, compression: Compression) -> Self {
		Self {
			seq,
			delay: 0,
			category: category.into(),
			data: wrapped.buffer,
			compress_algo: compression.id(),
			original_size: wrapped.original_size,
		}
	}

	pub fn compression(&self) -> Result<Compression> {
		Compression::from_id(self.compress_algo)
	}
}

/// Serializes an envelope into a single binary frame.
pub fn encode(envelope: &DebugEnvelope) -> Vec<u8> {
	envelope.encode_to_vec()
}

/// Parses a binary frame into an envelope.
pub fn decode(frame: &[u8]) -> Result<DebugEnvelope> {
	<DebugEnvelope as Message>::decode(frame).map_err(CodecError::Envelope)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> DebugEnvelope {
		DebugEnvelope {
			seq: 42,
			delay: 0,
			category: CATEGORY_DEVTOOLS_RESULT.to_string(),
			data: vec![1, 2, 3, 250],
			compress_algo: 0,
			original_size: 4,
		}
	}

	#[test]
	fn decode_reverses_encode() {
		let envelope = sample();
		let decoded = decode(&encode(&envelope)).unwrap();
		assert_eq!(decoded, envelope);
	}

	#[test]
	fn nonzero_delay_survives() {
		let envelope = DebugEnvelope {
			delay: 17,
			..sample()
		};
		assert_eq!(decode(&encode(&envelope)).unwrap().delay, 17);
	}

	#[test]
	fn truncated_varint_is_rejected() {
		// field 1, varint, continuation bit set with no following byte
		let err = decode(&[0x08, 0xFF]).unwrap_err();
		assert!(matches!(err, CodecError::Envelope(_)), "got {err:?}");
	}

	#[test]
	fn wrong_wire_type_is_rejected() {
		// field 1 declared as length-delimited although `seq` is a varint
		let err = decode(&[0x0A, 0x01, 0x00]).unwrap_err();
		assert!(matches!(err, CodecError::Envelope(_)));
	}

	#[test]
	fn empty_frame_is_default_envelope() {
		let envelope = decode(&[]).unwrap();
		assert_eq!(envelope.seq, 0);
		assert!(envelope.category.is_empty());
		assert!(envelope.data.is_empty());
	}

	#[test]
	fn unknown_compression_id_is_reported() {
		let envelope = DebugEnvelope {
			compress_algo: 9,
			..sample()
		};
		assert!(matches!(
			envelope.compression(),
			Err(CodecError::UnsupportedCompression(9))
		));
	}
}
