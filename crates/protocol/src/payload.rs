//! Inner payloads carried in an envelope's `data` field.

use std::io::{Read, Write};

use flate2::Compression as Level;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use prost::Message;

use crate::envelope::{CATEGORY_DEVTOOLS, CATEGORY_DEVTOOLS_RESULT, DebugEnvelope};
use crate::error::{CodecError, Result};

/// Upper bound for an inflated payload when the envelope does not declare its size.
const MAX_INFLATED_SIZE: u64 = 64 * 1024 * 1024;

/// Inspector-protocol message wrapped for the device.
///
/// Used for both directions: [`CATEGORY_DEVTOOLS`] carries commands from the
/// inspector, [`CATEGORY_DEVTOOLS_RESULT`] carries responses and events back.
#[derive(Clone, PartialEq, Message)]
pub struct DevtoolsPayload {
	/// Opaque correlation id chosen by the sender.
	#[prost(uint32, tag = "1")]
	pub op_id: u32,
	/// One complete inspector-protocol message, as text.
	#[prost(string, tag = "2")]
	pub payload: String,
	#[prost(string, tag = "3")]
	pub jscontext_id: String,
}

impl DevtoolsPayload {
	pub fn new(op_id: u32, payload: impl Into<String>) -> Self {
		Self {
			op_id,
			payload: payload.into(),
			jscontext_id: String::new(),
		}
	}
}

/// Compression applied to an envelope's `data`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
	#[default]
	None,
	Zlib,
}

impl Compression {
	pub fn from_id(id: u32) -> Result<Self> {
		match id {
			0 => Ok(Self::None),
			1 => Ok(Self::Zlib),
			other => Err(CodecError::UnsupportedCompression(other)),
		}
	}

	pub fn id(self) -> u32 {
		match self {
			Self::None => 0,
			Self::Zlib => 1,
		}
	}

	fn compress(self, raw: Vec<u8>) -> Result<Vec<u8>> {
		match self {
			Self::None => Ok(raw),
			Self::Zlib => {
				let mut encoder = ZlibEncoder::new(Vec::new(), Level::default());
				encoder.write_all(&raw).map_err(CodecError::Deflate)?;
				encoder.finish().map_err(CodecError::Deflate)
			}
		}
	}

	fn decompress(self, data: &[u8], original_size: u32) -> Result<Vec<u8>> {
		let inflated = match self {
			Self::None => data.to_vec(),
			Self::Zlib => {
				let limit = if original_size == 0 {
					MAX_INFLATED_SIZE
				} else {
					u64::from(original_size)
				};
				// one extra byte so an oversized stream shows up as a mismatch
				let mut out = Vec::new();
				ZlibDecoder::new(data)
					.take(limit + 1)
					.read_to_end(&mut out)
					.map_err(CodecError::Inflate)?;
				out
			}
		};

		if original_size != 0 && inflated.len() != original_size as usize {
			return Err(CodecError::SizeMismatch {
				expected: original_size,
				actual: inflated.len(),
			});
		}
		Ok(inflated)
	}
}

/// A payload ready to be placed in [`DebugEnvelope::data`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wrapped {
	pub buffer: Vec<u8>,
	/// Length of the serialized payload before compression.
	pub original_size: u32,
}

/// Decoded content of an envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum MessageData {
	Devtools(DevtoolsPayload),
	/// Payload of a category this codec does not interpret, decompressed.
	Opaque(Vec<u8>),
}

impl MessageData {
	/// The inspector-protocol text, when this is a devtools payload.
	pub fn payload(&self) -> Option<&str> {
		match self {
			Self::Devtools(devtools) => Some(&devtools.payload),
			Self::Opaque(_) => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnwrappedMessage {
	pub category: String,
	pub data: MessageData,
}

pub fn is_devtools_category(category: &str) -> bool {
	category == CATEGORY_DEVTOOLS || category == CATEGORY_DEVTOOLS_RESULT
}

/// Serializes and compresses a devtools payload for the given category.
pub fn wrap(raw: &DevtoolsPayload, category: &str, compress_algo: u32) -> Result<Wrapped> {
	if !is_devtools_category(category) {
		return Err(CodecError::UnknownCategory(category.to_string()));
	}
	let compression = Compression::from_id(compress_algo)?;

	let serialized = raw.encode_to_vec();
	let original_size =
		u32::try_from(serialized.len()).map_err(|_| CodecError::TooLarge(serialized.len()))?;

	Ok(Wrapped {
		buffer: compression.compress(serialized)?,
		original_size,
	})
}

/// Decompresses and decodes an envelope's payload.
///
/// Returns `Ok(None)` for an envelope that carries no data: it is well formed
/// but there is nothing to act on.
pub fn unwrap(envelope: &DebugEnvelope) -> Result<Option<UnwrappedMessage>> {
	if envelope.data.is_empty() {
		return Ok(None);
	}

	let compression = envelope.compression()?;
	let raw = compression.decompress(&envelope.data, envelope.original_size)?;

	let data = if is_devtools_category(&envelope.category) {
		let devtools =
			DevtoolsPayload::decode(raw.as_slice()).map_err(|source| CodecError::Payload {
				category: envelope.category.clone(),
				source,
			})?;
		MessageData::Devtools(devtools)
	} else {
		MessageData::Opaque(raw)
	};

	Ok(Some(UnwrappedMessage {
		category: envelope.category.clone(),
		data,
	}))
}
