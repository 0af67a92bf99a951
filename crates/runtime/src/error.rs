//! Error types for the bridge runtime.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the bridge.
#[derive(Debug, Error)]
pub enum Error {
	/// A socket server could not bind its listener.
	#[error("failed to bind {server} server on {addr}: {source}")]
	Bind {
		server: &'static str,
		addr: String,
		#[source]
		source: std::io::Error,
	},

	/// An inbound envelope could not be decoded.
	#[error("decode error: {0}")]
	Decode(#[from] wmpf_protocol::CodecError),

	/// Process enumeration itself failed.
	#[error("failed to enumerate processes: {0}")]
	Enumeration(String),

	/// No running process matched the target name.
	#[error("{name} process not found")]
	ProcessNotFound { name: String },

	/// The target's executable path carries no usable version number.
	#[error("could not detect target version from {}", path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "an unknown executable path".into()))]
	VersionDetectionFailed { path: Option<PathBuf> },

	/// The instrumentation runtime could not open a session on the process.
	#[error("failed to attach to process {pid}: {reason}")]
	AttachFailed { pid: u32, reason: String },

	/// The hook script asset is absent or unreadable.
	#[error("hook script not found: {}", path.display())]
	HookScriptMissing { path: PathBuf },

	/// The configuration for the detected version is absent or not valid JSON.
	#[error("version config not found: {version} ({reason})")]
	VersionConfigMissing {
		version: u32,
		path: PathBuf,
		reason: String,
	},

	/// The script was rejected by the instrumentation runtime.
	#[error("failed to load hook script: {0}")]
	ScriptLoadFailed(String),

	/// A run is already starting or running.
	#[error("bridge is already {0}")]
	AlreadyRunning(crate::BridgeStatus),

	/// The instrumentation session was started twice without a stop.
	#[error("instrumentation session is already {0}")]
	SessionActive(&'static str),

	/// Individual failures collected during stop.
	#[error("stop errors: {}", .0.join(", "))]
	AggregateStop(Vec<String>),

	/// A server task did not shut down cleanly.
	#[error("{server} server shutdown failed: {reason}")]
	Shutdown { server: &'static str, reason: String },

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns true for failures of the instrumentation phase of start.
	pub fn is_instrumentation(&self) -> bool {
		matches!(
			self,
			Error::Enumeration(_)
				| Error::ProcessNotFound { .. }
				| Error::VersionDetectionFailed { .. }
				| Error::AttachFailed { .. }
				| Error::HookScriptMissing { .. }
				| Error::VersionConfigMissing { .. }
				| Error::ScriptLoadFailed(_)
		)
	}
}
