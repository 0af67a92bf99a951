//! Structured output for CLI commands.
//!
//! ## Output Contract
//!
//! With `--format json` every one-shot command prints one result envelope on
//! stdout:
//!
//! ```json
//! { "ok": true, "command": "versions", "data": [13331, 11633], "timings": { "durationMs": 3 } }
//! ```
//!
//! On failure:
//!
//! ```json
//! { "ok": false, "command": "start", "error": { "code": "PROCESS_NOT_FOUND", "message": "..." } }
//! ```
//!
//! `start` additionally streams one JSON object per line for every log event
//! and status change while the bridge runs.

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use wmpf_runtime::{BridgeStatus, LogEvent};

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON envelopes; streamed events as one object per line
	Json,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"text" => Ok(OutputFormat::Text),
			"json" => Ok(OutputFormat::Json),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

/// The result envelope returned by one-shot commands.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub ok: bool,

	/// Command name (e.g., "start", "versions")
	pub command: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,
	pub message: String,
}

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// A listener port is taken
	BindFailed,
	/// The miniapp host process is not running
	ProcessNotFound,
	/// The host executable path carries no version
	VersionDetectionFailed,
	/// Attach or script injection failed
	InjectionFailed,
	/// Hook script or version config missing or invalid
	ResourceMissing,
	/// A bridge run is already active
	AlreadyRunning,
	/// Configuration file could not be used
	ConfigError,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ErrorCode::BindFailed => write!(f, "BIND_FAILED"),
			ErrorCode::ProcessNotFound => write!(f, "PROCESS_NOT_FOUND"),
			ErrorCode::VersionDetectionFailed => write!(f, "VERSION_DETECTION_FAILED"),
			ErrorCode::InjectionFailed => write!(f, "INJECTION_FAILED"),
			ErrorCode::ResourceMissing => write!(f, "RESOURCE_MISSING"),
			ErrorCode::AlreadyRunning => write!(f, "ALREADY_RUNNING"),
			ErrorCode::ConfigError => write!(f, "CONFIG_ERROR"),
			ErrorCode::IoError => write!(f, "IO_ERROR"),
			ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

/// Builder for constructing command results
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
		}
	}
}

/// Print a command result to stdout; text mode prints only the data.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	let mut stdout = io::stdout().lock();
	if let Some(error) = &result.error {
		let _ = writeln!(stdout, "Error [{}]: {}", error.code, error.message);
		return;
	}
	let Some(data) = &result.data else {
		return;
	};
	match serde_json::to_value(data) {
		Ok(serde_json::Value::String(s)) => {
			let _ = writeln!(stdout, "{s}");
		}
		Ok(serde_json::Value::Array(items)) => {
			for item in items {
				let _ = writeln!(stdout, "{}", render_scalar(&item));
			}
		}
		Ok(value) => {
			if let Ok(pretty) = serde_json::to_string_pretty(&value) {
				let _ = writeln!(stdout, "{pretty}");
			}
		}
		Err(_) => {}
	}
}

fn render_scalar(value: &serde_json::Value) -> String {
	match value {
		serde_json::Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

/// One streamed notification while `start` runs.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum StreamEvent<'a> {
	/// The bridge is running and DevTools can connect.
	#[serde(rename_all = "camelCase")]
	Ready {
		devtools_url: &'a str,
		device_addr: Option<SocketAddr>,
		inspector_addr: Option<SocketAddr>,
		version: Option<u32>,
	},
	Log(&'a LogEvent),
	Status { status: BridgeStatus },
	/// Log events dropped because the reader fell behind.
	Lagged { skipped: u64 },
}

/// Writes a notification as one JSON line on stdout.
///
/// Text mode prints nothing: log lines already reach stderr through tracing.
pub fn print_event(event: &StreamEvent<'_>, format: OutputFormat) {
	if format != OutputFormat::Json {
		return;
	}
	if let Ok(line) = serde_json::to_string(event) {
		let mut stdout = io::stdout().lock();
		let _ = writeln!(stdout, "{line}");
		let _ = stdout.flush();
	}
}

