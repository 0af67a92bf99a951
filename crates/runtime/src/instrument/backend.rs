//! Seams to the process-inspection and code-injection runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use sysinfo::{ProcessesToUpdate, System};

use crate::error::{Error, Result};

/// One row of a process listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessEntry {
	pub pid: u32,
	pub parent_pid: Option<u32>,
	pub name: String,
	pub executable: Option<PathBuf>,
}

/// Called with every message an injected script posts, as JSON text.
pub type ScriptMessageHandler = Arc<dyn Fn(String) + Send + Sync>;

/// A message posted by an injected script.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptMessage {
	/// `send(payload)` from the script.
	Send { payload: Value },
	/// `console.*` output.
	Log { level: String, payload: String },
	/// An uncaught exception.
	Error {
		description: String,
		stack: Option<String>,
	},
	/// Anything else, passed through as received.
	Other(Value),
}

impl ScriptMessage {
	/// JSON text in the runtime's own message shape, e.g.
	/// `{"type":"log","level":"info","payload":"hooked"}`.
	pub fn to_json(&self) -> String {
		let value = match self {
			ScriptMessage::Send { payload } => json!({ "type": "send", "payload": payload }),
			ScriptMessage::Log { level, payload } => {
				json!({ "type": "log", "level": level, "payload": payload })
			}
			ScriptMessage::Error { description, stack } => {
				let mut value = json!({ "type": "error", "description": description });
				if let Some(stack) = stack {
					value["stack"] = json!(stack);
				}
				value
			}
			ScriptMessage::Other(value) => value.clone(),
		};
		value.to_string()
	}
}

/// Enumerates processes and opens instrumentation sessions on them.
#[async_trait]
pub trait InstrumentationBackend: Send + Sync {
	async fn enumerate_processes(&self) -> Result<Vec<ProcessEntry>>;

	/// Opens a session on `pid`. Failures map to [`Error::AttachFailed`].
	async fn attach(&self, pid: u32) -> Result<Box<dyn AttachedProcess>>;
}

/// A live session on one process.
#[async_trait]
pub trait AttachedProcess: Send {
	/// Compiles `source` inside the target. Messages it posts go to `on_message`.
	async fn create_script(
		&mut self,
		source: &str,
		on_message: ScriptMessageHandler,
	) -> Result<Box<dyn InjectedScript>>;

	async fn detach(&mut self) -> Result<()>;
}

/// A script created in an attached process.
#[async_trait]
pub trait InjectedScript: Send {
	async fn load(&mut self) -> Result<()>;

	async fn unload(&mut self) -> Result<()>;
}

/// Lists processes through the operating system.
pub fn snapshot_processes() -> Vec<ProcessEntry> {
	let mut system = System::new();
	system.refresh_processes(ProcessesToUpdate::All, true);
	system
		.processes()
		.values()
		.map(|process| ProcessEntry {
			pid: process.pid().as_u32(),
			parent_pid: process.parent().map(|pid| pid.as_u32()),
			name: process.name().to_string_lossy().into_owned(),
			executable: process.exe().map(Path::to_path_buf),
		})
		.collect()
}

pub(crate) async fn enumerate_with_sysinfo() -> Result<Vec<ProcessEntry>> {
	tokio::task::spawn_blocking(snapshot_processes)
		.await
		.map_err(|err| Error::Enumeration(err.to_string()))
}

/// Process discovery only; builds without the `frida` feature cannot inject.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBackend;

#[async_trait]
impl InstrumentationBackend for SystemBackend {
	async fn enumerate_processes(&self) -> Result<Vec<ProcessEntry>> {
		enumerate_with_sysinfo().await
	}

	async fn attach(&self, pid: u32) -> Result<Box<dyn AttachedProcess>> {
		Err(Error::AttachFailed {
			pid,
			reason: "no injection runtime in this build (enable the `frida` feature)".into(),
		})
	}
}

/// The backend this build was compiled with.
pub fn default_backend() -> Arc<dyn InstrumentationBackend> {
	#[cfg(feature = "frida")]
	{
		Arc::new(super::frida::FridaBackend::new())
	}
	#[cfg(not(feature = "frida"))]
	{
		Arc::new(SystemBackend)
	}
}
