//! Instrumentation session: find the target process, attach, inject the hook.
//!
//! ```text
//! Detached -> Attaching -> Attached -> Loaded -> Unloading -> Detached
//! ```
//!
//! The session never outlives one bridge run. Start failures leave it
//! `Detached` with nothing attached.

mod backend;
#[cfg(feature = "frida")]
mod frida;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;

pub use backend::{
	AttachedProcess, InjectedScript, InstrumentationBackend, ProcessEntry, ScriptMessage,
	ScriptMessageHandler, SystemBackend, default_backend, snapshot_processes,
};
#[cfg(feature = "frida")]
pub use self::frida::FridaBackend;

use crate::error::{Error, Result};
use crate::notify::LogSink;
use crate::resources::ResourceLayout;

/// Executable name of the miniapp host process.
pub const DEFAULT_PROCESS_NAME: &str = "WeChatAppEx.exe";

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+").expect("valid regex"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstrumentationOptions {
	pub process_name: String,
	pub resources: ResourceLayout,
}

impl InstrumentationOptions {
	pub fn new(resources: ResourceLayout) -> Self {
		Self {
			process_name: DEFAULT_PROCESS_NAME.to_owned(),
			resources,
		}
	}

	pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
		self.process_name = name.into();
		self
	}
}

/// The process selected for injection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetProcessInfo {
	pub pid: u32,
	pub parent_pid: Option<u32>,
	pub name: String,
	pub executable_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscoveredTarget {
	pub process: TargetProcessInfo,
	pub version: u32,
}

/// Picks the parent pid shared by the most candidates.
///
/// Pids are stably sorted by ascending frequency and the last one wins, so
/// among equally frequent pids the one listed last in its first-seen order is
/// chosen: `[5, 5, 7]` yields 5, `[5, 7]` yields 7.
pub fn select_parent_pid(parents: &[u32]) -> Option<u32> {
	let mut counts: HashMap<u32, usize> = HashMap::new();
	for pid in parents {
		*counts.entry(*pid).or_default() += 1;
	}

	let mut sorted = parents.to_vec();
	sorted.sort_by_key(|pid| counts[pid]);
	sorted.pop()
}

/// Last run of ASCII digits in `path`, if it is a non-zero number.
pub fn detect_version(path: &Path) -> Option<u32> {
	let text = path.to_string_lossy();
	let last = DIGIT_RUN.find_iter(&text).last()?;
	match last.as_str().parse::<u32>() {
		Ok(0) | Err(_) => None,
		Ok(version) => Some(version),
	}
}

/// Locates the host process and the target version without attaching.
pub async fn discover_target(
	backend: &dyn InstrumentationBackend,
	process_name: &str,
) -> Result<DiscoveredTarget> {
	let processes = backend.enumerate_processes().await?;
	let not_found = || Error::ProcessNotFound {
		name: process_name.to_owned(),
	};

	let parents: Vec<u32> = processes
		.iter()
		.filter(|process| process.name == process_name)
		.map(|process| process.parent_pid.unwrap_or(0))
		.collect();
	let pid = select_parent_pid(&parents).ok_or_else(not_found)?;
	let process = processes
		.iter()
		.find(|process| process.pid == pid)
		.ok_or_else(not_found)?;

	let version = process
		.executable
		.as_deref()
		.and_then(detect_version)
		.ok_or_else(|| Error::VersionDetectionFailed {
			path: process.executable.clone(),
		})?;

	Ok(DiscoveredTarget {
		process: TargetProcessInfo {
			pid: process.pid,
			parent_pid: process.parent_pid,
			name: process.name.clone(),
			executable_path: process.executable.clone(),
		},
		version,
	})
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
	#[default]
	Detached,
	Attaching,
	Attached,
	Loaded,
	Unloading,
}

impl SessionState {
	pub fn as_str(self) -> &'static str {
		match self {
			SessionState::Detached => "detached",
			SessionState::Attaching => "attaching",
			SessionState::Attached => "attached",
			SessionState::Loaded => "loaded",
			SessionState::Unloading => "unloading",
		}
	}
}

pub struct InstrumentationSession {
	backend: Arc<dyn InstrumentationBackend>,
	options: InstrumentationOptions,
	sink: LogSink,
	state: SessionState,
	target: Option<DiscoveredTarget>,
	process: Option<Box<dyn AttachedProcess>>,
	script: Option<Box<dyn InjectedScript>>,
}

impl InstrumentationSession {
	pub fn new(
		backend: Arc<dyn InstrumentationBackend>,
		options: InstrumentationOptions,
		sink: LogSink,
	) -> Self {
		Self {
			backend,
			options,
			sink,
			state: SessionState::Detached,
			target: None,
			process: None,
			script: None,
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Version of the attached target, cleared by [`stop`](Self::stop).
	pub fn detected_version(&self) -> Option<u32> {
		self.target.as_ref().map(|target| target.version)
	}

	pub fn target(&self) -> Option<&TargetProcessInfo> {
		self.target.as_ref().map(|target| &target.process)
	}

	/// Discovers, attaches and loads the hook script.
	///
	/// On failure everything acquired so far is released before returning.
	pub async fn start(&mut self) -> Result<()> {
		if self.state != SessionState::Detached {
			return Err(Error::SessionActive(self.state.as_str()));
		}

		self.state = SessionState::Attaching;
		if let Err(err) = self.attach_and_load().await {
			self.stop().await;
			return Err(err);
		}
		Ok(())
	}

	async fn attach_and_load(&mut self) -> Result<()> {
		let target = discover_target(self.backend.as_ref(), &self.options.process_name).await?;
		let pid = target.process.pid;
		let version = target.version;
		self.sink.debug(format!(
			"[frida] found {} pid {pid}, version {version}",
			self.options.process_name
		));
		self.target = Some(target);

		let process = self.process.insert(self.backend.attach(pid).await?);
		self.state = SessionState::Attached;

		let resources = &self.options.resources;
		let script = resources.load_hook_script().await?;
		let config = resources.load_version_config(version).await?;
		let source = config.render_into(&script);

		let sink = self.sink.clone();
		let on_message: ScriptMessageHandler =
			Arc::new(move |message| sink.info(format!("[frida client] {message}")));
		let script = self.script.insert(process.create_script(&source, on_message).await?);
		script.load().await?;

		self.state = SessionState::Loaded;
		self.sink.info(format!(
			"[frida] script loaded, WMPF version: {version}, pid: {pid}"
		));
		Ok(())
	}

	/// Unloads the script and detaches, ignoring failures of either step.
	pub async fn stop(&mut self) {
		self.state = SessionState::Unloading;

		if let Some(mut script) = self.script.take() {
			if let Err(err) = script.unload().await {
				self.sink.debug(format!("[frida] unload failed: {err}"));
			}
		}
		if let Some(mut process) = self.process.take() {
			match process.detach().await {
				Ok(()) => self.sink.info("[frida] session detached"),
				Err(err) => self.sink.debug(format!("[frida] detach failed: {err}")),
			}
		}

		self.target = None;
		self.state = SessionState::Detached;
	}
}

impl std::fmt::Debug for InstrumentationSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InstrumentationSession")
			.field("options", &self.options)
			.field("state", &self.state)
			.field("target", &self.target)
			.finish_non_exhaustive()
	}
}
