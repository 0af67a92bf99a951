//! Control surface for the host application.
//!
//! Holds at most one [`Bridge`] and answers the four control operations with
//! a [`ControlResult`] instead of an error, the way a UI would consume them.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

use crate::bridge::{Bridge, BridgeOptions, BridgePorts};
use crate::error::{Error, Result};
use crate::instrument::{DiscoveredTarget, InstrumentationBackend, discover_target};
use crate::notify::{BridgeStatus, LogEvent, Notifier};

/// Outcome of a control operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ControlResult {
	pub success: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ControlResult {
	pub fn ok() -> Self {
		Self {
			success: true,
			error: None,
		}
	}

	pub fn failed(error: impl ToString) -> Self {
		Self {
			success: false,
			error: Some(error.to_string()),
		}
	}
}

impl<E: std::fmt::Display> From<std::result::Result<(), E>> for ControlResult {
	fn from(result: std::result::Result<(), E>) -> Self {
		match result {
			Ok(()) => Self::ok(),
			Err(err) => Self::failed(err),
		}
	}
}

/// What `probe` found without attaching.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
	pub target: DiscoveredTarget,
	pub config_path: PathBuf,
	pub config_available: bool,
}

pub struct BridgeHost {
	options: BridgeOptions,
	notifier: Notifier,
	backend: Arc<dyn InstrumentationBackend>,
	bridge: Mutex<Option<Bridge>>,
}

impl BridgeHost {
	pub fn new(options: BridgeOptions, backend: Arc<dyn InstrumentationBackend>) -> Self {
		Self::with_notifier(options, backend, Notifier::new())
	}

	pub fn with_notifier(
		options: BridgeOptions,
		backend: Arc<dyn InstrumentationBackend>,
		notifier: Notifier,
	) -> Self {
		Self {
			options,
			notifier,
			backend,
			bridge: Mutex::new(None),
		}
	}

	pub fn options(&self) -> &BridgeOptions {
		&self.options
	}

	pub fn notifier(&self) -> &Notifier {
		&self.notifier
	}

	/// Starts a fresh run on `ports`, replacing a stopped or failed one.
	pub async fn start(&self, ports: BridgePorts) -> ControlResult {
		self.try_start(ports).await.into()
	}

	/// Like [`start`](Self::start), keeping the typed error.
	pub async fn try_start(&self, ports: BridgePorts) -> Result<()> {
		let status = self.status();
		if status.is_active() {
			return Err(Error::AlreadyRunning(status));
		}

		let mut slot = self.bridge.lock().await;
		let status = self.status();
		if status.is_active() {
			return Err(Error::AlreadyRunning(status));
		}
		if let Some(mut previous) = slot.take() {
			previous.stop().await;
		}

		let mut options = self.options.clone();
		options.ports = ports;
		let bridge = slot.insert(Bridge::new(options, self.notifier.clone(), Arc::clone(&self.backend)));
		bridge.start().await
	}

	/// Stops the current run, if any.
	pub async fn stop(&self) -> ControlResult {
		if let Some(mut bridge) = self.bridge.lock().await.take() {
			bridge.stop().await;
		}
		ControlResult::ok()
	}

	/// Target versions with a configuration file, highest first.
	pub fn available_versions(&self) -> Vec<u32> {
		self.options.instrumentation.resources.available_versions()
	}

	pub fn status(&self) -> BridgeStatus {
		self.notifier.status()
	}

	pub async fn detected_version(&self) -> Option<u32> {
		self.bridge.lock().await.as_ref().and_then(Bridge::detected_version)
	}

	/// Bound (device, inspector) addresses of the current run.
	pub async fn addresses(&self) -> Option<(SocketAddr, SocketAddr)> {
		let slot = self.bridge.lock().await;
		let bridge = slot.as_ref()?;
		Some((bridge.device_addr()?, bridge.inspector_addr()?))
	}

	/// Connected (device, inspector) clients of the current run.
	pub async fn client_counts(&self) -> (usize, usize) {
		self.bridge
			.lock()
			.await
			.as_ref()
			.map_or((0, 0), Bridge::client_counts)
	}

	pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEvent> {
		self.notifier.subscribe_logs()
	}

	pub fn subscribe_status(&self) -> broadcast::Receiver<BridgeStatus> {
		self.notifier.subscribe_status()
	}

	pub fn recent_logs(&self) -> Vec<LogEvent> {
		self.notifier.recent_logs()
	}

	/// Finds the target process and checks for a matching configuration.
	pub async fn probe(&self) -> Result<ProbeReport> {
		let instrumentation = &self.options.instrumentation;
		let target = discover_target(self.backend.as_ref(), &instrumentation.process_name).await?;
		let config_path = instrumentation.resources.version_config(target.version);
		let config_available = tokio::fs::try_exists(&config_path).await.unwrap_or(false);
		Ok(ProbeReport {
			target,
			config_path,
			config_available,
		})
	}
}

impl std::fmt::Debug for BridgeHost {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BridgeHost")
			.field("options", &self.options)
			.field("status", &self.status())
			.finish_non_exhaustive()
	}
}
