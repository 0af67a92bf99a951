//! One bridge run: relay bus, both socket servers and the instrumentation session.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bus::RelayBus;
use crate::device::DeviceServer;
use crate::error::{Error, Result};
use crate::inspector::InspectorServer;
use crate::instrument::{InstrumentationBackend, InstrumentationOptions, InstrumentationSession};
use crate::notify::{BridgeStatus, LogSink, Notifier};

pub const DEFAULT_DEVICE_PORT: u16 = 9421;
pub const DEFAULT_INSPECTOR_PORT: u16 = 62000;
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Listening ports of the two socket servers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgePorts {
	/// Where the miniapp runtime connects.
	pub device: u16,
	/// Where DevTools front-ends connect.
	pub inspector: u16,
}

impl Default for BridgePorts {
	fn default() -> Self {
		Self {
			device: DEFAULT_DEVICE_PORT,
			inspector: DEFAULT_INSPECTOR_PORT,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeOptions {
	pub host: String,
	pub ports: BridgePorts,
	pub instrumentation: InstrumentationOptions,
}

impl BridgeOptions {
	pub fn new(instrumentation: InstrumentationOptions) -> Self {
		Self {
			host: DEFAULT_HOST.to_owned(),
			ports: BridgePorts::default(),
			instrumentation,
		}
	}

	/// DevTools front-end URL pointing at the inspector-facing server.
	pub fn devtools_url(&self) -> String {
		format!(
			"devtools://devtools/bundled/inspector.html?ws={}:{}",
			self.host, self.ports.inspector
		)
	}
}

struct Components {
	device: DeviceServer,
	inspector: InspectorServer,
	session: InstrumentationSession,
}

/// Orchestrates a single run.
///
/// Components are built fresh on every [`start`](Self::start) and torn down by
/// [`stop`](Self::stop); the status lives in the shared [`Notifier`].
pub struct Bridge {
	options: BridgeOptions,
	notifier: Notifier,
	sink: LogSink,
	backend: Arc<dyn InstrumentationBackend>,
	components: Option<Components>,
}

impl Bridge {
	pub fn new(
		options: BridgeOptions,
		notifier: Notifier,
		backend: Arc<dyn InstrumentationBackend>,
	) -> Self {
		let sink = notifier.sink();
		Self {
			options,
			notifier,
			sink,
			backend,
			components: None,
		}
	}

	pub fn options(&self) -> &BridgeOptions {
		&self.options
	}

	pub fn status(&self) -> BridgeStatus {
		self.notifier.status()
	}

	/// Starts device server, inspector server and session, in that order.
	///
	/// Rejected while a run is starting or running. Any failure tears down
	/// what was started, leaves the status at `Error` and is returned as is.
	pub async fn start(&mut self) -> Result<()> {
		let status = self.status();
		if status.is_active() {
			return Err(Error::AlreadyRunning(status));
		}

		self.notifier.set_status(BridgeStatus::Starting);
		let bus = Arc::new(RelayBus::new());
		let host = &self.options.host;
		let ports = self.options.ports;
		let components = self.components.insert(Components {
			device: DeviceServer::new(host, ports.device, Arc::clone(&bus), self.sink.clone()),
			inspector: InspectorServer::new(host, ports.inspector, bus, self.sink.clone()),
			session: InstrumentationSession::new(
				Arc::clone(&self.backend),
				self.options.instrumentation.clone(),
				self.sink.clone(),
			),
		});

		let started = async {
			components.device.start().await?;
			components.inspector.start().await?;
			components.session.start().await
		}
		.await;

		match started {
			Ok(()) => {
				self.notifier.set_status(BridgeStatus::Running);
				self.sink.info("[debugger] all services started successfully");
				Ok(())
			}
			Err(err) => {
				self.sink.error(format!("[debugger] start failed: {err}"));
				self.teardown().await;
				self.notifier.set_status(BridgeStatus::Error);
				Err(err)
			}
		}
	}

	/// Tears everything down in reverse start order and returns to `Idle`.
	///
	/// Never fails; individual errors are logged as one aggregate line.
	/// Stopping an idle bridge does nothing.
	pub async fn stop(&mut self) {
		if self.components.is_none() && self.status() == BridgeStatus::Idle {
			return;
		}
		self.teardown().await;
		self.notifier.set_status(BridgeStatus::Idle);
	}

	async fn teardown(&mut self) {
		let Some(mut components) = self.components.take() else {
			return;
		};
		self.sink.info("[debugger] stopping all services...");

		components.session.stop().await;
		let mut errors = Vec::new();
		if let Err(err) = components.inspector.stop().await {
			errors.push(err.to_string());
		}
		if let Err(err) = components.device.stop().await {
			errors.push(err.to_string());
		}

		report_stop(&self.sink, errors);
	}

	/// Version of the attached target while running.
	pub fn detected_version(&self) -> Option<u32> {
		self.components
			.as_ref()
			.and_then(|c| c.session.detected_version())
	}

	pub fn device_addr(&self) -> Option<SocketAddr> {
		self.components.as_ref().and_then(|c| c.device.local_addr())
	}

	pub fn inspector_addr(&self) -> Option<SocketAddr> {
		self.components.as_ref().and_then(|c| c.inspector.local_addr())
	}

	/// Connected (device, inspector) client counts.
	pub fn client_counts(&self) -> (usize, usize) {
		self.components.as_ref().map_or((0, 0), |c| {
			(c.device.client_count(), c.inspector.client_count())
		})
	}
}

/// One summary line for a teardown: success, or every failure at once.
fn report_stop(sink: &LogSink, errors: Vec<String>) {
	if errors.is_empty() {
		sink.info("[debugger] all services stopped");
	} else {
		sink.error(format!("[debugger] {}", Error::AggregateStop(errors)));
	}
}

impl std::fmt::Debug for Bridge {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Bridge")
			.field("options", &self.options)
			.field("status", &self.status())
			.field("running", &self.components.is_some())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::notify::LogLevel;
	use crate::resources::ResourceLayout;

	#[test]
	fn default_ports_match_the_desktop_app() {
		let ports = BridgePorts::default();
		assert_eq!((ports.device, ports.inspector), (9421, 62000));
		assert_eq!(
			serde_json::to_string(&ports).unwrap(),
			r#"{"device":9421,"inspector":62000}"#
		);
	}

	#[test]
	fn stop_failures_are_logged_as_one_line() {
		let notifier = Notifier::new();
		report_stop(
			&notifier.sink(),
			vec![
				"proxy server shutdown failed: task panicked".into(),
				"debug server shutdown failed: task panicked".into(),
			],
		);
		report_stop(&notifier.sink(), Vec::new());

		let logs = notifier.recent_logs();
		assert_eq!(logs.len(), 2);
		assert_eq!(logs[0].level, LogLevel::Error);
		assert_eq!(
			logs[0].message,
			"[debugger] stop errors: proxy server shutdown failed: task panicked, \
			 debug server shutdown failed: task panicked"
		);
		assert_eq!(logs[1].level, LogLevel::Info);
		assert_eq!(logs[1].message, "[debugger] all services stopped");
	}

	#[test]
	fn devtools_url_targets_the_inspector_port() {
		let mut options = BridgeOptions::new(InstrumentationOptions::new(ResourceLayout::new("res")));
		options.ports.inspector = 62001;
		assert_eq!(
			options.devtools_url(),
			"devtools://devtools/bundled/inspector.html?ws=127.0.0.1:62001"
		);
	}
}
