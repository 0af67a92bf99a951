//! Log and status notifications pushed to the host application.
//!
//! Every component reports through a [`LogSink`]; the sinks all feed the one
//! [`Notifier`] owned by the host, which fans events out to subscribers, keeps
//! a short replay history and mirrors each line into `tracing`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info};

/// Number of log events kept for late subscribers.
pub const LOG_HISTORY_LIMIT: usize = 500;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Info,
	Error,
	Debug,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
	pub level: LogLevel,
	pub message: String,
	/// Milliseconds since the Unix epoch.
	pub timestamp: u64,
}

impl LogEvent {
	pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
		let timestamp = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|elapsed| elapsed.as_millis() as u64)
			.unwrap_or_default();
		Self {
			level,
			message: message.into(),
			timestamp,
		}
	}
}

/// Lifecycle state of a bridge run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
	#[default]
	Idle,
	Starting,
	Running,
	Error,
}

impl BridgeStatus {
	/// True while a run owns sockets or an instrumentation session.
	pub fn is_active(self) -> bool {
		matches!(self, BridgeStatus::Starting | BridgeStatus::Running)
	}
}

impl fmt::Display for BridgeStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			BridgeStatus::Idle => "idle",
			BridgeStatus::Starting => "starting",
			BridgeStatus::Running => "running",
			BridgeStatus::Error => "error",
		})
	}
}

/// The single outward notification channel.
///
/// Cheap to clone; all clones share the same subscribers and history.
#[derive(Clone)]
pub struct Notifier {
	inner: Arc<Inner>,
}

struct Inner {
	logs: broadcast::Sender<LogEvent>,
	transitions: broadcast::Sender<BridgeStatus>,
	status: watch::Sender<BridgeStatus>,
	history: Mutex<VecDeque<LogEvent>>,
}

impl Notifier {
	pub fn new() -> Self {
		let (logs, _) = broadcast::channel(CHANNEL_CAPACITY);
		let (transitions, _) = broadcast::channel(CHANNEL_CAPACITY);
		let (status, _) = watch::channel(BridgeStatus::Idle);
		Self {
			inner: Arc::new(Inner {
				logs,
				transitions,
				status,
				history: Mutex::new(VecDeque::with_capacity(LOG_HISTORY_LIMIT)),
			}),
		}
	}

	/// Returns a logging handle for a component.
	pub fn sink(&self) -> LogSink {
		LogSink {
			notifier: self.clone(),
		}
	}

	pub fn log(&self, level: LogLevel, message: impl Into<String>) {
		let event = LogEvent::new(level, message);
		match event.level {
			LogLevel::Info => info!(target = "wmpf", "{}", event.message),
			LogLevel::Error => error!(target = "wmpf", "{}", event.message),
			LogLevel::Debug => debug!(target = "wmpf", "{}", event.message),
		}

		{
			let mut history = self.inner.history.lock();
			if history.len() == LOG_HISTORY_LIMIT {
				history.pop_front();
			}
			history.push_back(event.clone());
		}

		// no subscribers is fine
		let _ = self.inner.logs.send(event);
	}

	/// Records a status transition and notifies subscribers.
	pub fn set_status(&self, status: BridgeStatus) {
		self.inner.status.send_replace(status);
		info!(target = "wmpf", %status, "bridge status changed");
		let _ = self.inner.transitions.send(status);
	}

	pub fn status(&self) -> BridgeStatus {
		*self.inner.status.borrow()
	}

	pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEvent> {
		self.inner.logs.subscribe()
	}

	/// Stream of every status transition, in order.
	pub fn subscribe_status(&self) -> broadcast::Receiver<BridgeStatus> {
		self.inner.transitions.subscribe()
	}

	/// Latest status only; intermediate transitions may be skipped.
	pub fn watch_status(&self) -> watch::Receiver<BridgeStatus> {
		self.inner.status.subscribe()
	}

	/// The most recent log events, oldest first.
	pub fn recent_logs(&self) -> Vec<LogEvent> {
		self.inner.history.lock().iter().cloned().collect()
	}
}

impl Default for Notifier {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Notifier {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Notifier")
			.field("status", &self.status())
			.field("history", &self.inner.history.lock().len())
			.finish()
	}
}

/// Logging handle given to bridge components.
#[derive(Clone, Debug)]
pub struct LogSink {
	notifier: Notifier,
}

impl LogSink {
	pub fn info(&self, message: impl Into<String>) {
		self.notifier.log(LogLevel::Info, message);
	}

	pub fn error(&self, message: impl Into<String>) {
		self.notifier.log(LogLevel::Error, message);
	}

	pub fn debug(&self, message: impl Into<String>) {
		self.notifier.log(LogLevel::Debug, message);
	}
}
