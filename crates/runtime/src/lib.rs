//! WMPF Runtime - socket servers, relay bus and instrumentation for the debug bridge
//!
//! This crate runs one bridge between a miniapp runtime and DevTools front-ends:
//!
//! - **Device server**: accepts the miniapp runtime, speaks binary envelopes
//! - **Inspector server**: accepts DevTools, speaks plain CDP text frames
//! - **Relay bus**: per-run channel pair connecting the two servers
//! - **Instrumentation**: finds the host process and injects the hook script
//! - **Bridge / host**: start/stop orchestration and the control surface
//!
//! # Architecture
//!
//! ```text
//!   miniapp ──ws(binary)──► ┌──────────┐  ToInspector  ┌───────────┐ ──ws(text)──► DevTools
//!                           │  device  │ ────────────► │ inspector │
//!   miniapp ◄─ws(binary)─── │  server  │ ◄──────────── │  server   │ ◄─ws(text)─── DevTools
//!                           └──────────┘   ToDevice    └───────────┘
//!                                  ▲
//!                     hook.js      │ redirects debug traffic
//!   InstrumentationSession ──► WeChatAppEx
//! ```
//!
//! All components report through one [`Notifier`], which is what a host
//! application subscribes to.

pub mod bridge;
pub mod bus;
pub mod device;
pub mod error;
pub mod host;
pub mod inspector;
pub mod instrument;
pub mod notify;
pub mod resources;
mod socket;

pub use bridge::{
	Bridge, BridgeOptions, BridgePorts, DEFAULT_DEVICE_PORT, DEFAULT_HOST, DEFAULT_INSPECTOR_PORT,
};
pub use bus::{Direction, RelayBus, Subscription};
pub use device::{DeviceServer, EnvelopeWriter};
pub use error::{Error, Result};
pub use host::{BridgeHost, ControlResult, ProbeReport};
pub use inspector::InspectorServer;
pub use instrument::{
	AttachedProcess, DEFAULT_PROCESS_NAME, DiscoveredTarget, InjectedScript, InstrumentationBackend,
	InstrumentationOptions, InstrumentationSession, ProcessEntry, ScriptMessage, ScriptMessageHandler,
	SessionState, SystemBackend, TargetProcessInfo, default_backend, detect_version,
	discover_target, select_parent_pid,
};
#[cfg(feature = "frida")]
pub use instrument::FridaBackend;
pub use notify::{BridgeStatus, LOG_HISTORY_LIMIT, LogEvent, LogLevel, LogSink, Notifier};
pub use resources::{CONFIG_PLACEHOLDER, ResourceLayout, VersionConfig, available_versions};
