//! Shared fixtures for the runtime integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wmpf_runtime::{
	AttachedProcess, BridgeOptions, BridgePorts, DEFAULT_PROCESS_NAME, Error, InjectedScript,
	InstrumentationBackend, InstrumentationOptions, ProcessEntry, ResourceLayout, Result,
	ScriptMessageHandler,
};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TARGET_VERSION: u32 = 13331;

/// Records every backend call in order.
#[derive(Default)]
pub struct Journal {
	events: Mutex<Vec<String>>,
}

impl Journal {
	fn push(&self, event: impl Into<String>) {
		self.events.lock().push(event.into());
	}

	pub fn events(&self) -> Vec<String> {
		self.events.lock().clone()
	}

	pub fn count(&self, event: &str) -> usize {
		self.events.lock().iter().filter(|e| *e == event).count()
	}
}

/// In-memory backend with one WeChatAppEx process tree.
pub struct FakeBackend {
	pub journal: Arc<Journal>,
}

impl FakeBackend {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			journal: Arc::default(),
		})
	}
}

#[async_trait]
impl InstrumentationBackend for FakeBackend {
	async fn enumerate_processes(&self) -> Result<Vec<ProcessEntry>> {
		let exe = PathBuf::from(format!("/wmpf/RadiumWMPF/{TARGET_VERSION}/extracted/WeChatAppEx.exe"));
		Ok((0..4)
			.map(|i| ProcessEntry {
				pid: 200 + i,
				parent_pid: Some(if i == 0 { 1 } else { 200 }),
				name: DEFAULT_PROCESS_NAME.to_owned(),
				executable: Some(exe.clone()),
			})
			.collect())
	}

	async fn attach(&self, pid: u32) -> Result<Box<dyn AttachedProcess>> {
		self.journal.push(format!("attach {pid}"));
		Ok(Box::new(FakeProcess {
			journal: Arc::clone(&self.journal),
		}))
	}
}

struct FakeProcess {
	journal: Arc<Journal>,
}

#[async_trait]
impl AttachedProcess for FakeProcess {
	async fn create_script(
		&mut self,
		_source: &str,
		_on_message: ScriptMessageHandler,
	) -> Result<Box<dyn InjectedScript>> {
		self.journal.push("create");
		Ok(Box::new(FakeScript {
			journal: Arc::clone(&self.journal),
		}))
	}

	async fn detach(&mut self) -> Result<()> {
		self.journal.push("detach");
		Ok(())
	}
}

struct FakeScript {
	journal: Arc<Journal>,
}

#[async_trait]
impl InjectedScript for FakeScript {
	async fn load(&mut self) -> Result<()> {
		self.journal.push("load");
		Ok(())
	}

	async fn unload(&mut self) -> Result<()> {
		self.journal.push("unload");
		Ok(())
	}
}

/// A resource directory with a hook script and one version config.
pub fn resources(config: &str) -> (tempfile::TempDir, ResourceLayout) {
	let dir = tempfile::tempdir().unwrap();
	let layout = ResourceLayout::new(dir.path());
	fs::create_dir_all(layout.config_dir()).unwrap();
	fs::write(layout.hook_script(), "rpc.exports = @@CONFIG@@;").unwrap();
	fs::write(layout.version_config(TARGET_VERSION), config).unwrap();
	(dir, layout)
}

pub fn options(layout: ResourceLayout) -> BridgeOptions {
	BridgeOptions::new(InstrumentationOptions::new(layout))
}

/// Ports that let the OS pick.
pub fn ephemeral_ports() -> BridgePorts {
	BridgePorts {
		device: 0,
		inspector: 0,
	}
}

pub async fn connect(addr: std::net::SocketAddr) -> Client {
	let (client, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
	client
}

/// Polls `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) {
	for _ in 0..100 {
		if check() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	panic!("condition not reached in time");
}

/// Next data frame, skipping pings.
pub async fn next_frame(client: &mut Client) -> Message {
	loop {
		let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
			.await
			.expect("timed out waiting for a frame")
			.expect("stream ended")
			.unwrap();
		if !matches!(frame, Message::Ping(_) | Message::Pong(_)) {
			return frame;
		}
	}
}

/// True when nothing arrives within `wait`.
pub async fn stays_silent(client: &mut Client, wait: Duration) -> bool {
	tokio::time::timeout(wait, client.next()).await.is_err()
}

pub fn is_bind_error(err: &Error) -> bool {
	matches!(err, Error::Bind { .. })
}
