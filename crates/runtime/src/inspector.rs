//! Inspector-facing server: DevTools front-ends connect here.
//!
//! A pure pass-through. Text frames go onto the bus unchanged and results
//! from the device are sent back unchanged to every connected inspector.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::task::JoinHandle;

use crate::bus::{Direction, RelayBus};
use crate::error::{Error, Result};
use crate::notify::LogSink;
use crate::socket::{FrameHandler, ServerLabel, SocketServer};

const LABEL: ServerLabel = ServerLabel {
	server: "proxy",
	peer: "CDP",
};

struct InboundText {
	bus: Arc<RelayBus>,
	sink: LogSink,
}

impl InboundText {
	fn forward(&self, text: String) {
		if !self.bus.publish(Direction::ToDevice, text) {
			self.sink.debug("[client] no device relay, CDP message dropped");
		}
	}
}

impl FrameHandler for InboundText {
	fn on_frame(&self, frame: Message) {
		match frame {
			Message::Text(text) => self.forward(text.as_str().to_owned()),
			Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
				Ok(text) => self.forward(text),
				Err(_) => self.sink.error("[client] CDP err: binary frame is not UTF-8"),
			},
			_ => {}
		}
	}
}

struct Running {
	server: SocketServer,
	relay: JoinHandle<()>,
}

pub struct InspectorServer {
	host: String,
	port: u16,
	bus: Arc<RelayBus>,
	sink: LogSink,
	running: Option<Running>,
}

impl InspectorServer {
	pub fn new(host: impl Into<String>, port: u16, bus: Arc<RelayBus>, sink: LogSink) -> Self {
		Self {
			host: host.into(),
			port,
			bus,
			sink,
			running: None,
		}
	}

	pub async fn start(&mut self) -> Result<()> {
		if self.running.is_some() {
			return Ok(());
		}

		let handler = Arc::new(InboundText {
			bus: Arc::clone(&self.bus),
			sink: self.sink.clone(),
		});
		let server = SocketServer::bind(LABEL, &self.host, self.port, handler, self.sink.clone()).await?;

		let Some(mut subscription) = self.bus.subscribe(Direction::ToInspector) else {
			let _ = server.shutdown().await;
			return Err(Error::Io(std::io::Error::other(
				"device relay already has an inspector subscriber",
			)));
		};

		let clients = Arc::clone(server.clients());
		let relay = tokio::spawn(async move {
			while let Some(message) = subscription.recv().await {
				clients.broadcast(Message::Text(message.into()));
			}
		});

		self.sink.info(format!(
			"[server] proxy server running on ws://{}",
			server.local_addr()
		));
		self.running = Some(Running { server, relay });
		Ok(())
	}

	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.running.as_ref().map(|r| r.server.local_addr())
	}

	pub fn client_count(&self) -> usize {
		self.running
			.as_ref()
			.map_or(0, |r| r.server.clients().len())
	}

	pub async fn stop(&mut self) -> Result<()> {
		let Some(Running { server, relay }) = self.running.take() else {
			return Ok(());
		};
		relay.abort();
		let _ = relay.await;
		server.shutdown().await?;
		self.sink.info("[server] proxy server stopped");
		Ok(())
	}
}
