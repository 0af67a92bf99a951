//! Device-facing server: the debugged miniapp runtime connects here.
//!
//! Inbound frames are binary envelopes. Results in the devtools-result category
//! are unwrapped and published towards the inspector; everything else is
//! logged and dropped. Inspector messages arriving from the bus are wrapped in
//! fresh envelopes and broadcast to every connected device client.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::Message;
use rand::Rng;
use tokio::task::JoinHandle;
use wmpf_protocol::{
	CATEGORY_DEVTOOLS, CATEGORY_DEVTOOLS_RESULT, Compression, DebugEnvelope, DevtoolsPayload,
	MessageData, decode, encode, unwrap, wrap,
};

use crate::bus::{Direction, RelayBus};
use crate::error::{Error, Result};
use crate::notify::LogSink;
use crate::socket::{FrameHandler, ServerLabel, SocketServer};

const LABEL: ServerLabel = ServerLabel {
	server: "debug",
	peer: "miniapp",
};

/// Builds outbound envelopes and owns the sequence counter.
///
/// The first envelope gets sequence 1; numbering restarts only with a new writer.
#[derive(Debug, Default)]
pub struct EnvelopeWriter {
	last_seq: u32,
}

impl EnvelopeWriter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Wraps one inspector message into an encoded `chromeDevtools` envelope.
	pub fn next_frame(&mut self, message: &str) -> Result<Vec<u8>> {
		let op_id = rand::thread_rng().gen_range(0..=100);
		let raw = DevtoolsPayload::new(op_id, message);
		let wrapped = wrap(&raw, CATEGORY_DEVTOOLS, Compression::None.id())?;

		self.last_seq = self.last_seq.wrapping_add(1);
		let envelope = DebugEnvelope::new(self.last_seq, CATEGORY_DEVTOOLS, wrapped, Compression::None);
		Ok(encode(&envelope))
	}

	/// Returns the last sequence number to the pool after a frame reached no client.
	pub fn discard_last(&mut self) {
		self.last_seq = self.last_seq.wrapping_sub(1);
	}

	pub fn last_seq(&self) -> u32 {
		self.last_seq
	}
}

struct InboundEnvelopes {
	bus: Arc<RelayBus>,
	sink: LogSink,
}

impl InboundEnvelopes {
	fn handle(&self, frame: &[u8]) {
		let message = match decode(frame).and_then(|envelope| unwrap(&envelope)) {
			Ok(Some(message)) => message,
			Ok(None) => return,
			Err(err) => {
				self.sink.error(format!("[client] err: {err}"));
				return;
			}
		};

		if message.category != CATEGORY_DEVTOOLS_RESULT {
			self.sink.debug(format!("[client] ignoring '{}' message", message.category));
			return;
		}

		match message.data {
			MessageData::Devtools(devtools) => {
				if !self.bus.publish(Direction::ToInspector, devtools.payload) {
					self.sink.debug("[client] no inspector relay, result dropped");
				}
			}
			MessageData::Opaque(_) => {}
		}
	}
}

impl FrameHandler for InboundEnvelopes {
	fn on_frame(&self, frame: Message) {
		match frame {
			Message::Binary(bytes) => self.handle(&bytes),
			Message::Text(text) => self.handle(text.as_str().as_bytes()),
			_ => {}
		}
	}
}

struct Running {
	server: SocketServer,
	relay: JoinHandle<()>,
}

pub struct DeviceServer {
	host: String,
	port: u16,
	bus: Arc<RelayBus>,
	sink: LogSink,
	running: Option<Running>,
}

impl DeviceServer {
	pub fn new(host: impl Into<String>, port: u16, bus: Arc<RelayBus>, sink: LogSink) -> Self {
		Self {
			host: host.into(),
			port,
			bus,
			sink,
			running: None,
		}
	}

	/// Binds the listener and subscribes to inspector traffic.
	pub async fn start(&mut self) -> Result<()> {
		if self.running.is_some() {
			return Ok(());
		}

		let handler = Arc::new(InboundEnvelopes {
			bus: Arc::clone(&self.bus),
			sink: self.sink.clone(),
		});
		let server = SocketServer::bind(LABEL, &self.host, self.port, handler, self.sink.clone()).await?;

		let Some(mut subscription) = self.bus.subscribe(Direction::ToDevice) else {
			let _ = server.shutdown().await;
			return Err(Error::Io(std::io::Error::other(
				"inspector relay already has a device subscriber",
			)));
		};

		let clients = Arc::clone(server.clients());
		let sink = self.sink.clone();
		let relay = tokio::spawn(async move {
			let mut writer = EnvelopeWriter::new();
			while let Some(message) = subscription.recv().await {
				// sequence numbers are only spent on envelopes a client receives
				if clients.is_empty() {
					sink.debug("[server] no miniapp client, CDP message dropped");
					continue;
				}
				match writer.next_frame(&message) {
					Ok(frame) => {
						if clients.broadcast(Message::Binary(frame.into())) == 0 {
							writer.discard_last();
							sink.debug("[server] no miniapp client, CDP message dropped");
						}
					}
					Err(err) => sink.error(format!("[server] failed to wrap inspector message: {err}")),
				}
			}
		});

		self.sink.info(format!(
			"[server] debug server running on ws://{}",
			server.local_addr()
		));
		self.running = Some(Running { server, relay });
		Ok(())
	}

	/// Address actually bound, once started.
	pub fn local_addr(&self) -> Option<SocketAddr> {
		self.running.as_ref().map(|r| r.server.local_addr())
	}

	pub fn client_count(&self) -> usize {
		self.running
			.as_ref()
			.map_or(0, |r| r.server.clients().len())
	}

	/// Unsubscribes, closes all clients and waits for the listener to close.
	pub async fn stop(&mut self) -> Result<()> {
		let Some(Running { server, relay }) = self.running.take() else {
			return Ok(());
		};
		relay.abort();
		let _ = relay.await;
		server.shutdown().await?;
		self.sink.info("[server] debug server stopped");
		Ok(())
	}
}
