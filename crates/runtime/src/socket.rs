//! WebSocket listener shared by the device- and inspector-facing servers.
//!
//! Each accepted client gets an unbounded outbound queue drained by its own
//! writer task, so a broadcast never waits on a slow socket. Shutdown flips a
//! watch flag that every client loop and the accept loop observe.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::notify::LogSink;

/// Receives every data frame a client sends.
pub(crate) trait FrameHandler: Send + Sync + 'static {
	fn on_frame(&self, frame: Message);
}

/// Names used in log lines.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ServerLabel {
	/// Short server name, e.g. `"device"`.
	pub server: &'static str,
	/// What connects to it, e.g. `"miniapp"`.
	pub peer: &'static str,
}

/// Currently connected clients of one server.
#[derive(Debug, Default)]
pub(crate) struct ClientRegistry {
	next_id: AtomicU64,
	clients: Mutex<HashMap<u64, mpsc::UnboundedSender<Message>>>,
}

impl ClientRegistry {
	fn register(&self) -> (u64, mpsc::UnboundedReceiver<Message>) {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = mpsc::unbounded_channel();
		self.clients.lock().insert(id, tx);
		(id, rx)
	}

	fn remove(&self, id: u64) {
		self.clients.lock().remove(&id);
	}

	/// Queues `message` for every open client and returns how many accepted it.
	///
	/// Clients whose writer has already gone away are skipped.
	pub fn broadcast(&self, message: Message) -> usize {
		let clients = self.clients.lock();
		clients
			.values()
			.filter(|tx| tx.send(message.clone()).is_ok())
			.count()
	}

	/// Sends a close frame to every client and forgets them.
	fn close_all(&self) {
		for (_, tx) in self.clients.lock().drain() {
			let _ = tx.send(Message::Close(None));
		}
	}

	pub fn len(&self) -> usize {
		self.clients.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.clients.lock().is_empty()
	}
}

#[derive(Clone)]
struct Shared {
	label: ServerLabel,
	clients: Arc<ClientRegistry>,
	handler: Arc<dyn FrameHandler>,
	sink: LogSink,
	shutdown: watch::Receiver<bool>,
}

/// A bound, running WebSocket server.
pub(crate) struct SocketServer {
	label: ServerLabel,
	local_addr: SocketAddr,
	clients: Arc<ClientRegistry>,
	shutdown: watch::Sender<bool>,
	task: JoinHandle<std::io::Result<()>>,
}

impl SocketServer {
	/// Binds `host:port` and starts accepting clients.
	///
	/// Fails with [`Error::Bind`] when the address is unavailable; nothing is
	/// left running in that case.
	pub async fn bind(
		label: ServerLabel,
		host: &str,
		port: u16,
		handler: Arc<dyn FrameHandler>,
		sink: LogSink,
	) -> Result<Self> {
		let addr = format!("{host}:{port}");
		let listener = TcpListener::bind(&addr).await.map_err(|source| Error::Bind {
			server: label.server,
			addr: addr.clone(),
			source,
		})?;
		let local_addr = listener.local_addr()?;

		let clients = Arc::new(ClientRegistry::default());
		let (shutdown, shutdown_rx) = watch::channel(false);
		let shared = Shared {
			label,
			clients: Arc::clone(&clients),
			handler,
			sink,
			shutdown: shutdown_rx.clone(),
		};

		let app = Router::new().fallback(upgrade).with_state(shared);
		let mut stop = shutdown_rx;
		let task = tokio::spawn(async move {
			axum::serve(listener, app)
				.with_graceful_shutdown(async move {
					let _ = stop.wait_for(|stopping| *stopping).await;
				})
				.await
		});

		debug!(target = "wmpf", server = label.server, %local_addr, "listener bound");

		Ok(Self {
			label,
			local_addr,
			clients,
			shutdown,
			task,
		})
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	pub fn clients(&self) -> &Arc<ClientRegistry> {
		&self.clients
	}

	/// Closes every client, stops accepting and waits for the listener to close.
	pub async fn shutdown(self) -> Result<()> {
		self.shutdown.send_replace(true);
		self.clients.close_all();

		let server = self.label.server;
		match self.task.await {
			Ok(Ok(())) => Ok(()),
			Ok(Err(err)) => Err(Error::Shutdown {
				server,
				reason: err.to_string(),
			}),
			Err(err) => Err(Error::Shutdown {
				server,
				reason: err.to_string(),
			}),
		}
	}
}

async fn upgrade(ws: WebSocketUpgrade, State(shared): State<Shared>) -> impl IntoResponse {
	ws.on_upgrade(move |socket| serve_client(socket, shared))
}

async fn serve_client(socket: WebSocket, shared: Shared) {
	let Shared {
		label,
		clients,
		handler,
		sink,
		mut shutdown,
	} = shared;

	if *shutdown.borrow() {
		return;
	}

	let (id, rx) = clients.register();
	sink.info(format!("[conn] {} client connected", label.peer));

	let (mut ws_tx, mut ws_rx) = socket.split();
	let mut outbound = UnboundedReceiverStream::new(rx);
	let writer = tokio::spawn(async move {
		while let Some(msg) = outbound.next().await {
			let closing = matches!(msg, Message::Close(_));
			if ws_tx.send(msg).await.is_err() || closing {
				break;
			}
		}
		let _ = ws_tx.close().await;
	});

	loop {
		tokio::select! {
			_ = shutdown.wait_for(|stopping| *stopping) => break,
			msg = ws_rx.next() => match msg {
				Some(Ok(Message::Close(_))) | None => break,
				Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
				Some(Ok(frame)) => handler.on_frame(frame),
				Some(Err(err)) => {
					sink.error(format!("[client] {} error: {err}", label.peer));
					break;
				}
			},
		}
	}

	clients.remove(id);
	let _ = writer.await;
	sink.info(format!("[client] {} client disconnected", label.peer));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn broadcast_skips_closed_clients() {
		let registry = ClientRegistry::default();
		let (_a, mut rx_a) = registry.register();
		let (_b, rx_b) = registry.register();
		drop(rx_b);

		let delivered = registry.broadcast(Message::Text("hello".into()));
		assert_eq!(delivered, 1);
		assert!(matches!(rx_a.recv().await, Some(Message::Text(t)) if t.as_str() == "hello"));
	}

	#[tokio::test]
	async fn close_all_sends_close_and_empties() {
		let registry = ClientRegistry::default();
		let (_id, mut rx) = registry.register();
		registry.close_all();

		assert_eq!(registry.len(), 0);
		assert!(matches!(rx.recv().await, Some(Message::Close(None))));
		assert!(rx.recv().await.is_none());
	}

	#[test]
	fn removed_clients_do_not_receive() {
		let registry = ClientRegistry::default();
		let (id, _rx) = registry.register();
		registry.remove(id);
		assert_eq!(registry.broadcast(Message::Binary(vec![1u8].into())), 0);
	}
}
