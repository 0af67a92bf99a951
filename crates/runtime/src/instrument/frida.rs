//! Attach and inject through Frida.
//!
//! Frida handles are neither `Send` nor `'static`, so each attached process is
//! driven by a dedicated worker thread that owns the device, the session and
//! the script. The async side talks to it over a command channel.

use std::sync::mpsc as std_mpsc;
use std::thread;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use super::backend::{
	AttachedProcess, InjectedScript, InstrumentationBackend, ProcessEntry, ScriptMessage,
	ScriptMessageHandler, enumerate_with_sysinfo,
};
use crate::error::{Error, Result};

type Reply = oneshot::Sender<Result<()>>;

enum Command {
	CreateScript {
		source: String,
		on_message: ScriptMessageHandler,
		reply: Reply,
	},
	Load(Reply),
	Unload(Reply),
	Detach(Reply),
}

/// Enumerates with `sysinfo`, attaches with Frida's local device.
#[derive(Debug, Default)]
pub struct FridaBackend;

impl FridaBackend {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl InstrumentationBackend for FridaBackend {
	async fn enumerate_processes(&self) -> Result<Vec<ProcessEntry>> {
		enumerate_with_sysinfo().await
	}

	async fn attach(&self, pid: u32) -> Result<Box<dyn AttachedProcess>> {
		let (commands, inbox) = std_mpsc::channel();
		let (ready_tx, ready_rx) = oneshot::channel();

		thread::Builder::new()
			.name(format!("frida-{pid}"))
			.spawn(move || run_worker(pid, ready_tx, inbox))
			.map_err(|err| Error::AttachFailed {
				pid,
				reason: err.to_string(),
			})?;

		ready_rx.await.map_err(|_| Error::AttachFailed {
			pid,
			reason: "frida worker exited before attaching".into(),
		})??;

		Ok(Box::new(FridaProcess { pid, commands }))
	}
}

struct FridaProcess {
	pid: u32,
	commands: std_mpsc::Sender<Command>,
}

async fn request(
	commands: &std_mpsc::Sender<Command>,
	make: impl FnOnce(Reply) -> Command,
) -> Result<()> {
	let (reply, response) = oneshot::channel();
	commands
		.send(make(reply))
		.map_err(|_| Error::ScriptLoadFailed("frida worker is gone".into()))?;
	response
		.await
		.map_err(|_| Error::ScriptLoadFailed("frida worker dropped the request".into()))?
}

#[async_trait]
impl AttachedProcess for FridaProcess {
	async fn create_script(
		&mut self,
		source: &str,
		on_message: ScriptMessageHandler,
	) -> Result<Box<dyn InjectedScript>> {
		let source = source.to_owned();
		request(&self.commands, |reply| Command::CreateScript {
			source,
			on_message,
			reply,
		})
		.await?;
		Ok(Box::new(FridaScript {
			commands: self.commands.clone(),
		}))
	}

	async fn detach(&mut self) -> Result<()> {
		debug!(target = "wmpf", pid = self.pid, "detaching frida session");
		request(&self.commands, Command::Detach).await
	}
}

struct FridaScript {
	commands: std_mpsc::Sender<Command>,
}

#[async_trait]
impl InjectedScript for FridaScript {
	async fn load(&mut self) -> Result<()> {
		request(&self.commands, Command::Load).await
	}

	async fn unload(&mut self) -> Result<()> {
		request(&self.commands, Command::Unload).await
	}
}

struct Forwarder(ScriptMessageHandler);

impl frida::ScriptHandler for Forwarder {
	fn on_message(&mut self, message: &frida::Message) {
		(self.0)(script_message(message).to_json());
	}
}

fn script_message(message: &frida::Message) -> ScriptMessage {
	match message {
		frida::Message::Send(send) => ScriptMessage::Send {
			payload: Value::String(format!("{:?}", send.payload)),
		},
		frida::Message::Log(log) => ScriptMessage::Log {
			level: format!("{:?}", log.level).to_lowercase(),
			payload: log.payload.clone(),
		},
		frida::Message::Error(err) => ScriptMessage::Error {
			description: err.description.clone(),
			stack: Some(err.stack.clone()).filter(|stack| !stack.is_empty()),
		},
		frida::Message::Other(value) => ScriptMessage::Other(value.clone()),
	}
}

fn script_error(err: impl std::fmt::Display) -> Error {
	Error::ScriptLoadFailed(err.to_string())
}

fn run_worker(pid: u32, ready: oneshot::Sender<Result<()>>, inbox: std_mpsc::Receiver<Command>) {
	let attach_failed = |reason: String| Error::AttachFailed { pid, reason };

	// SAFETY: obtained once per worker thread and dropped on the same thread.
	let frida = unsafe { frida::Frida::obtain() };
	let manager = frida::DeviceManager::obtain(&frida);
	let device = match manager.get_local_device() {
		Ok(device) => device,
		Err(err) => {
			let _ = ready.send(Err(attach_failed(err.to_string())));
			return;
		}
	};
	let session = match device.attach(pid) {
		Ok(session) => session,
		Err(err) => {
			let _ = ready.send(Err(attach_failed(err.to_string())));
			return;
		}
	};
	let _ = ready.send(Ok(()));

	let mut script = None;
	while let Ok(command) = inbox.recv() {
		match command {
			Command::CreateScript {
				source,
				on_message,
				reply,
			} => {
				let mut options = frida::ScriptOption::new();
				let created = session
					.create_script(&source, &mut options)
					.and_then(|mut created| {
						created.handle_message(Forwarder(on_message))?;
						Ok(created)
					});
				let _ = reply.send(match created {
					Ok(created) => {
						script = Some(created);
						Ok(())
					}
					Err(err) => Err(script_error(err)),
				});
			}
			Command::Load(reply) => {
				let result = match script.as_ref() {
					Some(script) => script.load().map_err(script_error),
					None => Err(script_error("no script created")),
				};
				let _ = reply.send(result);
			}
			Command::Unload(reply) => {
				let result = match script.take() {
					Some(script) => script.unload().map_err(script_error),
					None => Ok(()),
				};
				let _ = reply.send(result);
			}
			Command::Detach(reply) => {
				drop(script.take());
				let _ = reply.send(session.detach().map_err(|err| attach_failed(err.to_string())));
				break;
			}
		}
	}
}
