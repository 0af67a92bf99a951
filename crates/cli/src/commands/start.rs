//! Foreground bridge run.

use anyhow::Context;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::info;
use wmpf_runtime::{BridgeHost, BridgeStatus, LogEvent, default_backend};

use crate::config::Settings;
use crate::error::Result;
use crate::output::{OutputFormat, StreamEvent, print_event};

pub async fn run(settings: Settings, format: OutputFormat) -> Result<()> {
	let options = settings.bridge_options();
	let devtools_url = options.devtools_url();
	let ports = options.ports;
	let host = BridgeHost::new(options, default_backend());

	// text mode already sees every event through tracing
	let stream = (format == OutputFormat::Json).then(|| {
		tokio::spawn(stream_notifications(
			host.subscribe_logs(),
			host.subscribe_status(),
			format,
		))
	});

	let started = host.try_start(ports).await;
	let mut interrupted = Ok(());
	if started.is_ok() {
		announce(&host, &devtools_url, format).await;
		interrupted = wait_for_shutdown().await;
		host.stop().await;
	}

	// dropping the host closes the notification channels and ends the stream
	drop(host);
	if let Some(stream) = stream {
		let _ = stream.await;
	}
	started?;
	interrupted?;
	Ok(())
}

async fn announce(host: &BridgeHost, devtools_url: &str, format: OutputFormat) {
	let addrs = host.addresses().await;
	let version = host.detected_version().await;
	match format {
		OutputFormat::Json => print_event(
			&StreamEvent::Ready {
				devtools_url,
				device_addr: addrs.map(|(device, _)| device),
				inspector_addr: addrs.map(|(_, inspector)| inspector),
				version,
			},
			format,
		),
		OutputFormat::Text => {
			if let Some(version) = version {
				println!("WMPF version {version}");
			}
			println!("Open in Chrome: {devtools_url}");
			println!("Press Ctrl+C to stop.");
		}
	}
}

async fn stream_notifications(
	mut logs: broadcast::Receiver<LogEvent>,
	mut statuses: broadcast::Receiver<BridgeStatus>,
	format: OutputFormat,
) {
	let mut logs_open = true;
	let mut statuses_open = true;
	while logs_open || statuses_open {
		tokio::select! {
			event = logs.recv(), if logs_open => match event {
				Ok(event) => print_event(&StreamEvent::Log(&event), format),
				Err(RecvError::Lagged(skipped)) => print_event(&StreamEvent::Lagged { skipped }, format),
				Err(RecvError::Closed) => logs_open = false,
			},
			status = statuses.recv(), if statuses_open => match status {
				Ok(status) => print_event(&StreamEvent::Status { status }, format),
				Err(RecvError::Lagged(_)) => {}
				Err(RecvError::Closed) => statuses_open = false,
			},
		}
	}
}

#[cfg(unix)]
async fn wait_for_shutdown() -> anyhow::Result<()> {
	use tokio::signal::unix::{SignalKind, signal};

	let mut sigterm =
		signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
	let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

	tokio::select! {
		_ = sigterm.recv() => info!(target = "wmpf.cli", "received SIGTERM, shutting down"),
		_ = sigint.recv() => info!(target = "wmpf.cli", "received SIGINT, shutting down"),
	}
	Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> anyhow::Result<()> {
	tokio::signal::ctrl_c()
		.await
		.context("Failed to listen for Ctrl+C")?;
	info!(target = "wmpf.cli", "received Ctrl+C, shutting down");
	Ok(())
}
