//! Full start/relay/stop cycles through the host control surface.

mod common;

use std::time::Duration;

use common::{FakeBackend, connect, ephemeral_ports, next_frame, options, resources};
use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;
use wmpf_protocol::{CATEGORY_DEVTOOLS, decode};
use wmpf_runtime::{BridgeHost, BridgePorts, BridgeStatus, LogLevel};

fn drain(rx: &mut tokio::sync::broadcast::Receiver<BridgeStatus>) -> Vec<BridgeStatus> {
	let mut seen = Vec::new();
	while let Ok(status) = rx.try_recv() {
		seen.push(status);
	}
	seen
}

#[tokio::test]
async fn start_relay_stop() {
	let (_dir, layout) = resources(r#"{"LoadStartHookOffset":"0x10"}"#);
	let backend = FakeBackend::new();
	let host = BridgeHost::new(options(layout), backend.clone());
	let mut transitions = host.subscribe_status();

	let result = host.start(ephemeral_ports()).await;
	assert!(result.success, "{:?}", result.error);
	assert_eq!(host.status(), BridgeStatus::Running);
	assert_eq!(host.detected_version().await, Some(common::TARGET_VERSION));
	assert_eq!(backend.journal.events(), vec!["attach 200", "create", "load"]);

	let (device_addr, inspector_addr) = host.addresses().await.unwrap();
	let mut device = connect(device_addr).await;
	let mut inspector = connect(inspector_addr).await;
	// connections register asynchronously after the handshake
	for _ in 0..100 {
		if host.client_counts().await == (1, 1) {
			break;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	inspector
		.send(Message::Text(r#"{"id":1,"method":"Page.enable"}"#.into()))
		.await
		.unwrap();
	let Message::Binary(frame) = next_frame(&mut device).await else {
		panic!("expected a binary envelope");
	};
	let envelope = decode(&frame).unwrap();
	assert_eq!(envelope.category, CATEGORY_DEVTOOLS);
	assert_eq!(envelope.seq, 1);

	assert!(host.stop().await.success);
	assert_eq!(host.status(), BridgeStatus::Idle);
	assert_eq!(host.detected_version().await, None);
	assert_eq!(
		backend.journal.events(),
		vec!["attach 200", "create", "load", "unload", "detach"]
	);
	assert_eq!(
		drain(&mut transitions),
		vec![BridgeStatus::Starting, BridgeStatus::Running, BridgeStatus::Idle]
	);
	assert!(
		host.recent_logs()
			.iter()
			.any(|e| e.message == "[debugger] all services stopped")
	);
}

#[tokio::test]
async fn start_while_running_is_rejected() {
	let (_dir, layout) = resources("{}");
	let backend = FakeBackend::new();
	let host = BridgeHost::new(options(layout), backend.clone());

	assert!(host.start(ephemeral_ports()).await.success);
	let before = host.addresses().await.unwrap();

	let again = host.start(ephemeral_ports()).await;
	assert!(!again.success);
	assert!(again.error.unwrap().contains("already running"));
	assert_eq!(host.status(), BridgeStatus::Running);
	assert_eq!(host.addresses().await, Some(before));
	assert_eq!(backend.journal.count("attach 200"), 1);

	host.stop().await;
}

#[tokio::test]
async fn invalid_config_fails_start_without_injecting() {
	let (_dir, layout) = resources("{ not json");
	let backend = FakeBackend::new();
	let host = BridgeHost::new(options(layout), backend.clone());

	let result = host.start(ephemeral_ports()).await;
	assert!(!result.success);
	assert!(
		result.error.as_deref().unwrap_or_default().contains("version config not found: 13331"),
		"{:?}",
		result.error
	);
	assert_eq!(host.status(), BridgeStatus::Error);
	assert_eq!(backend.journal.count("create"), 0);
	assert_eq!(backend.journal.events(), vec!["attach 200", "detach"]);
	assert_eq!(host.addresses().await, None);
	assert!(
		host.recent_logs()
			.iter()
			.any(|e| e.level == LogLevel::Error && e.message.starts_with("[debugger] start failed:"))
	);

	assert!(host.stop().await.success);
	assert_eq!(host.status(), BridgeStatus::Idle);
}

#[tokio::test]
async fn a_failed_start_can_be_retried() {
	let (dir, layout) = resources("[]");
	let host = BridgeHost::new(options(layout.clone()), FakeBackend::new());

	assert!(!host.start(ephemeral_ports()).await.success);
	assert_eq!(host.status(), BridgeStatus::Error);

	std::fs::write(layout.version_config(common::TARGET_VERSION), "{}").unwrap();
	assert!(host.start(ephemeral_ports()).await.success);
	assert_eq!(host.status(), BridgeStatus::Running);

	host.stop().await;
	drop(dir);
}

#[tokio::test]
async fn occupied_device_port_fails_start() {
	let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let (_dir, layout) = resources("{}");
	let backend = FakeBackend::new();
	let host = BridgeHost::new(options(layout), backend.clone());

	let result = host
		.start(BridgePorts {
			device: taken.local_addr().unwrap().port(),
			inspector: 0,
		})
		.await;
	assert!(!result.success);
	assert!(result.error.unwrap().contains("failed to bind debug server"));
	assert_eq!(host.status(), BridgeStatus::Error);
	assert!(backend.journal.events().is_empty());
}

#[tokio::test]
async fn stop_twice_is_a_noop() {
	let (_dir, layout) = resources("{}");
	let host = BridgeHost::new(options(layout), FakeBackend::new());
	let mut transitions = host.subscribe_status();

	assert!(host.stop().await.success);
	assert!(host.stop().await.success);
	assert_eq!(host.status(), BridgeStatus::Idle);
	assert!(drain(&mut transitions).is_empty());

	assert!(host.start(ephemeral_ports()).await.success);
	assert!(host.stop().await.success);
	assert!(host.stop().await.success);
	assert_eq!(
		drain(&mut transitions),
		vec![BridgeStatus::Starting, BridgeStatus::Running, BridgeStatus::Idle]
	);
}

#[tokio::test]
async fn versions_come_from_the_config_directory() {
	let (_dir, layout) = resources("{}");
	for version in [10, 12, 7] {
		std::fs::write(layout.version_config(version), "{}").unwrap();
	}
	let host = BridgeHost::new(options(layout), FakeBackend::new());
	assert_eq!(host.available_versions(), vec![common::TARGET_VERSION, 12, 10, 7]);
}

#[tokio::test]
async fn probe_reports_target_and_config() {
	let (_dir, layout) = resources("{}");
	let host = BridgeHost::new(options(layout), FakeBackend::new());

	let report = host.probe().await.unwrap();
	assert_eq!(report.target.process.pid, 200);
	assert_eq!(report.target.version, common::TARGET_VERSION);
	assert!(report.config_available);
	assert_eq!(host.status(), BridgeStatus::Idle);
}

#[tokio::test]
async fn stop_tears_down_in_reverse_start_order() {
	let (_dir, layout) = resources("{}");
	let backend = FakeBackend::new();
	let host = BridgeHost::new(options(layout), backend.clone());
	assert!(host.start(ephemeral_ports()).await.success);
	assert!(host.stop().await.success);

	assert_eq!(
		backend.journal.events(),
		vec!["attach 200", "create", "load", "unload", "detach"]
	);

	let messages: Vec<String> = host.recent_logs().into_iter().map(|e| e.message).collect();
	let position = |line: &str| {
		messages
			.iter()
			.position(|m| m == line)
			.unwrap_or_else(|| panic!("missing {line:?} in {messages:#?}"))
	};
	let teardown = [
		"[debugger] stopping all services...",
		"[frida] session detached",
		"[server] proxy server stopped",
		"[server] debug server stopped",
		"[debugger] all services stopped",
	]
	.map(position);
	assert!(teardown.is_sorted(), "teardown out of order: {messages:#?}");
}
