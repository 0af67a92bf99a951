use wmpf_runtime::LogLevel;

use super::*;

#[test]
fn result_builder_success() {
	let result: CommandResult<Vec<u32>> = ResultBuilder::new("versions").data(vec![13331, 11633]).build();

	assert!(result.ok);
	assert_eq!(result.command, "versions");
	assert_eq!(result.data.as_deref(), Some(&[13331, 11633][..]));
	assert!(result.error.is_none());
	assert!(result.timings.is_some());
}

#[test]
fn result_builder_error() {
	let result: CommandResult<()> = ResultBuilder::new("start")
		.error(ErrorCode::ProcessNotFound, "WeChatAppEx.exe process not found")
		.build();

	assert!(!result.ok);
	assert!(result.data.is_none());
	assert_eq!(result.error.as_ref().unwrap().code, ErrorCode::ProcessNotFound);
}

#[test]
fn error_code_display_matches_serde() {
	for code in [ErrorCode::BindFailed, ErrorCode::VersionDetectionFailed, ErrorCode::ConfigError] {
		let json = serde_json::to_string(&code).unwrap();
		assert_eq!(json, format!("\"{code}\""));
	}
}

#[test]
fn output_format_parse() {
	assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
	assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
	assert!("toon".parse::<OutputFormat>().is_err());
}

#[test]
fn serialize_command_result() {
	let result: CommandResult<Vec<u32>> = ResultBuilder::new("versions").data(vec![7]).build();
	let json = serde_json::to_string(&result).unwrap();
	assert!(json.contains("\"ok\":true"));
	assert!(json.contains("\"data\":[7]"));
	assert!(json.contains("\"durationMs\""));
	assert!(!json.contains("\"error\""));
}

#[test]
fn stream_events_are_tagged() {
	let log = LogEvent {
		level: LogLevel::Debug,
		message: "[client] ignoring 'other' message".into(),
		timestamp: 1,
	};
	let line = serde_json::to_value(StreamEvent::Log(&log)).unwrap();
	assert_eq!(line["event"], "log");
	assert_eq!(line["level"], "debug");

	let status = serde_json::to_value(StreamEvent::Status {
		status: BridgeStatus::Running,
	})
	.unwrap();
	assert_eq!(status, serde_json::json!({"event": "status", "status": "running"}));

	let lagged = serde_json::to_value(StreamEvent::Lagged { skipped: 3 }).unwrap();
	assert_eq!(lagged["skipped"], 3);
}
