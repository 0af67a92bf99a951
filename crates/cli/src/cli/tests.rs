use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_start_with_ports() {
	let args = vec![
		"wmpf-bridge",
		"start",
		"--device-port",
		"9500",
		"--inspector-port",
		"62100",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	match cli.command {
		Commands::Start(args) => {
			assert_eq!(args.device_port, Some(9500));
			assert_eq!(args.inspector_port, Some(62100));
			assert_eq!(args.host, None);
			assert_eq!(args.target, TargetArgs::default());
		}
		_ => panic!("Expected Start command"),
	}
}

#[test]
fn parse_start_defaults() {
	let cli = Cli::try_parse_from(["wmpf-bridge", "start"]).unwrap();
	assert_eq!(cli.verbose, 0);
	assert_eq!(cli.format, OutputFormat::Text);
	assert!(matches!(cli.command, Commands::Start(ref args) if *args == StartArgs::default()));
}

#[test]
fn parse_start_target_overrides() {
	let args = vec![
		"wmpf-bridge",
		"start",
		"--resource-dir",
		"/opt/wmpf",
		"--process-name",
		"WeChatAppEx",
		"--host",
		"0.0.0.0",
	];
	let cli = Cli::try_parse_from(args).unwrap();

	let Commands::Start(args) = cli.command else {
		panic!("Expected Start command");
	};
	assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
	assert_eq!(args.target.resources.resource_dir, Some(PathBuf::from("/opt/wmpf")));
	assert_eq!(args.target.process_name.as_deref(), Some("WeChatAppEx"));
}

#[test]
fn parse_global_flags_after_subcommand() {
	let cli = Cli::try_parse_from(["wmpf-bridge", "versions", "-vv", "-f", "json", "--config", "cfg.json"]).unwrap();
	assert_eq!(cli.verbose, 2);
	assert_eq!(cli.format, OutputFormat::Json);
	assert_eq!(cli.config, Some(PathBuf::from("cfg.json")));
	assert_eq!(cli.command.name(), "versions");
}

#[test]
fn parse_probe() {
	let cli = Cli::try_parse_from(["wmpf-bridge", "probe", "--process-name", "Other.exe"]).unwrap();
	match cli.command {
		Commands::Probe(args) => assert_eq!(args.process_name.as_deref(), Some("Other.exe")),
		_ => panic!("Expected Probe command"),
	}
}

#[test]
fn rejects_out_of_range_port() {
	assert!(Cli::try_parse_from(["wmpf-bridge", "start", "--device-port", "70000"]).is_err());
}

#[test]
fn rejects_unknown_format() {
	assert!(Cli::try_parse_from(["wmpf-bridge", "versions", "-f", "toon"]).is_err());
}

#[test]
fn versions_takes_no_process_name() {
	assert!(Cli::try_parse_from(["wmpf-bridge", "versions", "--process-name", "x"]).is_err());
}
