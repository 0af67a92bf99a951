use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

#[cfg(test)]
mod tests;

/// Cargo-like help colors; errors in red.
fn help_styles() -> Styles {
	let accent = AnsiColor::Green.on_default().bold();
	Styles::styled()
		.header(accent)
		.usage(accent)
		.literal(AnsiColor::Cyan.on_default().bold())
		.placeholder(AnsiColor::Cyan.on_default())
		.error(AnsiColor::Red.on_default().bold())
		.invalid(AnsiColor::Yellow.on_default().bold())
}

#[derive(Parser, Debug)]
#[command(name = "wmpf-bridge")]
#[command(about = "Bridge Chrome DevTools to a WeChat miniapp runtime")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v bridge debug lines, -vv everything)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Read settings from this JSON file instead of the per-user config
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Start the bridge and run until Ctrl+C
	Start(StartArgs),

	/// List target versions that have an address configuration
	Versions(ResourceArgs),

	/// Find the target process and detect its version without attaching
	Probe(TargetArgs),
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Start(_) => "start",
			Commands::Versions(_) => "versions",
			Commands::Probe(_) => "probe",
		}
	}
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceArgs {
	/// Directory containing frida/hook.js and frida/config/
	#[arg(long, value_name = "DIR")]
	pub resource_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetArgs {
	#[command(flatten)]
	pub resources: ResourceArgs,

	/// Executable name of the miniapp host process
	#[arg(long, value_name = "NAME")]
	pub process_name: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StartArgs {
	/// Port the miniapp runtime connects to
	#[arg(long, value_name = "PORT")]
	pub device_port: Option<u16>,

	/// Port DevTools connects to
	#[arg(long, value_name = "PORT")]
	pub inspector_port: Option<u16>,

	/// Address both servers bind to
	#[arg(long, value_name = "HOST")]
	pub host: Option<String>,

	#[command(flatten)]
	pub target: TargetArgs,
}
