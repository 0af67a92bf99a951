//! Settings resolution: defaults, then the config file, then the
//! environment, then command-line flags.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use wmpf_runtime::{
	BridgeOptions, BridgePorts, DEFAULT_HOST, DEFAULT_PROCESS_NAME, InstrumentationOptions,
	ResourceLayout,
};

use crate::cli::{ResourceArgs, StartArgs, TargetArgs};
use crate::error::{CliError, Result};

/// Overrides the resource directory from the environment.
pub const RESOURCE_DIR_ENV: &str = "WMPF_RESOURCE_DIR";

/// `<config_dir>/wmpf-bridge/config.json`, e.g. `~/.config/wmpf-bridge/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("wmpf-bridge").join("config.json"))
}

/// Contents of the JSON config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
	pub device_port: Option<u16>,
	pub inspector_port: Option<u16>,
	pub host: Option<String>,
	pub resource_dir: Option<PathBuf>,
	pub process_name: Option<String>,
}

impl ConfigFile {
	pub fn parse(path: &Path, raw: &str) -> Result<Self> {
		serde_json::from_str(raw).map_err(|err| CliError::Config {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})
	}

	/// Reads `explicit`, or the per-user file when it exists.
	///
	/// An explicit path that cannot be read is an error; a missing per-user
	/// file is not.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		let path = match explicit {
			Some(path) => path.to_path_buf(),
			None => match default_config_path() {
				Some(path) if path.is_file() => path,
				_ => return Ok(Self::default()),
			},
		};

		let raw = std::fs::read_to_string(&path).map_err(|err| CliError::Config {
			path: path.clone(),
			reason: err.to_string(),
		})?;
		Self::parse(&path, &raw)
	}
}

/// Fully resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub host: String,
	pub ports: BridgePorts,
	pub resource_dir: PathBuf,
	pub process_name: String,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			host: DEFAULT_HOST.to_owned(),
			ports: BridgePorts::default(),
			resource_dir: default_resource_dir(),
			process_name: DEFAULT_PROCESS_NAME.to_owned(),
		}
	}
}

impl Settings {
	/// Layers the config file and then the environment over the defaults.
	pub fn resolve(file: ConfigFile, env_resource_dir: Option<PathBuf>) -> Self {
		let mut settings = Self::default();
		if let Some(port) = file.device_port {
			settings.ports.device = port;
		}
		if let Some(port) = file.inspector_port {
			settings.ports.inspector = port;
		}
		if let Some(host) = file.host {
			settings.host = host;
		}
		if let Some(dir) = file.resource_dir {
			settings.resource_dir = dir;
		}
		if let Some(name) = file.process_name {
			settings.process_name = name;
		}
		if let Some(dir) = env_resource_dir {
			settings.resource_dir = dir;
		}
		settings
	}

	pub fn apply_resources(&mut self, args: &ResourceArgs) {
		if let Some(dir) = &args.resource_dir {
			self.resource_dir = dir.clone();
		}
	}

	pub fn apply_target(&mut self, args: &TargetArgs) {
		self.apply_resources(&args.resources);
		if let Some(name) = &args.process_name {
			self.process_name = name.clone();
		}
	}

	pub fn apply_start(&mut self, args: &StartArgs) {
		self.apply_target(&args.target);
		if let Some(port) = args.device_port {
			self.ports.device = port;
		}
		if let Some(port) = args.inspector_port {
			self.ports.inspector = port;
		}
		if let Some(host) = &args.host {
			self.host = host.clone();
		}
	}

	pub fn resources(&self) -> ResourceLayout {
		ResourceLayout::new(&self.resource_dir)
	}

	pub fn bridge_options(&self) -> BridgeOptions {
		let instrumentation =
			InstrumentationOptions::new(self.resources()).with_process_name(&self.process_name);
		BridgeOptions {
			host: self.host.clone(),
			ports: self.ports,
			instrumentation,
		}
	}
}

/// `WMPF_RESOURCE_DIR`, when set and non-empty.
pub fn env_resource_dir() -> Option<PathBuf> {
	std::env::var_os(RESOURCE_DIR_ENV)
		.filter(|value| !value.is_empty())
		.map(PathBuf::from)
}

/// Resources ship next to the executable, like a packaged desktop app.
fn default_resource_dir() -> PathBuf {
	std::env::current_exe()
		.ok()
		.and_then(|exe| exe.parent().map(Path::to_path_buf))
		.unwrap_or_else(|| PathBuf::from("."))
}
