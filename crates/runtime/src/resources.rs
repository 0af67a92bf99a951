//! On-disk hook script and per-version address configuration.
//!
//! ```text
//! <root>/frida/hook.js                      hook script, contains @@CONFIG@@
//! <root>/frida/config/addresses.<N>.json    address/offset map for target version N
//! ```

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Token in the hook script replaced by the canonical configuration JSON.
pub const CONFIG_PLACEHOLDER: &str = "@@CONFIG@@";

const CONFIG_PREFIX: &str = "addresses.";
const CONFIG_SUFFIX: &str = ".json";

/// Where the instrumentation assets live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceLayout {
	root: PathBuf,
}

impl ResourceLayout {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn hook_script(&self) -> PathBuf {
		self.root.join("frida").join("hook.js")
	}

	pub fn config_dir(&self) -> PathBuf {
		self.root.join("frida").join("config")
	}

	pub fn version_config(&self, version: u32) -> PathBuf {
		self.config_dir()
			.join(format!("{CONFIG_PREFIX}{version}{CONFIG_SUFFIX}"))
	}

	/// Target versions with a configuration file, highest first.
	pub fn available_versions(&self) -> Vec<u32> {
		available_versions(&self.config_dir())
	}

	pub async fn load_hook_script(&self) -> Result<String> {
		let path = self.hook_script();
		tokio::fs::read_to_string(&path)
			.await
			.map_err(|_| Error::HookScriptMissing { path })
	}

	pub async fn load_version_config(&self, version: u32) -> Result<VersionConfig> {
		let path = self.version_config(version);
		let missing = |reason: String| Error::VersionConfigMissing {
			version,
			path: path.clone(),
			reason,
		};

		let raw = tokio::fs::read_to_string(&path)
			.await
			.map_err(|err| missing(err.to_string()))?;
		VersionConfig::parse(version, &raw).map_err(missing)
	}
}

/// Lists `addresses.<N>.json` files in `config_dir`, highest version first.
///
/// An unreadable directory yields an empty list.
pub fn available_versions(config_dir: &Path) -> Vec<u32> {
	let Ok(entries) = std::fs::read_dir(config_dir) else {
		return Vec::new();
	};

	let mut versions: Vec<u32> = entries
		.filter_map(|entry| entry.ok())
		.filter_map(|entry| parse_config_file_name(&entry.file_name().to_string_lossy()))
		.collect();
	versions.sort_unstable_by(|a, b| b.cmp(a));
	versions.dedup();
	versions
}

fn parse_config_file_name(name: &str) -> Option<u32> {
	let digits = name.strip_prefix(CONFIG_PREFIX)?.strip_suffix(CONFIG_SUFFIX)?;
	if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	digits.parse().ok()
}

/// Symbol-to-address mapping for one target version.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionConfig {
	version: u32,
	entries: Map<String, Value>,
}

impl VersionConfig {
	/// Parses a configuration file body; it must be a JSON object.
	pub fn parse(version: u32, raw: &str) -> std::result::Result<Self, String> {
		match serde_json::from_str::<Value>(raw) {
			Ok(Value::Object(entries)) => Ok(Self { version, entries }),
			Ok(other) => Err(format!("expected a JSON object, found {}", json_kind(&other))),
			Err(err) => Err(format!("invalid JSON: {err}")),
		}
	}

	pub fn version(&self) -> u32 {
		self.version
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Numeric value of `name`, accepting plain numbers or `0x` hex strings.
	pub fn address(&self, name: &str) -> Option<u64> {
		match self.entries.get(name)? {
			Value::Number(n) => n.as_u64(),
			Value::String(s) => {
				let hex = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
				u64::from_str_radix(hex, 16).ok()
			}
			_ => None,
		}
	}

	/// Compact re-serialization substituted into the hook script.
	pub fn canonical_json(&self) -> String {
		Value::Object(self.entries.clone()).to_string()
	}

	/// Hook script source with the placeholder replaced by this configuration.
	pub fn render_into(&self, script: &str) -> String {
		script.replacen(CONFIG_PLACEHOLDER, &self.canonical_json(), 1)
	}
}

fn json_kind(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}
