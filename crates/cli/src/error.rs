use std::path::PathBuf;

use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid config file {}: {reason}", path.display())]
	Config { path: PathBuf, reason: String },

	#[error(transparent)]
	Bridge(#[from] wmpf_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		use wmpf_runtime::Error as Bridge;

		match self {
			CliError::Config { .. } => ErrorCode::ConfigError,
			CliError::Bridge(err) => match err {
				Bridge::Bind { .. } => ErrorCode::BindFailed,
				Bridge::ProcessNotFound { .. } | Bridge::Enumeration(_) => ErrorCode::ProcessNotFound,
				Bridge::VersionDetectionFailed { .. } => ErrorCode::VersionDetectionFailed,
				Bridge::AttachFailed { .. } | Bridge::ScriptLoadFailed(_) => ErrorCode::InjectionFailed,
				Bridge::HookScriptMissing { .. } | Bridge::VersionConfigMissing { .. } => {
					ErrorCode::ResourceMissing
				}
				Bridge::AlreadyRunning(_) | Bridge::SessionActive(_) => ErrorCode::AlreadyRunning,
				Bridge::Io(_) => ErrorCode::IoError,
				Bridge::Decode(_) | Bridge::AggregateStop(_) | Bridge::Shutdown { .. } => {
					ErrorCode::InternalError
				}
			},
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) | CliError::Anyhow(_) => ErrorCode::InternalError,
		}
	}

	/// Convert this error to a CommandError for structured output
	pub fn to_command_error(&self) -> CommandError {
		CommandError {
			code: self.code(),
			message: self.to_string(),
		}
	}
}
