use tracing::debug;
use wmpf_runtime::{BridgeHost, default_backend};

use crate::config::Settings;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

pub async fn run(settings: &Settings, format: OutputFormat) -> Result<()> {
	let host = BridgeHost::new(settings.bridge_options(), default_backend());
	let report = host.probe().await?;
	debug!(
		target = "wmpf.cli",
		pid = report.target.process.pid,
		version = report.target.version,
		"probe complete"
	);

	if !report.config_available && format == OutputFormat::Text {
		eprintln!(
			"warning: no address config for version {} at {}",
			report.target.version,
			report.config_path.display()
		);
	}

	let result = ResultBuilder::new("probe").data(&report).build();
	print_result(&result, format);
	Ok(())
}
