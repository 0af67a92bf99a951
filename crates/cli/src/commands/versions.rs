use crate::config::Settings;
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};

pub fn run(settings: &Settings, format: OutputFormat) -> Result<()> {
	let resources = settings.resources();
	let versions = resources.available_versions();

	if versions.is_empty() && format == OutputFormat::Text {
		eprintln!("no version configs in {}", resources.config_dir().display());
	}

	let result = ResultBuilder::new("versions").data(versions).build();
	print_result(&result, format);
	Ok(())
}
