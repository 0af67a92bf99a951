mod probe;
mod start;
mod versions;

use crate::cli::{Cli, Commands};
use crate::config::{ConfigFile, Settings, env_resource_dir};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let Cli {
		format,
		config,
		command,
		..
	} = cli;

	let file = ConfigFile::load(config.as_deref())?;
	let mut settings = Settings::resolve(file, env_resource_dir());

	match command {
		Commands::Start(args) => {
			settings.apply_start(&args);
			start::run(settings, format).await
		}
		Commands::Versions(args) => {
			settings.apply_resources(&args);
			versions::run(&settings, format)
		}
		Commands::Probe(args) => {
			settings.apply_target(&args);
			probe::run(&settings, format).await
		}
	}
}
