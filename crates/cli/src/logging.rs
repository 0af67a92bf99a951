//! stderr log output for the bridge binary.
//!
//! Bridge log lines are mirrored into `tracing` by the runtime, so the
//! default filter already shows what the desktop log viewer would. `RUST_LOG`
//! replaces the verbosity-derived filter entirely.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter directives for a `-v` count.
fn directives(verbosity: u8) -> &'static str {
	match verbosity {
		0 => "warn,wmpf_runtime=info,wmpf_cli=info",
		// ignored envelope categories, dropped relay messages
		1 => "info,wmpf_runtime=debug,wmpf_cli=debug",
		// includes hyper and tungstenite
		_ => "debug",
	}
}

pub fn init_logging(verbosity: u8) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(directives(verbosity)));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr.with_max_level(Level::TRACE))
		.with_target(verbosity > 0)
		.without_time()
		.compact()
		.init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn every_verbosity_parses() {
		for verbosity in 0..=3 {
			assert!(
				directives(verbosity).parse::<EnvFilter>().is_ok(),
				"verbosity {verbosity}"
			);
		}
	}

	#[test]
	fn extra_flags_saturate() {
		assert_eq!(directives(2), directives(u8::MAX));
	}
}
