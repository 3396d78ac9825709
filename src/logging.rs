//! Terminal logger setup.

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Install the process-wide terminal logger.
///
/// Only the first call installs a logger; later calls return `false` and
/// leave the existing logger in place.
pub fn init(level: LevelFilter) -> bool {
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build();

    TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto).is_ok()
}
