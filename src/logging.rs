use env_logger::{Builder, Env};
use log::LevelFilter;

/// Installs the global logger. `RUST_LOG` wins when set; otherwise `verbose`
/// selects debug over info.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let env = Env::default().default_filter_or(level.to_string());
    let mut builder = Builder::from_env(env);
    builder.format_timestamp_millis();

    // Already initialised (tests, repeated CLI calls in one process).
    let _ = builder.try_init();
}
