use tracing::level_filters::LevelFilter;
use tracing::debug;

/// Level filter of a provider `log_level`
pub fn level_filter(level: &str) -> Option<LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        "off" => Some(LevelFilter::OFF),
        _ => None,
    }
}

/// Install a stderr logger at the given level
///
/// Terraform captures the plugin stderr in its own logs. When `PLUGIN_LOG_FILE`
/// is set, the plugin server has already installed a subscriber and this is a no-op.
pub fn init(level: &str) {
    let filter = level_filter(level).unwrap_or(LevelFilter::INFO);
    let installed = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if !installed {
        debug!(level, "logger already installed");
    }
}
