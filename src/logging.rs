// Tracing subscriber setup for applications embedding the client

use crate::config::LogFormat;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`. Returns `false` when a
/// subscriber was already installed by the host application.
pub fn init(log_level: &str, format: LogFormat) -> bool {
    let log_level = log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init("debug", LogFormat::Text);
        assert!(!init("info", LogFormat::Json));
    }
}
