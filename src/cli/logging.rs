//! Tracing subscriber setup for the CLI

use crate::cli::args::LogFormat;

/// Resolve the filter directive from `--log-level` and `--verbose`
pub fn effective_level(log_level: &str, verbose: bool) -> String {
    let level = log_level.trim().to_ascii_lowercase();
    if verbose && matches!(level.as_str(), "error" | "warn" | "info") {
        "debug".to_string()
    } else {
        level
    }
}

/// Install the global subscriber once, writing to stderr. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str, format: LogFormat, use_color: bool) {
    use std::io::IsTerminal;
    use std::sync::OnceLock;
    use tracing_subscriber::{fmt, EnvFilter};

    static INITIALISED: OnceLock<()> = OnceLock::new();

    INITIALISED.get_or_init(|| {
        let use_ansi = use_color
            && std::env::var_os("NO_COLOR").is_none()
            && std::io::stderr().is_terminal();
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                let subscriber = fmt::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .json()
                    .finish();
                let _ = tracing::subscriber::set_global_default(subscriber);
            }
            LogFormat::Text => {
                let subscriber = fmt::fmt()
                    .with_env_filter(filter)
                    .with_ansi(use_ansi)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .without_time()
                    .compact()
                    .finish();
                let _ = tracing::subscriber::set_global_default(subscriber);
            }
        }
    });
}
