use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub const LOG_ENV: &str = "MILO_DASHBOARD_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

/// Filter directive: `-v` forces debug, else the dashboard's own variable,
/// then `RUST_LOG`, then warnings only.
pub(crate) fn filter_directive(verbose: bool, env: impl Fn(&str) -> Option<String>) -> String {
    if verbose {
        return "debug".to_string();
    }
    env(LOG_ENV)
        .or_else(|| env("RUST_LOG"))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// Install the stderr subscriber. Safe to call more than once.
pub fn init_logging(verbose: bool) {
    let directive = filter_directive(verbose, |key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok(); // Already installed is fine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_environment() {
        let env = |key: &str| (key == LOG_ENV).then(|| "error".to_string());
        assert_eq!(filter_directive(true, env), "debug");
        assert_eq!(filter_directive(false, env), "error");
    }

    #[test]
    fn falls_back_to_rust_log_then_warn() {
        let env = |key: &str| (key == "RUST_LOG").then(|| "info".to_string());
        assert_eq!(filter_directive(false, env), "info");
        assert_eq!(filter_directive(false, |_: &str| None), "warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging(false);
        init_logging(true);
    }
}
