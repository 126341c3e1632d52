use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// `--debug` wins; otherwise the configured level, falling back to INFO.
pub fn resolve_level(debug: bool, configured: &str) -> Level {
    if debug {
        return Level::DEBUG;
    }
    Level::from_str(configured.trim()).unwrap_or(Level::INFO)
}

pub fn init(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_level() {
        assert_eq!(resolve_level(true, "warn"), Level::DEBUG);
        assert_eq!(resolve_level(false, "warn"), Level::WARN);
        assert_eq!(resolve_level(false, "TRACE"), Level::TRACE);
        assert_eq!(resolve_level(false, "chatty"), Level::INFO);
    }
}
