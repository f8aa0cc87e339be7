//! Logger setup for hosts and tests.

/// Installs `env_logger` with `filter` as the default directive.
///
/// `RUST_LOG` still takes precedence. Calling this more than once is
/// harmless; only the first call installs a logger.
pub fn init(filter: &str) {
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .try_init();
    if result.is_ok() {
        log::debug!("logging initialised with filter '{filter}'");
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init("debug");
        super::init("warn");
    }
}
