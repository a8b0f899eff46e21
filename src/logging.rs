//! Logger setup

use log::{debug, warn};
use std::path::Path;

/// Initialize log4rs from `config_file`, falling back to env_logger when the
/// file is missing or unreadable
pub fn init(config_file: &str) {
    if Path::new(config_file).exists() {
        match log4rs::init_file(config_file, Default::default()) {
            Ok(()) => return,
            Err(e) => {
                init_env_logger();
                warn!("Failed to load log configuration {}: {}. Using env_logger.", config_file, e);
                return;
            }
        }
    }

    init_env_logger();
    warn!("Log configuration {} not found. Using env_logger.", config_file);
}

fn init_env_logger() {
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init() {
        debug!("Logger already installed, keeping it: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_tolerates_installed_logger() {
        init("missing_log_config.yaml");
        init("missing_log_config.yaml");
        log::info!("still logging after a second init");
    }
}
