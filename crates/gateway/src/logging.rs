// Tracing initialization, mirroring the rest of the stack's filter-string
// and format-selection convention.

use crate::config::LoggingConfig;

pub fn init_tracing(logging_config: &LoggingConfig) {
    let mut filter = logging_config.level.clone();
    for (module, level) in &logging_config.modules {
        filter.push_str(&format!(",{module}={level}"));
    }

    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        }
        "compact" => {
            tracing_subscriber::fmt().compact().with_env_filter(filter).init();
        }
        _ => {
            tracing_subscriber::fmt().pretty().with_env_filter(filter).init();
        }
    }
}
