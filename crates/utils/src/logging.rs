use tracing_subscriber::{EnvFilter, prelude::*};

const WORKSPACE_CRATES: &[&str] = &[
    "server",
    "services",
    "db",
    "deployment",
    "local_deployment",
    "utils",
];

/// Filter directive applying `level` to every workspace crate and `warn` elsewhere.
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec!["warn".to_string(), format!("tower_http={level}")];
    directives.extend(WORKSPACE_CRATES.iter().map(|krate| format!("{krate}={level}")));
    directives.join(",")
}

/// Install the global subscriber. `RUST_LOG` holds a bare level such as `debug`.
pub fn init() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_new(filter_directives(&log_level))
        .unwrap_or_else(|_| EnvFilter::new(filter_directives("info")));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();
}
