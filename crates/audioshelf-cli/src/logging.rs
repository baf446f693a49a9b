use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const CRATES: [&str; 3] = ["audioshelf", "audioshelf_core", "audioshelf_client"];

/// Log to stderr. `AUDIOSHELF_LOG` takes an `EnvFilter` directive and wins
/// over `-v`.
pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_env("AUDIOSHELF_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .init();
}

/// Our crates at the `-v` level, everything else at `warn`.
fn default_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let mut directives: Vec<String> = CRATES
        .iter()
        .map(|name| format!("{name}={level}"))
        .collect();
    directives.push("warn".to_string());
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_follows_verbosity() {
        assert_eq!(
            default_directive(1),
            "audioshelf=info,audioshelf_core=info,audioshelf_client=info,warn"
        );
        assert!(default_directive(9).starts_with("audioshelf=trace,"));
        assert!(EnvFilter::try_new(default_directive(2)).is_ok());
    }
}
