//! Diagnostic logging on stderr
//!
//! `RUST_LOG` wins when set and valid. Otherwise the level is `warn`, or
//! `debug` for addonpack crates under `--debug`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DIRECTIVE: &str = "warn";
const DEBUG_DIRECTIVE: &str =
    "warn,addonpack=debug,addonpack_core=debug,addonpack_engine=debug,addonpack_image=debug,addonpack_bundle=debug";

/// Filter directive used when `RUST_LOG` is absent
pub fn default_directive(debug: bool) -> &'static str {
    if debug { DEBUG_DIRECTIVE } else { DEFAULT_DIRECTIVE }
}

pub fn init(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    // a subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .without_time()
                .with_target(debug)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "warn");
        assert!(default_directive(true).contains("addonpack_bundle=debug"));
        EnvFilter::try_new(default_directive(true)).unwrap();
    }
}
