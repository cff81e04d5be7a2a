use std::sync::Once;

use tracing_subscriber::filter::Directive;

static TRACING_INIT: Once = Once::new();

/// Initializes the global tracing subscriber with `directive`, usually the
/// engine config's log filter. `RUST_LOG` still takes precedence.
pub fn init_tracing_with(directive: &str) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let mut filter = EnvFilter::from_default_env();
        match directive.parse::<Directive>() {
            Ok(parsed) => filter = filter.add_directive(parsed),
            Err(err) => eprintln!("ignoring invalid log filter `{directive}`: {err}"),
        }

        let _ = fmt().with_env_filter(filter).try_init();
    });
}
