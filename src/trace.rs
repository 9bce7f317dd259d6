use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber. `levels` takes `EnvFilter` directives,
/// e.g. `info,scaleway_sd=debug`, invalid directives fall back to `info`.
///
/// Calling it again is a no-op, so tests can call it freely.
pub fn init(color: bool, json: bool, levels: &str) {
    let filter = EnvFilter::try_new(levels).unwrap_or_else(|err| {
        eprintln!("invalid log levels {levels:?}, {err}");
        EnvFilter::new("info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.with_ansi(color).finish().try_init()
    };

    if let Err(err) = result {
        debug!(message = "global subscriber already installed", %err);
    }
}
