//! Logging setup

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` is honored; on top of it the arm controller logs at info
/// (debug with `-v`, trace with `-vv`) and everything else at warn.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init(verbosity: u8) -> Result<(), ParseError> {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("armctl={}", level).parse()?)
        .add_directive(format!("armctl_host={}", level).parse()?)
        .add_directive("warn".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
