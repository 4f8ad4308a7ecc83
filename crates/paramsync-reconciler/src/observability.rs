//! Process-wide tracing setup.
//!
//! The filter sits behind a reload layer so `logging.level` can be changed
//! while the process runs without reinstalling the subscriber.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

use crate::config::LoggingConfig;
use crate::error::{ReconcileError, Result};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER: OnceLock<FilterHandle> = OnceLock::new();

/// Parses a bare level or a directive list such as
/// `paramsync_reconciler=debug,info`.
pub fn parse_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|err| {
        ReconcileError::configuration(format!("invalid log filter '{directives}': {err}"))
    })
}

/// Installs the global subscriber filtered by `logging.level`.
///
/// A valid `RUST_LOG` takes precedence. Returns `Ok(false)` when some other
/// subscriber was installed first.
pub fn init_logging(logging: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => parse_filter(&logging.level)?,
    };
    let (filter, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER.set(handle);
    }
    Ok(installed)
}

/// Replaces the active filter.
///
/// Returns `Ok(false)` if [`init_logging`] never installed a subscriber.
pub fn set_logging_level(directives: &str) -> Result<bool> {
    let filter = parse_filter(directives)?;
    let Some(handle) = FILTER.get() else {
        return Ok(false);
    };
    handle
        .reload(filter)
        .map_err(|err| ReconcileError::configuration(format!("log filter reload failed: {err}")))?;
    Ok(true)
}
