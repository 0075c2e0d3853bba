pub use session::timing::warn_if_slow;

use once_cell::sync::OnceCell;
use tracing::{Span, field};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Correlation id attached to every line logged while serving one request.
#[derive(Clone, Debug)]
pub struct TraceId(String);

impl TraceId {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_tracing(json: bool) {
    LOGGER_INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let base = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            // Includes timing when the span closes
            .with_span_events(fmt::format::FmtSpan::CLOSE);

        if json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(base.json())
                .init();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(base.pretty())
                .init();
        }
    });
}

pub fn request_span(action: &str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "request",
        action = %action,
        trace_id = %trace_id.as_str(),
        user = field::Empty,
        range_id = field::Empty
    )
}

pub fn annotate_span(user: &str, range_id: Option<&str>) {
    let span = Span::current();
    span.record("user", field::display(user));
    if let Some(id) = range_id {
        span.record("range_id", field::display(id));
    }
}
