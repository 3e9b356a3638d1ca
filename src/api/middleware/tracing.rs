//! Request spans for every route.

use tower_http::LatencyUnit;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Wraps each request in an `INFO` span and logs the status and latency in
/// milliseconds when the response is sent.
///
/// Redirects show up as 307 responses; the resolver logs the cache hit or miss
/// inside the same span. 5xx responses are classified as failures.
///
/// ```text
/// INFO request{method=GET uri=/ab12CD34 version=HTTP/1.1}: finished processing request latency=3 ms status=307
/// INFO request{method=PATCH uri=/api/links/7 version=HTTP/1.1}: finished processing request latency=9 ms status=200
/// ```
pub fn layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}
