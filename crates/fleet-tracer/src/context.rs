//! Ambient span propagation across `.await` points.

use fleet_core::Span;
use std::collections::BTreeMap;
use std::future::Future;

tokio::task_local! {
    static CURRENT_SPAN: Span;
}

/// Header-style carrier for span context crossing an RPC boundary.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key carrying the trace id across process boundaries.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Metadata key carrying the parent span id across process boundaries.
pub const SPAN_ID_HEADER: &str = "x-span-id";
/// Metadata key carrying the resource id across process boundaries.
pub const RESOURCE_ID_HEADER: &str = "x-resource-id";

/// The span installed by the innermost enclosing `observe_*` call, if any.
///
/// Returns `None` outside of any observed call; callers at the edge of the
/// system (e.g. a fresh server entrypoint with no parent) should treat this
/// as "no parent" rather than an error.
#[must_use]
pub fn current_span() -> Option<Span> {
    CURRENT_SPAN.try_with(Clone::clone).ok()
}

/// Run `fut` with `span` installed as [`current_span`] for its duration.
///
/// Nests correctly: a call made from within `fut` that in turn calls
/// `with_span` again shadows `span` only until that inner future resolves,
/// then `span` is current again.
pub(crate) async fn with_span<F, T>(span: Span, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_SPAN.scope(span, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::SpanKind;

    fn span(id: &str) -> Span {
        Span::start("tr", id, None, "Svc.Method", SpanKind::Internal, "svc", chrono::Utc::now())
    }

    #[tokio::test]
    async fn no_current_span_outside_any_scope() {
        assert!(current_span().is_none());
    }

    #[tokio::test]
    async fn nested_scope_shadows_then_restores_outer() {
        with_span(span("outer"), async {
            assert_eq!(current_span().unwrap().span_id, "outer");
            with_span(span("inner"), async {
                assert_eq!(current_span().unwrap().span_id, "inner");
            })
            .await;
            assert_eq!(current_span().unwrap().span_id, "outer");
        })
        .await;
    }
}
