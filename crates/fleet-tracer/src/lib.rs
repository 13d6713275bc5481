// SPDX-License-Identifier: MIT OR Apache-2.0
//! Distributed trace propagation: span creation, ambient current-span
//! carrying across `.await` points, and the `observe_*` call wrappers RPC
//! servers and clients use to thread spans through unary and streaming
//! calls.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod sink;
mod tracer;

pub use context::{Metadata, RESOURCE_ID_HEADER, SPAN_ID_HEADER, TRACE_ID_HEADER, current_span};
pub use fleet_core::api::SpanFilter;
pub use fleet_core::{Span, SpanEvent, SpanKind, SpanStatus, StatusCode};
pub use sink::{NullSink, TraceSink};
pub use tracer::Tracer;
