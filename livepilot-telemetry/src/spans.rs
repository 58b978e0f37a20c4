//! Span helpers for live-session operations

use tracing::Span;

/// Span covering one live session, from open to teardown.
///
/// # Example
/// ```
/// use livepilot_telemetry::live_session_span;
/// let span = live_session_span("3f2a", "models/gemini-live");
/// let _enter = span.enter();
/// ```
pub fn live_session_span(session_id: &str, model: &str) -> Span {
    tracing::info_span!("live.session", session.id = session_id, model.name = model)
}

/// Span for opening the transport.
pub fn transport_connect_span(model: &str) -> Span {
    tracing::info_span!("transport.connect", model.name = model, mouse_mode = tracing::field::Empty)
}

/// Span for handling a tool call from the model.
pub fn tool_call_span(tool_name: &str, call_id: &str) -> Span {
    tracing::info_span!("tool.call", tool.name = tool_name, call.id = call_id)
}

/// Record the session mode on the current span, if it declared the field.
pub fn record_mouse_mode(enabled: bool) {
    Span::current().record("mouse_mode", enabled);
}
