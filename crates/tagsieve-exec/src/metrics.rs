//! Tracing hooks for backend compiles.
//!
//! Compiled out entirely without the `tracing` feature.

/// One debug event per backend compile, fields flattened into a single line.
#[cfg(feature = "tracing")]
pub fn emit_span(stage: &str, fields: &[(&str, String)]) {
    let span = tracing::debug_span!("backend_compile", stage);
    let _entered = span.enter();
    let summary = fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");
    tracing::debug!(%summary, "compiled");
}

#[cfg(not(feature = "tracing"))]
pub fn emit_span(_stage: &str, _fields: &[(&str, String)]) {}
