//! Prometheus text exposition format.

use std::fmt::Write;

use crate::registry::GaugeSample;

pub const METRIC_NAME: &str = "api_health_status";
pub const METRIC_HELP: &str = "Status of the API (1 for healthy, 0 for unhealthy)";

/// Render gauge samples into Prometheus text format.
///
/// HELP and TYPE lines are always present, even with no samples.
pub fn render_prometheus(samples: &[GaugeSample]) -> String {
    let mut out = String::new();

    out.push_str(&format!("# HELP {METRIC_NAME} {METRIC_HELP}\n"));
    out.push_str(&format!("# TYPE {METRIC_NAME} gauge\n"));
    for s in samples {
        let _ = writeln!(
            out,
            "{METRIC_NAME}{{name=\"{}\",ip=\"{}\"}} {}",
            escape_label(&s.name),
            escape_label(&s.ip),
            s.status.value()
        );
    }

    out
}

/// Escape a label value: backslash, double quote and newline.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
