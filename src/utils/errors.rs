//! User-Friendly Error Formatting
//!
//! Turns errors reaching the probe binary into a message with
//! troubleshooting hints picked from the error's classification.

use std::fmt::Write;

use crate::audio::AudioError;
use crate::connection::ConnectError;
use crate::cursor::CursorError;
use crate::error::ErrorKind;
use crate::gl::GlError;
use crate::registry::SegmentError;
use crate::transport::TransportError;
use crate::video::VideoError;

/// Classification of the first bridge error in an error chain
pub fn error_kind(error: &anyhow::Error) -> Option<ErrorKind> {
    error.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<VideoError>() {
            Some(crate::video::classify_error(e))
        } else if let Some(e) = cause.downcast_ref::<AudioError>() {
            Some(crate::audio::classify_error(e))
        } else if let Some(e) = cause.downcast_ref::<ConnectError>() {
            Some(crate::connection::classify_error(e))
        } else if let Some(e) = cause.downcast_ref::<SegmentError>() {
            Some(crate::registry::classify_error(e))
        } else if let Some(e) = cause.downcast_ref::<GlError>() {
            Some(crate::gl::classify_error(e))
        } else if let Some(e) = cause.downcast_ref::<CursorError>() {
            Some(crate::cursor::classify_error(e))
        } else {
            cause
                .downcast_ref::<TransportError>()
                .map(crate::transport::classify_error)
        }
    })
}

/// Format error for user consumption
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    let error_msg = error.to_string();
    match error_kind(error) {
        Some(ErrorKind::ConnectionUnavailable) => format_connection_error(&mut output),
        Some(ErrorKind::SegmentRejected) => format_segment_error(&mut output),
        Some(ErrorKind::ProtocolInconsistent) => format_protocol_error(&mut output),
        Some(kind) => format_generic_error(&mut output, &error_msg, Some(kind)),
        None if error_msg.contains("config") => format_config_error(&mut output),
        None => format_generic_error(&mut output, &error_msg, None),
    }

    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: shmif-probe -vv"
    )
    .ok();

    output
}

fn format_connection_error(output: &mut String) {
    writeln!(output, "Compositor Connection Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not reach an Arcan compositor.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. ARCAN_CONNPATH is not set").ok();
    writeln!(output, "     → Launch the program from within an Arcan session").ok();
    writeln!(
        output,
        "     → Or set connection.env_var to the variable your setup uses"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. The compositor refused the connection").ok();
    writeln!(output, "     → Check that the connection point is still listening").ok();
}

fn format_segment_error(output: &mut String) {
    writeln!(output, "Segment Request Rejected").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "The compositor declined a window or cursor segment."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  → The window manager script may limit subwindows").ok();
    writeln!(output, "  → Retry with a single window").ok();
}

fn format_protocol_error(output: &mut String) {
    writeln!(output, "Protocol Error").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "The connection to the compositor was lost or answered out of order."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  → The compositor may have exited or been restarted").ok();
    writeln!(output, "  → Reconnect by restarting the program").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not load the configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Out-of-range values").ok();
    writeln!(output, "     → audio.samples and video.pump_event_budget must be > 0").ok();
}

fn format_generic_error(output: &mut String, error: &str, kind: Option<ErrorKind>) {
    writeln!(output, "Bridge Error").ok();
    writeln!(output).ok();
    if let Some(kind) = kind {
        writeln!(output, "Category: {}", kind).ok();
    }
    writeln!(output, "Error: {}", error).ok();
}
