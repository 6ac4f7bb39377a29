//! Conversion of caught errors into host-transmissible records.
//!
//! The host runtime receives failures from executed Python as two pieces:
//! a 3-field error code (fixed origin tag, exception type name, message)
//! it can dispatch on, and a human-readable info string carrying a banner
//! plus the formatted traceback. Both are plain data; marshalling never
//! fails and never retains interpreter state.

use std::fmt;

use crate::error::Error;

/// Origin tag the host uses to tell bridge failures from its own.
pub const ERROR_ORIGIN: &str = "PYTHON";

/// Leading banner of [`ErrorRecord::info`], naming where the failing code
/// ran.
pub const INFO_BANNER: &str = "\nfrom python code executed by pybounce\n";

/// One call-stack entry at the moment an error surfaced. `text` is the
/// offending source line, empty when it could not be resolved.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TracebackFrame {
    pub name: String,
    pub line: usize,
    pub text: String,
}

/// The ordered (origin, exception type, message) triple.
///
/// Renders as a flat space-joined list for hosts that consume the triple
/// in its serialized form.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorCode {
    pub origin: String,
    pub exception: String,
    pub message: String,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.origin, self.exception, self.message)
    }
}

/// A fully marshalled execution failure.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorRecord {
    pub code: ErrorCode,
    /// Banner plus formatted traceback, right-trimmed.
    pub info: String,
}

/// Build the host-facing record for a caught error.
pub fn marshal(err: &Error, frames: &[TracebackFrame]) -> ErrorRecord {
    let (exception, message) = exception_parts(err);
    let mut info = String::from(INFO_BANNER);
    info.push_str(&format_traceback(frames));
    ErrorRecord {
        code: ErrorCode {
            origin: ERROR_ORIGIN.to_string(),
            exception,
            message,
        },
        info: info.trim_end().to_string(),
    }
}

/// Python exception type name and bare message for an internal error.
///
/// `Runtime` errors raised as `"SomeError: message"` split back into their
/// type and message; anything unrecognized is a `RuntimeError`.
pub(crate) fn exception_parts(err: &Error) -> (String, String) {
    match err {
        Error::Parse(msg) => ("SyntaxError".to_string(), msg.clone()),
        Error::Type { expected, got } => (
            "TypeError".to_string(),
            format!("expected {}, got {}", expected, got),
        ),
        Error::NameError(name) => (
            "NameError".to_string(),
            format!("name '{}' is not defined", name),
        ),
        Error::KeyError(key) => ("KeyError".to_string(), format!("'{}'", key)),
        Error::DivisionByZero => ("ZeroDivisionError".to_string(), "division by zero".to_string()),
        Error::Unsupported(msg) => (
            "RuntimeError".to_string(),
            format!("unsupported operation: {}", msg),
        ),
        Error::InstructionLimitExceeded(n) => (
            "InstructionLimitExceeded".to_string(),
            format!("execution exceeded {} instructions", n),
        ),
        Error::RecursionLimitExceeded(depth) => (
            "RecursionLimitExceeded".to_string(),
            format!("maximum recursion depth exceeded ({})", depth),
        ),
        Error::Runtime(msg) => match split_raised(msg) {
            Some((exc, rest)) => (exc.to_string(), rest.to_string()),
            None => ("RuntimeError".to_string(), msg.clone()),
        },
    }
}

/// Format traceback frames the way the embedded runtime prints them.
pub fn format_traceback(frames: &[TracebackFrame]) -> String {
    let mut out = String::new();
    for frame in frames {
        out.push_str(&format!(
            "  File \"<string>\", line {}, in {}\n",
            frame.line, frame.name
        ));
        if !frame.text.is_empty() {
            out.push_str(&format!("    {}\n", frame.text));
        }
    }
    out
}

/// The full exception display: traceback header, frames, and the final
/// `Type: message` line.
pub fn format_exception(err: &Error, frames: &[TracebackFrame]) -> String {
    let (exception, message) = exception_parts(err);
    let mut out = String::new();
    if !frames.is_empty() {
        out.push_str("Traceback (most recent call last):\n");
        out.push_str(&format_traceback(frames));
    }
    if message.is_empty() {
        out.push_str(&format!("{}\n", exception));
    } else {
        out.push_str(&format!("{}: {}\n", exception, message));
    }
    out
}

/// Split a `"SomeError: message"` string raised inside executed code.
/// The head must be identifier-shaped to count; `raise` always produces
/// that form, whatever the type is called (`StopIteration` included).
fn split_raised(msg: &str) -> Option<(&str, &str)> {
    let (head, rest) = msg.split_once(": ")?;
    let mut chars = head.chars();
    let looks_like_exception = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if looks_like_exception {
        Some((head, rest))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, line: usize, text: &str) -> TracebackFrame {
        TracebackFrame {
            name: name.to_string(),
            line,
            text: text.to_string(),
        }
    }

    #[test]
    fn classifies_variant_errors() {
        assert_eq!(
            exception_parts(&Error::DivisionByZero),
            ("ZeroDivisionError".to_string(), "division by zero".to_string())
        );
        assert_eq!(
            exception_parts(&Error::NameError("x".to_string())),
            ("NameError".to_string(), "name 'x' is not defined".to_string())
        );
        assert_eq!(
            exception_parts(&Error::KeyError("zzz".to_string())),
            ("KeyError".to_string(), "'zzz'".to_string())
        );
    }

    #[test]
    fn splits_raised_runtime_errors() {
        let (exc, msg) = exception_parts(&Error::Runtime("ValueError: bad input".to_string()));
        assert_eq!(exc, "ValueError");
        assert_eq!(msg, "bad input");

        let (exc, msg) = exception_parts(&Error::Runtime("CustomWidgetError: nope".to_string()));
        assert_eq!(exc, "CustomWidgetError");
        assert_eq!(msg, "nope");

        // Types without an Error/Exception suffix still split.
        let (exc, msg) = exception_parts(&Error::Runtime("StopIteration: done".to_string()));
        assert_eq!(exc, "StopIteration");
        assert_eq!(msg, "done");

        let (exc, msg) = exception_parts(&Error::Runtime("just some text: here".to_string()));
        assert_eq!(exc, "RuntimeError");
        assert_eq!(msg, "just some text: here");
    }

    #[test]
    fn record_carries_banner_and_is_right_trimmed() {
        let frames = vec![frame("<module>", 1, "1/0")];
        let record = marshal(&Error::DivisionByZero, &frames);
        assert_eq!(record.code.origin, "PYTHON");
        assert_eq!(record.code.exception, "ZeroDivisionError");
        assert_eq!(record.code.message, "division by zero");
        assert!(record.info.starts_with("\nfrom python code executed by pybounce\n"));
        assert!(record.info.contains("  File \"<string>\", line 1, in <module>"));
        assert_eq!(record.info, record.info.trim_end());
    }

    #[test]
    fn empty_traceback_still_yields_banner() {
        let record = marshal(&Error::Parse("invalid syntax".to_string()), &[]);
        assert_eq!(record.info, "\nfrom python code executed by pybounce");
    }

    #[test]
    fn format_exception_layout() {
        let frames = vec![frame("<module>", 3, "f()"), frame("f", 2, "return 1/0")];
        let text = format_exception(&Error::DivisionByZero, &frames);
        let expected = "Traceback (most recent call last):\n\
                        \x20 File \"<string>\", line 3, in <module>\n\
                        \x20   f()\n\
                        \x20 File \"<string>\", line 2, in f\n\
                        \x20   return 1/0\n\
                        ZeroDivisionError: division by zero\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn error_code_displays_as_flat_list() {
        let record = marshal(&Error::Runtime("ValueError: bad".to_string()), &[]);
        assert_eq!(record.code.to_string(), "PYTHON ValueError bad");
    }
}
