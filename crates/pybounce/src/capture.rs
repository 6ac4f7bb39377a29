//! Scoped capture of the interpreter's output stream.
//!
//! The trampoline and the interpreter share one [`OutputStream`] handle.
//! `print` writes through it; by default the text goes straight to the
//! process stdout. [`CaptureGuard::redirect`] swaps the stream's target to
//! an in-memory buffer and restores the previous target when the guard is
//! finished or dropped, so a capture can never leak past its scope, even
//! when execution fails partway through.

use std::cell::RefCell;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;

#[derive(Debug)]
enum Target {
    Stdout,
    Buffer(String),
}

/// A cheaply clonable handle to one output stream. Clones share the same
/// underlying target, so a redirect through any handle is visible to all
/// of them.
#[derive(Clone, Debug)]
pub struct OutputStream {
    target: Rc<RefCell<Target>>,
}

impl OutputStream {
    /// A stream that passes writes through to the process stdout.
    pub fn stdout() -> Self {
        OutputStream {
            target: Rc::new(RefCell::new(Target::Stdout)),
        }
    }

    pub fn write_str(&self, text: &str) {
        match &mut *self.target.borrow_mut() {
            Target::Stdout => {
                let mut out = io::stdout();
                let _ = out.write_all(text.as_bytes());
            }
            Target::Buffer(buf) => buf.push_str(text),
        }
    }

    /// Write `line` followed by a newline.
    pub fn write_line(&self, line: &str) {
        self.write_str(line);
        self.write_str("\n");
    }

    fn swap(&self, target: Target) -> Target {
        mem::replace(&mut *self.target.borrow_mut(), target)
    }
}

impl Default for OutputStream {
    fn default() -> Self {
        OutputStream::stdout()
    }
}

/// Redirects an [`OutputStream`] into a fresh buffer for as long as it
/// lives. [`finish`](CaptureGuard::finish) hands back the captured text;
/// if the guard is dropped without finishing (early return, panic), the
/// previous target is still restored and the captured text is discarded.
///
/// Guards must be released in the reverse order they were taken. Two
/// captures interleaved on the same stream will restore each other's
/// targets out of order; callers serialize access (the trampoline takes at
/// most one capture at a time).
pub struct CaptureGuard {
    stream: OutputStream,
    prev: Option<Target>,
}

impl CaptureGuard {
    pub fn redirect(stream: &OutputStream) -> Self {
        let prev = stream.swap(Target::Buffer(String::new()));
        CaptureGuard {
            stream: stream.clone(),
            prev: Some(prev),
        }
    }

    /// Restore the previous target and return everything captured.
    pub fn finish(mut self) -> String {
        match self.prev.take() {
            Some(prev) => match self.stream.swap(prev) {
                Target::Buffer(text) => text,
                Target::Stdout => String::new(),
            },
            None => String::new(),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.prev.take() {
            self.stream.swap(prev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_capturing(stream: &OutputStream) -> bool {
        matches!(&*stream.target.borrow(), Target::Buffer(_))
    }

    #[test]
    fn finish_returns_captured_text_and_restores() {
        let stream = OutputStream::stdout();
        let guard = CaptureGuard::redirect(&stream);
        stream.write_str("hello ");
        stream.write_line("world");
        assert!(is_capturing(&stream));
        assert_eq!(guard.finish(), "hello world\n");
        assert!(!is_capturing(&stream));
    }

    #[test]
    fn drop_without_finish_restores() {
        let stream = OutputStream::stdout();
        {
            let _guard = CaptureGuard::redirect(&stream);
            stream.write_str("discarded");
            assert!(is_capturing(&stream));
        }
        assert!(!is_capturing(&stream));
    }

    #[test]
    fn clones_share_the_redirect() {
        let stream = OutputStream::stdout();
        let writer = stream.clone();
        let guard = CaptureGuard::redirect(&stream);
        writer.write_line("via clone");
        assert_eq!(guard.finish(), "via clone\n");
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let stream = OutputStream::stdout();
        let outer = CaptureGuard::redirect(&stream);
        stream.write_str("outer ");
        let inner = CaptureGuard::redirect(&stream);
        stream.write_str("inner");
        assert_eq!(inner.finish(), "inner");
        stream.write_str("text");
        assert_eq!(outer.finish(), "outer text");
        assert!(!is_capturing(&stream));
    }

    #[test]
    fn restores_even_when_the_body_panics() {
        let stream = OutputStream::stdout();
        let clone = stream.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = CaptureGuard::redirect(&clone);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!is_capturing(&stream));
    }
}
