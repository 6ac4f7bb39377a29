use std::collections::HashMap;
use std::rc::Rc;

use crate::capture::{CaptureGuard, OutputStream};
use crate::error::Error;
use crate::eval::{Evaluator, HostFn, Limits};
use crate::marshal::{self, exception_parts, ErrorRecord, TracebackFrame};
use crate::value::PyValue;

/// Outcome of a checked execution: success carries no payload, failure
/// carries the marshalled record. The raised error itself never crosses
/// this boundary.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecOutcome {
    Success,
    Exception(ErrorRecord),
}

impl ExecOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Success)
    }
}

/// The execution trampoline: runs host-supplied Python fragments in a
/// persistent namespace pair and hands back captured output or a
/// marshalled error record.
///
/// Definitions and variables persist across calls on one instance; the
/// namespaces are mutated in place and never replaced, so a fragment that
/// fails halfway still leaves its earlier bindings visible to later calls.
///
/// Output redirection is scoped per [`run`](Trampoline::run) call and
/// restored on every exit path, but it is not reentrant: calls must be
/// serialized by the embedding host. The trampoline is deliberately
/// neither `Send` nor `Sync`.
///
/// # Example
///
/// ```
/// use pybounce::Trampoline;
///
/// let mut py = Trampoline::default();
///
/// assert_eq!(py.run("x = 41"), "");
/// assert_eq!(py.run("print(x + 1)"), "42\n");
///
/// // Failures come back as captured diagnostic text, never a panic.
/// let output = py.run("1 / 0");
/// assert!(output.contains("ZeroDivisionError"));
/// ```
pub struct Trampoline {
    evaluator: Evaluator,
    stdout: OutputStream,
}

impl Trampoline {
    /// Create a trampoline owning the given namespace pair for its
    /// lifetime.
    pub fn new(globals: HashMap<String, PyValue>, locals: HashMap<String, PyValue>) -> Self {
        Self::with_limits(globals, locals, Limits::default())
    }

    /// Like [`new`](Trampoline::new), with explicit resource limits.
    pub fn with_limits(
        globals: HashMap<String, PyValue>,
        locals: HashMap<String, PyValue>,
        limits: Limits,
    ) -> Self {
        let stdout = OutputStream::stdout();
        Self {
            evaluator: Evaluator::new(globals, locals, stdout.clone(), limits),
            stdout,
        }
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.evaluator.set_limits(limits);
    }

    /// Execute `command` and return everything it wrote to standard
    /// output, the empty string included.
    ///
    /// Exceptions do not propagate: a failing command has its diagnostic
    /// (message, type name, argument tuple, and the fully formatted
    /// exception) written into the captured stream instead, so the
    /// returned text always tells the whole story. The previous stream
    /// target is restored on every path.
    pub fn run(&mut self, command: &str) -> String {
        let guard = CaptureGuard::redirect(&self.stdout);
        if let Err(err) = self.evaluator.execute(command) {
            let frames = self.evaluator.take_traceback();
            self.print_diagnostic(&err, &frames);
        }
        guard.finish()
    }

    /// Execute `command` without output capture and report the outcome as
    /// a discriminated result.
    ///
    /// # Example
    ///
    /// ```
    /// use pybounce::{ExecOutcome, Trampoline};
    ///
    /// let mut py = Trampoline::default();
    ///
    /// assert!(py.execute("y = 2 + 2").is_success());
    ///
    /// match py.execute("raise ValueError('bad input')") {
    ///     ExecOutcome::Exception(record) => {
    ///         assert_eq!(record.code.origin, "PYTHON");
    ///         assert_eq!(record.code.exception, "ValueError");
    ///         assert_eq!(record.code.message, "bad input");
    ///     }
    ///     ExecOutcome::Success => unreachable!(),
    /// }
    /// ```
    pub fn execute(&mut self, command: &str) -> ExecOutcome {
        match self.evaluator.execute(command) {
            Ok(_) => ExecOutcome::Success,
            Err(err) => {
                let frames = self.evaluator.take_traceback();
                ExecOutcome::Exception(marshal::marshal(&err, &frames))
            }
        }
    }

    /// Insert a binding into the globals map.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<PyValue>) {
        self.evaluator.set_global(name, value.into());
    }

    /// Locals-then-globals lookup, the order executed code resolves names.
    pub fn get_variable(&self, name: &str) -> Option<&PyValue> {
        self.evaluator.get_binding(name)
    }

    /// Register a host callback callable from executed code. This is how
    /// the embedding host exposes its own commands to the embedded
    /// runtime.
    ///
    /// # Example
    ///
    /// ```
    /// use pybounce::{PyValue, Trampoline};
    ///
    /// let mut py = Trampoline::default();
    ///
    /// py.register_fn("tcl_eval", |args| {
    ///     let script = args.first().and_then(|v| v.as_str()).unwrap_or("");
    ///     PyValue::Str(format!("tcl said: {}", script))
    /// });
    ///
    /// assert_eq!(py.run("print(tcl_eval('puts hi'))"), "tcl said: puts hi\n");
    /// ```
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<PyValue>) -> PyValue + 'static,
    {
        self.evaluator.register_host_fn(name, Rc::new(f) as HostFn);
    }

    /// The diagnostic lines `run` folds into its captured text on
    /// failure, mirroring what the embedded runtime would print for an
    /// uncaught exception.
    fn print_diagnostic(&self, err: &Error, frames: &[TracebackFrame]) {
        let (exc_type, message) = exception_parts(err);
        self.stdout.write_line(&format!("exception: {}", message));
        self.stdout.write_line(&format!("exception type: {}", exc_type));
        if message.is_empty() {
            self.stdout.write_line("exception args: ()");
        } else {
            self.stdout
                .write_line(&format!("exception args: ('{}',)", message));
        }
        self.stdout.write_line("format_exception():");
        self.stdout.write_str(&marshal::format_exception(err, frames));
    }
}

impl Default for Trampoline {
    fn default() -> Self {
        Self::new(HashMap::new(), HashMap::new())
    }
}
