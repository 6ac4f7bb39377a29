//! Pybounce - the Python side of a Tcl/Python embedding bridge
//!
//! Pybounce executes Python code fragments supplied by an embedding host
//! inside a persistent namespace pair, captures everything the fragments
//! write to standard output, and converts raised exceptions into
//! structured records the host can carry across the runtime boundary. It
//! also ships [`TclDict`], a mutable mapping view over the host's flat
//! `key value key value` dictionary encoding.
//!
//! # Quick Start
//!
//! ```
//! use pybounce::{ExecOutcome, Trampoline};
//!
//! let mut py = Trampoline::default();
//!
//! // Definitions persist across calls on one trampoline.
//! py.run("def greet(name):\n    return 'hello ' + name");
//! assert_eq!(py.run("print(greet('tcl'))"), "hello tcl\n");
//!
//! // Failures become structured records instead of propagating.
//! match py.execute("greet(42)") {
//!     ExecOutcome::Exception(record) => {
//!         assert_eq!(record.code.origin, "PYTHON");
//!     }
//!     ExecOutcome::Success => unreachable!(),
//! }
//! ```
//!
//! # Execution model
//!
//! [`Trampoline::run`] captures standard output for the duration of one
//! call and returns the text wholesale; exceptions are folded into that
//! text as diagnostic lines. [`Trampoline::execute`] skips capture and
//! returns an [`ExecOutcome`]: `Success`, or `Exception` with an
//! [`ErrorRecord`] (origin tag, exception type, message, and a
//! banner-prefixed formatted traceback). Both mutate the namespace pair
//! in place — partial effects of a failed fragment persist, exactly like
//! `exec` against an explicit globals/locals pair.
//!
//! Calls are synchronous and must not be interleaved: output redirection
//! is shared state, so the embedding host serializes access. The
//! trampoline is intentionally neither `Send` nor `Sync`.
//!
//! # Supported Python Subset
//!
//! - Types: `None`, `bool`, `int`, `float`, `str`, `list`, `dict`
//!   (string keys)
//! - Operators: arithmetic, bitwise, comparisons (with chaining),
//!   `in`/`not in`, `is`/`is not`, `and`/`or`/`not`, conditional
//!   expressions
//! - Statements: assignment (names, subscripts), augmented assignment,
//!   `if`/`elif`/`else`, `while`/`for` with `break`/`continue`, `assert`,
//!   `pass`
//! - Functions: `def` with positional parameters and defaults, `return`,
//!   recursion; host callbacks via [`Trampoline::register_fn`]
//! - Exceptions: `raise Type("message")`, `try`/`except` with typed
//!   handlers and `as` binding
//! - Builtins: `print`, `len`, `str`, `repr`, `int`, `float`, `bool`,
//!   `list`, `range`, `abs`, `min`, `max`, `sum`; common `str`/`list`/
//!   `dict` methods; list comprehensions
//!
//! # Not Supported
//!
//! Classes, imports, closures, lambdas, f-strings, slices, `finally`,
//! `del`, `global`/`nonlocal`. These fail with a descriptive error
//! through the normal exception channel, never a panic.

mod builtins;
mod capture;
mod error;
mod eval;
mod marshal;
mod methods;
mod operators;
mod tcldict;
mod trampoline;
mod value;

pub use capture::{CaptureGuard, OutputStream};
pub use error::{Error, Result};
pub use eval::Limits;
pub use marshal::{ErrorCode, ErrorRecord, TracebackFrame, ERROR_ORIGIN, INFO_BANNER};
pub use tcldict::TclDict;
pub use trampoline::{ExecOutcome, Trampoline};
pub use value::PyValue;
