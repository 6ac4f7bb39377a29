//! Tree-walking evaluator behind the trampoline's execution boundary.
//!
//! Code fragments are parsed with `rustpython-parser` and walked statement
//! by statement against the namespace pair. The evaluator keeps a frame
//! stack for traceback bookkeeping: one entry for `<module>` plus one per
//! active function call. When an error propagates out, the frames are left
//! in place so the trampoline can snapshot them into
//! [`TracebackFrame`](crate::TracebackFrame)s before the next execution.

use std::collections::HashMap;
use std::rc::Rc;

use rustpython_parser::ast::{self, Constant, Expr, Ranged, Stmt};
use rustpython_parser::{parse, Mode};

use crate::builtins::{try_builtin, BuiltinResult};
use crate::capture::OutputStream;
use crate::error::{Error, Result};
use crate::marshal::{exception_parts, TracebackFrame};
use crate::methods;
use crate::operators::{apply_binop, apply_cmpop, apply_unaryop};
use crate::value::PyValue;

/// A host callback callable from executed code.
pub type HostFn = Rc<dyn Fn(Vec<PyValue>) -> PyValue>;

/// The walker recurses on the real stack, so the depth ceiling stays on
/// even when no limits are configured.
const DEFAULT_RECURSION_LIMIT: usize = 100;

/// Resource ceilings for one execution.
///
/// Exceeding a limit raises an error that `try`/`except` in executed code
/// cannot intercept; the host still receives it through the normal
/// `run`/`execute` channels.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Maximum number of statements evaluated per execution, loop
    /// iterations included. `None` means unlimited.
    pub max_instructions: Option<u64>,
    /// Maximum depth of user-defined function calls.
    pub max_recursion_depth: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_instructions: None,
            max_recursion_depth: Some(DEFAULT_RECURSION_LIMIT),
        }
    }
}

/// A user-defined function. The body is cloned out of the parse and the
/// defining source is retained so definitions outlive the `execute` call
/// that made them.
#[derive(Clone)]
struct FunctionDef {
    params: Vec<String>,
    /// Aligned to the tail of `params`, evaluated at definition time.
    defaults: Vec<PyValue>,
    body: Vec<Stmt>,
    source: Rc<str>,
}

/// Traceback bookkeeping for one active scope: which source it runs in
/// and the byte offset of the statement currently executing.
struct Frame {
    name: String,
    source: Rc<str>,
    offset: usize,
}

/// What a statement produced: a value, or a control signal escaping the
/// enclosing body.
enum Flow {
    Value(PyValue),
    Break,
    Continue,
    Return(PyValue),
}

/// The evaluator. One instance persists across `execute` calls; the
/// namespace pair, function registry, and host callbacks all survive
/// between calls.
pub struct Evaluator {
    globals: HashMap<String, PyValue>,
    locals: HashMap<String, PyValue>,
    functions: HashMap<String, FunctionDef>,
    host_fns: HashMap<String, HostFn>,
    /// One scope per active user-function call, innermost last. Empty at
    /// top level, where assignment goes to `locals`.
    call_scopes: Vec<HashMap<String, PyValue>>,
    frames: Vec<Frame>,
    stdout: OutputStream,
    limits: Limits,
    instructions: u64,
}

impl Evaluator {
    pub fn new(
        globals: HashMap<String, PyValue>,
        locals: HashMap<String, PyValue>,
        stdout: OutputStream,
        limits: Limits,
    ) -> Self {
        Self {
            globals,
            locals,
            functions: HashMap::new(),
            host_fns: HashMap::new(),
            call_scopes: Vec::new(),
            frames: Vec::new(),
            stdout,
            limits,
            instructions: 0,
        }
    }

    pub fn set_limits(&mut self, limits: Limits) {
        self.limits = limits;
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: PyValue) {
        self.globals.insert(name.into(), value);
    }

    /// Locals-then-globals lookup, the order executed code sees.
    pub fn get_binding(&self, name: &str) -> Option<&PyValue> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }

    pub fn register_host_fn(&mut self, name: impl Into<String>, f: HostFn) {
        self.host_fns.insert(name.into(), f);
    }

    /// Parse and run `code`, returning the value of its last expression
    /// statement. The namespace pair is mutated in place; on failure every
    /// binding made before the fault is kept.
    pub fn execute(&mut self, code: &str) -> Result<PyValue> {
        self.instructions = 0;
        self.frames.clear();
        self.call_scopes.clear();

        let ast = parse(code, Mode::Module, "<string>")
            .map_err(|e| Error::Parse(e.to_string()))?;
        let module = ast
            .as_module()
            .ok_or_else(|| Error::Parse("expected a module".to_string()))?;

        let source: Rc<str> = Rc::from(code);
        self.frames.push(Frame {
            name: "<module>".to_string(),
            source,
            offset: 0,
        });

        let mut result = PyValue::None;
        for stmt in &module.body {
            match self.eval_stmt(stmt)? {
                Flow::Value(v) => result = v,
                Flow::Break | Flow::Continue => {
                    return Err(Error::Runtime(
                        "SyntaxError: 'break' or 'continue' outside loop".to_string(),
                    ));
                }
                Flow::Return(_) => {
                    return Err(Error::Runtime(
                        "SyntaxError: 'return' outside function".to_string(),
                    ));
                }
            }
        }

        self.frames.pop();
        Ok(result)
    }

    /// Snapshot and clear the frame stack left behind by a failed
    /// execution, resolving each frame's offset to a line number and the
    /// source line text.
    pub fn take_traceback(&mut self) -> Vec<TracebackFrame> {
        self.call_scopes.clear();
        std::mem::take(&mut self.frames)
            .iter()
            .map(|frame| {
                let (line, text) = locate(&frame.source, frame.offset);
                TracebackFrame {
                    name: frame.name.clone(),
                    line,
                    text,
                }
            })
            .collect()
    }

    fn tick(&mut self) -> Result<()> {
        self.instructions += 1;
        if let Some(limit) = self.limits.max_instructions {
            if self.instructions > limit {
                return Err(Error::InstructionLimitExceeded(limit));
            }
        }
        Ok(())
    }

    /// Record where the current frame is, for traceback snapshots.
    fn mark(&mut self, offset: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.offset = offset;
        }
    }

    fn eval_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        self.mark(stmt.start().to_usize());
        self.tick()?;

        match stmt {
            Stmt::Expr(expr_stmt) => Ok(Flow::Value(self.eval_expr(&expr_stmt.value)?)),

            Stmt::Assign(assign) => {
                let value = self.eval_expr(&assign.value)?;
                for target in &assign.targets {
                    self.assign_target(target, value.clone())?;
                }
                Ok(Flow::Value(PyValue::None))
            }

            Stmt::AugAssign(aug) => {
                let current = self.eval_expr(&aug.target)?;
                let right = self.eval_expr(&aug.value)?;
                let result = apply_binop(&aug.op, &current, &right)?;
                self.assign_target(&aug.target, result)?;
                Ok(Flow::Value(PyValue::None))
            }

            Stmt::If(if_stmt) => {
                if self.eval_expr(&if_stmt.test)?.is_truthy() {
                    self.eval_body(&if_stmt.body)
                } else {
                    self.eval_body(&if_stmt.orelse)
                }
            }

            Stmt::While(while_stmt) => {
                if !while_stmt.orelse.is_empty() {
                    return Err(Error::Unsupported("'else' on loops".to_string()));
                }
                while self.eval_expr(&while_stmt.test)?.is_truthy() {
                    self.tick()?;
                    match self.eval_body(&while_stmt.body)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Value(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Value(PyValue::None))
            }

            Stmt::For(for_stmt) => {
                if !for_stmt.orelse.is_empty() {
                    return Err(Error::Unsupported("'else' on loops".to_string()));
                }
                let iter = self.eval_expr(&for_stmt.iter)?;
                for item in self.iter_items(iter)? {
                    self.tick()?;
                    self.assign_target(&for_stmt.target, item)?;
                    match self.eval_body(&for_stmt.body)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Value(_) => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Value(PyValue::None))
            }

            Stmt::FunctionDef(def) => {
                self.define_function(def)?;
                Ok(Flow::Value(PyValue::None))
            }

            Stmt::Return(ret) => {
                if self.call_scopes.is_empty() {
                    return Err(Error::Runtime(
                        "SyntaxError: 'return' outside function".to_string(),
                    ));
                }
                let value = match &ret.value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => PyValue::None,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Try(try_stmt) => self.eval_try(try_stmt),

            Stmt::Raise(raise_stmt) => match &raise_stmt.exc {
                Some(exc) => Err(self.raised_error(exc)?),
                None => Err(Error::Unsupported("bare 'raise'".to_string())),
            },

            Stmt::Assert(assert_stmt) => {
                if self.eval_expr(&assert_stmt.test)?.is_truthy() {
                    return Ok(Flow::Value(PyValue::None));
                }
                let message = match &assert_stmt.msg {
                    Some(msg) => self.eval_expr(msg)?.to_print_string(),
                    None => String::new(),
                };
                Err(Error::Runtime(format!("AssertionError: {}", message)))
            }

            Stmt::Pass(_) => Ok(Flow::Value(PyValue::None)),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),

            Stmt::ClassDef(_) => Err(Error::Unsupported("class definitions".to_string())),
            Stmt::Import(_) | Stmt::ImportFrom(_) => {
                Err(Error::Unsupported("imports".to_string()))
            }
            Stmt::Delete(_) => Err(Error::Unsupported("'del'".to_string())),
            Stmt::Global(_) | Stmt::Nonlocal(_) => {
                Err(Error::Unsupported("'global'/'nonlocal'".to_string()))
            }

            _ => Err(Error::Unsupported(format!(
                "Statement type not supported: {:?}",
                std::mem::discriminant(stmt)
            ))),
        }
    }

    fn eval_body(&mut self, body: &[Stmt]) -> Result<Flow> {
        let mut result = PyValue::None;
        for stmt in body {
            match self.eval_stmt(stmt)? {
                Flow::Value(v) => result = v,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Value(result))
    }

    fn eval_try(&mut self, try_stmt: &ast::StmtTry) -> Result<Flow> {
        if !try_stmt.finalbody.is_empty() {
            return Err(Error::Unsupported("'finally' blocks".to_string()));
        }
        if !try_stmt.orelse.is_empty() {
            return Err(Error::Unsupported("'else' on try blocks".to_string()));
        }

        let frame_depth = self.frames.len();
        let scope_depth = self.call_scopes.len();

        match self.eval_body(&try_stmt.body) {
            Ok(flow) => Ok(flow),
            Err(err) if err.is_catchable() => {
                // Frames pushed inside the failed body are dead once a
                // handler catches.
                self.frames.truncate(frame_depth);
                self.call_scopes.truncate(scope_depth);

                let (exc_type, message) = exception_parts(&err);
                for handler in &try_stmt.handlers {
                    let ast::ExceptHandler::ExceptHandler(h) = handler;
                    if !handler_matches(h.type_.as_deref(), &exc_type)? {
                        continue;
                    }
                    if let Some(name) = &h.name {
                        self.bind(name.to_string(), PyValue::Str(message.clone()));
                    }
                    return self.eval_body(&h.body);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Build the error for a `raise` statement. `raise ValueError("msg")`
    /// and `raise ValueError` both carry the type name so the marshaller
    /// can split it back out.
    fn raised_error(&mut self, exc: &Expr) -> Result<Error> {
        match exc {
            Expr::Call(call) => {
                let name = match call.func.as_ref() {
                    Expr::Name(name) => name.id.to_string(),
                    _ => {
                        return Err(Error::Unsupported(
                            "raising a computed exception".to_string(),
                        ));
                    }
                };
                let message = match call.args.first() {
                    Some(arg) => self.eval_expr(arg)?.to_print_string(),
                    None => String::new(),
                };
                Ok(Error::Runtime(format!("{}: {}", name, message)))
            }
            Expr::Name(name) => Ok(Error::Runtime(format!("{}: ", name.id))),
            _ => Err(Error::Unsupported(
                "raise requires an exception type".to_string(),
            )),
        }
    }

    fn define_function(&mut self, def: &ast::StmtFunctionDef) -> Result<()> {
        if def.args.vararg.is_some() || def.args.kwarg.is_some() || !def.args.kwonlyargs.is_empty()
        {
            return Err(Error::Unsupported(
                "*args/**kwargs parameters".to_string(),
            ));
        }

        let mut params = Vec::new();
        let mut defaults = Vec::new();
        for arg in def.args.posonlyargs.iter().chain(&def.args.args) {
            params.push(arg.def.arg.to_string());
            if let Some(default) = &arg.default {
                defaults.push(self.eval_expr(default)?);
            } else if !defaults.is_empty() {
                return Err(Error::Parse(
                    "non-default argument follows default argument".to_string(),
                ));
            }
        }

        let source = match self.frames.first() {
            Some(frame) => frame.source.clone(),
            None => Rc::from(""),
        };
        self.functions.insert(
            def.name.to_string(),
            FunctionDef {
                params,
                defaults,
                body: def.body.clone(),
                source,
            },
        );
        Ok(())
    }

    fn assign_target(&mut self, target: &Expr, value: PyValue) -> Result<()> {
        match target {
            Expr::Name(name) => {
                self.bind(name.id.to_string(), value);
                Ok(())
            }
            Expr::Subscript(sub) => {
                let index = self.eval_expr(&sub.slice)?;
                let name = match sub.value.as_ref() {
                    Expr::Name(name) => name.id.to_string(),
                    _ => {
                        return Err(Error::Unsupported(
                            "assignment to a computed subscript".to_string(),
                        ));
                    }
                };
                let slot = self
                    .binding_mut(&name)
                    .ok_or_else(|| Error::NameError(name.clone()))?;
                match (slot, index) {
                    (PyValue::List(items), PyValue::Int(idx)) => {
                        let len = items.len() as i64;
                        let at = if idx < 0 { len.checked_add(idx).unwrap_or(-1) } else { idx };
                        if at < 0 || at >= len {
                            return Err(Error::Runtime(format!(
                                "IndexError: list assignment index out of range: {}",
                                idx
                            )));
                        }
                        items[at as usize] = value;
                        Ok(())
                    }
                    (PyValue::Dict(pairs), PyValue::Str(key)) => {
                        // First-match update, append otherwise.
                        match pairs.iter_mut().find(|(k, _)| *k == key) {
                            Some((_, slot)) => *slot = value,
                            None => pairs.push((key, value)),
                        }
                        Ok(())
                    }
                    (slot, index) => Err(Error::Type {
                        expected: "list[int] or dict[str] target".to_string(),
                        got: format!("{}[{}]", slot.type_name(), index.type_name()),
                    }),
                }
            }
            _ => Err(Error::Unsupported(
                "assignment target not supported".to_string(),
            )),
        }
    }

    /// Write a binding: the active function scope if any, otherwise the
    /// namespace pair's locals.
    fn bind(&mut self, name: String, value: PyValue) {
        match self.call_scopes.last_mut() {
            Some(scope) => {
                scope.insert(name, value);
            }
            None => {
                self.locals.insert(name, value);
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<&PyValue> {
        self.call_scopes
            .last()
            .and_then(|scope| scope.get(name))
            .or_else(|| self.locals.get(name))
            .or_else(|| self.globals.get(name))
    }

    fn binding_mut(&mut self, name: &str) -> Option<&mut PyValue> {
        let in_scope = self
            .call_scopes
            .last()
            .is_some_and(|scope| scope.contains_key(name));
        if in_scope {
            return self.call_scopes.last_mut().and_then(|scope| scope.get_mut(name));
        }
        if self.locals.contains_key(name) {
            return self.locals.get_mut(name);
        }
        self.globals.get_mut(name)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<PyValue> {
        match expr {
            Expr::Constant(constant) => eval_constant(&constant.value),

            Expr::Name(name) => match self.lookup(name.id.as_str()) {
                Some(value) => Ok(value.clone()),
                None => Err(Error::NameError(name.id.to_string())),
            },

            Expr::List(list) => {
                let items: Result<Vec<PyValue>> =
                    list.elts.iter().map(|e| self.eval_expr(e)).collect();
                Ok(PyValue::List(items?))
            }

            Expr::Tuple(tuple) => {
                let items: Result<Vec<PyValue>> =
                    tuple.elts.iter().map(|e| self.eval_expr(e)).collect();
                Ok(PyValue::List(items?))
            }

            Expr::Dict(dict) => {
                let mut pairs = Vec::new();
                for (key, value) in dict.keys.iter().zip(dict.values.iter()) {
                    let key = match key {
                        Some(k) => match self.eval_expr(k)? {
                            PyValue::Str(s) => s,
                            other => {
                                return Err(Error::Type {
                                    expected: "str".to_string(),
                                    got: other.type_name().to_string(),
                                });
                            }
                        },
                        None => return Err(Error::Unsupported("dict unpacking".to_string())),
                    };
                    let value = self.eval_expr(value)?;
                    pairs.push((key, value));
                }
                Ok(PyValue::Dict(pairs))
            }

            Expr::BinOp(binop) => {
                let left = self.eval_expr(&binop.left)?;
                let right = self.eval_expr(&binop.right)?;
                apply_binop(&binop.op, &left, &right)
            }

            Expr::UnaryOp(unary) => {
                let operand = self.eval_expr(&unary.operand)?;
                apply_unaryop(&unary.op, &operand)
            }

            Expr::BoolOp(boolop) => {
                // Short-circuit, returning the deciding operand like Python.
                let mut last = PyValue::None;
                for value in &boolop.values {
                    last = self.eval_expr(value)?;
                    let done = match boolop.op {
                        ast::BoolOp::And => !last.is_truthy(),
                        ast::BoolOp::Or => last.is_truthy(),
                    };
                    if done {
                        return Ok(last);
                    }
                }
                Ok(last)
            }

            Expr::Compare(cmp) => {
                let mut left = self.eval_expr(&cmp.left)?;
                for (op, right_expr) in cmp.ops.iter().zip(cmp.comparators.iter()) {
                    let right = self.eval_expr(right_expr)?;
                    if !apply_cmpop(op, &left, &right)? {
                        return Ok(PyValue::Bool(false));
                    }
                    left = right;
                }
                Ok(PyValue::Bool(true))
            }

            Expr::IfExp(ifexp) => {
                if self.eval_expr(&ifexp.test)?.is_truthy() {
                    self.eval_expr(&ifexp.body)
                } else {
                    self.eval_expr(&ifexp.orelse)
                }
            }

            Expr::Call(call) => {
                if !call.keywords.is_empty() {
                    return Err(Error::Unsupported("keyword arguments".to_string()));
                }
                let args: Result<Vec<PyValue>> =
                    call.args.iter().map(|a| self.eval_expr(a)).collect();
                let args = args?;
                match call.func.as_ref() {
                    Expr::Name(name) => self.call_named(name.id.as_str(), args),
                    Expr::Attribute(attr) => {
                        self.call_method(&attr.value, attr.attr.as_str(), args)
                    }
                    _ => Err(Error::Unsupported(
                        "calling a computed expression".to_string(),
                    )),
                }
            }

            Expr::Subscript(sub) => {
                if matches!(sub.slice.as_ref(), Expr::Slice(_)) {
                    return Err(Error::Unsupported("slices".to_string()));
                }
                let value = self.eval_expr(&sub.value)?;
                let index = self.eval_expr(&sub.slice)?;
                subscript(&value, &index)
            }

            Expr::ListComp(comp) => {
                let mut out = Vec::new();
                self.eval_comp(&comp.elt, &comp.generators, 0, &mut out)?;
                Ok(PyValue::List(out))
            }

            Expr::Attribute(attr) => Err(Error::Unsupported(format!(
                "attribute access '.{}' outside a method call",
                attr.attr
            ))),

            Expr::JoinedStr(_) => Err(Error::Unsupported("f-strings".to_string())),
            Expr::Lambda(_) => Err(Error::Unsupported("lambda expressions".to_string())),

            _ => Err(Error::Unsupported(format!(
                "Expression type not supported: {:?}",
                std::mem::discriminant(expr)
            ))),
        }
    }

    /// Dispatch a call by name: builtins, then host callbacks, then
    /// user-defined functions — the teacher ordering.
    fn call_named(&mut self, name: &str, args: Vec<PyValue>) -> Result<PyValue> {
        match try_builtin(name, args.clone(), &self.stdout) {
            BuiltinResult::Handled(result) => return result,
            BuiltinResult::NotBuiltin => {}
        }

        if let Some(f) = self.host_fns.get(name).cloned() {
            return Ok(f(args));
        }

        if let Some(func) = self.functions.get(name).cloned() {
            return self.call_function(name, &func, args);
        }

        Err(Error::NameError(name.to_string()))
    }

    fn call_function(
        &mut self,
        name: &str,
        func: &FunctionDef,
        args: Vec<PyValue>,
    ) -> Result<PyValue> {
        if let Some(limit) = self.limits.max_recursion_depth {
            if self.call_scopes.len() >= limit {
                return Err(Error::RecursionLimitExceeded(limit));
            }
        }

        let n_params = func.params.len();
        let n_required = n_params - func.defaults.len();
        if args.len() < n_required || args.len() > n_params {
            return Err(Error::Runtime(format!(
                "TypeError: {}() takes {} to {} arguments but {} were given",
                name,
                n_required,
                n_params,
                args.len()
            )));
        }

        let mut scope = HashMap::new();
        for (i, param) in func.params.iter().enumerate() {
            let value = match args.get(i) {
                Some(arg) => arg.clone(),
                None => func.defaults[i - n_required].clone(),
            };
            scope.insert(param.clone(), value);
        }

        self.call_scopes.push(scope);
        self.frames.push(Frame {
            name: name.to_string(),
            source: func.source.clone(),
            offset: 0,
        });

        // On error the frame stays for the traceback snapshot; a catching
        // `try` truncates it instead.
        let flow = self.eval_body(&func.body)?;

        self.frames.pop();
        self.call_scopes.pop();

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Value(_) => Ok(PyValue::None),
            Flow::Break | Flow::Continue => Err(Error::Runtime(
                "SyntaxError: 'break' or 'continue' outside loop".to_string(),
            )),
        }
    }

    fn call_method(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: Vec<PyValue>,
    ) -> Result<PyValue> {
        // Mutators on a named list write through the binding so the
        // mutation persists.
        if methods::is_list_mutator(method) {
            if let Expr::Name(name) = receiver {
                let id = name.id.to_string();
                let slot = self
                    .binding_mut(&id)
                    .ok_or_else(|| Error::NameError(id.clone()))?;
                if let PyValue::List(items) = slot {
                    return methods::mutate_list(items, method, args);
                }
            }
        }

        match self.eval_expr(receiver)? {
            PyValue::Str(s) => methods::call_str_method(&s, method, args),
            PyValue::List(mut items) if methods::is_list_mutator(method) => {
                // Mutating a temporary: legal, the result is just dropped
                // with the receiver.
                methods::mutate_list(&mut items, method, args)
            }
            PyValue::List(items) => methods::call_list_method(&items, method, args),
            PyValue::Dict(pairs) => methods::call_dict_method(&pairs, method, args),
            other => Err(Error::Unsupported(format!(
                "attribute access: {}.{}",
                other.type_name(),
                method
            ))),
        }
    }

    fn eval_comp(
        &mut self,
        elt: &Expr,
        generators: &[ast::Comprehension],
        depth: usize,
        out: &mut Vec<PyValue>,
    ) -> Result<()> {
        let Some(generator) = generators.get(depth) else {
            out.push(self.eval_expr(elt)?);
            return Ok(());
        };
        let iter = self.eval_expr(&generator.iter)?;
        'item: for item in self.iter_items(iter)? {
            self.tick()?;
            self.assign_target(&generator.target, item)?;
            for cond in &generator.ifs {
                if !self.eval_expr(cond)?.is_truthy() {
                    continue 'item;
                }
            }
            self.eval_comp(elt, generators, depth + 1, out)?;
        }
        Ok(())
    }

    /// Materialize an iterable: lists iterate items, strings characters,
    /// dicts keys.
    fn iter_items(&self, value: PyValue) -> Result<Vec<PyValue>> {
        match value {
            PyValue::List(items) => Ok(items),
            PyValue::Str(s) => Ok(s.chars().map(|c| PyValue::Str(c.to_string())).collect()),
            PyValue::Dict(pairs) => {
                Ok(pairs.into_iter().map(|(k, _)| PyValue::Str(k)).collect())
            }
            other => Err(Error::Type {
                expected: "iterable".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }
}

fn eval_constant(constant: &Constant) -> Result<PyValue> {
    match constant {
        Constant::None => Ok(PyValue::None),
        Constant::Bool(b) => Ok(PyValue::Bool(*b)),
        Constant::Int(i) => {
            let val: i64 = i
                .try_into()
                .map_err(|_| Error::Runtime("integer too large".to_string()))?;
            Ok(PyValue::Int(val))
        }
        Constant::Float(f) => Ok(PyValue::Float(*f)),
        Constant::Str(s) => Ok(PyValue::Str(s.clone())),
        Constant::Tuple(items) => {
            let values: Result<Vec<PyValue>> = items.iter().map(eval_constant).collect();
            Ok(PyValue::List(values?))
        }
        Constant::Bytes(_) => Err(Error::Unsupported("bytes literals".to_string())),
        Constant::Complex { .. } => Err(Error::Unsupported("complex numbers".to_string())),
        Constant::Ellipsis => Err(Error::Unsupported("ellipsis".to_string())),
    }
}

fn subscript(value: &PyValue, index: &PyValue) -> Result<PyValue> {
    match (value, index) {
        (PyValue::List(items), PyValue::Int(idx)) => {
            let len = items.len() as i64;
            let at = if *idx < 0 { len.checked_add(*idx).unwrap_or(-1) } else { *idx };
            usize::try_from(at)
                .ok()
                .and_then(|at| items.get(at))
                .cloned()
                .ok_or_else(|| {
                    Error::Runtime(format!("IndexError: list index out of range: {}", idx))
                })
        }
        (PyValue::Str(s), PyValue::Int(idx)) => {
            let len = s.chars().count() as i64;
            let at = if *idx < 0 { len.checked_add(*idx).unwrap_or(-1) } else { *idx };
            usize::try_from(at)
                .ok()
                .and_then(|at| s.chars().nth(at))
                .map(|c| PyValue::Str(c.to_string()))
                .ok_or_else(|| {
                    Error::Runtime(format!("IndexError: string index out of range: {}", idx))
                })
        }
        (PyValue::Dict(pairs), PyValue::Str(key)) => pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Error::KeyError(key.clone())),
        _ => Err(Error::Type {
            expected: "subscriptable".to_string(),
            got: format!("{}[{}]", value.type_name(), index.type_name()),
        }),
    }
}

/// Whether an `except` clause catches an exception of type `actual`.
/// A bare `except:` and the `Exception`/`BaseException` roots catch
/// everything; anything else must match exactly.
fn handler_matches(clause: Option<&Expr>, actual: &str) -> Result<bool> {
    match clause {
        None => Ok(true),
        Some(Expr::Name(name)) => Ok(exception_matches(actual, name.id.as_str())),
        Some(Expr::Tuple(tuple)) => {
            for elt in &tuple.elts {
                if handler_matches(Some(elt), actual)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Some(_) => Err(Error::Unsupported(
            "computed exception types in 'except'".to_string(),
        )),
    }
}

fn exception_matches(actual: &str, expected: &str) -> bool {
    matches!(expected, "Exception" | "BaseException") || actual == expected
}

/// Resolve a byte offset into a 1-based line number plus that line's
/// trimmed text.
fn locate(source: &str, offset: usize) -> (usize, String) {
    let offset = offset.min(source.len());
    let line = source[..offset].bytes().filter(|&b| b == b'\n').count() + 1;
    let text = source
        .lines()
        .nth(line - 1)
        .unwrap_or_default()
        .trim()
        .to_string();
    (line, text)
}
