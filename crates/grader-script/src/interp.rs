//! Tree-walking interpreter
//!
//! Module-level code binds straight into the caller's [`Environment`].
//! Function calls get their own local frame, read globals at call time and
//! see the frames of the functions they were defined in. Nothing here blocks;
//! a runaway computation is stopped through its [`Interrupt`].

use crate::ast::{CmpOp, Expr, FunctionDef, Program, Stmt, Target};
use crate::builtins::Builtin;
use crate::env::Environment;
use crate::error::{FaultKind, ScriptError, ScriptResult};
use crate::interrupt::Interrupt;
use crate::loader::{ModuleLoader, NoModules};
use crate::ops;
use crate::output::Output;
use crate::parser::parse_program;
use crate::value::{Function, ModuleHome, SharedFrame, Value};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

/// Call depth at which `RecursionError` is raised
pub const DEFAULT_MAX_DEPTH: usize = 1000;

#[derive(Debug, Clone)]
pub struct Interpreter {
    loader: Arc<dyn ModuleLoader>,
    output: Output,
    interrupt: Interrupt,
    max_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Control flow out of a statement
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

enum Frame<'a> {
    Module {
        env: &'a mut Environment,
        home: Option<ModuleHome>,
    },
    Function {
        globals: &'a Environment,
        locals: SharedFrame,
        captured: &'a [SharedFrame],
        home: Option<ModuleHome>,
    },
}

/// Read-only view used while evaluating an expression
#[derive(Clone, Copy)]
struct Scope<'a> {
    globals: &'a Environment,
    locals: Option<&'a SharedFrame>,
    captured: &'a [SharedFrame],
    home: Option<&'a ModuleHome>,
}

impl<'a> Scope<'a> {
    fn module(env: &'a Environment) -> Self {
        Self {
            globals: env,
            locals: None,
            captured: &[],
            home: None,
        }
    }

    fn lookup(&self, name: &str) -> ScriptResult<Value> {
        if let Some(locals) = self.locals {
            if let Some(v) = locals.lock().get(name).cloned() {
                return Ok(v);
            }
        }
        for frame in self.captured {
            if let Some(v) = frame.lock().get(name).cloned() {
                return Ok(v);
            }
        }
        if let Some(v) = self.globals.get(name) {
            return Ok(v.clone());
        }
        Builtin::lookup(name)
            .map(Value::Builtin)
            .ok_or_else(|| ScriptError::name_error(name))
    }

    fn make_function(&self, def: &Arc<FunctionDef>) -> Value {
        let captured = self
            .locals
            .into_iter()
            .chain(self.captured)
            .cloned()
            .collect();
        Value::Function(Arc::new(Function {
            def: Arc::clone(def),
            captured,
            home: self.home.cloned(),
        }))
    }
}

impl Frame<'_> {
    fn scope(&self) -> Scope<'_> {
        match self {
            Frame::Module { env, home } => Scope {
                globals: env,
                locals: None,
                captured: &[],
                home: home.as_ref(),
            },
            Frame::Function {
                globals,
                locals,
                captured,
                home,
            } => Scope {
                globals,
                locals: Some(locals),
                captured,
                home: home.as_ref(),
            },
        }
    }

    fn bind(&mut self, name: &str, value: Value) {
        match self {
            Frame::Module { env, .. } => env.insert(name, value),
            Frame::Function { locals, .. } => locals.lock().insert(name, value),
        }
    }
}

impl Interpreter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Arc::new(NoModules),
            output: Output::default(),
            interrupt: Interrupt::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = loader;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    #[must_use]
    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Execute `program`, binding names into `env`
    pub fn exec(&self, program: &Program, env: &mut Environment) -> ScriptResult<()> {
        self.exec_interactive(program, env).map(|_| ())
    }

    /// Execute `program`; when its last statement is an expression, return that value
    pub fn exec_interactive(
        &self,
        program: &Program,
        env: &mut Environment,
    ) -> ScriptResult<Option<Value>> {
        let mut frame = Frame::Module { env, home: None };
        self.run_module(&program.body, &mut frame, 0)
    }

    /// Evaluate `expr` against `env` without modifying it
    pub fn eval(&self, expr: &Expr, env: &Environment) -> ScriptResult<Value> {
        self.eval_expr(expr, Scope::module(env), 0)
    }

    /// Parse and execute source text
    pub fn run(&self, src: &str, env: &mut Environment) -> ScriptResult<Option<Value>> {
        let program = parse_program(src)?;
        self.exec_interactive(&program, env)
    }

    fn run_module(
        &self,
        body: &[Stmt],
        frame: &mut Frame<'_>,
        depth: usize,
    ) -> ScriptResult<Option<Value>> {
        for (i, stmt) in body.iter().enumerate() {
            if i + 1 == body.len() {
                if let Stmt::Expr(e) = stmt {
                    return self.eval_expr(e, frame.scope(), depth).map(Some);
                }
            }
            match self.exec_stmt(stmt, frame, depth)? {
                Flow::Normal => {}
                Flow::Break => return Err(misplaced("'break' outside loop")),
                Flow::Continue => return Err(misplaced("'continue' not properly in loop")),
                Flow::Return(_) => return Err(misplaced("'return' outside function")),
            }
        }
        Ok(None)
    }

    fn exec_block(&self, body: &[Stmt], frame: &mut Frame<'_>, depth: usize) -> ScriptResult<Flow> {
        for stmt in body {
            match self.exec_stmt(stmt, frame, depth)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, frame: &mut Frame<'_>, depth: usize) -> ScriptResult<Flow> {
        match stmt {
            Stmt::Expr(e) => {
                self.eval_expr(e, frame.scope(), depth)?;
            }
            Stmt::Assign(target, e) => {
                let value = self.eval_expr(e, frame.scope(), depth)?;
                bind_target(frame, target, value)?;
            }
            Stmt::AugAssign(name, op, e) => {
                let scope = frame.scope();
                let current = scope.lookup(name)?;
                let rhs = self.eval_expr(e, scope, depth)?;
                let value = ops::binary(*op, &current, &rhs)?;
                frame.bind(name, value);
            }
            Stmt::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval_expr(cond, frame.scope(), depth)?.is_truthy() {
                        return self.exec_block(body, frame, depth);
                    }
                }
                return self.exec_block(orelse, frame, depth);
            }
            Stmt::While(cond, body) => loop {
                self.interrupt.check()?;
                if !self.eval_expr(cond, frame.scope(), depth)?.is_truthy() {
                    break;
                }
                match self.exec_block(body, frame, depth)? {
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            Stmt::For(target, iter, body) => {
                let items = self.eval_expr(iter, frame.scope(), depth)?.iter_items()?;
                for item in items {
                    self.interrupt.check()?;
                    bind_target(frame, target, item)?;
                    match self.exec_block(body, frame, depth)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::Def(def) => {
                let function = frame.scope().make_function(def);
                frame.bind(&def.name, function);
            }
            Stmt::Return(e) => {
                let value = match e {
                    Some(e) => self.eval_expr(e, frame.scope(), depth)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Assert(cond, msg) => {
                if !self.eval_expr(cond, frame.scope(), depth)?.is_truthy() {
                    let message = match msg {
                        Some(m) => self.eval_expr(m, frame.scope(), depth)?.to_string(),
                        None => String::new(),
                    };
                    return Err(ScriptError::new(FaultKind::AssertionError, message));
                }
            }
            Stmt::Import { module, names } => self.import(module, names.as_deref(), frame, depth)?,
            Stmt::Pass => {}
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn import(
        &self,
        module: &str,
        names: Option<&[String]>,
        frame: &mut Frame<'_>,
        depth: usize,
    ) -> ScriptResult<()> {
        if depth >= self.max_depth {
            return Err(recursion_limit());
        }
        let src = self.loader.load_source(module)?;
        let program = parse_program(&src)?;

        let home: ModuleHome = Arc::new(OnceLock::new());
        let mut module_env = Environment::new();
        {
            let mut module_frame = Frame::Module {
                env: &mut module_env,
                home: Some(Arc::clone(&home)),
            };
            self.run_module(&program.body, &mut module_frame, depth + 1)
                .map_err(|e| e.with_frame(format!("<module {module}>")))?;
        }

        let exported: Vec<(String, Value)> = match names {
            None => module_env
                .public()
                .map(|(n, v)| (n.to_string(), v.clone()))
                .collect(),
            Some(names) => names
                .iter()
                .map(|n| {
                    module_env.get(n).cloned().map(|v| (n.clone(), v)).ok_or_else(|| {
                        ScriptError::new(
                            FaultKind::ImportError,
                            format!("cannot import name '{n}' from '{module}'"),
                        )
                    })
                })
                .collect::<ScriptResult<_>>()?,
        };
        tracing::debug!(module, bindings = exported.len(), "module imported");
        // only set here, so this cannot fail
        let _ = home.set(module_env);
        for (name, value) in exported {
            frame.bind(&name, value);
        }
        Ok(())
    }

    /// Containers may nest no deeper than calls, which keeps printing,
    /// comparing and dropping them within any thread's stack
    fn nested(&self, value: Value) -> ScriptResult<Value> {
        if value.nesting() > self.max_depth {
            return Err(ScriptError::new(
                FaultKind::RecursionError,
                "maximum container nesting depth exceeded",
            ));
        }
        Ok(value)
    }

    fn eval_all(&self, exprs: &[Expr], scope: Scope<'_>, depth: usize) -> ScriptResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval_expr(e, scope, depth)).collect()
    }

    fn eval_expr(&self, expr: &Expr, scope: Scope<'_>, depth: usize) -> ScriptResult<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(v) => Ok(Value::Int(*v)),
            Expr::Float(v) => Ok(Value::Float(*v)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Name(name) => scope.lookup(name),
            Expr::List(items) => self.nested(Value::list(self.eval_all(items, scope, depth)?)),
            Expr::Tuple(items) => self.nested(Value::tuple(self.eval_all(items, scope, depth)?)),
            Expr::Unary(op, e) => ops::unary(*op, &self.eval_expr(e, scope, depth)?),
            Expr::Binary(op, a, b) => {
                let left = self.eval_expr(a, scope, depth)?;
                let right = self.eval_expr(b, scope, depth)?;
                ops::binary(*op, &left, &right)
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval_expr(first, scope, depth)?;
                for (op, e) in rest {
                    let right = self.eval_expr(e, scope, depth)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(a, b) => {
                let left = self.eval_expr(a, scope, depth)?;
                if left.is_truthy() {
                    self.eval_expr(b, scope, depth)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(a, b) => {
                let left = self.eval_expr(a, scope, depth)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    self.eval_expr(b, scope, depth)
                }
            }
            Expr::IfElse { cond, then, orelse } => {
                if self.eval_expr(cond, scope, depth)?.is_truthy() {
                    self.eval_expr(then, scope, depth)
                } else {
                    self.eval_expr(orelse, scope, depth)
                }
            }
            Expr::Call(callee, args) => {
                let callee = self.eval_expr(callee, scope, depth)?;
                let args = self.eval_all(args, scope, depth)?;
                self.call(&callee, args, scope.globals, depth)
            }
            Expr::Index(target, index) => {
                let target = self.eval_expr(target, scope, depth)?;
                let index = self.eval_expr(index, scope, depth)?;
                subscript(&target, &index)
            }
            Expr::Slice { target, start, stop } => {
                let target = self.eval_expr(target, scope, depth)?;
                let bound = |e: &Option<Box<Expr>>| -> ScriptResult<Option<i64>> {
                    e.as_ref()
                        .map(|e| self.eval_expr(e, scope, depth)?.as_index())
                        .transpose()
                };
                let start = bound(start)?;
                let stop = bound(stop)?;
                slice(&target, start, stop)
            }
            Expr::Lambda(def) => Ok(scope.make_function(def)),
        }
    }

    fn call(
        &self,
        callee: &Value,
        args: Vec<Value>,
        globals: &Environment,
        depth: usize,
    ) -> ScriptResult<Value> {
        self.interrupt.check()?;
        match callee {
            Value::Builtin(builtin) => builtin.call(args, &self.output),
            Value::Function(function) => self.call_function(function, args, globals, depth),
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &self,
        function: &Arc<Function>,
        args: Vec<Value>,
        caller_globals: &Environment,
        depth: usize,
    ) -> ScriptResult<Value> {
        if depth >= self.max_depth {
            return Err(recursion_limit());
        }
        let def = &function.def;
        if args.len() != def.params.len() {
            return Err(ScriptError::type_error(format!(
                "{}() takes {} positional argument(s) but {} were given",
                def.name,
                def.params.len(),
                args.len()
            )));
        }
        let locals: Environment = def.params.iter().cloned().zip(args).collect();
        let globals = function
            .home
            .as_ref()
            .and_then(|home| home.get())
            .unwrap_or(caller_globals);
        let mut frame = Frame::Function {
            globals,
            locals: Arc::new(Mutex::new(locals)),
            captured: &function.captured,
            home: function.home.clone(),
        };
        match self.exec_block(&def.body, &mut frame, depth + 1) {
            Ok(Flow::Return(v)) => Ok(v),
            Ok(Flow::Normal) => Ok(Value::None),
            Ok(Flow::Break | Flow::Continue) => Err(misplaced("'break' outside loop")),
            Err(e) => Err(e.with_frame(def.name.clone())),
        }
    }
}

fn bind_target(frame: &mut Frame<'_>, target: &Target, value: Value) -> ScriptResult<()> {
    match target {
        Target::Name(name) => {
            frame.bind(name, value);
            Ok(())
        }
        Target::Tuple(targets) => {
            let items = value.iter_items().map_err(|_| {
                ScriptError::type_error(format!(
                    "cannot unpack non-iterable {} object",
                    value.type_name()
                ))
            })?;
            if items.len() != targets.len() {
                return Err(ScriptError::value_error(format!(
                    "expected {} values to unpack, got {}",
                    targets.len(),
                    items.len()
                )));
            }
            for (target, item) in targets.iter().zip(items) {
                bind_target(frame, target, item)?;
            }
            Ok(())
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> ScriptResult<bool> {
    Ok(match op {
        CmpOp::Eq => left == right,
        CmpOp::Ne => left != right,
        CmpOp::Lt => left.compare(right)? == Ordering::Less,
        CmpOp::Le => left.compare(right)? != Ordering::Greater,
        CmpOp::Gt => left.compare(right)? == Ordering::Greater,
        CmpOp::Ge => left.compare(right)? != Ordering::Less,
        CmpOp::In => right.contains(left)?,
        CmpOp::NotIn => !right.contains(left)?,
        CmpOp::Is => left.same_object(right),
        CmpOp::IsNot => !left.same_object(right),
    })
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let k = if index < 0 { index + len } else { index };
    if (0..len).contains(&k) {
        usize::try_from(k).ok()
    } else {
        None
    }
}

fn subscript(target: &Value, index: &Value) -> ScriptResult<Value> {
    let position = |len: usize| -> ScriptResult<usize> {
        let i = index.as_index().map_err(|_| {
            ScriptError::type_error(format!("{} indices must be integers", target.type_name()))
        })?;
        normalize_index(i, len).ok_or_else(|| {
            ScriptError::index_error(format!("{} index out of range", target.type_name()))
        })
    };
    match target {
        Value::List(items) | Value::Tuple(items) => Ok(items[position(items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[position(chars.len())?].to_string()))
        }
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice(target: &Value, start: Option<i64>, stop: Option<i64>) -> ScriptResult<Value> {
    let range = |len: usize| {
        let clamp = |bound: Option<i64>, default: usize| match bound {
            None => default,
            Some(b) => {
                let signed_len = i64::try_from(len).unwrap_or(i64::MAX);
                let b = if b < 0 { (b + signed_len).max(0) } else { b.min(signed_len) };
                usize::try_from(b).unwrap_or(0)
            }
        };
        let (from, to) = (clamp(start, 0), clamp(stop, len));
        from..to.max(from)
    };
    match target {
        Value::List(items) => Ok(Value::list(items[range(items.len())].to_vec())),
        Value::Tuple(items) => Ok(Value::tuple(items[range(items.len())].to_vec())),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[range(chars.len())].iter().collect()))
        }
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn recursion_limit() -> ScriptError {
    ScriptError::new(FaultKind::RecursionError, "maximum recursion depth exceeded")
}

fn misplaced(what: &str) -> ScriptError {
    ScriptError::new(FaultKind::SyntaxError, what)
}
