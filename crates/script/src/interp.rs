use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

use thiserror::Error;

use crate::ast::{AssignTarget, BinaryOp, Block, Expr, ExternalKind, Param, Program, Stmt, UnaryOp};
use crate::env::Environment;
use crate::host::{HostError, HostRegistry};
use crate::lexer::Span;
use crate::value::{new_ref, Callable, ClassDef, FnBody, Instance, MapValue, ScriptFn, Value, ValueRef};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}: undefined variable '{1}'")]
    UndefinedVariable(Span, String),
    #[error("{0}: undefined field '{1}' on {2}")]
    UndefinedField(Span, String, String),
    #[error("{0}: undefined method '{1}' on {2}")]
    UndefinedMethod(Span, String, String),
    #[error("{0}: value of type {1} is not callable")]
    NotCallable(Span, String),
    #[error("{0}: expected {1} argument(s), got {2}")]
    ArityMismatch(Span, usize, usize),
    #[error("{0}: type error: {1}")]
    TypeError(Span, String),
    #[error("{0}: index out of bounds")]
    IndexOutOfBounds(Span),
    #[error("{0}: division by zero")]
    DivisionByZero(Span),
    #[error("{span}: assertion test '{cond_src}' failed{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    AssertionFailed { span: Span, cond_src: String, message: Option<String> },
    #[error("{0}: 'break' outside of a loop")]
    BreakOutsideLoop(Span),
    #[error("{0}: 'continue' outside of a loop")]
    ContinueOutsideLoop(Span),
    #[error("{0}: unknown host extension '{1}'")]
    UnknownExtension(Span, String),
    #[error("import error: {0}")]
    Import(String),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Resolves `import` statements to source text. The interpreter itself has
/// no notion of a filesystem; the embedding binary supplies this.
pub trait ImportResolver {
    fn resolve(&self, path: &[String], relative: bool) -> Result<String, String>;
}

enum Signal {
    Normal,
    Break,
    Continue,
    Return(ValueRef),
}

pub struct Interpreter {
    env: Environment,
    host: HostRegistry,
    resolver: Option<Rc<dyn ImportResolver>>,
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new(host: HostRegistry) -> Self {
        Self {
            env: Environment::new(),
            host,
            resolver: None,
            out: Box::new(std::io::stdout()),
        }
    }

    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn with_resolver(mut self, resolver: Rc<dyn ImportResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn run(&mut self, program: &Program) -> Result<(), Error> {
        match self.exec_block(&Block { stmts: program.stmts.clone() })? {
            Signal::Return(_) => Ok(()),
            _ => Ok(()),
        }
    }

    /// Invokes a top-level function by name, e.g. dispatching `build()` or
    /// `install()` declared in a script after it has been run once.
    pub fn call_function(&mut self, name: &str, args: Vec<ValueRef>) -> Result<ValueRef, Error> {
        let span = Span::default();
        let callee = self
            .env
            .get(name)
            .ok_or_else(|| Error::UndefinedVariable(span, name.to_string()))?;
        self.call_value(&callee, args, span)
    }

    fn exec_block(&mut self, block: &Block) -> Result<Signal, Error> {
        self.env.push_scope();
        let result = self.exec_stmts(&block.stmts);
        self.env.pop_scope();
        result
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<Signal, Error> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Signal::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Signal, Error> {
        match stmt {
            Stmt::VarDecl { name, ty, init, span } => {
                let value = match init {
                    Some(expr) => self.eval_expr(expr)?,
                    None => new_ref(Value::None),
                };
                if let Some(ty) = ty {
                    check_type(*span, ty, &value.borrow())?;
                }
                self.env.declare(name, value, ty.clone());
                Ok(Signal::Normal)
            }
            Stmt::Assign { target, value, span } => {
                let value = self.eval_expr(value)?;
                self.exec_assign(target, value, *span)?;
                Ok(Signal::Normal)
            }
            Stmt::FuncDecl { name, is_static: _, params, body } => {
                let f = Rc::new(ScriptFn {
                    name: name.clone(),
                    params: params.clone(),
                    body: FnBody::Block(body.clone()),
                    closure: self.env.snapshot(),
                    bound_self: RefCell::new(None),
                });
                self.env.declare(name, new_ref(Value::Fn(Callable::Script(f))), None);
                Ok(Signal::Normal)
            }
            Stmt::ClassDecl { name, body, span } => {
                let class = self.build_class(name, body, *span)?;
                self.env.declare(name, new_ref(Value::Class(class)), None);
                Ok(Signal::Normal)
            }
            Stmt::ExternalDecl { kind, name } => {
                self.exec_external_decl(kind, name)?;
                Ok(Signal::Normal)
            }
            Stmt::ExprStmt(expr) => {
                self.eval_expr(expr)?;
                Ok(Signal::Normal)
            }
            Stmt::Import { path, relative, span } => {
                self.exec_import(path, *relative, *span)?;
                Ok(Signal::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.eval_expr(expr)?;
                let text = value.borrow().render();
                let _ = writeln!(self.out, "{text}");
                Ok(Signal::Normal)
            }
            Stmt::Assert { cond, cond_src, message, span } => {
                let value = self.eval_expr(cond)?;
                if value.borrow().is_truthy() {
                    Ok(Signal::Normal)
                } else {
                    let message = match message {
                        Some(expr) => Some(self.eval_expr(expr)?.borrow().render()),
                        None => None,
                    };
                    Err(Error::AssertionFailed { span: *span, cond_src: cond_src.clone(), message })
                }
            }
            Stmt::Return { value, span: _ } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => new_ref(Value::None),
                };
                Ok(Signal::Return(value))
            }
            Stmt::Break(span) => {
                let _ = span;
                Ok(Signal::Break)
            }
            Stmt::Continue(span) => {
                let _ = span;
                Ok(Signal::Continue)
            }
            Stmt::If { branches, else_branch } => {
                for (cond, body) in branches {
                    if self.eval_expr(cond)?.borrow().is_truthy() {
                        return self.exec_block(body);
                    }
                }
                match else_branch {
                    Some(body) => self.exec_block(body),
                    None => Ok(Signal::Normal),
                }
            }
            Stmt::For { var, iter, body, span } => self.exec_for(var, iter, body, *span),
        }
    }

    fn exec_for(&mut self, var: &str, iter: &Expr, body: &Block, span: Span) -> Result<Signal, Error> {
        let iterable = self.eval_expr(iter)?;
        let items: Vec<ValueRef> = match &*iterable.borrow() {
            Value::Vec(items) => items.clone(),
            Value::Map(m) => m.iter().map(|(k, _)| k).collect(),
            other => return Err(Error::TypeError(span, format!("cannot iterate over {}", other.type_name()))),
        };

        for item in items {
            self.env.push_scope();
            self.env.declare(var, item, None);
            let signal = self.exec_stmts(body.stmts.as_slice());
            self.env.pop_scope();

            match signal? {
                Signal::Break => break,
                Signal::Continue | Signal::Normal => {}
                Signal::Return(v) => return Ok(Signal::Return(v)),
            }
        }

        Ok(Signal::Normal)
    }

    fn exec_assign(&mut self, target: &AssignTarget, value: ValueRef, span: Span) -> Result<(), Error> {
        match target {
            AssignTarget::Ident(name) => {
                if let Some(ty) = self.env.declared_type(name) {
                    check_type(span, &ty, &value.borrow())?;
                }
                if !self.env.assign(name, value) {
                    return Err(Error::UndefinedVariable(span, name.clone()));
                }
                Ok(())
            }
            AssignTarget::Field { base, name } => {
                let base_val = self.eval_expr(base)?;
                let borrowed = base_val.borrow();
                match &*borrowed {
                    Value::Instance(inst) => {
                        inst.fields.borrow_mut().insert(name.clone(), value);
                        Ok(())
                    }
                    other => Err(Error::TypeError(span, format!("cannot set field on {}", other.type_name()))),
                }
            }
            AssignTarget::Index { base, index } => {
                let base_val = self.eval_expr(base)?;
                let index_val = self.eval_expr(index)?;
                let mut borrowed = base_val.borrow_mut();
                match &mut *borrowed {
                    Value::Vec(items) => {
                        let idx = expect_index(span, &index_val.borrow())?;
                        let slot = items.get_mut(idx).ok_or(Error::IndexOutOfBounds(span))?;
                        *slot = value;
                        Ok(())
                    }
                    Value::Map(map) => {
                        let key_repr = index_val.borrow().render();
                        map.insert(key_repr, index_val.clone(), value);
                        Ok(())
                    }
                    other => Err(Error::TypeError(span, format!("cannot index into {}", other.type_name()))),
                }
            }
        }
    }

    fn build_class(&mut self, name: &str, body: &Block, _span: Span) -> Result<Rc<ClassDef>, Error> {
        let methods = RefCell::new(BTreeMap::new());
        let static_methods = RefCell::new(BTreeMap::new());
        let closure = self.env.snapshot();

        for stmt in &body.stmts {
            if let Stmt::FuncDecl { name: fname, is_static, params, body } = stmt {
                let f = Rc::new(ScriptFn {
                    name: fname.clone(),
                    params: params.clone(),
                    body: FnBody::Block(body.clone()),
                    closure: closure.clone(),
                    bound_self: RefCell::new(None),
                });
                if *is_static {
                    static_methods.borrow_mut().insert(fname.clone(), f);
                } else {
                    methods.borrow_mut().insert(fname.clone(), f);
                }
            }
        }

        Ok(Rc::new(ClassDef {
            name: name.to_string(),
            body: body.clone(),
            methods,
            static_methods,
            host_id: None,
        }))
    }

    fn exec_external_decl(&mut self, kind: &ExternalKind, name: &str) -> Result<(), Error> {
        let span = Span::default();
        let id = self
            .host
            .lookup(name)
            .ok_or_else(|| Error::UnknownExtension(span, name.to_string()))?;

        match kind {
            ExternalKind::Function => {
                self.env
                    .declare(name, new_ref(Value::Fn(Callable::External(name.into()))), None);
                Ok(())
            }
            ExternalKind::Class => {
                let class = Rc::new(ClassDef {
                    name: name.to_string(),
                    body: Block { stmts: Vec::new() },
                    methods: RefCell::new(BTreeMap::new()),
                    static_methods: RefCell::new(BTreeMap::new()),
                    host_id: Some(id),
                });
                self.host.get(id).populate(&class)?;
                self.env.declare(name, new_ref(Value::Class(class)), None);
                Ok(())
            }
        }
    }

    fn exec_import(&mut self, path: &[String], relative: bool, span: Span) -> Result<(), Error> {
        let resolver = self
            .resolver
            .clone()
            .ok_or_else(|| Error::Import(format!("{span}: no import resolver configured")))?;
        let source = resolver.resolve(path, relative).map_err(Error::Import)?;
        let program = crate::parser::parse(&source).map_err(|e| Error::Import(e.to_string()))?;
        self.exec_stmts(&program.stmts)?;
        Ok(())
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<ValueRef, Error> {
        match expr {
            Expr::None => Ok(new_ref(Value::None)),
            Expr::Bool(b) => Ok(new_ref(Value::Bool(*b))),
            Expr::Int(n) => Ok(new_ref(Value::Int(*n))),
            Expr::Str(s) => Ok(new_ref(Value::Str(s.clone()))),
            Expr::Ident(name) => self
                .env
                .get(name)
                .ok_or_else(|| Error::UndefinedVariable(Span::default(), name.clone())),
            Expr::SelfExpr => self
                .env
                .get("self")
                .ok_or_else(|| Error::UndefinedVariable(Span::default(), "self".to_string())),
            Expr::Vector(items) => {
                let values = items.iter().map(|e| self.eval_expr(e)).collect::<Result<Vec<_>, _>>()?;
                Ok(new_ref(Value::Vec(values)))
            }
            Expr::Map(entries) => {
                let mut map = MapValue::new();
                for (k, v) in entries {
                    let key = self.eval_expr(k)?;
                    let value = self.eval_expr(v)?;
                    let repr = key.borrow().render();
                    map.insert(repr, key, value);
                }
                Ok(new_ref(Value::Map(map)))
            }
            Expr::Paren(inner) => self.eval_expr(inner),
            Expr::Unary { op, rhs, span } => self.eval_unary(*op, rhs, *span),
            Expr::Binary { op, lhs, rhs, span } => self.eval_binary(*op, lhs, rhs, *span),
            Expr::Index { base, index, span } => self.eval_index(base, index, *span),
            Expr::Field { base, name, span } => self.eval_field(base, name, *span),
            Expr::Call { callee, args, span } => self.eval_call(callee, args, *span),
            Expr::Lambda { params, body } => {
                let body = match body {
                    crate::ast::LambdaBody::Block(b) => FnBody::Block(b.clone()),
                    crate::ast::LambdaBody::Expr(e) => FnBody::Expr(e.clone()),
                };
                let f = Rc::new(ScriptFn {
                    name: "<lambda>".to_string(),
                    params: params.clone(),
                    body,
                    closure: self.env.snapshot(),
                    bound_self: RefCell::new(None),
                });
                Ok(new_ref(Value::Fn(Callable::Script(f))))
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, rhs: &Expr, span: Span) -> Result<ValueRef, Error> {
        let value = self.eval_expr(rhs)?;
        let value = value.borrow();
        match (op, &*value) {
            (UnaryOp::Neg, Value::Int(n)) => Ok(new_ref(Value::Int(-n))),
            (UnaryOp::Not, other) => Ok(new_ref(Value::Bool(!other.is_truthy()))),
            (UnaryOp::Neg, other) => Err(Error::TypeError(span, format!("cannot negate {}", other.type_name()))),
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, span: Span) -> Result<ValueRef, Error> {
        match op {
            BinaryOp::And => {
                let l = self.eval_expr(lhs)?;
                let l = require_bool(&l.borrow(), span)?;
                if !l {
                    return Ok(new_ref(Value::Bool(false)));
                }
                let r = self.eval_expr(rhs)?;
                let r = require_bool(&r.borrow(), span)?;
                return Ok(new_ref(Value::Bool(r)));
            }
            BinaryOp::Or => {
                let l = self.eval_expr(lhs)?;
                let l = require_bool(&l.borrow(), span)?;
                if l {
                    return Ok(new_ref(Value::Bool(true)));
                }
                let r = self.eval_expr(rhs)?;
                let r = require_bool(&r.borrow(), span)?;
                return Ok(new_ref(Value::Bool(r)));
            }
            _ => {}
        }

        let l = self.eval_expr(lhs)?;
        let r = self.eval_expr(rhs)?;
        let l = l.borrow();
        let r = r.borrow();

        match op {
            BinaryOp::Eq => return Ok(new_ref(Value::Bool(l.eq_value(&r)))),
            BinaryOp::NotEq => return Ok(new_ref(Value::Bool(!l.eq_value(&r)))),
            BinaryOp::Xor => {
                let l = require_bool(&l, span)?;
                let r = require_bool(&r, span)?;
                return Ok(new_ref(Value::Bool(l ^ r)));
            }
            _ => {}
        }

        match (&*l, &*r) {
            (Value::Int(a), Value::Int(b)) => eval_int_binary(op, *a, *b, span),
            (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
                let mut out = a.clone();
                out.extend_from_slice(b);
                Ok(new_ref(Value::Str(out)))
            }
            (Value::Vec(a), Value::Vec(b)) if op == BinaryOp::Add => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                Ok(new_ref(Value::Vec(out)))
            }
            (Value::Map(a), Value::Map(b)) if op == BinaryOp::Add => {
                // Right-biased union: entries from `b` overwrite `a` on key collision.
                let mut out = a.clone();
                for (k, v) in b.iter() {
                    out.insert(k.borrow().render(), k, v);
                }
                Ok(new_ref(Value::Map(out)))
            }
            (a, b) => Err(Error::TypeError(
                span,
                format!("unsupported operands {} and {} for {:?}", a.type_name(), b.type_name(), op),
            )),
        }
    }

    fn eval_index(&mut self, base: &Expr, index: &Expr, span: Span) -> Result<ValueRef, Error> {
        let base_val = self.eval_expr(base)?;
        let index_val = self.eval_expr(index)?;
        let base_val = base_val.borrow();

        match &*base_val {
            Value::Vec(items) => {
                let idx = expect_index(span, &index_val.borrow())?;
                items.get(idx).cloned().ok_or(Error::IndexOutOfBounds(span))
            }
            Value::Map(map) => {
                let repr = index_val.borrow().render();
                map.get(&repr).ok_or_else(|| Error::UndefinedField(span, repr, "map".to_string()))
            }
            Value::Str(bytes) => {
                let idx = expect_index(span, &index_val.borrow())?;
                bytes
                    .get(idx)
                    .map(|b| new_ref(Value::Str(vec![*b])))
                    .ok_or(Error::IndexOutOfBounds(span))
            }
            other => Err(Error::TypeError(span, format!("cannot index into {}", other.type_name()))),
        }
    }

    fn eval_field(&mut self, base: &Expr, name: &str, span: Span) -> Result<ValueRef, Error> {
        let base_val = self.eval_expr(base)?;
        let borrowed = base_val.borrow();

        match &*borrowed {
            Value::Instance(inst) => {
                if let Some(v) = inst.fields.borrow().get(name) {
                    return Ok(v.clone());
                }
                if let Some(method) = inst.class.methods.borrow().get(name) {
                    let bound = Rc::new(ScriptFn {
                        name: method.name.clone(),
                        params: method.params.clone(),
                        body: clone_body(&method.body),
                        closure: method.closure.clone(),
                        bound_self: RefCell::new(Some(inst.clone())),
                    });
                    return Ok(new_ref(Value::Fn(Callable::Script(bound))));
                }
                Err(Error::UndefinedField(span, name.to_string(), borrowed.display_type_name()))
            }
            Value::Class(class) => {
                if let Some(method) = class.static_methods.borrow().get(name) {
                    return Ok(new_ref(Value::Fn(Callable::Script(method.clone()))));
                }
                Err(Error::UndefinedField(span, name.to_string(), class.name.clone()))
            }
            other => Err(Error::UndefinedField(span, name.to_string(), other.type_name().to_string())),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<ValueRef, Error> {
        if let Expr::Field { base, name, .. } = callee {
            let base_val = self.eval_expr(base)?;
            let arg_vals = args.iter().map(|a| self.eval_expr(a)).collect::<Result<Vec<_>, _>>()?;
            return self.call_method(&base_val, name, &arg_vals, span);
        }

        let callee_val = self.eval_expr(callee)?;
        let arg_vals = args.iter().map(|a| self.eval_expr(a)).collect::<Result<Vec<_>, _>>()?;
        self.call_value(&callee_val, arg_vals, span)
    }

    fn call_method(&mut self, base: &ValueRef, name: &str, args: &[ValueRef], span: Span) -> Result<ValueRef, Error> {
        let borrowed = base.borrow();

        match &*borrowed {
            Value::Instance(inst) => {
                if let Some(host_id) = inst.class.host_id {
                    let result = self.host.get(host_id).call(inst, name, args)?;
                    return Ok(result);
                }
                let method = inst
                    .class
                    .methods
                    .borrow()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UndefinedMethod(span, name.to_string(), inst.class.name.clone()))?;
                drop(borrowed);
                self.call_script_fn(&method, args.to_vec(), Some(inst_of(base)), span)
            }
            Value::Class(class) => {
                if let Some(host_id) = class.host_id {
                    // A class-level call on a host class with no instances
                    // of its own (e.g. `Fs.list(...)`) dispatches straight
                    // to the extension's exported functions.
                    let result = self.host.get(host_id).call_function(name, args)?;
                    return Ok(result);
                }
                let method = class
                    .static_methods
                    .borrow()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UndefinedMethod(span, name.to_string(), class.name.clone()))?;
                drop(borrowed);
                self.call_script_fn(&method, args.to_vec(), None, span)
            }
            other => Err(Error::UndefinedMethod(span, name.to_string(), other.type_name().to_string())),
        }
    }

    fn call_value(&mut self, callee: &ValueRef, args: Vec<ValueRef>, span: Span) -> Result<ValueRef, Error> {
        let borrowed = callee.borrow();

        match &*borrowed {
            Value::Fn(Callable::Script(f)) => {
                let f = f.clone();
                let bound_self = f.bound_self.borrow().clone();
                drop(borrowed);
                self.call_script_fn(&f, args, bound_self, span)
            }
            Value::Fn(Callable::External(name)) => {
                let name = name.clone();
                drop(borrowed);
                self.call_external_function(&name, &args, span)
            }
            Value::Class(class) => {
                let class = class.clone();
                drop(borrowed);
                self.instantiate(&class, args, span)
            }
            other => Err(Error::NotCallable(span, other.type_name().to_string())),
        }
    }

    fn call_external_function(&mut self, name: &str, args: &[ValueRef], span: Span) -> Result<ValueRef, Error> {
        let id = self
            .host
            .lookup(name)
            .ok_or_else(|| Error::UnknownExtension(span, name.to_string()))?;
        Ok(self.host.get(id).call_function(name, args)?)
    }

    fn call_script_fn(
        &mut self,
        f: &ScriptFn,
        args: Vec<ValueRef>,
        bound_self: Option<Rc<Instance>>,
        span: Span,
    ) -> Result<ValueRef, Error> {
        if f.params.len() != args.len() {
            return Err(Error::ArityMismatch(span, f.params.len(), args.len()));
        }

        let saved_env = std::mem::replace(&mut self.env, f.closure.call_frame());

        for (Param { name }, arg) in f.params.iter().zip(args) {
            self.env.declare(name, arg, None);
        }
        if let Some(inst) = bound_self {
            self.env.declare("self", new_ref(Value::Instance(inst)), None);
        }

        let result = match &f.body {
            FnBody::Block(block) => match self.exec_stmts(&block.stmts) {
                Ok(Signal::Return(v)) => Ok(v),
                Ok(_) => Ok(new_ref(Value::None)),
                Err(e) => Err(e),
            },
            FnBody::Expr(expr) => self.eval_expr(expr),
        };

        self.env = saved_env;
        result
    }

    fn instantiate(&mut self, class: &Rc<ClassDef>, args: Vec<ValueRef>, span: Span) -> Result<ValueRef, Error> {
        if let Some(host_id) = class.host_id {
            let state = self.host.get(host_id).instantiate(&args)?;
            let inst = Rc::new(Instance {
                class: class.clone(),
                fields: RefCell::new(BTreeMap::new()),
                host_state: RefCell::new(Some(state)),
            });
            return Ok(new_ref(Value::Instance(inst)));
        }

        let inst = Rc::new(Instance {
            class: class.clone(),
            fields: RefCell::new(BTreeMap::new()),
            host_state: RefCell::new(None),
        });

        if let Some(init) = class.methods.borrow().get("init").cloned() {
            self.call_script_fn(&init, args, Some(inst.clone()), span)?;
        }

        Ok(new_ref(Value::Instance(inst)))
    }
}

fn inst_of(value: &ValueRef) -> Rc<Instance> {
    match &*value.borrow() {
        Value::Instance(inst) => inst.clone(),
        _ => unreachable!("inst_of called on non-instance"),
    }
}

fn clone_body(body: &FnBody) -> FnBody {
    match body {
        FnBody::Block(b) => FnBody::Block(b.clone()),
        FnBody::Expr(e) => FnBody::Expr(e.clone()),
    }
}

fn expect_index(span: Span, value: &Value) -> Result<usize, Error> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        Value::Int(_) => Err(Error::IndexOutOfBounds(span)),
        other => Err(Error::TypeError(span, format!("index must be int, got {}", other.type_name()))),
    }
}

fn require_bool(value: &Value, span: Span) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(Error::TypeError(span, format!("expected bool, got {}", other.type_name()))),
    }
}

fn eval_int_binary(op: BinaryOp, a: i64, b: i64, span: Span) -> Result<ValueRef, Error> {
    let result = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(Error::DivisionByZero(span));
            }
            a.wrapping_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(Error::DivisionByZero(span));
            }
            a.wrapping_rem(b)
        }
        BinaryOp::Pow => i64::try_from(a.pow(u32::try_from(b.max(0)).unwrap_or(u32::MAX))).unwrap_or(i64::MAX),
        BinaryOp::Lt => return Ok(new_ref(Value::Bool(a < b))),
        BinaryOp::LtEq => return Ok(new_ref(Value::Bool(a <= b))),
        BinaryOp::Gt => return Ok(new_ref(Value::Bool(a > b))),
        BinaryOp::GtEq => return Ok(new_ref(Value::Bool(a >= b))),
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => unreachable!("handled earlier"),
    };
    Ok(new_ref(Value::Int(result)))
}

fn check_type(span: Span, ty: &str, value: &Value) -> Result<(), Error> {
    if value.display_type_name() == ty || matches!(value, Value::None) {
        Ok(())
    } else {
        Err(Error::TypeError(span, format!("expected {ty}, got {}", value.display_type_name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ok(src: &str) -> String {
        let program = crate::parser::parse(src).unwrap();
        let out = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut interp = Interpreter::new(HostRegistry::new()).with_output(Box::new(SinkWriter(out.clone())));
        interp.run(&program).unwrap();
        String::from_utf8(out.borrow().clone()).unwrap()
    }

    struct SinkWriter(Rc<RefCell<Vec<u8>>>);
    impl Write for SinkWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn arithmetic_and_print() {
        let out = run_ok("print 1 + 2 * 3\n");
        assert_eq!(out, "7\n");
    }

    #[test]
    fn functions_and_closures() {
        let out = run_ok(
            "fn make_adder(n) {\n return fn(x) n + x\n}\nvar add5 = make_adder(5)\nprint add5(10)\n",
        );
        assert_eq!(out, "15\n");
    }

    #[test]
    fn classes_and_methods() {
        let out = run_ok(
            "class Counter {\n fn init(start) {\n self.n = start\n }\n fn bump(by) {\n self.n = self.n + by\n return self.n\n }\n}\nvar c = Counter(1)\nprint c.bump(2)\n",
        );
        assert_eq!(out, "3\n");
    }

    #[test]
    fn for_loop_over_vector() {
        let out = run_ok("var total = 0\nfor x in [1, 2, 3] {\n total = total + x\n}\nprint total\n");
        assert_eq!(out, "6\n");
    }

    #[test]
    fn assert_failure_includes_source() {
        let program = crate::parser::parse("assert(1 == 2)\n").unwrap();
        let mut interp = Interpreter::new(HostRegistry::new());
        let err = interp.run(&program).unwrap_err();
        assert!(err.to_string().contains("1 == 2"));
    }

    #[test]
    fn assert_failure_with_message_appends_it_after_source() {
        let program = crate::parser::parse("assert(1 == 2, \"nope\")\n").unwrap();
        let mut interp = Interpreter::new(HostRegistry::new());
        let err = interp.run(&program).unwrap_err();
        assert!(err.to_string().ends_with("assertion test '1 == 2' failed: nope"));
    }

    #[test]
    fn map_union_is_right_biased() {
        let out = run_ok("var a = {\"x\": 1}\nvar b = {\"x\": 2}\nprint a + b\n");
        assert_eq!(out, "{\"x\": 2}\n");
    }
}
