//! Name resolution and type checking
//!
//! Two passes over the AST: first collect every function signature into
//! the module scope (calls may precede their callee's declaration),
//! then walk each body building nested scopes, binding identifier uses
//! and checking every expression against the Rerechan02 typing rules.
//!
//! Scopes live in a flat arena indexed by `ScopeId`; child scopes hold
//! the parent's index, never ownership. Resolution results go into side
//! tables keyed by expression `NodeId` so the AST itself is never
//! mutated and codegen stays a pure function of tree + tables.

use crate::ast::{
    BinaryOp, Block, Expr, ExprKind, Function, Ident, Program, Stmt, StmtKind, Type, UnaryOp,
};
use crate::error::{Diagnostic, DiagnosticEmitter, Span};
use crate::ast::NodeId;
use indexmap::IndexMap;
use std::collections::HashMap;

pub type ScopeId = u32;
pub type SymbolId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Builtin,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Value type for variables/parameters, return type for callables
    pub ty: Type,
    /// Parameter types, callables only
    pub params: Vec<Type>,
    pub depth: u32,
    pub span: Span,
}

struct Scope {
    parent: Option<ScopeId>,
    depth: u32,
    // insertion-ordered so duplicate reporting is deterministic
    symbols: IndexMap<String, SymbolId>,
}

/// Side tables produced by a successful resolution
pub struct Resolution {
    pub symbols: Vec<Symbol>,
    /// Var / Call expression -> the symbol it refers to
    pub bindings: HashMap<NodeId, SymbolId>,
    /// Every expression's checked type
    pub expr_types: HashMap<NodeId, Type>,
}

impl Resolution {
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id as usize]
    }

    pub fn binding(&self, node: NodeId) -> Option<&Symbol> {
        self.bindings.get(&node).map(|&id| self.symbol(id))
    }

    pub fn expr_type(&self, node: NodeId) -> Option<Type> {
        self.expr_types.get(&node).copied()
    }
}

/// Builtin functions, always visible; lowered to `rere_<name>` calls
const BUILTINS: &[(&str, &[Type], Type)] = &[
    ("print", &[Type::Str], Type::Void),
    ("println", &[Type::Str], Type::Void),
    ("print_int", &[Type::Int], Type::Void),
    ("print_float", &[Type::Float], Type::Void),
    ("print_bool", &[Type::Bool], Type::Void),
    ("concat", &[Type::Str, Type::Str], Type::Str),
    ("len", &[Type::Str], Type::Int),
];

/// Import paths with known meaning. Builtins are visible regardless;
/// importing anything else is a warning, not an error.
const KNOWN_IMPORTS: &[&str] = &["std.io"];

pub fn resolve(program: &Program, emitter: &mut DiagnosticEmitter) -> Resolution {
    let mut resolver = Resolver::new(emitter);
    resolver.run(program);
    Resolution {
        symbols: resolver.symbols,
        bindings: resolver.bindings,
        expr_types: resolver.expr_types,
    }
}

struct Resolver<'a> {
    emitter: &'a mut DiagnosticEmitter,
    scopes: Vec<Scope>,
    current: ScopeId,
    symbols: Vec<Symbol>,
    bindings: HashMap<NodeId, SymbolId>,
    expr_types: HashMap<NodeId, Type>,
    /// Declared return type of the function being checked
    current_ret: Type,
}

impl<'a> Resolver<'a> {
    fn new(emitter: &'a mut DiagnosticEmitter) -> Self {
        let mut resolver = Self {
            emitter,
            scopes: Vec::new(),
            current: 0,
            symbols: Vec::new(),
            bindings: HashMap::new(),
            expr_types: HashMap::new(),
            current_ret: Type::Void,
        };

        // scope 0: builtins; scope 1: the module's functions
        resolver.scopes.push(Scope {
            parent: None,
            depth: 0,
            symbols: IndexMap::new(),
        });
        for (name, params, ret) in BUILTINS {
            let id = resolver.symbols.len() as SymbolId;
            resolver.symbols.push(Symbol {
                name: (*name).to_string(),
                kind: SymbolKind::Builtin,
                ty: *ret,
                params: params.to_vec(),
                depth: 0,
                span: Span::dummy(),
            });
            resolver.scopes[0].symbols.insert((*name).to_string(), id);
        }
        resolver.current = resolver.push_scope();
        resolver
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.emitter.emit(Diagnostic::error(message).with_span(span));
    }

    fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.emitter
            .emit(Diagnostic::warning(message).with_span(span));
    }

    /* ==== scope arena ==== */

    fn push_scope(&mut self) -> ScopeId {
        let parent = if self.scopes.is_empty() {
            None
        } else {
            Some(self.current)
        };
        let depth = parent.map(|p| self.scopes[p as usize].depth + 1).unwrap_or(0);
        let id = self.scopes.len() as ScopeId;
        self.scopes.push(Scope {
            parent,
            depth,
            symbols: IndexMap::new(),
        });
        id
    }

    fn enter_scope(&mut self) -> ScopeId {
        let id = self.push_scope();
        self.current = id;
        id
    }

    fn leave_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current as usize].parent {
            self.current = parent;
        }
    }

    /// Declare in the current scope. Duplicates within the same scope are
    /// rejected; shadowing an outer scope is allowed.
    fn declare(
        &mut self,
        name: &Ident,
        kind: SymbolKind,
        ty: Type,
        params: Vec<Type>,
    ) -> Option<SymbolId> {
        let scope = &self.scopes[self.current as usize];
        if scope.symbols.contains_key(&name.name) {
            let msg = format!("duplicate declaration of `{}` in this scope", name.name);
            self.error(msg, name.span);
            return None;
        }
        let depth = scope.depth;
        let id = self.symbols.len() as SymbolId;
        self.symbols.push(Symbol {
            name: name.name.clone(),
            kind,
            ty,
            params,
            depth,
            span: name.span,
        });
        self.scopes[self.current as usize]
            .symbols
            .insert(name.name.clone(), id);
        Some(id)
    }

    /// Innermost-to-outermost lookup
    fn lookup(&self, name: &str) -> Option<SymbolId> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            let s = &self.scopes[id as usize];
            if let Some(&sym) = s.symbols.get(name) {
                return Some(sym);
            }
            scope = s.parent;
        }
        None
    }

    /* ==== passes ==== */

    fn run(&mut self, program: &Program) {
        self.check_imports(program);

        // pass 1: function signatures
        for func in &program.functions {
            let param_types: Vec<Type> = func.params.iter().map(|p| p.ty).collect();
            self.declare(&func.name, SymbolKind::Function, func.ret_type, param_types);
        }

        self.check_entry_point(program);

        // pass 2: bodies; errors in one function do not stop the next
        for func in &program.functions {
            self.check_function(func);
        }
    }

    fn check_imports(&mut self, program: &Program) {
        let mut seen: Vec<String> = Vec::new();
        for import in &program.imports {
            let path = import.path();
            if seen.contains(&path) {
                self.warning(format!("duplicate import `{}`", path), import.span);
                continue;
            }
            if !KNOWN_IMPORTS.contains(&path.as_str()) {
                let msg = format!("unknown import `{}`", path);
                self.emitter.emit(
                    Diagnostic::warning(msg)
                        .with_span(import.span)
                        .with_note("builtin functions are available without imports"),
                );
            }
            seen.push(path);
        }
    }

    fn check_entry_point(&mut self, program: &Program) {
        match program.functions.iter().find(|f| f.name.name == "main") {
            None => {
                let msg = format!("module `{}` has no `main` function", program.module.name.name);
                self.error(msg, program.module.span);
            }
            Some(main) => {
                if !main.params.is_empty() {
                    self.error("`main` must take no parameters", main.name.span);
                }
                if main.ret_type != Type::Int && main.ret_type != Type::Void {
                    let span = main.ret_type_span.unwrap_or(main.name.span);
                    let msg = format!(
                        "`main` must return int or void, not {}",
                        main.ret_type
                    );
                    self.error(msg, span);
                }
            }
        }
    }

    fn check_function(&mut self, func: &Function) {
        self.current_ret = func.ret_type;
        self.enter_scope();
        for param in &func.params {
            if param.ty == Type::Void {
                self.error(
                    format!("parameter `{}` cannot have type void", param.name.name),
                    param.span,
                );
            }
            self.declare(&param.name, SymbolKind::Parameter, param.ty, Vec::new());
        }
        self.check_block(&func.body);
        self.leave_scope();

        if func.ret_type != Type::Void && !block_always_returns(&func.body) {
            let msg = format!(
                "function `{}` is declared to return {} but may finish without returning",
                func.name.name, func.ret_type
            );
            self.error(msg, func.name.span);
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.enter_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.leave_scope();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let {
                name,
                ty,
                ty_span,
                init,
            } => {
                let init_ty = self.check_expr(init);
                let declared = match (ty, init_ty) {
                    (Some(annot), Some(actual)) => {
                        if *annot != actual {
                            let span = ty_span.unwrap_or(name.span);
                            let msg = format!(
                                "let binding annotated as {} but initializer has type {}",
                                annot, actual
                            );
                            self.error(msg, span);
                        }
                        *annot
                    }
                    (Some(annot), None) => *annot,
                    (None, Some(actual)) => actual,
                    // initializer failed to check; declare with a
                    // placeholder so uses don't cascade
                    (None, None) => Type::Int,
                };
                if declared == Type::Void {
                    self.error(
                        format!("variable `{}` cannot have type void", name.name),
                        name.span,
                    );
                }
                self.declare(name, SymbolKind::Variable, declared, Vec::new());
            }
            StmtKind::Assign { name, value } => {
                let value_ty = self.check_expr(value);
                match self.lookup(&name.name) {
                    None => {
                        let msg = format!("unresolved identifier `{}`", name.name);
                        self.error(msg, name.span);
                    }
                    Some(id) => {
                        let sym = &self.symbols[id as usize];
                        match sym.kind {
                            SymbolKind::Variable | SymbolKind::Parameter => {
                                let expected = sym.ty;
                                if let Some(actual) = value_ty {
                                    if actual != expected {
                                        let msg = format!(
                                            "cannot assign {} to `{}` of type {}",
                                            actual, name.name, expected
                                        );
                                        self.error(msg, value.span);
                                    }
                                }
                            }
                            SymbolKind::Function | SymbolKind::Builtin => {
                                let msg =
                                    format!("cannot assign to function `{}`", name.name);
                                self.error(msg, name.span);
                            }
                        }
                    }
                }
            }
            StmtKind::Return(value) => {
                let expected = self.current_ret;
                match (value, expected) {
                    (None, Type::Void) => {}
                    (None, _) => {
                        let msg = format!("return without a value in a function returning {}", expected);
                        self.error(msg, stmt.span);
                    }
                    (Some(expr), _) => {
                        if let Some(actual) = self.check_expr(expr) {
                            if expected == Type::Void {
                                self.error(
                                    "cannot return a value from a void function",
                                    expr.span,
                                );
                            } else if actual != expected {
                                let msg = format!(
                                    "return type mismatch: expected {}, found {}",
                                    expected, actual
                                );
                                self.error(msg, expr.span);
                            }
                        }
                    }
                }
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                self.check_condition(cond, "if");
                self.check_block(then_block);
                if let Some(block) = else_block {
                    self.check_block(block);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond, "while");
                self.check_block(body);
            }
            StmtKind::Expr(expr) => {
                self.check_expr(expr);
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr, construct: &str) {
        if let Some(ty) = self.check_expr(cond) {
            if ty != Type::Bool {
                let msg = format!("{} condition must be bool, found {}", construct, ty);
                self.error(msg, cond.span);
            }
        }
    }

    /// Check one expression; `None` means an error was already reported
    /// somewhere inside it and dependent checks should stay silent.
    fn check_expr(&mut self, expr: &Expr) -> Option<Type> {
        let ty = match &expr.kind {
            ExprKind::Int(_) => Some(Type::Int),
            ExprKind::Float(_) => Some(Type::Float),
            ExprKind::Str(_) => Some(Type::Str),
            ExprKind::Bool(_) => Some(Type::Bool),
            ExprKind::Var(name) => match self.lookup(name) {
                None => {
                    let msg = format!("unresolved identifier `{}`", name);
                    self.error(msg, expr.span);
                    None
                }
                Some(id) => {
                    let sym = &self.symbols[id as usize];
                    match sym.kind {
                        SymbolKind::Variable | SymbolKind::Parameter => {
                            let ty = sym.ty;
                            self.bindings.insert(expr.id, id);
                            Some(ty)
                        }
                        SymbolKind::Function | SymbolKind::Builtin => {
                            let msg = format!(
                                "`{}` is a function; functions are not values in Rerechan02",
                                name
                            );
                            self.error(msg, expr.span);
                            None
                        }
                    }
                }
            },
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expr(operand)?;
                match op {
                    UnaryOp::Neg if operand_ty == Type::Int || operand_ty == Type::Float => {
                        Some(operand_ty)
                    }
                    UnaryOp::Neg => {
                        let msg = format!("cannot negate {}", operand_ty);
                        self.error(msg, expr.span);
                        None
                    }
                    UnaryOp::Not if operand_ty == Type::Bool => Some(Type::Bool),
                    UnaryOp::Not => {
                        let msg = format!("`!` requires bool, found {}", operand_ty);
                        self.error(msg, expr.span);
                        None
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.check_expr(lhs);
                let rhs_ty = self.check_expr(rhs);
                let (lhs_ty, rhs_ty) = (lhs_ty?, rhs_ty?);
                self.check_binary(*op, lhs_ty, rhs_ty, expr.span)
            }
            ExprKind::Call { callee, args } => self.check_call(expr, callee, args),
        };

        if let Some(ty) = ty {
            self.expr_types.insert(expr.id, ty);
        }
        ty
    }

    fn check_binary(&mut self, op: BinaryOp, lhs: Type, rhs: Type, span: Span) -> Option<Type> {
        use BinaryOp::*;
        let numeric = |t: Type| t == Type::Int || t == Type::Float;

        match op {
            Add if lhs == Type::Str && rhs == Type::Str => Some(Type::Str),
            Add | Sub | Mul | Div => {
                if numeric(lhs) && lhs == rhs {
                    Some(lhs)
                } else {
                    let msg = format!("cannot apply `{}` to {} and {}", op, lhs, rhs);
                    self.error(msg, span);
                    None
                }
            }
            Rem => {
                if lhs == Type::Int && rhs == Type::Int {
                    Some(Type::Int)
                } else {
                    let msg = format!("`%` requires int operands, found {} and {}", lhs, rhs);
                    self.error(msg, span);
                    None
                }
            }
            Lt | Le | Gt | Ge => {
                if numeric(lhs) && lhs == rhs {
                    Some(Type::Bool)
                } else {
                    let msg = format!("cannot compare {} and {} with `{}`", lhs, rhs, op);
                    self.error(msg, span);
                    None
                }
            }
            Eq | Ne => {
                if lhs == rhs && lhs != Type::Void {
                    Some(Type::Bool)
                } else {
                    let msg = format!("cannot compare {} and {} with `{}`", lhs, rhs, op);
                    self.error(msg, span);
                    None
                }
            }
            And | Or => {
                if lhs == Type::Bool && rhs == Type::Bool {
                    Some(Type::Bool)
                } else {
                    let msg = format!("`{}` requires bool operands, found {} and {}", op, lhs, rhs);
                    self.error(msg, span);
                    None
                }
            }
        }
    }

    fn check_call(&mut self, expr: &Expr, callee: &Ident, args: &[Expr]) -> Option<Type> {
        // check arguments first so their errors surface even when the
        // callee is unknown
        let arg_types: Vec<Option<Type>> = args.iter().map(|a| self.check_expr(a)).collect();

        let id = match self.lookup(&callee.name) {
            None => {
                let msg = format!("unresolved identifier `{}`", callee.name);
                self.error(msg, callee.span);
                return None;
            }
            Some(id) => id,
        };

        let (kind, ret, params) = {
            let sym = &self.symbols[id as usize];
            (sym.kind, sym.ty, sym.params.clone())
        };

        match kind {
            SymbolKind::Variable | SymbolKind::Parameter => {
                let msg = format!("`{}` is not a function", callee.name);
                self.error(msg, callee.span);
                return None;
            }
            SymbolKind::Function | SymbolKind::Builtin => {}
        }

        self.bindings.insert(expr.id, id);

        if args.len() != params.len() {
            let msg = format!(
                "`{}` expects {} argument(s), found {}",
                callee.name,
                params.len(),
                args.len()
            );
            self.error(msg, expr.span);
            return Some(ret);
        }

        for (i, (arg, expected)) in args.iter().zip(params.iter()).enumerate() {
            if let Some(actual) = arg_types[i] {
                if actual != *expected {
                    let msg = format!(
                        "argument {} of `{}` expects {}, found {}",
                        i + 1,
                        callee.name,
                        expected,
                        actual
                    );
                    self.error(msg, arg.span);
                }
            }
        }

        Some(ret)
    }
}

/// Conservative "all paths return" check: a block always returns when it
/// contains a return statement, or an if whose branches both always
/// return. Loops never count.
fn block_always_returns(block: &Block) -> bool {
    block.stmts.iter().any(stmt_always_returns)
}

fn stmt_always_returns(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If {
            then_block,
            else_block,
            ..
        } => match else_block {
            Some(else_block) => {
                block_always_returns(then_block) && block_always_returns(else_block)
            }
            None => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser;

    fn resolve_src(src: &str) -> (Resolution, DiagnosticEmitter) {
        let (tokens, lex_errors) = Lexer::tokenize(src);
        assert!(lex_errors.is_empty());
        let mut emitter = DiagnosticEmitter::new();
        let program = parser::parse(&tokens, &mut emitter).expect("parse failed");
        assert!(!emitter.has_errors(), "parse errors");
        let resolution = resolve(&program, &mut emitter);
        (resolution, emitter)
    }

    fn errors_of(src: &str) -> Vec<String> {
        let (_, mut emitter) = resolve_src(src);
        emitter
            .take_diagnostics()
            .into_iter()
            .filter(|d| d.severity == crate::error::Severity::Error)
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_hello_world_resolves() {
        let errors = errors_of(
            "module hello; import std.io; func main() -> int { println(\"hi\"); return 0; }",
        );
        assert!(errors.is_empty(), "unexpected: {:?}", errors);
    }

    #[test]
    fn test_unresolved_identifier() {
        let errors = errors_of("module m; func main() { print_int(nope); }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unresolved identifier `nope`"));
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let errors = errors_of("module m; func main() { let x = 1; let x = 2; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("duplicate declaration of `x`"));
    }

    #[test]
    fn test_shadowing_in_nested_scope_allowed() {
        let errors = errors_of(
            "module m; func main() { let x = 1; if x == 1 { let x = 2.0; print_float(x); } }",
        );
        assert!(errors.is_empty(), "unexpected: {:?}", errors);
    }

    #[test]
    fn test_duplicate_function() {
        let errors = errors_of("module m; func main() { } func f() { } func f() { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("duplicate declaration of `f`"));
    }

    #[test]
    fn test_call_before_declaration() {
        let errors = errors_of(
            "module m; func main() { print_int(later()); } func later() -> int { return 3; }",
        );
        assert!(errors.is_empty(), "unexpected: {:?}", errors);
    }

    #[test]
    fn test_type_mismatch_mixed_arithmetic() {
        let errors = errors_of("module m; func main() { let x = 1 + 2.0; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cannot apply `+` to int and float"));
    }

    #[test]
    fn test_string_concat_with_plus() {
        let errors = errors_of("module m; func main() { println(\"a\" + \"b\"); }");
        assert!(errors.is_empty(), "unexpected: {:?}", errors);
    }

    #[test]
    fn test_condition_must_be_bool() {
        let errors = errors_of("module m; func main() { if 1 { } }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("if condition must be bool"));
    }

    #[test]
    fn test_assignment_type_checked() {
        let errors = errors_of("module m; func main() { let x = 1; x = \"s\"; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cannot assign string to `x` of type int"));
    }

    #[test]
    fn test_return_type_mismatch() {
        let errors = errors_of("module m; func main() -> int { return \"no\"; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("return type mismatch"));
    }

    #[test]
    fn test_missing_return_on_some_path() {
        let errors =
            errors_of("module m; func main() -> int { if true { return 1; } }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("may finish without returning"));
    }

    #[test]
    fn test_both_branches_return_is_ok() {
        let errors = errors_of(
            "module m; func main() -> int { if true { return 1; } else { return 2; } }",
        );
        assert!(errors.is_empty(), "unexpected: {:?}", errors);
    }

    #[test]
    fn test_arity_checked() {
        let errors = errors_of("module m; func main() { println(\"a\", \"b\"); }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expects 1 argument(s), found 2"));
    }

    #[test]
    fn test_builtin_argument_type() {
        let errors = errors_of("module m; func main() { println(42); }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expects string, found int"));
    }

    #[test]
    fn test_missing_main() {
        let errors = errors_of("module m; func helper() { }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("no `main` function"));
    }

    #[test]
    fn test_main_signature_checked() {
        let errors = errors_of("module m; func main(x: int) -> string { return \"s\"; }");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_unknown_import_is_warning() {
        let (_, mut emitter) = resolve_src(
            "module m; import std.nonsense; func main() { }",
        );
        assert!(!emitter.has_errors());
        let diags = emitter.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unknown import"));
    }

    #[test]
    fn test_bindings_and_types_recorded() {
        let (resolution, mut emitter) = resolve_src(
            "module m; func main() { let x = 2; print_int(x * 3); }",
        );
        assert!(!emitter.has_errors());
        let _ = emitter.take_diagnostics();
        // one Var binding (x) plus one Call binding (print_int)
        assert_eq!(resolution.bindings.len(), 2);
        assert!(resolution
            .expr_types
            .values()
            .any(|&t| t == Type::Int));
    }

    #[test]
    fn test_multiple_errors_reported_together() {
        let errors = errors_of(
            "module m; func main() { print_int(a); print_int(b); let x = 1 + true; }",
        );
        assert_eq!(errors.len(), 3);
    }
}
