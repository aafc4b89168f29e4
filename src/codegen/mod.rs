//! C11 code generation
//!
//! Lowers a resolved program to a single portable C translation unit
//! that includes `rere_runtime.h` and calls into the runtime library
//! for printing, string operations and integer arithmetic (wrapping
//! add/sub/mul/neg, checked division and modulo).
//!
//! The output is byte-deterministic for a given input: string literals
//! are hoisted to counter-named file-scope constants in pre-order,
//! temporaries are numbered by one monotonic counter, and functions are
//! emitted in source order.
//!
//! Evaluation order is pinned to left-to-right by lowering every call
//! result into a temporary before use. A `&&`/`||` whose right operand
//! contains a call is lowered to an `if` over a flag so short-circuit
//! behavior survives the hoisting, and a `while` condition containing a
//! call becomes a `for (;;)` with the condition re-lowered inside the
//! loop body.

use crate::ast::{
    BinaryOp, Block, Expr, ExprKind, Function, Program, Stmt, StmtKind, Type, UnaryOp,
};
use crate::error::{RerecError, Result};
use crate::resolve::{Resolution, SymbolKind};
use crate::runtime::ABI_VERSION;
use std::collections::{HashMap, HashSet};

/// Generate the C source for a resolved program.
///
/// Must only be called when resolution produced no errors; an
/// inconsistent side table is reported as an internal error.
pub fn generate(program: &Program, resolution: &Resolution) -> Result<String> {
    let mut gen = CodeGenerator::new(program, resolution);
    gen.run()?;
    Ok(gen.out)
}

struct CodeGenerator<'a> {
    program: &'a Program,
    resolution: &'a Resolution,
    out: String,
    indent: usize,
    /// Expression id of each string literal -> hoisted constant index
    string_ids: HashMap<u32, usize>,
    strings: Vec<String>,
    tmp_counter: usize,
    /// Source name -> C name, innermost scope last
    locals: Vec<HashMap<String, String>>,
    /// C names already taken in the current function (plus all function
    /// names, so a local never collides with a callee)
    used_names: HashSet<String>,
}

impl<'a> CodeGenerator<'a> {
    fn new(program: &'a Program, resolution: &'a Resolution) -> Self {
        Self {
            program,
            resolution,
            out: String::new(),
            indent: 0,
            string_ids: HashMap::new(),
            strings: Vec::new(),
            tmp_counter: 0,
            locals: Vec::new(),
            used_names: HashSet::new(),
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn internal(&self, what: impl Into<String>) -> RerecError {
        RerecError::Internal(what.into())
    }

    fn expr_type(&self, expr: &Expr) -> Result<Type> {
        self.resolution
            .expr_type(expr.id)
            .ok_or_else(|| self.internal(format!("no type recorded for expression {}", expr.id)))
    }

    fn fresh_tmp(&mut self) -> String {
        let name = format!("rrt_{}", self.tmp_counter);
        self.tmp_counter += 1;
        name
    }

    /* ==== name mangling ==== */

    /// Declare a variable or parameter, picking a C name that does not
    /// collide with anything live in the function. Shadowed names get a
    /// numeric suffix.
    fn declare_local(&mut self, name: &str) -> String {
        let base = format!("rr_{}", name);
        let mut candidate = base.clone();
        let mut n = 0usize;
        while self.used_names.contains(&candidate) {
            n += 1;
            candidate = format!("{}_{}", base, n);
        }
        self.used_names.insert(candidate.clone());
        self.locals
            .last_mut()
            .map(|scope| scope.insert(name.to_string(), candidate.clone()));
        candidate
    }

    fn local_name(&self, name: &str) -> Result<String> {
        for scope in self.locals.iter().rev() {
            if let Some(c_name) = scope.get(name) {
                return Ok(c_name.clone());
            }
        }
        Err(self.internal(format!("no C name for local `{}`", name)))
    }

    /* ==== top level ==== */

    fn run(&mut self) -> Result<()> {
        // `program` outlives the generator, so pulling the reference out
        // lets the emit methods take &mut self while walking it
        let program = self.program;
        self.collect_strings();

        self.line(&format!(
            "/* Generated by rerec from module \"{}\". Do not edit. */",
            program.module.name.name
        ));
        self.line("#include \"rere_runtime.h\"");
        self.line("#include <stdbool.h>");
        self.blank();
        self.line(&format!(
            "_Static_assert(RERE_RT_ABI_VERSION == {}, \"rere runtime ABI mismatch\");",
            ABI_VERSION
        ));

        if !self.strings.is_empty() {
            self.blank();
            for (i, s) in self.strings.clone().into_iter().enumerate() {
                self.line(&format!(
                    "static const char rrs_{}[] = \"{}\";",
                    i,
                    c_escape(&s)
                ));
            }
        }

        // prototypes first so call order never constrains source order
        self.blank();
        for func in &program.functions {
            let proto = self.prototype(func);
            self.line(&format!("{};", proto));
        }

        for func in &program.functions {
            self.blank();
            self.emit_function(func)?;
        }

        self.blank();
        self.emit_entry_wrapper()?;
        Ok(())
    }

    fn c_type(&self, ty: Type) -> &'static str {
        match ty {
            Type::Int => "long long",
            Type::Float => "double",
            Type::Bool => "bool",
            Type::Str => "const char *",
            Type::Void => "void",
        }
    }

    /// Declaration text for `name` of type `ty`; pointer types bind the
    /// `*` to the name
    fn c_decl(&self, ty: Type, name: &str) -> String {
        match ty {
            Type::Str => format!("const char *{}", name),
            other => format!("{} {}", self.c_type(other), name),
        }
    }

    /// Forward declaration, parameter types only
    fn prototype(&self, func: &Function) -> String {
        let params = if func.params.is_empty() {
            "void".to_string()
        } else {
            func.params
                .iter()
                .map(|p| self.c_type(p.ty).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "static {} rr_{}({})",
            self.c_type(func.ret_type),
            func.name.name,
            params
        )
    }

    fn emit_function(&mut self, func: &Function) -> Result<()> {
        self.locals.clear();
        self.used_names = self
            .program
            .functions
            .iter()
            .map(|f| format!("rr_{}", f.name.name))
            .collect();

        self.locals.push(HashMap::new());
        let params: Vec<String> = func
            .params
            .iter()
            .map(|p| {
                let c_name = self.declare_local(&p.name.name);
                self.c_decl(p.ty, &c_name)
            })
            .collect();
        let params = if params.is_empty() {
            "void".to_string()
        } else {
            params.join(", ")
        };

        self.line(&format!(
            "static {} rr_{}({}) {{",
            self.c_type(func.ret_type),
            func.name.name,
            params
        ));
        self.indent += 1;
        self.locals.push(HashMap::new());
        for stmt in &func.body.stmts {
            self.emit_stmt(stmt)?;
        }
        self.locals.pop();
        self.indent -= 1;
        self.line("}");
        self.locals.pop();
        Ok(())
    }

    fn emit_entry_wrapper(&mut self) -> Result<()> {
        let main = self
            .program
            .functions
            .iter()
            .find(|f| f.name.name == "main")
            .ok_or_else(|| self.internal("entry wrapper requested without a main function"))?;
        let returns_int = main.ret_type == Type::Int;

        self.line("int main(void) {");
        self.indent += 1;
        self.line("rere_rt_init();");
        if returns_int {
            self.line("long long code = rr_main();");
            self.line("rere_rt_shutdown();");
            self.line("return (int)code;");
        } else {
            self.line("rr_main();");
            self.line("rere_rt_shutdown();");
            self.line("return 0;");
        }
        self.indent -= 1;
        self.line("}");
        Ok(())
    }

    /* ==== statements ==== */

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match &stmt.kind {
            StmtKind::Let { name, ty, init, .. } => {
                let init_text = self.lower_expr(init)?;
                let var_ty = match ty {
                    Some(t) => *t,
                    None => self.expr_type(init)?,
                };
                let c_name = self.declare_local(&name.name);
                let decl = self.c_decl(var_ty, &c_name);
                self.line(&format!("{} = {};", decl, init_text));
            }
            StmtKind::Assign { name, value } => {
                let value_text = self.lower_expr(value)?;
                let c_name = self.local_name(&name.name)?;
                self.line(&format!("{} = {};", c_name, value_text));
            }
            StmtKind::Return(None) => {
                self.line("return;");
            }
            StmtKind::Return(Some(expr)) => {
                let text = self.lower_expr(expr)?;
                self.line(&format!("return {};", text));
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond_text = self.lower_expr(cond)?;
                self.line(&format!("if ({}) {{", cond_text));
                self.indent += 1;
                self.locals.push(HashMap::new());
                for s in &then_block.stmts {
                    self.emit_stmt(s)?;
                }
                self.locals.pop();
                self.indent -= 1;
                match else_block {
                    None => self.line("}"),
                    Some(else_block) => {
                        self.line("} else {");
                        self.indent += 1;
                        self.locals.push(HashMap::new());
                        for s in &else_block.stmts {
                            self.emit_stmt(s)?;
                        }
                        self.locals.pop();
                        self.indent -= 1;
                        self.line("}");
                    }
                }
            }
            StmtKind::While { cond, body } => {
                if contains_call(cond) {
                    // condition has side effects; re-lower it on every
                    // iteration inside the loop
                    self.line("for (;;) {");
                    self.indent += 1;
                    self.locals.push(HashMap::new());
                    let cond_text = self.lower_expr(cond)?;
                    self.line(&format!("if (!({})) {{", cond_text));
                    self.indent += 1;
                    self.line("break;");
                    self.indent -= 1;
                    self.line("}");
                    for s in &body.stmts {
                        self.emit_stmt(s)?;
                    }
                    self.locals.pop();
                    self.indent -= 1;
                    self.line("}");
                } else {
                    let cond_text = self.lower_expr(cond)?;
                    self.line(&format!("while ({}) {{", cond_text));
                    self.indent += 1;
                    self.locals.push(HashMap::new());
                    for s in &body.stmts {
                        self.emit_stmt(s)?;
                    }
                    self.locals.pop();
                    self.indent -= 1;
                    self.line("}");
                }
            }
            StmtKind::Expr(expr) => {
                // call results are discarded here, so emit the call
                // directly instead of hoisting it into a temporary
                if let ExprKind::Call { callee, args } = &expr.kind {
                    let text = self.lower_call_text(expr, callee, args)?;
                    self.line(&format!("{};", text));
                } else {
                    let text = self.lower_expr(expr)?;
                    self.line(&format!("(void)({});", text));
                }
            }
        }
        Ok(())
    }

    /* ==== expressions ==== */

    /// Lower one expression, appending any hoisted statements to the
    /// output, and return the C expression text for its value.
    fn lower_expr(&mut self, expr: &Expr) -> Result<String> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(format!("{}LL", n)),
            ExprKind::Float(x) => Ok(float_literal(*x)),
            ExprKind::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
            ExprKind::Str(_) => {
                let idx = self
                    .string_ids
                    .get(&expr.id)
                    .copied()
                    .ok_or_else(|| self.internal("string literal not hoisted"))?;
                Ok(format!("rrs_{}", idx))
            }
            ExprKind::Var(name) => self.local_name(name),
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.expr_type(operand)?;
                let text = self.lower_expr(operand)?;
                Ok(match (op, operand_ty) {
                    (UnaryOp::Neg, Type::Int) => format!("rere_neg_int({})", text),
                    (UnaryOp::Neg, _) => format!("(-{})", text),
                    (UnaryOp::Not, _) => format!("(!{})", text),
                })
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            ExprKind::Call { callee, args } => {
                let text = self.lower_call_text(expr, callee, args)?;
                let ret = self.expr_type(expr)?;
                if ret == Type::Void {
                    return Err(self.internal(format!(
                        "void call to `{}` used as a value",
                        callee.name
                    )));
                }
                let tmp = self.fresh_tmp();
                let decl = self.c_decl(ret, &tmp);
                self.line(&format!("{} = {};", decl, text));
                Ok(tmp)
            }
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<String> {
        use BinaryOp::*;

        if matches!(op, And | Or) && contains_call(rhs) {
            return self.lower_short_circuit(op, lhs, rhs);
        }

        let operand_ty = self.expr_type(lhs)?;
        let lhs_text = self.lower_expr(lhs)?;
        let rhs_text = self.lower_expr(rhs)?;

        let text = match (op, operand_ty) {
            (Add, Type::Str) => format!("rere_concat({}, {})", lhs_text, rhs_text),
            // int arithmetic wraps in two's complement, which native C
            // signed operators do not guarantee
            (Add, Type::Int) => format!("rere_add_int({}, {})", lhs_text, rhs_text),
            (Sub, Type::Int) => format!("rere_sub_int({}, {})", lhs_text, rhs_text),
            (Mul, Type::Int) => format!("rere_mul_int({}, {})", lhs_text, rhs_text),
            (Div, Type::Int) => format!("rere_div_int({}, {})", lhs_text, rhs_text),
            (Rem, Type::Int) => format!("rere_mod_int({}, {})", lhs_text, rhs_text),
            (Eq, Type::Str) => format!("rere_str_eq({}, {})", lhs_text, rhs_text),
            (Ne, Type::Str) => format!("(!rere_str_eq({}, {}))", lhs_text, rhs_text),
            _ => format!("({} {} {})", lhs_text, op.as_str(), rhs_text),
        };
        Ok(text)
    }

    /// `a && b` where `b` contains a call: evaluate `a` into a flag and
    /// only run `b`'s hoisted statements when the flag demands it.
    fn lower_short_circuit(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<String> {
        let lhs_text = self.lower_expr(lhs)?;
        let tmp = self.fresh_tmp();
        self.line(&format!("bool {} = {};", tmp, lhs_text));
        let guard = match op {
            BinaryOp::And => format!("if ({}) {{", tmp),
            BinaryOp::Or => format!("if (!{}) {{", tmp),
            _ => return Err(self.internal("short-circuit lowering on a non-logical operator")),
        };
        self.line(&guard);
        self.indent += 1;
        let rhs_text = self.lower_expr(rhs)?;
        self.line(&format!("{} = {};", tmp, rhs_text));
        self.indent -= 1;
        self.line("}");
        Ok(tmp)
    }

    fn lower_call_text(
        &mut self,
        expr: &Expr,
        callee: &crate::ast::Ident,
        args: &[Expr],
    ) -> Result<String> {
        // arguments are lowered (and their calls hoisted) left to right
        let mut arg_texts = Vec::with_capacity(args.len());
        for arg in args {
            arg_texts.push(self.lower_expr(arg)?);
        }

        let symbol = self
            .resolution
            .binding(expr.id)
            .ok_or_else(|| self.internal(format!("call to `{}` has no binding", callee.name)))?;
        let target = match symbol.kind {
            SymbolKind::Builtin => format!("rere_{}", symbol.name),
            SymbolKind::Function => format!("rr_{}", symbol.name),
            _ => {
                return Err(self.internal(format!(
                    "call binding for `{}` is not a function",
                    callee.name
                )))
            }
        };
        Ok(format!("{}({})", target, arg_texts.join(", ")))
    }

    /* ==== string hoisting ==== */

    fn collect_strings(&mut self) {
        fn walk_expr(gen: &mut CodeGenerator<'_>, expr: &Expr) {
            match &expr.kind {
                ExprKind::Str(s) => {
                    let idx = gen.strings.len();
                    gen.strings.push(s.clone());
                    gen.string_ids.insert(expr.id, idx);
                }
                ExprKind::Binary { lhs, rhs, .. } => {
                    walk_expr(gen, lhs);
                    walk_expr(gen, rhs);
                }
                ExprKind::Unary { operand, .. } => walk_expr(gen, operand),
                ExprKind::Call { args, .. } => {
                    for arg in args {
                        walk_expr(gen, arg);
                    }
                }
                _ => {}
            }
        }
        fn walk_block(gen: &mut CodeGenerator<'_>, block: &Block) {
            for stmt in &block.stmts {
                walk_stmt(gen, stmt);
            }
        }
        fn walk_stmt(gen: &mut CodeGenerator<'_>, stmt: &Stmt) {
            match &stmt.kind {
                StmtKind::Let { init, .. } => walk_expr(gen, init),
                StmtKind::Assign { value, .. } => walk_expr(gen, value),
                StmtKind::Return(e) => {
                    if let Some(e) = e {
                        walk_expr(gen, e);
                    }
                }
                StmtKind::If {
                    cond,
                    then_block,
                    else_block,
                } => {
                    walk_expr(gen, cond);
                    walk_block(gen, then_block);
                    if let Some(b) = else_block {
                        walk_block(gen, b);
                    }
                }
                StmtKind::While { cond, body } => {
                    walk_expr(gen, cond);
                    walk_block(gen, body);
                }
                StmtKind::Expr(e) => walk_expr(gen, e),
            }
        }

        let program = self.program;
        for func in &program.functions {
            walk_block(self, &func.body);
        }
    }
}

fn contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Binary { lhs, rhs, .. } => contains_call(lhs) || contains_call(rhs),
        ExprKind::Unary { operand, .. } => contains_call(operand),
        _ => false,
    }
}

/// Shortest round-tripping decimal form, always valid as a C double
/// literal (Rust's Debug form for finite f64 always carries a `.` or an
/// exponent)
fn float_literal(x: f64) -> String {
    format!("{:?}", x)
}

/// Escape a string for a C literal. Printable ASCII passes through,
/// everything else becomes a three-digit octal escape so a following
/// digit can never extend it.
fn c_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticEmitter;
    use crate::lexer::Lexer;
    use crate::parser;
    use crate::resolve;

    fn generate_src(src: &str) -> String {
        let (tokens, lex_errors) = Lexer::tokenize(src);
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        let mut emitter = DiagnosticEmitter::new();
        let program = parser::parse(&tokens, &mut emitter).expect("parse failed");
        let resolution = resolve::resolve(&program, &mut emitter);
        assert!(
            !emitter.has_errors(),
            "errors: {:?}",
            emitter.take_diagnostics()
        );
        generate(&program, &resolution).expect("codegen failed")
    }

    #[test]
    fn test_hello_world_shape() {
        let c = generate_src(
            "module hello; import std.io; func main() -> int { println(\"hello\"); return 0; }",
        );
        assert!(c.contains("#include \"rere_runtime.h\""));
        assert!(c.contains("static const char rrs_0[] = \"hello\";"));
        assert!(c.contains("static long long rr_main(void)"));
        assert!(c.contains("rere_println(rrs_0);"));
        assert!(c.contains("rere_rt_init();"));
        assert!(c.contains("rere_rt_shutdown();"));
        assert!(c.contains("return (int)code;"));
    }

    #[test]
    fn test_void_main_wrapper_returns_zero() {
        let c = generate_src("module m; func main() { print_int(1); }");
        assert!(c.contains("static void rr_main(void)"));
        assert!(c.contains("rr_main();"));
        assert!(c.contains("return 0;"));
    }

    #[test]
    fn test_type_mapping() {
        let c = generate_src(
            "module m; func main() { let a = 1; let b = 2.0; let c = true; let d = \"s\"; \
             print_int(a); print_float(b); print_bool(c); print(d); }",
        );
        assert!(c.contains("long long rr_a = 1LL;"));
        assert!(c.contains("double rr_b = 2.0;"));
        assert!(c.contains("bool rr_c = true;"));
        assert!(c.contains("const char *rr_d = rrs_0;"));
    }

    #[test]
    fn test_integer_division_is_checked() {
        let c = generate_src("module m; func main() { let x = 7 / 2; let y = 7 % 2; print_int(x + y); }");
        assert!(c.contains("rere_div_int(7LL, 2LL)"));
        assert!(c.contains("rere_mod_int(7LL, 2LL)"));
    }

    #[test]
    fn test_int_arithmetic_wraps_via_runtime() {
        let c = generate_src(
            "module m; func main() { print_int(9223372036854775807 + 1); print_int(-(2 * 3)); }",
        );
        assert!(c.contains("rere_add_int(9223372036854775807LL, 1LL)"));
        assert!(c.contains("rere_neg_int(rere_mul_int(2LL, 3LL))"));
    }

    #[test]
    fn test_float_arithmetic_is_native() {
        let c = generate_src("module m; func main() { print_float(-(1.5 + 2.5)); }");
        assert!(c.contains("(-(1.5 + 2.5))"));
        assert!(!c.contains("rere_add_int"));
    }

    #[test]
    fn test_float_division_is_native() {
        let c = generate_src("module m; func main() { let x = 7.0 / 2.0; print_float(x); }");
        assert!(c.contains("(7.0 / 2.0)"));
        assert!(!c.contains("rere_div_int"));
    }

    #[test]
    fn test_string_operations_use_runtime() {
        let c = generate_src(
            "module m; func main() { let s = \"a\" + \"b\"; if s == \"ab\" { println(s); } }",
        );
        assert!(c.contains("rere_concat(rrs_0, rrs_1)"));
        assert!(c.contains("rere_str_eq("));
    }

    #[test]
    fn test_call_results_hoisted_in_order() {
        let c = generate_src(
            "module m; func one() -> int { return 1; } \
             func main() { print_int(one() + one()); }",
        );
        let first = c.find("long long rrt_0 = rr_one();").expect("first temp");
        let second = c.find("long long rrt_1 = rr_one();").expect("second temp");
        assert!(first < second);
        assert!(c.contains("rere_add_int(rrt_0, rrt_1)"));
    }

    #[test]
    fn test_short_circuit_with_call_rhs() {
        let c = generate_src(
            "module m; func check() -> bool { return true; } \
             func main() { if false && check() { println(\"no\"); } }",
        );
        assert!(c.contains("bool rrt_"));
        assert!(c.contains("if (rrt_"));
        // the call only runs under the guard
        let guard = c.find("if (rrt_0) {").expect("guard");
        let call = c.find("rr_check()").expect("call");
        assert!(guard < call);
    }

    #[test]
    fn test_while_condition_with_call_relowered() {
        let c = generate_src(
            "module m; func more() -> bool { return false; } \
             func main() { while more() { println(\"x\"); } }",
        );
        assert!(c.contains("for (;;) {"));
        assert!(c.contains("break;"));
    }

    #[test]
    fn test_pure_while_stays_a_while() {
        let c = generate_src(
            "module m; func main() { let i = 0; while i < 3 { i = i + 1; } print_int(i); }",
        );
        assert!(c.contains("while ((rr_i < 3LL)) {"));
        assert!(!c.contains("for (;;)"));
    }

    #[test]
    fn test_shadowed_local_gets_suffixed_name() {
        let c = generate_src(
            "module m; func main() { let x = 1; if x == 1 { let x = 2.0; print_float(x); } print_int(x); }",
        );
        assert!(c.contains("long long rr_x = 1LL;"));
        assert!(c.contains("double rr_x_1 = 2.0;"));
        assert!(c.contains("rere_print_float(rr_x_1);"));
        assert!(c.contains("rere_print_int(rr_x);"));
    }

    #[test]
    fn test_parameter_shadowed_by_let() {
        let c = generate_src(
            "module m; func f(x: int) -> int { let x = x + 1; return x; } \
             func main() { print_int(f(1)); }",
        );
        assert!(c.contains("rr_f(long long rr_x)"));
        assert!(c.contains("long long rr_x_1 = rere_add_int(rr_x, 1LL);"));
        assert!(c.contains("return rr_x_1;"));
    }

    #[test]
    fn test_prototypes_precede_definitions() {
        let c = generate_src(
            "module m; func main() { print_int(later()); } func later() -> int { return 9; }",
        );
        let proto = c.find("static long long rr_later(void);").expect("prototype");
        let def = c.find("static long long rr_later(void) {").expect("definition");
        assert!(proto < def);
    }

    #[test]
    fn test_string_escapes() {
        let c = generate_src("module m; func main() { println(\"a\\n\\\"b\\\"\\t\"); }");
        assert!(c.contains("static const char rrs_0[] = \"a\\n\\\"b\\\"\\t\";"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let src = "module m; func main() { let x = 1 + 2 * 3; print_int(x); println(\"done\"); }";
        assert_eq!(generate_src(src), generate_src(src));
    }

    #[test]
    fn test_output_independent_of_formatting() {
        let compact = "module m; func main() { let x = 1+2*3; print_int(x); }";
        let spread = "module m;\n\nfunc main() {\n    let x = 1 + 2 * 3;\n    print_int(x);\n}\n";
        assert_eq!(generate_src(compact), generate_src(spread));
    }

    #[test]
    fn test_abi_guard_emitted() {
        let c = generate_src("module m; func main() { }");
        assert!(c.contains("_Static_assert(RERE_RT_ABI_VERSION == 1"));
    }

    #[test]
    fn test_c_escape_non_ascii_uses_octal() {
        assert_eq!(c_escape("é"), "\\303\\251");
        assert_eq!(c_escape("a\0b"), "a\\000b");
    }

    #[test]
    fn test_float_literal_forms() {
        assert_eq!(float_literal(2.0), "2.0");
        assert_eq!(float_literal(0.5), "0.5");
        let big = float_literal(1e300);
        assert!(big.contains('e') || big.contains('.'));
    }
}
