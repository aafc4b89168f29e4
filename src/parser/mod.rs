//! rerec parser
//!
//! Hand-written recursive descent over the token stream. Pure function
//! of the tokens: produces a `Program` plus diagnostics, never mutates
//! its input. On a syntax error the parser records a diagnostic and
//! performs panic-mode recovery, skipping to the next `;`, `}` or
//! statement-starting keyword so one pass can report several errors.

use crate::ast::{
    BinaryOp, Block, Expr, ExprKind, Function, Ident, Import, ModuleDecl, NodeId, Param, Program,
    Stmt, StmtKind, Type, UnaryOp,
};
use crate::error::{Diagnostic, DiagnosticEmitter, Span};
use crate::lexer::{Keyword, Token, TokenKind};

/// Operator precedence, higher binds tighter. All binary operators are
/// left-associative.
fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    let (op, prec) = match kind {
        TokenKind::OrOr => (BinaryOp::Or, 1),
        TokenKind::AndAnd => (BinaryOp::And, 2),
        TokenKind::EqEq => (BinaryOp::Eq, 3),
        TokenKind::Ne => (BinaryOp::Ne, 3),
        TokenKind::Lt => (BinaryOp::Lt, 4),
        TokenKind::Le => (BinaryOp::Le, 4),
        TokenKind::Gt => (BinaryOp::Gt, 4),
        TokenKind::Ge => (BinaryOp::Ge, 4),
        TokenKind::Plus => (BinaryOp::Add, 5),
        TokenKind::Minus => (BinaryOp::Sub, 5),
        TokenKind::Star => (BinaryOp::Mul, 6),
        TokenKind::Slash => (BinaryOp::Div, 6),
        TokenKind::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    };
    Some((op, prec))
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    next_id: NodeId,
    emitter: &'a mut DiagnosticEmitter,
}

/// Parse a full token stream into a program.
///
/// Returns `None` only when no usable program could be built (e.g. the
/// module header is missing); partial errors inside functions still
/// yield `Some` so later declarations get checked too. Callers must
/// consult the emitter before using the result.
pub fn parse(tokens: &[Token], emitter: &mut DiagnosticEmitter) -> Option<Program> {
    Parser::new(tokens, emitter).parse_program()
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], emitter: &'a mut DiagnosticEmitter) -> Self {
        Self {
            tokens,
            pos: 0,
            next_id: 0,
            emitter,
        }
    }

    fn peek(&self) -> &Token {
        // tokenize() guarantees a trailing Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().is(kind)
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        self.peek().is_keyword(kw)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.emitter.emit(Diagnostic::error(message).with_span(span));
    }

    fn expect(&mut self, kind: &TokenKind, context: &str) -> Option<Span> {
        if self.check(kind) {
            let span = self.peek().span;
            self.advance();
            Some(span)
        } else {
            let found = self.peek().kind.describe();
            let span = self.peek().span;
            self.error(
                format!("expected {} {}, found {}", kind.describe(), context, found),
                span,
            );
            None
        }
    }

    fn expect_keyword(&mut self, kw: Keyword, context: &str) -> Option<Span> {
        if self.check_keyword(kw) {
            let span = self.peek().span;
            self.advance();
            Some(span)
        } else {
            let found = self.peek().kind.describe();
            let span = self.peek().span;
            self.error(
                format!("expected keyword `{}` {}, found {}", kw, context, found),
                span,
            );
            None
        }
    }

    fn expect_ident(&mut self, context: &str) -> Option<Ident> {
        let span = self.peek().span;
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let ident = Ident {
                    name: name.clone(),
                    span,
                };
                self.advance();
                Some(ident)
            }
            other => {
                let found = other.describe();
                self.error(format!("expected identifier {}, found {}", context, found), span);
                None
            }
        }
    }

    /// Panic-mode recovery: skip forward to a synchronization point.
    ///
    /// Stops after consuming a `;`, or before a `}` or a
    /// statement-starting keyword (`let`, `return`, `if`, `while`,
    /// `func`).
    fn synchronize(&mut self) {
        while !self.at_eof() {
            match &self.peek().kind {
                TokenKind::Semi => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace => return,
                TokenKind::Keyword(
                    Keyword::Let | Keyword::Return | Keyword::If | Keyword::While | Keyword::Func,
                ) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /* ==== grammar productions ==== */

    fn parse_program(&mut self) -> Option<Program> {
        let start = self.peek().span;
        let module = self.parse_module_decl()?;

        let mut imports = Vec::new();
        while self.check_keyword(Keyword::Import) {
            if let Some(import) = self.parse_import() {
                imports.push(import);
            } else {
                self.synchronize();
            }
        }

        let mut functions = Vec::new();
        while !self.at_eof() {
            if self.check_keyword(Keyword::Func) {
                if let Some(func) = self.parse_function() {
                    functions.push(func);
                }
            } else {
                let span = self.peek().span;
                let found = self.peek().kind.describe();
                self.error(
                    format!("expected `func` at top level, found {}", found),
                    span,
                );
                self.advance();
                self.synchronize();
            }
        }

        let end = self.peek().span;
        Some(Program {
            module,
            imports,
            functions,
            span: start.merge(end),
        })
    }

    fn parse_module_decl(&mut self) -> Option<ModuleDecl> {
        let start = self.expect_keyword(Keyword::Module, "at start of file")?;
        let name = self.expect_ident("after `module`")?;
        let end = self.expect(&TokenKind::Semi, "after module name")?;
        Some(ModuleDecl {
            name,
            span: start.merge(end),
        })
    }

    fn parse_import(&mut self) -> Option<Import> {
        let start = self.expect_keyword(Keyword::Import, "")?;
        let mut segments = vec![self.expect_ident("after `import`")?];
        while self.eat(&TokenKind::Dot) {
            segments.push(self.expect_ident("after `.` in import path")?);
        }
        let end = self.expect(&TokenKind::Semi, "after import path")?;
        Some(Import {
            segments,
            span: start.merge(end),
        })
    }

    fn parse_function(&mut self) -> Option<Function> {
        let start = self.expect_keyword(Keyword::Func, "")?;
        let name = self.expect_ident("after `func`").or_else(|| {
            self.synchronize();
            None
        })?;

        self.expect(&TokenKind::LParen, "after function name")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                match self.parse_param() {
                    Some(p) => params.push(p),
                    None => {
                        self.synchronize();
                        return None;
                    }
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "after parameters")?;

        let mut ret_type = Type::Void;
        let mut ret_type_span = None;
        if self.eat(&TokenKind::Arrow) {
            let (ty, span) = self.parse_type("after `->`")?;
            ret_type = ty;
            ret_type_span = Some(span);
        }

        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Some(Function {
            name,
            params,
            ret_type,
            ret_type_span,
            body,
            span,
        })
    }

    fn parse_param(&mut self) -> Option<Param> {
        let name = self.expect_ident("in parameter list")?;
        self.expect(&TokenKind::Colon, "after parameter name")?;
        let (ty, ty_span) = self.parse_type("after `:`")?;
        let span = name.span.merge(ty_span);
        Some(Param { name, ty, span })
    }

    fn parse_type(&mut self, context: &str) -> Option<(Type, Span)> {
        let span = self.peek().span;
        match &self.peek().kind {
            TokenKind::Ident(name) => match Type::from_name(name) {
                Some(ty) => {
                    self.advance();
                    Some((ty, span))
                }
                None => {
                    let msg = format!("unknown type `{}` {}", name, context);
                    self.error(msg, span);
                    self.advance();
                    None
                }
            },
            other => {
                let found = other.describe();
                self.error(format!("expected type {}, found {}", context, found), span);
                None
            }
        }
    }

    fn parse_block(&mut self) -> Option<Block> {
        let start = self.expect(&TokenKind::LBrace, "to open block")?;
        let mut stmts = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => self.synchronize(),
            }
        }

        let end = self.expect(&TokenKind::RBrace, "to close block")?;
        Some(Block {
            stmts,
            span: start.merge(end),
        })
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match &self.peek().kind {
            TokenKind::Keyword(Keyword::Let) => self.parse_let(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            _ => self.parse_assign_or_expr(),
        }
    }

    fn parse_let(&mut self) -> Option<Stmt> {
        let start = self.expect_keyword(Keyword::Let, "")?;
        let name = self.expect_ident("after `let`")?;

        let mut ty = None;
        let mut ty_span = None;
        if self.eat(&TokenKind::Colon) {
            let (t, s) = self.parse_type("in let binding")?;
            ty = Some(t);
            ty_span = Some(s);
        }

        self.expect(&TokenKind::Eq, "in let binding")?;
        let init = self.parse_expr()?;
        let end = self.expect(&TokenKind::Semi, "after let binding")?;
        Some(Stmt {
            span: start.merge(end),
            kind: StmtKind::Let {
                name,
                ty,
                ty_span,
                init,
            },
        })
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let start = self.expect_keyword(Keyword::Return, "")?;
        let value = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let end = self.expect(&TokenKind::Semi, "after return")?;
        Some(Stmt {
            span: start.merge(end),
            kind: StmtKind::Return(value),
        })
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let start = self.expect_keyword(Keyword::If, "")?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let mut span = start.merge(then_block.span);

        let else_block = if self.check_keyword(Keyword::Else) {
            self.advance();
            if self.check_keyword(Keyword::If) {
                // `else if` becomes an else block holding one nested if
                let nested = self.parse_if()?;
                let nested_span = nested.span;
                span = span.merge(nested_span);
                Some(Block {
                    stmts: vec![nested],
                    span: nested_span,
                })
            } else {
                let block = self.parse_block()?;
                span = span.merge(block.span);
                Some(block)
            }
        } else {
            None
        };

        Some(Stmt {
            span,
            kind: StmtKind::If {
                cond,
                then_block,
                else_block,
            },
        })
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let start = self.expect_keyword(Keyword::While, "")?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        let span = start.merge(body.span);
        Some(Stmt {
            span,
            kind: StmtKind::While { cond, body },
        })
    }

    /// `name = expr;` or an expression statement
    fn parse_assign_or_expr(&mut self) -> Option<Stmt> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            // one-token lookahead distinguishes assignment from a call
            if self.pos + 1 < self.tokens.len() && self.tokens[self.pos + 1].kind == TokenKind::Eq {
                let name = Ident {
                    name: name.clone(),
                    span: self.peek().span,
                };
                let start = self.peek().span;
                self.advance(); // name
                self.advance(); // =
                let value = self.parse_expr()?;
                let end = self.expect(&TokenKind::Semi, "after assignment")?;
                return Some(Stmt {
                    span: start.merge(end),
                    kind: StmtKind::Assign { name, value },
                });
            }
        }

        let expr = self.parse_expr()?;
        let start = expr.span;
        let end = self.expect(&TokenKind::Semi, "after expression")?;
        Some(Stmt {
            span: start.merge(end),
            kind: StmtKind::Expr(expr),
        })
    }

    /* ==== expressions ==== */

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, prec)) = binary_op(&self.peek().kind) {
            if prec < min_prec {
                break;
            }
            self.advance();
            // prec + 1: equal precedence associates to the left
            let rhs = self.parse_binary(prec + 1)?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr {
                id: self.fresh_id(),
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }

        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let op = match &self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        };

        if let Some(op) = op {
            let start = self.peek().span;
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Some(Expr {
                id: self.fresh_id(),
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let span = self.peek().span;
        let kind = match self.peek().kind.clone() {
            TokenKind::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(n) => {
                self.advance();
                ExprKind::Float(n)
            }
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::Str(s)
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    return self.parse_call(Ident { name, span });
                }
                ExprKind::Var(name)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "to close parenthesized expression")?;
                // keep the inner node; grouping has no AST form
                return Some(inner);
            }
            other => {
                let found = other.describe();
                self.error(format!("expected expression, found {}", found), span);
                return None;
            }
        };

        Some(Expr {
            id: self.fresh_id(),
            kind,
            span,
        })
    }

    fn parse_call(&mut self, callee: Ident) -> Option<Expr> {
        self.expect(&TokenKind::LParen, "in call")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&TokenKind::RParen, "to close call arguments")?;
        let span = callee.span.merge(end);
        Some(Expr {
            id: self.fresh_id(),
            kind: ExprKind::Call { callee, args },
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_src(src: &str) -> (Option<Program>, DiagnosticEmitter) {
        let (tokens, lex_errors) = Lexer::tokenize(src);
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        let mut emitter = DiagnosticEmitter::new();
        let program = parse(&tokens, &mut emitter);
        (program, emitter)
    }

    fn parse_ok(src: &str) -> Program {
        let (program, emitter) = parse_src(src);
        assert!(!emitter.has_errors(), "unexpected parse errors");
        program.expect("no program produced")
    }

    #[test]
    fn test_hello_world() {
        let program = parse_ok(
            r#"
            module hello;
            import std.io;

            func main() -> int {
                println("Hello, World!");
                return 0;
            }
            "#,
        );
        assert_eq!(program.module.name.name, "hello");
        assert_eq!(program.imports.len(), 1);
        assert_eq!(program.imports[0].path(), "std.io");
        assert_eq!(program.functions.len(), 1);
        let main = &program.functions[0];
        assert_eq!(main.name.name, "main");
        assert_eq!(main.ret_type, Type::Int);
        assert_eq!(main.body.stmts.len(), 2);
    }

    #[test]
    fn test_params_and_types() {
        let program = parse_ok(
            "module m; func add(a: int, b: int) -> int { return a + b; }",
        );
        let f = &program.functions[0];
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].name.name, "a");
        assert_eq!(f.params[0].ty, Type::Int);
        assert_eq!(f.ret_type, Type::Int);
    }

    #[test]
    fn test_precedence() {
        let program = parse_ok("module m; func f() -> int { return 1 + 2 * 3; }");
        let f = &program.functions[0];
        let StmtKind::Return(Some(expr)) = &f.body.stmts[0].kind else {
            panic!("expected return");
        };
        let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_left_associativity() {
        let program = parse_ok("module m; func f() -> int { return 10 - 4 - 3; }");
        let f = &program.functions[0];
        let StmtKind::Return(Some(expr)) = &f.body.stmts[0].kind else {
            panic!("expected return");
        };
        // (10 - 4) - 3
        let ExprKind::Binary { lhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert!(matches!(
            lhs.kind,
            ExprKind::Binary {
                op: BinaryOp::Sub,
                ..
            }
        ));
    }

    #[test]
    fn test_comparison_binds_looser_than_arith() {
        let program = parse_ok("module m; func f() -> bool { return 1 + 2 < 4; }");
        let f = &program.functions[0];
        let StmtKind::Return(Some(expr)) = &f.body.stmts[0].kind else {
            panic!("expected return");
        };
        assert!(matches!(
            expr.kind,
            ExprKind::Binary {
                op: BinaryOp::Lt,
                ..
            }
        ));
    }

    #[test]
    fn test_if_else_chain() {
        let program = parse_ok(
            "module m; func f(x: int) { if x < 0 { println(\"neg\"); } else if x == 0 { println(\"zero\"); } else { println(\"pos\"); } }",
        );
        let f = &program.functions[0];
        let StmtKind::If { else_block, .. } = &f.body.stmts[0].kind else {
            panic!("expected if");
        };
        let else_block = else_block.as_ref().expect("has else");
        assert!(matches!(else_block.stmts[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_while_and_assign() {
        let program = parse_ok(
            "module m; func f() { let i = 0; while i < 10 { i = i + 1; } }",
        );
        let f = &program.functions[0];
        assert!(matches!(f.body.stmts[0].kind, StmtKind::Let { .. }));
        let StmtKind::While { body, .. } = &f.body.stmts[1].kind else {
            panic!("expected while");
        };
        assert!(matches!(body.stmts[0].kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn test_missing_module_header() {
        let (program, emitter) = parse_src("func main() { }");
        assert!(program.is_none());
        assert!(emitter.has_errors());
    }

    #[test]
    fn test_recovery_reports_multiple_errors() {
        let (program, mut emitter) = parse_src(
            "module m; func f() { let = 1; let y = 2; return }; func g() { }",
        );
        assert!(emitter.error_count() >= 2);
        // recovery still parsed the later function
        let program = program.expect("program survives recovery");
        assert!(program.functions.iter().any(|f| f.name.name == "g"));
        let _ = emitter.take_diagnostics();
    }

    #[test]
    fn test_ast_ignores_formatting() {
        let compact = parse_ok("module m; func f(x: int) -> int { return x * (x + 1); }");
        let spread = parse_ok(
            "module m;\n\nfunc f( x : int ) -> int {\n    // doubled\n    return x * ( x + 1 ) ;\n}\n",
        );
        assert_eq!(compact.expr_count(), spread.expr_count());
        assert_eq!(compact.functions.len(), spread.functions.len());
    }

    #[test]
    fn test_spans_nondecreasing_preorder() {
        let program = parse_ok(
            "module m; func f() -> int { let a = 1; let b = a + 2; return b; }",
        );
        let f = &program.functions[0];
        let mut last = 0u32;
        for stmt in &f.body.stmts {
            assert!(stmt.span.start >= last);
            last = stmt.span.start;
        }
    }
}
