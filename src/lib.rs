//! rerec - a compiler for the Rerechan02 language
//!
//! Translates `.rere` sources to portable C11 linked against a small
//! runtime support library. The pipeline is four stages, each feeding
//! the next and all sharing one diagnostics collector:
//!
//! 1. [`lexer`] - source text to tokens
//! 2. [`parser`] - tokens to an AST, with panic-mode recovery
//! 3. [`resolve`] - name binding and type checking into side tables
//! 4. [`codegen`] - resolved AST to a deterministic C translation unit
//!
//! The [`runtime`] module carries the embedded C support library the
//! generated code links against.

pub mod ast;
pub mod cli;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod runtime;

pub use error::{Diagnostic, DiagnosticEmitter, RerecError, Result, Severity, SourceMap, Span};

/// Run the whole pipeline over one source file.
///
/// Returns `Ok(Some(c_source))` on a clean compile, `Ok(None)` when the
/// source had errors (all reported through `emitter`), and `Err` only
/// for internal failures that are not the user's fault.
pub fn compile_to_c(source: &str, emitter: &mut DiagnosticEmitter) -> Result<Option<String>> {
    let (tokens, lex_errors) = lexer::Lexer::tokenize(source);
    for lex_error in lex_errors {
        emitter.emit(Diagnostic::error(lex_error.message).with_span(lex_error.span));
    }

    let program = parser::parse(&tokens, emitter);

    let program = match program {
        Some(program) => program,
        None => return Ok(None),
    };

    let resolution = resolve::resolve(&program, emitter);
    if emitter.has_errors() {
        return Ok(None);
    }

    let c_source = codegen::generate(&program, &resolution)?;
    Ok(Some(c_source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_clean_compile() {
        let mut emitter = DiagnosticEmitter::new();
        let out = compile_to_c(
            "module demo; func main() -> int { print_int(6 * 7); return 0; }",
            &mut emitter,
        )
        .expect("internal error");
        assert!(!emitter.has_errors());
        let c = out.expect("no output");
        assert!(c.contains("rere_print_int(rere_mul_int(6LL, 7LL));"));
    }

    #[test]
    fn test_pipeline_stops_before_codegen_on_errors() {
        let mut emitter = DiagnosticEmitter::new();
        let out = compile_to_c("module demo; func main() { print_int(missing); }", &mut emitter)
            .expect("internal error");
        assert!(out.is_none());
        assert!(emitter.has_errors());
    }

    #[test]
    fn test_float_overflow_rejected_before_codegen() {
        let mut emitter = DiagnosticEmitter::new();
        let out = compile_to_c(
            "module demo; func main() { let x = 1e999; print_float(x); }",
            &mut emitter,
        )
        .expect("internal error");
        assert!(out.is_none());
        assert!(emitter.has_errors());
    }

    #[test]
    fn test_pipeline_collects_lex_and_parse_errors() {
        let mut emitter = DiagnosticEmitter::new();
        let out = compile_to_c("module demo; func main() { let s = \"open; }", &mut emitter)
            .expect("internal error");
        assert!(out.is_none());
        assert!(emitter.has_errors());
    }
}
