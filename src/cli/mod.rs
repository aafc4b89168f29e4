//! Command-line interface for rerec

use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{
    Diagnostic, DiagnosticEmitter, JsonDiagnostic, RerecError, Severity, SourceMap,
};

#[derive(ClapParser)]
#[command(name = "rerec")]
#[command(about = "Compiler for the Rerechan02 language, emitting portable C11")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    rerec build hello.rere            Compile to hello.c
    rerec build hello.rere -o out.c   Compile to an explicit path
    rerec build hello.rere --emit-runtime
                                      Also drop the runtime sources next to the output
    rerec check hello.rere            Diagnostics only, no output file
    rerec check hello.rere -f json    JSON diagnostics for tooling
    rerec runtime --dir runtime/      Write rere_runtime.{h,c} for manual builds

Compile the output with any C11 compiler, for example:
    cc -std=c11 out.c rere_runtime.c -o hello")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for diagnostics
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output (default)
    #[default]
    Human,
    /// JSON output for IDE/tooling integration
    Json,
    /// Pretty-printed JSON for debugging
    JsonPretty,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a .rere file to a C translation unit
    Build {
        /// Path to the source file
        input: PathBuf,

        /// Output path for the generated C (defaults to the input with
        /// a .c extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write rere_runtime.h and rere_runtime.c next to the output
        #[arg(long)]
        emit_runtime: bool,

        /// Output format for errors/diagnostics
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Check a .rere file for errors without generating code
    Check {
        /// Path to the source file
        input: PathBuf,

        /// Output format for errors/diagnostics
        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Human)]
        format: OutputFormat,
    },

    /// Write the runtime support library sources
    Runtime {
        /// Directory to write rere_runtime.h and rere_runtime.c into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

pub fn run_cli() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            input,
            output,
            emit_runtime,
            format,
        } => build_file(&input, output.as_deref(), emit_runtime, format),
        Commands::Check { input, format } => check_file(&input, format),
        Commands::Runtime { dir } => emit_runtime_dir(&dir),
    }
}

// ============================================================================
// Diagnostic Output Helpers
// ============================================================================

fn print_human(diag: &Diagnostic, file: &str, map: &SourceMap) {
    let label = match diag.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
    };
    match diag.span {
        Some(span) => {
            let (line, col) = map.line_col(span.start);
            eprintln!("{}: {}:{}:{}: {}", label, file, line, col, diag.message);
        }
        None => eprintln!("{}: {}", label, diag.message),
    }
    for note in &diag.notes {
        eprintln!("  {} {}", "=".cyan(), note);
    }
}

/// Emit collected diagnostics in the requested format
fn emit_diagnostics(
    format: OutputFormat,
    diagnostics: Vec<Diagnostic>,
    file: &str,
    map: &SourceMap,
) {
    match format {
        OutputFormat::Human => {
            for diag in &diagnostics {
                print_human(diag, file, map);
            }
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let json: Vec<JsonDiagnostic> = diagnostics
                .into_iter()
                .map(|d| JsonDiagnostic::from_diagnostic(d, file, map))
                .collect();
            let errors = json.iter().filter(|d| d.severity == Severity::Error).count();
            let report = serde_json::json!({
                "status": if errors > 0 { "error" } else { "ok" },
                "error_count": errors,
                "diagnostics": json,
            });
            let text = if matches!(format, OutputFormat::JsonPretty) {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            };
            match text {
                Ok(text) => println!("{}", text),
                Err(e) => eprintln!("error: failed to serialize diagnostics: {}", e),
            }
        }
    }
}

fn emit_success(format: OutputFormat, message: &str, details: serde_json::Value) {
    match format {
        OutputFormat::Human => {
            println!("{}", message.green().bold());
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let output = serde_json::json!({
                "status": "ok",
                "message": message,
                "details": details,
            });
            let text = if matches!(format, OutputFormat::JsonPretty) {
                serde_json::to_string_pretty(&output)
            } else {
                serde_json::to_string(&output)
            };
            if let Ok(text) = text {
                println!("{}", text);
            }
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", "error".red().bold(), message);
    std::process::exit(1);
}

// ============================================================================
// Commands
// ============================================================================

fn read_source(input: &Path) -> String {
    if input.extension().map(|e| e != "rere").unwrap_or(true) {
        eprintln!(
            "{}: {} does not have a .rere extension",
            "warning".yellow().bold(),
            input.display()
        );
    }
    match std::fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => fail(format_args!("failed to read {}: {}", input.display(), e)),
    }
}

fn build_file(input: &Path, output: Option<&Path>, emit_runtime: bool, format: OutputFormat) {
    let start = Instant::now();
    let source = read_source(input);
    let map = SourceMap::new(&source);
    let file = input.display().to_string();

    if matches!(format, OutputFormat::Human) {
        println!("{} {}", "Compiling".green().bold(), input.display());
    }

    let mut emitter = DiagnosticEmitter::new();
    let generated = match crate::compile_to_c(&source, &mut emitter) {
        Ok(generated) => generated,
        Err(e) => fail(e),
    };
    let error_count = emitter.error_count();
    emit_diagnostics(format, emitter.take_diagnostics(), &file, &map);

    let generated = match generated {
        Some(c) => c,
        None => fail(RerecError::CompilationFailed(error_count)),
    };

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("c"),
    };
    if let Err(e) = write_atomic(&output_path, &generated) {
        fail(e);
    }

    if emit_runtime {
        let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        if let Err(e) = crate::runtime::write_to(dir) {
            fail(e);
        }
    }

    let elapsed = start.elapsed();
    if matches!(format, OutputFormat::Human) {
        println!(
            "{} {} in {:.2}ms",
            "Finished".green().bold(),
            output_path.display(),
            elapsed.as_secs_f64() * 1000.0
        );
    } else {
        emit_success(
            format,
            "build completed",
            serde_json::json!({
                "output": output_path.display().to_string(),
                "emit_runtime": emit_runtime,
                "compile_time_ms": elapsed.as_secs_f64() * 1000.0,
            }),
        );
    }
}

fn check_file(input: &Path, format: OutputFormat) {
    let start = Instant::now();
    let source = read_source(input);
    let map = SourceMap::new(&source);
    let file = input.display().to_string();

    if matches!(format, OutputFormat::Human) {
        println!("{} {}", "Checking".cyan().bold(), input.display());
    }

    let mut emitter = DiagnosticEmitter::new();
    if let Err(e) = crate::compile_to_c(&source, &mut emitter) {
        fail(e);
    }
    let error_count = emitter.error_count();
    emit_diagnostics(format, emitter.take_diagnostics(), &file, &map);

    if error_count > 0 {
        std::process::exit(1);
    }

    let elapsed = start.elapsed();
    if matches!(format, OutputFormat::Human) {
        println!(
            "{} ({:.2}ms)",
            "No errors found".green().bold(),
            elapsed.as_secs_f64() * 1000.0
        );
    } else {
        emit_success(
            format,
            "check completed",
            serde_json::json!({
                "check_time_ms": elapsed.as_secs_f64() * 1000.0,
            }),
        );
    }
}

fn emit_runtime_dir(dir: &Path) {
    if let Err(e) = crate::runtime::write_to(dir) {
        fail(e);
    }
    println!(
        "{} {} and {} in {}",
        "Wrote".green().bold(),
        crate::runtime::RUNTIME_HEADER_NAME,
        crate::runtime::RUNTIME_SOURCE_NAME,
        dir.display()
    );
}

/// Write via a sibling temp file and rename, so a crash mid-write never
/// leaves a truncated output behind.
fn write_atomic(path: &Path, contents: &str) -> crate::error::Result<()> {
    let tmp = path.with_extension("c.tmp");
    std::fs::write(&tmp, contents).map_err(|source| RerecError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| RerecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
