//! Driver binary (SPEC_FULL.md §6a). Hand-rolled C parsing is out of scope, so this
//! reads a translation unit as a JSON-serialized [`lscc::ast::Program`] from a file or
//! stdin and drives the library through its two output modes: `--ir` (IR dump) and the
//! default, MIPS-I/O32 assembly.

use clap::Parser;
use lscc::ast::Program;
use lscc::context::CompilationContext;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

/// A compiler for a subset of C, targeting MIPS-I/O32.
#[derive(Parser, Debug)]
#[command(name = "lscc", version, about)]
struct Cli {
    /// Path to a JSON-encoded translation unit. Reads stdin when omitted.
    input: Option<String>,

    /// Write output here instead of stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Dump the intermediate representation instead of emitting MIPS assembly.
    #[arg(long = "ir")]
    ir: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("compilation terminated.");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let input_text = read_input(cli.input.as_deref()).map_err(|e| format!("cannot read input: {e}"))?;
    let program: Program = serde_json::from_str(&input_text).map_err(|e| format!("malformed AST JSON: {e}"))?;

    let mut ctx = CompilationContext::new();
    let rendered = if cli.ir {
        lscc::compile_ir(&program, &mut ctx)
    } else {
        lscc::compile_mips(&program, &mut ctx)
    }
    .map_err(|e| e.to_string())?;

    write_output(cli.output.as_deref(), &rendered).map_err(|e| format!("cannot write output: {e}"))
}

fn read_input(path: Option<&str>) -> io::Result<String> {
    match path {
        Some(p) => fs::read_to_string(p),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, text: &str) -> io::Result<()> {
    match path {
        Some(p) => fs::write(p, text),
        None => io::stdout().write_all(text.as_bytes()),
    }
}
