mod ast;
mod builtins;
mod callable;
mod classes;
mod config;
mod debugger;
mod environment;
mod errors;
mod function;
mod highlighter;
mod interpreter;
mod modules;
mod outcome;
mod parser;
mod report;
mod resolver;
mod scanner;
mod source;
mod token;
mod value;

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};

use config::{SourceConfig, VERSION, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use errors::{DiagnosticKind, RuntimeError};
use highlighter::LoxHelper;
use interpreter::Interpreter;
use report::Verbosity;

const EXIT_USAGE: u8 = 64;
const EXIT_STATIC_ERROR: u8 = 65;
const EXIT_FILE_NOT_FOUND: u8 = 66;
const EXIT_RUNTIME_ERROR: u8 = 70;

/// A tree-walking interpreter for a small class-based scripting language.
#[derive(ClapParser, Debug)]
#[command(name = "loxrs")]
#[command(version = VERSION)]
#[command(about = "A tree-walking interpreter for a small dynamically-typed, class-based scripting language")]
struct CliArgs {
    /// Script file to run (must end in `.lox`). Starts the REPL if omitted.
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Run the ingest-generated test suite, redirecting stdout/stderr per test.
    #[arg(long = "test")]
    test: bool,

    /// Remove generated test artifacts.
    #[arg(long = "clean")]
    clean: bool,

    /// Print source position (file/line/column) on diagnostics.
    #[arg(long = "linepos")]
    linepos: bool,

    /// As `--linepos`, plus the offending source line and a caret.
    #[arg(long = "error")]
    error: bool,
}

impl CliArgs {
    fn verbosity(&self) -> Verbosity {
        if self.error {
            Verbosity::WithSource
        } else if self.linepos {
            Verbosity::WithLocus
        } else {
            Verbosity::Bare
        }
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.test || args.clean {
        eprintln!("-test/-clean drive an external ingest-generated test harness not carried by this crate.");
        return ExitCode::SUCCESS;
    }

    match &args.script {
        Some(path) => run_file(path, args.verbosity()),
        None => run_repl(),
    }
}

fn run_file(path: &PathBuf, verbosity: Verbosity) -> ExitCode {
    if path.extension().and_then(|e| e.to_str()) != Some("lox") {
        eprintln!("usage: loxrs [--test|--clean|--linepos|--error] [<path>.lox]");
        return ExitCode::from(EXIT_USAGE);
    }

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("file not found: {}", path.display());
            return ExitCode::from(EXIT_FILE_NOT_FOUND);
        }
        Err(e) => {
            eprintln!("cannot read {}: {e}", path.display());
            return ExitCode::from(EXIT_FILE_NOT_FOUND);
        }
    };

    let file_name: Rc<str> = Rc::from(path.display().to_string());
    let mut interp = Interpreter::new(SourceConfig::default());
    interp.debug_mode = true;
    interp.source_text = Some(Rc::from(source.as_str()));

    match compile(&source, Some(file_name), verbosity) {
        Ok((stmts, resolution)) => {
            interp.load_resolution(resolution);
            match interp.run(&stmts) {
                Ok(()) => ExitCode::SUCCESS,
                Err(RuntimeError::Halted { .. }) => ExitCode::SUCCESS,
                Err(e) => {
                    report_runtime_error(&e, verbosity, Some(&source));
                    ExitCode::from(EXIT_RUNTIME_ERROR)
                }
            }
        }
        Err(()) => ExitCode::from(EXIT_STATIC_ERROR),
    }
}

fn run_repl() -> ExitCode {
    let mut interp = Interpreter::new(SourceConfig::default());
    interp.debug_mode = true;

    let rl_config = Config::builder().auto_add_history(true).build();
    let mut rl = match Editor::with_config(rl_config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("failed to initialize REPL: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };
    rl.set_helper(Some(LoxHelper::new()));

    let history_file = ".loxrs_history";
    let _ = rl.load_history(history_file);

    println!("{WELCOME_MESSAGE}");
    println!("{WELCOME_SUBTITLE}");

    loop {
        let mut input = match rl.readline(">>> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        };

        if input.trim().is_empty() {
            break;
        }

        while input.trim_end().ends_with('\\') {
            let trimmed_len = input.trim_end().len();
            input.truncate(trimmed_len - 1);
            input.push('\n');
            match rl.readline("... ") {
                Ok(next) => input.push_str(&next),
                Err(_) => break,
            }
        }

        interp.source_text = Some(Rc::from(input.as_str()));
        match compile(&input, None, Verbosity::Bare) {
            Ok((stmts, resolution)) => {
                interp.load_resolution(resolution);
                match interp.run(&stmts) {
                    Ok(()) => {}
                    Err(RuntimeError::Halted { .. }) => break,
                    Err(e) => report_runtime_error(&e, Verbosity::Bare, None),
                }
            }
            Err(()) => {}
        }
    }

    let _ = rl.save_history(history_file);
    println!("Goodbye!");
    ExitCode::SUCCESS
}

/// Runs scan → parse → resolve, printing every diagnostic collected at each
/// stage. Returns `Err(())` if any stage produced a hard error (the driver
/// must not evaluate a program that failed to scan/parse/resolve).
fn compile(source: &str, file: Option<Rc<str>>, verbosity: Verbosity) -> Result<(Vec<ast::Stmt>, resolver::Resolution), ()> {
    let (tokens, scan_errors) = scanner::scan(source, file.clone());
    let mut had_error = false;
    for e in &scan_errors {
        eprintln!("{}", report::format(DiagnosticKind::Scan, &e.loc, &e.message, verbosity, Some(source)));
        had_error = true;
    }

    let loader: Box<dyn source::SourceLoader> = Box::new(source::FsSourceLoader::new(config::SourceConfig::default()));
    let (stmts, parse_errors) = parser::parse_with_loader(tokens, loader);
    for e in &parse_errors {
        eprintln!("{}", report::format_token(DiagnosticKind::Parse, e.token.as_ref(), &e.message, verbosity, Some(source)));
        had_error = true;
    }

    let (resolution, static_errors, static_warnings) = resolver::resolve(&stmts);
    for e in &static_errors {
        eprintln!("{}", report::format_token(DiagnosticKind::Static, Some(&e.token), &e.message, verbosity, Some(source)));
        had_error = true;
    }
    for w in &static_warnings {
        eprintln!("{}", report::format_token(DiagnosticKind::Warning, Some(&w.token), &w.message, verbosity, Some(source)));
    }

    if had_error {
        return Err(());
    }
    Ok((stmts, resolution))
}

fn report_runtime_error(err: &RuntimeError, verbosity: Verbosity, source: Option<&str>) {
    let kind = match err {
        RuntimeError::Reported { .. } => DiagnosticKind::User,
        RuntimeError::RecursionLimit { .. } => DiagnosticKind::Recursion,
        _ => DiagnosticKind::Runtime,
    };
    eprintln!("{}", report::format_token(kind, Some(err.token()), &err.to_string(), verbosity, source));
}
