// ABOUTME: Breakpoint debugger: stack/locals/globals inspection and ad hoc eval

use std::io::{self, Write};

use crate::errors::RuntimeError;
use crate::interpreter::Interpreter;
use crate::token::{Literal, SourceLoc, Token, TokenKind};

/// Commands recognized at a breakpoint stop. `step`/`next`/`out` are parsed
/// but deliberately left unimplemented (the language this interpreter is
/// built for never supported single-step execution either) rather than
/// faked as a no-op that looks like it works.
enum Command {
    Continue,
    Quit,
    Stack,
    Log,
    Locals,
    Globals,
    List,
    ValueLocal(String),
    ValueGlobal(String),
    Break(usize),
    Unsupported(&'static str),
    Help,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let mut parts = line.splitn(2, ' ');
    let head = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();
    match head {
        "" | "c" | "continue" => Command::Continue,
        "q" | "quit" => Command::Quit,
        "stack" => Command::Stack,
        "log" => Command::Log,
        "locals" => Command::Locals,
        "globals" => Command::Globals,
        "list" => Command::List,
        "help" | "?" => Command::Help,
        "step" => Command::Unsupported("step"),
        "next" => Command::Unsupported("next"),
        "out" => Command::Unsupported("out"),
        "break" => rest.parse::<usize>().map(Command::Break).unwrap_or_else(|_| Command::Unknown(line.to_string())),
        "value" => {
            let mut vrest = rest.splitn(2, ' ');
            match (vrest.next(), vrest.next()) {
                (Some("l"), Some(expr)) => Command::ValueLocal(expr.to_string()),
                (Some("g"), Some(expr)) => Command::ValueGlobal(expr.to_string()),
                _ => Command::Unknown(line.to_string()),
            }
        }
        _ => Command::Unknown(line.to_string()),
    }
}

const HELP: &str = "\
Debugger commands:
  continue (c)         resume execution
  quit (q)             stop the running program
  break N              set a deferred breakpoint at line N
  list                 print source lines around the current stop
  stack                print the current call stack
  log                  print the statement trace log
  locals               print bindings in the current scope
  globals              print bindings in the global scope
  value l <expr>       evaluate <expr> against the local scope
  value g <expr>       evaluate <expr> against the global scope
  step, next, out      not supported
";

/// Runs the breakpoint prompt loop against `interp` until `continue` is
/// entered, or `quit` asks to unwind the whole program via `RuntimeError::Halted`.
pub fn run(interp: &mut Interpreter, stop_line: usize) -> Result<(), RuntimeError> {
    println!("-- breakpoint at line {stop_line} --");
    let stdin = io::stdin();
    loop {
        print!("(debug) ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            return Ok(());
        }
        match parse_command(&line) {
            Command::Continue => return Ok(()),
            Command::Quit => {
                let synthetic = Token::new(TokenKind::Eof, "", Literal::None, SourceLoc::repl(stop_line, 1));
                return Err(RuntimeError::Halted { token: synthetic });
            }
            Command::Stack => {
                for (i, frame) in interp.call_stack.iter().enumerate().rev() {
                    println!("#{i} {} (called at line {})", frame.callee_name, frame.call_site_line);
                }
            }
            Command::Log => {
                for entry in &interp.trace_log {
                    println!("{entry}");
                }
            }
            Command::Locals => {
                for (name, value) in interp.environment.locals() {
                    match value {
                        Some(v) => println!("{name} = {}", interp.stringify_quick(&v)),
                        None => println!("{name} = <uninitialized>"),
                    }
                }
            }
            Command::Globals => {
                for (name, value) in interp.globals.locals() {
                    match value {
                        Some(v) => println!("{name} = {}", interp.stringify_quick(&v)),
                        None => println!("{name} = <uninitialized>"),
                    }
                }
            }
            Command::List => print_source_context(interp, stop_line),
            Command::ValueLocal(expr) => print_eval(interp, &expr, false),
            Command::ValueGlobal(expr) => print_eval(interp, &expr, true),
            Command::Break(n) => {
                interp.breakpoints.insert(n);
                println!("breakpoint set at line {n}");
            }
            Command::Unsupported(name) => println!("'{name}' is not supported by this debugger."),
            Command::Help => println!("{HELP}"),
            Command::Unknown(raw) => println!("unrecognized command: {raw}"),
        }
    }
}

/// Prints up to two lines of context on either side of `stop_line`, marking
/// the stop line itself with `>`. No-op if no source text is loaded (e.g. a
/// breakpoint hit mid-REPL-line, which has no multi-line context to show).
fn print_source_context(interp: &Interpreter, stop_line: usize) {
    let Some(source) = interp.source_text.as_ref() else {
        println!("no source text available");
        return;
    };
    let lines: Vec<&str> = source.lines().collect();
    let start = stop_line.saturating_sub(3);
    let end = (stop_line + 2).min(lines.len());
    for (i, text) in lines.iter().enumerate().take(end).skip(start) {
        let lineno = i + 1;
        let marker = if lineno == stop_line { ">" } else { " " };
        println!("{marker}{lineno:4} | {text}");
    }
}

/// Feeds `source` back through the scanner/parser and evaluates it as a
/// single expression, swapping the interpreter's active environment to the
/// global scope first when `global` is set. This is the same "re-feed
/// through the front end" trick the original debugger used for its `print
/// expr;` breakpoint evaluation.
fn print_eval(interp: &mut Interpreter, source: &str, global: bool) {
    let (tokens, scan_errors) = crate::scanner::scan(source, None);
    if !scan_errors.is_empty() {
        println!("scan error: {}", scan_errors[0].message);
        return;
    }
    let parser = crate::parser::Parser::new(tokens);
    let expr = parser.parse_single_expression();
    let expr = match expr {
        Ok(e) => e,
        Err(e) => {
            println!("parse error: {}", e.message);
            return;
        }
    };
    let saved = interp.environment.clone();
    if global {
        interp.environment = interp.globals.clone();
    }
    let result = interp.evaluate(&expr);
    interp.environment = saved;
    match result {
        Ok(v) => println!("{}", interp.stringify(&v)),
        Err(e) => println!("runtime error: {e}"),
    }
}
