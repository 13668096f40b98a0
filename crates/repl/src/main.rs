//! karst - the Karst Lisp interpreter
//!
//! Usage:
//!   karst                  # interactive REPL
//!   karst program.lisp     # evaluate a file, exit 1 on first error
//!
//! REPL commands:
//!   :reset                 # roll the session back to its start
//!   :quit                  # exit

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use karst_runtime::Runtime;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

#[derive(ClapParser)]
#[command(name = "karst")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "The Karst Lisp interpreter", long_about = None)]
struct Cli {
    /// Source file to evaluate; starts a REPL when omitted
    file: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut rt = Runtime::new();
    karst_reader::install(&mut rt);

    match cli.file {
        Some(file) => run_file(&mut rt, &file),
        None => run_repl(&mut rt),
    }
}

/// Evaluate every top-level form in `path`, stopping at the first error.
fn run_file(rt: &mut Runtime, path: &Path) -> ExitCode {
    let source = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("karst: {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let mut reader = karst_reader::Reader::new(&source);
    while let Some(form) = reader.read(rt) {
        rt.eval(form);
        if let Some(report) = rt.take_error() {
            eprintln!("karst: error{}", render(&report));
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn run_repl(rt: &mut Runtime) -> ExitCode {
    // Everything installed so far is session state worth keeping; make it
    // immutable and let :reset roll back to it.
    rt.freeze();

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("karst: failed to start line editor: {e}");
            return ExitCode::FAILURE;
        }
    };
    let history = home::home_dir().map(|dir| dir.join(".karst_history"));
    if let Some(ref path) = history {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match line.trim() {
                    "" => {}
                    ":quit" | ":q" => break,
                    ":reset" => {
                        rt.reset();
                        debug!("session reset to frozen state");
                    }
                    _ => eval_line(rt, &line),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("karst: {e}");
                break;
            }
        }
    }

    if let Some(ref path) = history {
        let _ = editor.save_history(path);
    }
    ExitCode::SUCCESS
}

/// Evaluate every form on one line and print the readable form of the
/// last result. Errors print and clear, and the prompt comes back.
fn eval_line(rt: &mut Runtime, line: &str) {
    let mut reader = karst_reader::Reader::new(line.as_bytes());
    let mut last = None;
    while let Some(form) = reader.read(rt) {
        let v = rt.eval(form);
        if let Some(report) = rt.take_error() {
            println!("error{}", render(&report));
            return;
        }
        last = Some(v);
    }
    if let Some(report) = rt.take_error() {
        println!("error{}", render(&report));
        return;
    }
    if let Some(v) = last {
        println!("{}", rt.dump(v, true));
    }
}

fn render(report: &karst_runtime::ErrorReport) -> String {
    match report.location {
        Some((line, col)) => format!("[{line}:{col}]: {}", report.message),
        None => format!(": {}", report.message),
    }
}
