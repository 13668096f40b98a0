//! Karst reader: source text to values
//!
//! The lexer produces tokens with line/column positions; the reader turns
//! them into values through the runtime's constructors, reporting each
//! token's location to the runtime so errors carry source attribution.
//!
//! `install` registers the `load` native, which is the one library
//! function that needs the reader and therefore cannot live in the
//! runtime crate.

pub mod lexer;
pub mod reader;

use karst_runtime::{NIL, Runtime, Value};
use tracing::debug;

pub use lexer::{Lexer, TokenKind};
pub use reader::Reader;

/// Register the reader-dependent natives (`load`).
pub fn install(rt: &mut Runtime) {
    let sym = rt.intern(b"load");
    let native = rt.native_new(load);
    rt.fset(sym, native);
}

/// Read and evaluate every top-level form in `source`, returning the last
/// result. Stops at the first error.
pub fn eval_source(rt: &mut Runtime, source: &[u8]) -> Value {
    let mut reader = Reader::new(source);
    let mut last = NIL;
    while let Some(form) = reader.read(rt) {
        if rt.has_error() {
            return NIL;
        }
        last = rt.eval(form);
        if rt.has_error() {
            return NIL;
        }
    }
    last
}

/// `(load PATH)`: evaluate a file form by form, returning the last result.
fn load(rt: &mut Runtime, args: Value) -> Value {
    let path_val = rt.car(args);
    let path = match rt.bytes_slice(path_val) {
        Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        None => {
            rt.fail("load: path was not a string");
            return NIL;
        }
    };
    debug!(path = %path, "loading file");
    let source = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            rt.fail(format!("failed to read file {path}: {e}"));
            return NIL;
        }
    };
    eval_source(rt, &source)
}
