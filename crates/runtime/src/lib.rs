//! Karst runtime: a small Lisp-2 interpreter core
//!
//! Key design principles:
//! - Value: a NaN-boxed 64-bit word (see `karst-core`)
//! - Heavy: everything that does not fit in a word lives in an arena of
//!   variant records, addressed by 32-bit byte offsets
//! - Symbols carry independent value and function cells (Lisp-2), bound
//!   and unbound by shallow binding at call boundaries
//! - Evaluation is two-phase: forms are flattened into a linear
//!   instruction stream, then the stream is folded into a value

pub mod closure;
pub mod equal;
pub mod eval;
pub mod expand;
pub mod freevars;
pub mod heap;
pub mod library;
pub mod list;
pub mod print;
pub mod runtime;
pub mod symtab;

pub use heap::{Heavy, NativeFn};
pub use karst_core::{NIL, Sort, Value};
pub use runtime::{ErrorReport, Runtime};
pub use symtab::SymtabEntry;
