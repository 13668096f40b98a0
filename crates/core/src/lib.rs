//! Karst core: the foundation the interpreter is built on
//!
//! Key design principles:
//! - Value: a single 64-bit word for everything the language talks about
//! - Arena: bump allocation with stable byte offsets, so a 32-bit index
//!   can be embedded directly in a tagged word
//! - No allocation is ever moved or freed individually; `freeze`/`reset`
//!   watermarks are the only lifetime boundary

pub mod arena;
pub mod value;

pub use arena::Arena;
pub use value::{NIL, Sort, Value};
