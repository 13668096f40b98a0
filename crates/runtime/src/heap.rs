//! Heavy objects: the targets of ref-sorted values
//!
//! Anything too big for a 64-bit word is stored in the runtime's values
//! arena as a `Heavy` variant record and referred to by its byte offset.

use karst_core::Value;

use crate::runtime::Runtime;

/// A host-implemented primitive. Receives the runtime and the (already
/// assembled) argument list; returns the result value. Special forms use
/// the same signature and manipulate the runtime's stacks and instruction
/// stream directly.
pub type NativeFn = fn(&mut Runtime, Value) -> Value;

/// A heavy value stored in the values arena.
#[derive(Debug)]
pub enum Heavy {
    /// A single mutable slot. Variable bindings point at cells so that
    /// lexical rebinding can repoint the symbol without touching frozen
    /// symbol-table entries.
    Cell(Value),
    /// A pair.
    Cons { car: Value, cdr: Value },
    /// A fixed-length vector of values.
    Array(Box<[Value]>),
    /// An immutable byte buffer: offset and length in the bytes arena.
    Bytes { offset: u32, len: u32 },
    /// A closure: `params` is a list of `(symbol . cell)` pairs for the
    /// formals, `env` an association list of `(symbol . cell)` captures,
    /// `body` the macro-expanded body wrapped in a sequential form.
    Func { params: Value, env: Value, body: Value },
    /// A host primitive.
    Native(NativeFn),
}
