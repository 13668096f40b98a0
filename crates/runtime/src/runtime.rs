//! The runtime: arenas, stacks, instruction buffer, error channel
//!
//! A `Runtime` owns every allocation the interpreter makes:
//!
//! - the values arena of [`Heavy`] records,
//! - the bytes arena backing symbol names and string literals,
//! - the symbol-table arena,
//! - the expression, result and saved-bindings stacks,
//! - the instruction buffer shared by the macro expander and evaluator.
//!
//! There is no tracing collector. `freeze` records per-arena watermarks
//! below which objects are immutable; `reset` truncates each arena back to
//! its watermark, which is the REPL's restart-session primitive.
//!
//! ## Error channel
//!
//! One first-wins error slot holds a value (conventionally a bytes
//! message). While it is non-nil, `eval`, `expand_macros` and `apply`
//! short-circuit to cleanup-and-return. The reader feeds token locations
//! through [`Runtime::set_source_location`]; the location current at the
//! moment the first error is recorded is attributed to it.

use karst_core::{Arena, NIL, Value};

use crate::heap::{Heavy, NativeFn};
use crate::symtab::SymtabEntry;

/// Maximum number of heavy objects.
const VALUES_CAPACITY: usize = 64 * 1024;
/// Maximum bytes-arena size.
const BYTES_CAPACITY: usize = 256 * 1024;
/// Maximum number of symbol-table entries.
const SYMTAB_CAPACITY: usize = 4 * 1024;
/// Depth limit shared by the three working stacks.
const STACK_CAPACITY: usize = 64 * 1024;
/// Length limit for the instruction buffer.
const PROGRAM_CAPACITY: usize = 64 * 1024;

/// One instruction in the linearized form of an expression.
///
/// The same stream is used by the macro expander (where `Apply`
/// reassembles a form) and the evaluator (where `Apply` calls a function).
#[derive(Debug, Clone, Copy)]
pub enum Instr {
    /// Push a value onto the result stack.
    Literal(Value),
    /// Pop one operator and `n` operands and combine them.
    Apply(usize),
}

/// Symbols the interpreter itself needs to recognize or emit.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WellKnown {
    pub t: Value,
    pub quote: Value,
    pub lambda: Value,
    pub progn: Value,
    pub if_: Value,
    pub set: Value,
    pub fset: Value,
    pub defun: Value,
    pub symbol_is_macro: Value,
}

/// An error taken out of the runtime's error slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    /// `(line, column)` of the token being read when the error fired.
    pub location: Option<(u32, u32)>,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some((line, col)) => write!(f, "[{line}:{col}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

pub struct Runtime {
    pub(crate) values: Arena<Heavy>,
    pub(crate) bytes: Arena<u8>,
    pub(crate) symtab: Arena<SymtabEntry>,
    pub(crate) expr_stack: Vec<Value>,
    pub(crate) result_stack: Vec<Value>,
    pub(crate) saved_bindings: Vec<Value>,
    pub(crate) program: Vec<Instr>,
    pub(crate) well_known: WellKnown,
    error: Value,
    error_location: Option<(u32, u32)>,
    source_location: Option<(u32, u32)>,
}

impl Runtime {
    /// Create a runtime with the essential library installed.
    pub fn new() -> Self {
        let mut rt = Runtime {
            values: Arena::with_capacity(VALUES_CAPACITY),
            bytes: Arena::with_capacity(BYTES_CAPACITY),
            symtab: Arena::with_capacity(SYMTAB_CAPACITY),
            expr_stack: Vec::new(),
            result_stack: Vec::new(),
            saved_bindings: Vec::new(),
            program: Vec::new(),
            well_known: WellKnown {
                t: NIL,
                quote: NIL,
                lambda: NIL,
                progn: NIL,
                if_: NIL,
                set: NIL,
                fset: NIL,
                defun: NIL,
                symbol_is_macro: NIL,
            },
            error: NIL,
            error_location: None,
            source_location: None,
        };
        // nil must land at symbol-table offset 0 so that interning it
        // yields the NIL word itself.
        let nil = rt.intern(b"nil");
        debug_assert_eq!(nil, NIL);
        rt.well_known = WellKnown {
            t: rt.intern(b"t"),
            quote: rt.intern(b"quote"),
            lambda: rt.intern(b"lambda"),
            progn: rt.intern(b"progn"),
            if_: rt.intern(b"if"),
            set: rt.intern(b"set"),
            fset: rt.intern(b"fset"),
            defun: rt.intern(b"defun"),
            symbol_is_macro: rt.intern(b"symbol-is-macro"),
        };
        // t is self-evaluating, like nil.
        let t = rt.well_known.t;
        rt.set(t, t);
        crate::library::install_essential(&mut rt);
        rt
    }

    // =========================================================================
    // Error channel
    // =========================================================================

    /// Record an error. Only the first error per session wins; later calls
    /// are ignored until the slot is cleared.
    pub fn fail(&mut self, msg: impl AsRef<str>) {
        if self.error == NIL {
            self.error_location = self.source_location;
            let v = self.bytes_new_quiet(msg.as_ref().as_bytes());
            // If even the message cannot be allocated, any non-nil value
            // keeps the short-circuit working.
            self.error = v.unwrap_or_else(|| Value::integer(0));
        }
    }

    pub fn has_error(&self) -> bool {
        self.error != NIL
    }

    /// The raw error value (nil when no error is pending).
    pub fn error_value(&self) -> Value {
        self.error
    }

    pub fn clear_error(&mut self) {
        self.error = NIL;
        self.error_location = None;
    }

    /// Take (and clear) the pending error, rendered for display.
    pub fn take_error(&mut self) -> Option<ErrorReport> {
        if self.error == NIL {
            return None;
        }
        let report =
            ErrorReport { message: self.dump(self.error, false), location: self.error_location };
        self.clear_error();
        Some(report)
    }

    /// Report the `(line, column)` of the token currently being read.
    pub fn set_source_location(&mut self, line: u32, column: u32) {
        self.source_location = Some((line, column));
    }

    pub fn clear_source_location(&mut self) {
        self.source_location = None;
    }

    // =========================================================================
    // Freeze / reset
    // =========================================================================

    /// Record watermarks in all three arenas. Everything allocated so far
    /// becomes immutable and survives [`Runtime::reset`].
    pub fn freeze(&mut self) {
        self.values.freeze();
        self.bytes.freeze();
        self.symtab.freeze();
    }

    /// Truncate all arenas back to their freeze watermarks and clear the
    /// working stacks and error slot.
    pub fn reset(&mut self) {
        self.values.reset();
        self.bytes.reset();
        self.symtab.reset();
        self.expr_stack.clear();
        self.result_stack.clear();
        self.saved_bindings.clear();
        self.program.clear();
        self.clear_error();
    }

    // =========================================================================
    // Heavy objects
    // =========================================================================

    /// Allocate a heavy object, returning a ref value.
    pub fn heavy_new(&mut self, h: Heavy) -> Value {
        match self.values.alloc(h) {
            Some(offset) => Value::reference(offset),
            None => {
                self.fail("values arena exhausted");
                NIL
            }
        }
    }

    /// Quiet dereference: `None` for non-refs and malformed offsets.
    pub(crate) fn deref(&self, v: Value) -> Option<&Heavy> {
        self.values.get(v.as_reference()?)
    }

    pub(crate) fn deref_mut(&mut self, v: Value) -> Option<&mut Heavy> {
        let offset = v.as_reference()?;
        self.values.get_mut(offset)
    }

    /// True if `v` refers to a heavy object below the freeze watermark.
    pub(crate) fn ref_frozen(&self, v: Value) -> bool {
        match v.as_reference() {
            Some(offset) => self.values.is_frozen(offset),
            None => false,
        }
    }

    // =========================================================================
    // Cells
    // =========================================================================

    /// Allocate a fresh cell holding `v`.
    pub fn cell_new(&mut self, v: Value) -> Value {
        self.heavy_new(Heavy::Cell(v))
    }

    /// Read a cell's slot.
    pub fn cell_get(&mut self, cell: Value) -> Value {
        match self.deref(cell) {
            Some(Heavy::Cell(v)) => *v,
            Some(_) => {
                self.fail("cell operation on non-cell value");
                NIL
            }
            None => {
                self.fail("bad ref");
                NIL
            }
        }
    }

    /// Overwrite a cell's slot. Fails on frozen cells.
    pub fn cell_set(&mut self, cell: Value, v: Value) {
        if self.ref_frozen(cell) {
            self.fail("attempted to mutate frozen object");
            return;
        }
        match self.deref_mut(cell) {
            Some(Heavy::Cell(slot)) => *slot = v,
            Some(_) => self.fail("cell operation on non-cell value"),
            None => self.fail("bad ref"),
        }
    }

    // =========================================================================
    // Bytes
    // =========================================================================

    /// Allocate an immutable byte buffer.
    pub fn bytes_new(&mut self, data: &[u8]) -> Value {
        match self.bytes_new_quiet(data) {
            Some(v) => v,
            None => {
                self.fail("failed to allocate bytes");
                NIL
            }
        }
    }

    fn bytes_new_quiet(&mut self, data: &[u8]) -> Option<Value> {
        let offset = self.bytes.alloc_slice(data)?;
        let len = u32::try_from(data.len()).ok()?;
        let heavy = self.values.alloc(Heavy::Bytes { offset, len })?;
        Some(Value::reference(heavy))
    }

    /// Allocate a byte buffer from a string.
    pub fn bytes_new_str(&mut self, s: &str) -> Value {
        self.bytes_new(s.as_bytes())
    }

    /// Borrow the contents of a bytes object; `None` if `v` is not bytes.
    pub fn bytes_slice(&self, v: Value) -> Option<&[u8]> {
        match self.deref(v)? {
            Heavy::Bytes { offset, len } => self.bytes.slice(*offset, *len as usize),
            _ => None,
        }
    }

    /// True if `v` is a bytes object with exactly these contents.
    pub fn bytes_match(&self, v: Value, expected: &[u8]) -> bool {
        self.bytes_slice(v) == Some(expected)
    }

    // =========================================================================
    // Arrays and natives
    // =========================================================================

    /// Allocate a fixed-length vector of values.
    pub fn array_new(&mut self, items: Vec<Value>) -> Value {
        self.heavy_new(Heavy::Array(items.into_boxed_slice()))
    }

    /// Wrap a host primitive as a value.
    pub fn native_new(&mut self, f: NativeFn) -> Value {
        self.heavy_new(Heavy::Native(f))
    }

    // =========================================================================
    // Typed access with error reporting
    // =========================================================================

    /// Unpack an integer, recording a type error on mismatch.
    pub fn integer_value(&mut self, v: Value) -> i64 {
        match v.as_integer() {
            Some(i) => i,
            None => {
                self.fail("invalid use of value as integer");
                -1
            }
        }
    }

    /// Unpack a double, recording a type error on mismatch.
    pub fn double_value(&mut self, v: Value) -> f64 {
        match v.as_double() {
            Some(d) => d,
            None => {
                self.fail("invalid use of value as double");
                f64::NAN
            }
        }
    }

    // =========================================================================
    // Heavy-sort predicates
    // =========================================================================

    /// True if `v` refers to a cons. A malformed ref records an error.
    pub fn is_cons(&mut self, v: Value) -> bool {
        self.heavy_is(v, |h| matches!(h, Heavy::Cons { .. }))
    }

    pub fn is_bytes(&mut self, v: Value) -> bool {
        self.heavy_is(v, |h| matches!(h, Heavy::Bytes { .. }))
    }

    pub fn is_cell(&mut self, v: Value) -> bool {
        self.heavy_is(v, |h| matches!(h, Heavy::Cell(_)))
    }

    pub fn is_array(&mut self, v: Value) -> bool {
        self.heavy_is(v, |h| matches!(h, Heavy::Array(_)))
    }

    pub fn is_func(&mut self, v: Value) -> bool {
        self.heavy_is(v, |h| matches!(h, Heavy::Func { .. }))
    }

    pub fn is_native(&mut self, v: Value) -> bool {
        self.heavy_is(v, |h| matches!(h, Heavy::Native(_)))
    }

    fn heavy_is(&mut self, v: Value, pred: fn(&Heavy) -> bool) -> bool {
        if !v.is_reference() {
            return false;
        }
        match self.deref(v) {
            Some(h) => pred(h),
            None => {
                self.fail("bad ref");
                false
            }
        }
    }

    // =========================================================================
    // Working stacks and instruction buffer
    // =========================================================================

    pub(crate) fn expr_push(&mut self, v: Value) {
        if self.expr_stack.len() >= STACK_CAPACITY {
            self.fail("expression stack overflow");
            return;
        }
        self.expr_stack.push(v);
    }

    pub(crate) fn result_push(&mut self, v: Value) {
        if self.result_stack.len() >= STACK_CAPACITY {
            self.fail("result stack overflow");
            return;
        }
        self.result_stack.push(v);
    }

    pub(crate) fn result_pop(&mut self) -> Value {
        match self.result_stack.pop() {
            Some(v) => v,
            None => {
                self.fail("result stack underflow");
                NIL
            }
        }
    }

    pub(crate) fn bindings_push(&mut self, v: Value) {
        if self.saved_bindings.len() >= STACK_CAPACITY {
            self.fail("binding stack overflow");
            return;
        }
        self.saved_bindings.push(v);
    }

    /// Append a LITERAL instruction. Special forms use this to hand their
    /// single result to the reduction phase.
    pub fn program_push_literal(&mut self, v: Value) {
        if self.program.len() >= PROGRAM_CAPACITY {
            self.fail("instruction buffer overflow");
            return;
        }
        self.program.push(Instr::Literal(v));
    }

    /// Append an APPLY-n instruction.
    pub fn program_push_apply(&mut self, n: usize) {
        if self.program.len() >= PROGRAM_CAPACITY {
            self.fail("instruction buffer overflow");
            return;
        }
        self.program.push(Instr::Apply(n));
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let mut rt = Runtime::new();
        rt.fail("first");
        rt.fail("second");
        let report = rt.take_error().unwrap();
        assert_eq!(report.message, "first");
        assert!(!rt.has_error());
    }

    #[test]
    fn test_error_location_attribution() {
        let mut rt = Runtime::new();
        rt.set_source_location(3, 14);
        rt.fail("boom");
        let report = rt.take_error().unwrap();
        assert_eq!(report.location, Some((3, 14)));
        assert_eq!(report.to_string(), "[3:14] boom");
    }

    #[test]
    fn test_cell_roundtrip() {
        let mut rt = Runtime::new();
        let c = rt.cell_new(Value::integer(5));
        assert_eq!(rt.cell_get(c), Value::integer(5));
        rt.cell_set(c, Value::integer(6));
        assert_eq!(rt.cell_get(c), Value::integer(6));
        assert!(!rt.has_error());
    }

    #[test]
    fn test_cell_ops_reject_non_cell() {
        let mut rt = Runtime::new();
        let b = rt.bytes_new(b"xyz");
        rt.cell_get(b);
        assert!(rt.has_error());
        rt.clear_error();
        rt.cell_set(b, NIL);
        assert!(rt.has_error());
    }

    #[test]
    fn test_bytes_roundtrip_and_match() {
        let mut rt = Runtime::new();
        let v = rt.bytes_new(b"hello");
        assert_eq!(rt.bytes_slice(v), Some(&b"hello"[..]));
        assert!(rt.bytes_match(v, b"hello"));
        assert!(!rt.bytes_match(v, b"hullo"));
        assert!(!rt.bytes_match(NIL, b"hello"));
    }

    #[test]
    fn test_frozen_cell_rejects_mutation() {
        let mut rt = Runtime::new();
        let c = rt.cell_new(Value::integer(1));
        rt.freeze();
        rt.cell_set(c, Value::integer(2));
        assert!(rt.has_error());
        rt.clear_error();
        // The cell is unchanged.
        assert_eq!(rt.cell_get(c), Value::integer(1));
    }

    #[test]
    fn test_reset_discards_post_freeze_objects() {
        let mut rt = Runtime::new();
        let kept = rt.bytes_new(b"kept");
        rt.freeze();
        let gone = rt.cell_new(NIL);
        rt.reset();
        assert!(rt.bytes_match(kept, b"kept"));
        assert!(rt.deref(gone).is_none());
    }

    #[test]
    fn test_predicates_on_malformed_ref() {
        let mut rt = Runtime::new();
        let bogus = Value::reference(0xFFFF_0000);
        assert!(!rt.is_cons(bogus));
        assert!(rt.has_error());
    }
}
