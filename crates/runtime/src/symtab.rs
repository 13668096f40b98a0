//! The symbol table: interning, value/function cells, shallow binding
//!
//! A symbol at runtime is the byte offset of its entry in the symtab
//! arena, packed into a symbol-sorted word. Entries are append-only;
//! interning scans linearly for a byte-equal name, which is fine at the
//! table sizes a session produces.
//!
//! Each entry carries two independent locations (Lisp-2): the value slot
//! and the function slot. A slot is either nil or a ref to a heap cell;
//! the cell indirection lets lexical binding repoint a symbol's location
//! without writing to a frozen entry. `bind` saves the current slot on the
//! saved-bindings stack and installs a new cell; `unbind` restores it.
//! Lookup, binding and unbinding are all O(1).

use karst_core::{NIL, Value};

use crate::runtime::Runtime;

const ENTRY_SIZE: usize = size_of::<SymtabEntry>();

/// One interned symbol.
#[derive(Debug, Clone, Copy)]
pub struct SymtabEntry {
    /// Bytes ref holding the symbol's name.
    pub name: Value,
    /// Nil, or a ref to the cell holding the symbol's value.
    pub value: Value,
    /// Nil, or a ref to the cell holding the symbol's function.
    pub function: Value,
    pub is_macro: bool,
    pub is_special_form: bool,
}

impl Runtime {
    /// Intern `name`, returning the canonical symbol value for it.
    pub fn intern(&mut self, name: &[u8]) -> Value {
        for i in 0..self.symtab.len() {
            let offset = (i * ENTRY_SIZE) as u32;
            let entry_name = match self.symtab.get(offset) {
                Some(e) => e.name,
                None => {
                    self.fail("corrupted symbol table");
                    return NIL;
                }
            };
            if self.bytes_match(entry_name, name) {
                return Value::symbol(offset);
            }
        }
        let name_val = self.bytes_new(name);
        if self.has_error() {
            return NIL;
        }
        let entry = SymtabEntry {
            name: name_val,
            value: NIL,
            function: NIL,
            is_macro: false,
            is_special_form: false,
        };
        match self.symtab.alloc(entry) {
            Some(offset) => Value::symbol(offset),
            None => {
                self.fail("symbol table exhausted");
                NIL
            }
        }
    }

    /// Intern a string name.
    pub fn intern_str(&mut self, name: &str) -> Value {
        self.intern(name.as_bytes())
    }

    pub(crate) fn entry(&self, sym: Value) -> Option<&SymtabEntry> {
        self.symtab.get(sym.as_symbol()?)
    }

    pub(crate) fn entry_mut(&mut self, sym: Value) -> Option<&mut SymtabEntry> {
        let offset = sym.as_symbol()?;
        self.symtab.get_mut(offset)
    }

    /// The symbol's name bytes, if `sym` is a well-formed symbol.
    pub fn symbol_name(&self, sym: Value) -> Option<&[u8]> {
        self.bytes_slice(self.entry(sym)?.name)
    }

    // =========================================================================
    // Value and function slots
    // =========================================================================

    /// Read the symbol's current value (through its value cell).
    pub fn get(&mut self, sym: Value) -> Value {
        let slot = match self.entry(sym) {
            Some(e) => e.value,
            None => {
                self.fail("bad symbol");
                return NIL;
            }
        };
        if slot == NIL { NIL } else { self.cell_get(slot) }
    }

    /// Write the symbol's value, allocating its cell on first set.
    pub fn set(&mut self, sym: Value, v: Value) {
        self.slot_set(sym, v, SlotKind::Value);
    }

    /// Read the symbol's current function.
    pub fn fget(&mut self, sym: Value) -> Value {
        let slot = match self.entry(sym) {
            Some(e) => e.function,
            None => {
                self.fail("bad symbol");
                return NIL;
            }
        };
        if slot == NIL { NIL } else { self.cell_get(slot) }
    }

    /// Write the symbol's function, allocating its cell on first set.
    pub fn fset(&mut self, sym: Value, v: Value) {
        self.slot_set(sym, v, SlotKind::Function);
    }

    /// Ref to the symbol's current value cell (nil if never set).
    pub fn value_cell(&mut self, sym: Value) -> Value {
        match self.entry(sym) {
            Some(e) => e.value,
            None => {
                self.fail("bad symbol");
                NIL
            }
        }
    }

    /// Ref to the symbol's value cell, allocating an empty cell on first
    /// use the same way `set` does. Closure capture goes through here so
    /// the captured location and any later assignment share one cell.
    /// A frozen entry without a cell can never be repointed by `set`, so
    /// its slot stays nil and nil is returned.
    pub fn ensure_value_cell(&mut self, sym: Value) -> Value {
        let (slot, offset) = match (self.entry(sym), sym.as_symbol()) {
            (Some(e), Some(offset)) => (e.value, offset),
            _ => {
                self.fail("bad symbol");
                return NIL;
            }
        };
        if slot != NIL {
            return slot;
        }
        if self.symtab.is_frozen(offset) {
            return NIL;
        }
        let cell = self.cell_new(NIL);
        if self.has_error() {
            return NIL;
        }
        if let Some(e) = self.entry_mut(sym) {
            e.value = cell;
        }
        cell
    }

    fn slot_set(&mut self, sym: Value, v: Value, kind: SlotKind) {
        let (slot, offset) = match (self.entry(sym), sym.as_symbol()) {
            (Some(e), Some(offset)) => (kind.read(e), offset),
            _ => {
                self.fail("bad symbol");
                return;
            }
        };
        if slot == NIL {
            // First set: the lazy cell allocation has to repoint the entry
            // itself, so the entry must not be frozen.
            if self.symtab.is_frozen(offset) {
                self.fail("attempted to mutate frozen symbol");
                return;
            }
            let cell = self.cell_new(v);
            if self.has_error() {
                return;
            }
            if let Some(e) = self.entry_mut(sym) {
                kind.write(e, cell);
            }
        } else {
            self.cell_set(slot, v);
        }
    }

    // =========================================================================
    // Shallow binding
    // =========================================================================

    /// Save the symbol's current value slot and install `cell` in its
    /// place. Always permitted, frozen or not: only the slot pointer
    /// moves, and `unbind` puts it back.
    pub fn bind(&mut self, sym: Value, cell: Value) {
        let old = match self.entry(sym) {
            Some(e) => e.value,
            None => {
                self.fail("bad symbol");
                return;
            }
        };
        self.bindings_push(old);
        if self.has_error() {
            return;
        }
        if let Some(e) = self.entry_mut(sym) {
            e.value = cell;
        }
    }

    /// Restore the most recently saved value slot into `sym`.
    pub fn unbind(&mut self, sym: Value) {
        let old = match self.saved_bindings.pop() {
            Some(v) => v,
            None => {
                self.fail("binding stack underflow");
                return;
            }
        };
        match self.entry_mut(sym) {
            Some(e) => e.value = old,
            None => self.fail("bad symbol"),
        }
    }

    // =========================================================================
    // Macro and special-form flags
    // =========================================================================

    pub fn symbol_is_macro(&self, sym: Value) -> bool {
        self.entry(sym).is_some_and(|e| e.is_macro)
    }

    pub fn symbol_is_special_form(&self, sym: Value) -> bool {
        self.entry(sym).is_some_and(|e| e.is_special_form)
    }

    /// Flag `sym` as a macro.
    pub fn set_macro_flag(&mut self, sym: Value) {
        match self.entry_mut(sym) {
            Some(e) => e.is_macro = true,
            None => self.fail("bad symbol"),
        }
    }

    /// Install `f` as a macro: function slot plus macro flag.
    pub fn mset(&mut self, sym: Value, f: Value) {
        self.fset(sym, f);
        self.set_macro_flag(sym);
    }

    /// Install `f` as a special form: function slot plus special flag.
    pub fn sfset(&mut self, sym: Value, f: Value) {
        self.fset(sym, f);
        match self.entry_mut(sym) {
            Some(e) => e.is_special_form = true,
            None => self.fail("bad symbol"),
        }
    }
}

enum SlotKind {
    Value,
    Function,
}

impl SlotKind {
    fn read(&self, e: &SymtabEntry) -> Value {
        match self {
            SlotKind::Value => e.value,
            SlotKind::Function => e.function,
        }
    }

    fn write(&self, e: &mut SymtabEntry, v: Value) {
        match self {
            SlotKind::Value => e.value = v,
            SlotKind::Function => e.function = v,
        }
    }
}
