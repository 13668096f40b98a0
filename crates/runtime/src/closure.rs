//! Closure construction
//!
//! A closure packages three lists:
//!
//! - `params`: one `(symbol . cell)` pair per formal, the cell fresh and
//!   initialized to nil;
//! - `env`: one `(symbol . cell)` pair per free variable, the cell being
//!   whatever the symbol's value cell was at construction time;
//! - `body`: the body forms wrapped in an implicit sequential form and
//!   macro-expanded once.
//!
//! Capture is by cell identity, not by value: two closures that capture
//! the same outer variable share its cell and observe each other's
//! mutations.

use karst_core::{NIL, Value};

use crate::heap::Heavy;
use crate::runtime::Runtime;

impl Runtime {
    /// Build a closure from a parameter list and body forms.
    pub fn lambda(&mut self, params: Value, body: Value) -> Value {
        if params != NIL && !self.is_cons(params) {
            self.fail("ill-formed lambda parameter list");
            return NIL;
        }

        // Expand the body once, under an implicit progn.
        let progn = self.well_known.progn;
        let wrapped = self.cons(progn, body);
        let expanded = self.expand_macros(wrapped);
        if self.has_error() {
            return NIL;
        }

        // Capture each free variable's value cell, materializing the
        // cell if the variable has never been set: binding a bare nil
        // slot would shadow a cell the symbol acquires later, and a
        // `set` inside the body would be thrown away on unbind.
        let free = self.free_vars(params, expanded);
        let mut env = NIL;
        for sym in free {
            let cell = self.ensure_value_cell(sym);
            let pair = self.cons(sym, cell);
            env = self.cons(pair, env);
        }

        // One fresh nil cell per formal parameter.
        let formals = self.list_items(params);
        let mut pairs = Vec::with_capacity(formals.len());
        for sym in formals {
            if !sym.is_symbol() {
                self.fail("ill-formed lambda parameter list");
                return NIL;
            }
            let cell = self.cell_new(NIL);
            pairs.push(self.cons(sym, cell));
        }
        let args = self.list(&pairs);

        if self.has_error() {
            return NIL;
        }
        self.heavy_new(Heavy::Func { params: args, env, body: expanded })
    }
}
