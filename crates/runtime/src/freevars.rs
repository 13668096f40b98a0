//! Free-variable analysis
//!
//! Computes the symbols a body references in an evaluable position without
//! binding them itself. The result drives closure capture: each free
//! symbol is paired with its current value cell at closure-construction
//! time.
//!
//! The walk is conservative about nested lambdas: an inner lambda's
//! parameter list joins the bound set and the walk continues into its
//! body. Inner lambdas run their own analysis when they are themselves
//! constructed, so over-approximating here only shrinks this closure's
//! capture set, never its correctness.

use karst_core::Value;

use crate::runtime::Runtime;

impl Runtime {
    /// Symbols free in `body` given the parameter list `params`.
    ///
    /// Uses the expression stack as the worklist; output order is
    /// insignificant, and each symbol appears at most once.
    pub fn free_vars(&mut self, params: Value, body: Value) -> Vec<Value> {
        let mut bound = self.list_items(params);
        let mut free: Vec<Value> = Vec::new();
        let mark = self.expr_stack.len();
        self.expr_push(body);
        while self.expr_stack.len() > mark {
            if self.has_error() {
                break;
            }
            let cur = match self.expr_stack.pop() {
                Some(v) => v,
                None => break,
            };
            if self.is_cons(cur) {
                let head = self.car(cur);
                if head == self.well_known.quote {
                    continue;
                }
                if head == self.well_known.lambda {
                    // Conservatively treat the inner parameters as bound
                    // and keep walking the inner body.
                    let rest = self.cdr(cur);
                    let inner_params = self.car(rest);
                    bound.extend(self.list_items(inner_params));
                    let mut forms = self.cdr(rest);
                    while self.is_cons(forms) {
                        let form = self.car(forms);
                        self.expr_push(form);
                        forms = self.cdr(forms);
                    }
                    continue;
                }
                // An application: walk every child, skipping a symbol in
                // operator position (it names a function cell, not a
                // value).
                if !head.is_symbol() {
                    self.expr_push(head);
                }
                let mut rest = self.cdr(cur);
                while self.is_cons(rest) {
                    let child = self.car(rest);
                    self.expr_push(child);
                    rest = self.cdr(rest);
                }
                if rest != karst_core::NIL {
                    self.expr_push(rest);
                }
            } else if cur.is_symbol() && !bound.contains(&cur) && !free.contains(&cur) {
                free.push(cur);
            }
        }
        self.expr_stack.truncate(mark);
        free
    }
}
