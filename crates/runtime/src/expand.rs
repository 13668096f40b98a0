//! Macro expansion
//!
//! `expand_macros` walks a form once and rewrites every application whose
//! head symbol is flagged as a macro, applying the macro function to the
//! unevaluated argument forms. Macro results are pushed back onto the
//! worklist, so a macro may expand into another macro call; termination
//! is the macro author's problem.
//!
//! The walk shares the evaluator's instruction stream: sub-forms are
//! flattened to `Literal` and `Apply` instructions, and a right-to-left
//! fold over the emitted instructions reassembles the expanded form.
//! `quote` forms are emitted untouched; `lambda` forms are reassembled
//! with each body sub-form expanded recursively so parameter lists are
//! never treated as applications.

use karst_core::{NIL, Value};

use crate::runtime::{Instr, Runtime};

impl Runtime {
    /// Expand every macro call in `form`, returning the rewritten form.
    pub fn expand_macros(&mut self, form: Value) -> Value {
        if self.has_error() {
            return NIL;
        }
        let expr_mark = self.expr_stack.len();
        let prog_mark = self.program.len();
        let result_mark = self.result_stack.len();

        self.expr_push(form);
        while self.expr_stack.len() > expr_mark {
            if self.has_error() {
                break;
            }
            let cur = match self.expr_stack.pop() {
                Some(v) => v,
                None => break,
            };
            self.expand_step(cur);
        }

        let mut ret = NIL;
        if !self.has_error() {
            // Rebuild: newest instruction first. `Apply(n)` pops the
            // operator, then n operands, and conses the form back up.
            let mut idx = self.program.len();
            while idx > prog_mark {
                idx -= 1;
                let instr = self.program[idx];
                match instr {
                    Instr::Literal(v) => self.result_push(v),
                    Instr::Apply(n) => {
                        let op = self.result_pop();
                        let mut operands = NIL;
                        for _ in 0..n {
                            let x = self.result_pop();
                            operands = self.cons(x, operands);
                        }
                        let rebuilt = self.cons(op, operands);
                        self.result_push(rebuilt);
                    }
                }
                if self.has_error() {
                    break;
                }
            }
            if !self.has_error() && self.result_stack.len() > result_mark {
                ret = self.result_stack.pop().unwrap_or(NIL);
            }
        }

        self.expr_stack.truncate(expr_mark);
        self.program.truncate(prog_mark);
        self.result_stack.truncate(result_mark);
        ret
    }

    fn expand_step(&mut self, cur: Value) {
        if !self.is_cons(cur) {
            self.program_push_literal(cur);
            return;
        }
        let head = self.car(cur);
        if head.is_symbol() {
            if self.symbol_is_macro(head) {
                let f = self.fget(head);
                let args = self.cdr(cur);
                let rewritten = self.apply(f, args);
                if !self.has_error() {
                    self.expr_push(rewritten);
                }
                return;
            }
            if head == self.well_known.quote {
                self.program_push_literal(cur);
                return;
            }
            if head == self.well_known.lambda {
                let rest = self.cdr(cur);
                let params = self.car(rest);
                let mut forms = self.cdr(rest);
                let mut expanded_body = Vec::new();
                while self.is_cons(forms) {
                    let form = self.car(forms);
                    expanded_body.push(self.expand_macros(form));
                    if self.has_error() {
                        return;
                    }
                    forms = self.cdr(forms);
                }
                let body = self.list(&expanded_body);
                let tail = self.cons(params, body);
                let rebuilt = self.cons(head, tail);
                self.program_push_literal(rebuilt);
                return;
            }
        }
        // Ordinary application: expand operator and operands alike. The
        // operands go onto the worklist first and the operator last, so
        // the operator's expansion lands next to the Apply that rebuilds
        // the form.
        let elems = self.list_items(cur);
        for &e in &elems[1..] {
            self.expr_push(e);
        }
        self.expr_push(elems[0]);
        self.program_push_apply(elems.len() - 1);
    }
}
