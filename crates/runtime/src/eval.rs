//! The two-phase evaluator
//!
//! Phase 1 flattens a form into the instruction stream, driving the walk
//! from the expression stack so recursion depth is bounded by data size
//! rather than source nesting:
//!
//! - an application with a symbol head pushes its arguments for further
//!   linearization, emits `Apply(n)`, and emits a `Literal` of the
//!   function looked up in the head's function cell;
//! - special forms run immediately and leave exactly one instruction
//!   behind (a `Literal`, or work pushed back onto the expression stack
//!   that will produce one);
//! - macro heads expand once and requeue the result;
//! - a bare symbol becomes a `Literal` of its value-cell contents, and
//!   anything else a `Literal` of itself.
//!
//! Phase 2 folds the emitted instructions newest-to-oldest: `Literal`
//! pushes onto the result stack, `Apply(n)` pops the function and its n
//! arguments and pushes the application result. Arguments were pushed in
//! source order, so the reverse traversal evaluates them left to right.
//!
//! On entry the three stacks and the instruction buffer are snapshotted;
//! on exit they are truncated back to the snapshot, so evaluation is
//! reentrant and leaves no residue even on error.

use karst_core::{NIL, Value};

use crate::heap::Heavy;
use crate::list::truthful;
use crate::runtime::{Instr, Runtime};

impl Runtime {
    /// Evaluate a form to a value. On error, nil is returned and the
    /// error slot holds the cause.
    pub fn eval(&mut self, form: Value) -> Value {
        if self.has_error() {
            return NIL;
        }
        let expr_mark = self.expr_stack.len();
        let prog_mark = self.program.len();
        let result_mark = self.result_stack.len();

        // Phase 1: linearize.
        self.expr_push(form);
        while self.expr_stack.len() > expr_mark {
            if self.has_error() {
                break;
            }
            let cur = match self.expr_stack.pop() {
                Some(v) => v,
                None => break,
            };
            self.linearize(cur);
        }

        // Phase 2: reduce, newest instruction first.
        let mut ret = NIL;
        if !self.has_error() {
            let mut idx = self.program.len();
            while idx > prog_mark {
                idx -= 1;
                let instr = self.program[idx];
                match instr {
                    Instr::Literal(v) => self.result_push(v),
                    Instr::Apply(n) => {
                        let f = self.result_pop();
                        let mut args = NIL;
                        for _ in 0..n {
                            let a = self.result_pop();
                            args = self.cons(a, args);
                        }
                        let r = self.apply(f, args);
                        self.result_push(r);
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

    fn linearize(&mut self, cur: Value) {
        if self.is_cons(cur) {
            let head = self.car(cur);
            if head.is_symbol() {
                if self.symbol_is_special_form(head) {
                    let f = self.fget(head);
                    let args = self.cdr(cur);
                    self.apply(f, args);
                    return;
                }
                if self.symbol_is_macro(head) {
                    let f = self.fget(head);
                    let args = self.cdr(cur);
                    let rewritten = self.apply(f, args);
                    if !self.has_error() {
                        self.expr_push(rewritten);
                    }
                    return;
                }
                // Ordinary call: arguments onto the expression stack in
                // source order, then the resolved function as a literal
                // right next to the Apply that consumes it.
                let args = self.list_items(cur);
                for &a in &args[1..] {
                    self.expr_push(a);
                }
                self.program_push_apply(args.len() - 1);
                let f = self.fget(head);
                self.program_push_literal(f);
                return;
            }
            // Computed operator: evaluate the head expression too.
            let elems = self.list_items(cur);
            for &a in &elems[1..] {
                self.expr_push(a);
            }
            self.expr_push(elems[0]);
            self.program_push_apply(elems.len() - 1);
        } else if cur.is_symbol() {
            let v = self.get(cur);
            self.program_push_literal(v);
        } else {
            self.program_push_literal(cur);
        }
    }

    /// Apply a function value to an argument list.
    pub fn apply(&mut self, f: Value, args: Value) -> Value {
        if self.has_error() {
            return NIL;
        }
        match self.deref(f) {
            Some(Heavy::Native(nf)) => {
                let nf = *nf;
                nf(self, args)
            }
            Some(Heavy::Func { params, env, body }) => {
                let (params, env, body) = (*params, *env, *body);
                self.apply_closure(params, env, body, args)
            }
            _ => {
                self.fail("attempted to apply non-function value");
                NIL
            }
        }
    }

    fn apply_closure(&mut self, params: Value, env: Value, body: Value, args: Value) -> Value {
        // Install captured cells, then parameter cells, remembering the
        // bind order so cleanup can unwind LIFO even on error.
        let mut bound: Vec<Value> = Vec::new();

        let mut capture = env;
        while self.is_cons(capture) {
            let pair = self.car(capture);
            let sym = self.car(pair);
            let cell = self.cdr(pair);
            self.bind(sym, cell);
            bound.push(sym);
            capture = self.cdr(capture);
        }

        let mut formal = params;
        let mut actual = args;
        while self.is_cons(formal) {
            if !self.is_cons(actual) {
                self.fail("too few arguments in call");
                break;
            }
            let pair = self.car(formal);
            let sym = self.car(pair);
            let cell = self.cdr(pair);
            let v = self.car(actual);
            self.cell_set(cell, v);
            self.bind(sym, cell);
            bound.push(sym);
            formal = self.cdr(formal);
            actual = self.cdr(actual);
        }
        if !self.has_error() && actual != NIL {
            self.fail("too many arguments in call");
        }

        let ret = if self.has_error() { NIL } else { self.eval(body) };

        for &sym in bound.iter().rev() {
            self.unbind(sym);
        }
        ret
    }
}

/// Special-form helper: evaluate a condition and queue the chosen branch.
pub(crate) fn linearize_if(rt: &mut Runtime, args: Value) {
    let c = rt.car(args);
    let cond = rt.eval(c);
    let rest = rt.cdr(args);
    let branch = if truthful(cond) {
        rt.car(rest)
    } else {
        let tail = rt.cdr(rest);
        rt.car(tail)
    };
    rt.expr_push(branch);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::integer(i)
    }

    #[test]
    fn test_self_evaluating_forms() {
        let mut rt = Runtime::new();
        assert_eq!(rt.eval(int(42)), int(42));
        let d = Value::double(2.5).unwrap();
        assert_eq!(rt.eval(d), d);
        let bytes = rt.bytes_new(b"str");
        assert_eq!(rt.eval(bytes), bytes);
        assert_eq!(rt.eval(NIL), NIL);
        assert!(!rt.has_error());
    }

    #[test]
    fn test_symbol_evaluates_to_value_cell() {
        let mut rt = Runtime::new();
        let sym = rt.intern(b"bound");
        rt.set(sym, int(9));
        assert_eq!(rt.eval(sym), int(9));
        let unset = rt.intern(b"unset");
        assert_eq!(rt.eval(unset), NIL);
    }

    #[test]
    fn test_native_call() {
        let mut rt = Runtime::new();
        let plus = rt.intern(b"+");
        let form = rt.list(&[plus, int(1), int(2)]);
        assert_eq!(rt.eval(form), int(3));
    }

    #[test]
    fn test_nested_calls_left_to_right() {
        let mut rt = Runtime::new();
        let plus = rt.intern(b"+");
        let minus = rt.intern(b"-");
        // (+ (- 10 4) (+ 1 2)) => 9
        let lhs = rt.list(&[minus, int(10), int(4)]);
        let rhs = rt.list(&[plus, int(1), int(2)]);
        let form = rt.list(&[plus, lhs, rhs]);
        assert_eq!(rt.eval(form), int(9));
    }

    #[test]
    fn test_apply_non_function_errors() {
        let mut rt = Runtime::new();
        let nofun = rt.intern(b"no-such-function");
        let form = rt.list(&[nofun, int(1)]);
        assert_eq!(rt.eval(form), NIL);
        let report = rt.take_error().unwrap();
        assert!(report.message.contains("non-function"));
    }

    #[test]
    fn test_eval_leaves_no_stack_residue_on_error() {
        let mut rt = Runtime::new();
        let nofun = rt.intern(b"still-no-function");
        let form = rt.list(&[nofun, int(1)]);
        rt.eval(form);
        assert!(rt.has_error());
        rt.clear_error();
        assert!(rt.expr_stack.is_empty());
        assert!(rt.result_stack.is_empty());
        assert!(rt.program.is_empty());
        // The machine still works afterwards.
        let plus = rt.intern(b"+");
        let ok = rt.list(&[plus, int(2), int(2)]);
        assert_eq!(rt.eval(ok), int(4));
    }

    #[test]
    fn test_closure_application_binds_and_restores() {
        let mut rt = Runtime::new();
        let x = rt.intern(b"x");
        rt.set(x, int(100)); // global x
        let params = rt.list(&[x]);
        let body = rt.list(&[x]);
        let f = rt.lambda(params, body);
        let args = rt.list(&[int(7)]);
        assert_eq!(rt.apply(f, args), int(7));
        // The global binding is restored after the call.
        assert_eq!(rt.get(x), int(100));
        assert!(!rt.has_error());
    }

    #[test]
    fn test_closure_arity_mismatch_errors() {
        let mut rt = Runtime::new();
        let x = rt.intern(b"arity-x");
        let params = rt.list(&[x]);
        let body = rt.list(&[x]);
        let f = rt.lambda(params, body);

        let none = rt.apply(f, NIL);
        assert_eq!(none, NIL);
        assert!(rt.take_error().unwrap().message.contains("too few"));

        let extra = rt.list(&[int(1), int(2)]);
        rt.apply(f, extra);
        assert!(rt.take_error().unwrap().message.contains("too many"));
    }

    #[test]
    fn test_computed_operator_position() {
        let mut rt = Runtime::new();
        // ((lambda (n) n) 5) => 5
        let lambda = rt.well_known.lambda;
        let n = rt.intern(b"n");
        let params = rt.list(&[n]);
        let lam = rt.list(&[lambda, params, n]);
        let form = rt.list(&[lam, int(5)]);
        assert_eq!(rt.eval(form), int(5));
    }
}
