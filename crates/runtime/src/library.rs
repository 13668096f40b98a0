//! The essential native library
//!
//! Special forms manipulate the instruction stream and expression stack
//! directly; each invocation leaves exactly one value's worth of
//! instructions behind. Macros receive their argument forms unevaluated
//! and return a replacement form. Everything else is an ordinary function
//! of already-evaluated arguments.
//!
//! `load` is not registered here: it needs the reader, which lives a
//! crate above this one.

use karst_core::{NIL, Value};

use crate::eval::linearize_if;
use crate::runtime::Runtime;

/// Install the essential library into a fresh runtime.
pub fn install_essential(rt: &mut Runtime) {
    // special forms
    register_sf(rt, "quote", sf_quote);
    register_sf(rt, "if", sf_if);
    register_sf(rt, "progn", sf_progn);
    register_sf(rt, "lambda", sf_lambda);

    // macros
    register_macro(rt, "defun", m_defun);
    register_macro(rt, "defmacro", m_defmacro);
    register_macro(rt, "let", m_let);
    register_macro(rt, "and", m_and);
    register_macro(rt, "setq", m_setq);

    // eval
    register_fn(rt, "eval", eval);

    // symbols
    register_fn(rt, "set", set);
    register_fn(rt, "fset", fset);
    register_fn(rt, "symbol-is-macro", symbol_is_macro);
    register_fn(rt, "funcall", funcall);

    // cons cells
    register_fn(rt, "cons", cons);
    register_fn(rt, "car", car);
    register_fn(rt, "cdr", cdr);

    // arithmetic
    register_fn(rt, "+", add);
    register_fn(rt, "-", sub);
    register_fn(rt, "*", mul);

    // stream IO
    register_fn(rt, "print", print);
    register_fn(rt, "princ", princ);
}

fn register_sf(rt: &mut Runtime, name: &str, f: crate::heap::NativeFn) {
    let sym = rt.intern_str(name);
    let native = rt.native_new(f);
    rt.sfset(sym, native);
}

fn register_macro(rt: &mut Runtime, name: &str, f: crate::heap::NativeFn) {
    let sym = rt.intern_str(name);
    let native = rt.native_new(f);
    rt.mset(sym, native);
}

fn register_fn(rt: &mut Runtime, name: &str, f: crate::heap::NativeFn) {
    let sym = rt.intern_str(name);
    let native = rt.native_new(f);
    rt.fset(sym, native);
}

// =============================================================================
// Special forms
// =============================================================================

fn sf_quote(rt: &mut Runtime, args: Value) -> Value {
    let x = rt.car(args);
    rt.program_push_literal(x);
    NIL
}

fn sf_if(rt: &mut Runtime, args: Value) -> Value {
    linearize_if(rt, args);
    NIL
}

fn sf_progn(rt: &mut Runtime, args: Value) -> Value {
    let mut forms = args;
    let mut last = NIL;
    while rt.is_cons(forms) {
        let form = rt.car(forms);
        last = rt.eval(form);
        if rt.has_error() {
            return NIL;
        }
        forms = rt.cdr(forms);
    }
    rt.program_push_literal(last);
    NIL
}

fn sf_lambda(rt: &mut Runtime, args: Value) -> Value {
    let params = rt.car(args);
    let body = rt.cdr(args);
    let f = rt.lambda(params, body);
    if rt.has_error() {
        return NIL;
    }
    rt.program_push_literal(f);
    NIL
}

// =============================================================================
// Macros
// =============================================================================

/// `(defun NAME PARAMS BODY...)` => `(fset (quote NAME) (lambda PARAMS BODY...))`
fn m_defun(rt: &mut Runtime, args: Value) -> Value {
    let name = rt.car(args);
    let rest = rt.cdr(args);
    let params = rt.car(rest);
    let body = rt.cdr(rest);

    let quote = rt.well_known.quote;
    let lambda = rt.well_known.lambda;
    let fset = rt.well_known.fset;
    let quoted = rt.list(&[quote, name]);
    let lam_tail = rt.cons(params, body);
    let lam = rt.cons(lambda, lam_tail);
    rt.list(&[fset, quoted, lam])
}

/// `(defmacro NAME PARAMS BODY...)` =>
/// `(progn (defun NAME PARAMS BODY...) (symbol-is-macro (quote NAME)))`
fn m_defmacro(rt: &mut Runtime, args: Value) -> Value {
    let name = rt.car(args);
    let progn = rt.well_known.progn;
    let defun = rt.well_known.defun;
    let quote = rt.well_known.quote;
    let flagger = rt.well_known.symbol_is_macro;

    let defun_form = rt.cons(defun, args);
    let quoted = rt.list(&[quote, name]);
    let flag_form = rt.list(&[flagger, quoted]);
    rt.list(&[progn, defun_form, flag_form])
}

/// `(let ((S1 E1) ...) BODY...)` => `((lambda (S1 ...) BODY...) E1 ...)`
fn m_let(rt: &mut Runtime, args: Value) -> Value {
    let mut params = NIL;
    let mut actuals = NIL;
    let mut binds = rt.car(args);
    let body = rt.cdr(args);
    while binds != NIL {
        if !rt.is_cons(binds) {
            rt.fail("ill-formed let binding list");
            return NIL;
        }
        let bind = rt.car(binds);
        if !rt.is_cons(bind) {
            rt.fail("ill-formed let binding");
            return NIL;
        }
        let sym = rt.car(bind);
        let rest = rt.cdr(bind);
        let expr = rt.car(rest);
        params = rt.cons(sym, params);
        actuals = rt.cons(expr, actuals);
        binds = rt.cdr(binds);
    }
    let lambda = rt.well_known.lambda;
    let lam_tail = rt.cons(params, body);
    let lam = rt.cons(lambda, lam_tail);
    rt.cons(lam, actuals)
}

/// `(and A B C)` => `(if A (if B C))`; `(and)` => `nil`
fn m_and(rt: &mut Runtime, args: Value) -> Value {
    let mut rev = rt.reverse(args);
    if rev == NIL {
        return NIL;
    }
    let mut ret = rt.car(rev);
    rev = rt.cdr(rev);
    let if_ = rt.well_known.if_;
    while rev != NIL {
        let cond = rt.car(rev);
        ret = rt.list(&[if_, cond, ret]);
        rev = rt.cdr(rev);
    }
    ret
}

/// `(setq S V)` => `(set (quote S) V)`
fn m_setq(rt: &mut Runtime, args: Value) -> Value {
    let sym = rt.car(args);
    let rest = rt.cdr(args);
    let v = rt.car(rest);
    let set = rt.well_known.set;
    let quote = rt.well_known.quote;
    let quoted = rt.list(&[quote, sym]);
    rt.list(&[set, quoted, v])
}

// =============================================================================
// Functions
// =============================================================================

fn eval(rt: &mut Runtime, args: Value) -> Value {
    let x = rt.car(args);
    rt.eval(x)
}

fn set(rt: &mut Runtime, args: Value) -> Value {
    let sym = rt.car(args);
    let rest = rt.cdr(args);
    let v = rt.car(rest);
    rt.set(sym, v);
    v
}

fn fset(rt: &mut Runtime, args: Value) -> Value {
    let sym = rt.car(args);
    let rest = rt.cdr(args);
    let v = rt.car(rest);
    rt.fset(sym, v);
    v
}

fn symbol_is_macro(rt: &mut Runtime, args: Value) -> Value {
    let sym = rt.car(args);
    rt.set_macro_flag(sym);
    NIL
}

fn funcall(rt: &mut Runtime, args: Value) -> Value {
    let head = rt.car(args);
    // A symbol names its function cell; anything else is assumed to be a
    // function value already, e.g. a lambda passed in a variable.
    let f = if head.is_symbol() && head != NIL { rt.fget(head) } else { head };
    let rest = rt.cdr(args);
    rt.apply(f, rest)
}

fn cons(rt: &mut Runtime, args: Value) -> Value {
    let car = rt.car(args);
    let rest = rt.cdr(args);
    let cdr = rt.car(rest);
    rt.cons(car, cdr)
}

fn car(rt: &mut Runtime, args: Value) -> Value {
    let x = rt.car(args);
    rt.car(x)
}

fn cdr(rt: &mut Runtime, args: Value) -> Value {
    let x = rt.car(args);
    rt.cdr(x)
}

fn add(rt: &mut Runtime, args: Value) -> Value {
    binary_integer_op(rt, args, i64::checked_add)
}

fn sub(rt: &mut Runtime, args: Value) -> Value {
    binary_integer_op(rt, args, i64::checked_sub)
}

fn mul(rt: &mut Runtime, args: Value) -> Value {
    binary_integer_op(rt, args, i64::checked_mul)
}

fn binary_integer_op(
    rt: &mut Runtime,
    args: Value,
    op: fn(i64, i64) -> Option<i64>,
) -> Value {
    let xv = rt.car(args);
    let rest = rt.cdr(args);
    let yv = rt.car(rest);
    let x = rt.integer_value(xv);
    let y = rt.integer_value(yv);
    if rt.has_error() {
        return NIL;
    }
    match op(x, y).and_then(Value::try_integer) {
        Some(v) => v,
        None => {
            rt.fail("integer overflow");
            NIL
        }
    }
}

fn print(rt: &mut Runtime, args: Value) -> Value {
    let x = rt.car(args);
    println!("{}", rt.dump(x, true));
    x
}

fn princ(rt: &mut Runtime, args: Value) -> Value {
    let x = rt.car(args);
    println!("{}", rt.dump(x, false));
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::truthful;

    fn int(i: i64) -> Value {
        Value::integer(i)
    }

    fn eval_form(rt: &mut Runtime, items: &[Value]) -> Value {
        let form = rt.list(items);
        rt.eval(form)
    }

    #[test]
    fn test_quote() {
        let mut rt = Runtime::new();
        let quote = rt.well_known.quote;
        let (a, b) = (rt.intern(b"a"), rt.intern(b"b"));
        let inner = rt.list(&[a, b]);
        let out = eval_form(&mut rt, &[quote, inner]);
        assert_eq!(out, inner);
    }

    #[test]
    fn test_if_branches() {
        let mut rt = Runtime::new();
        let if_ = rt.well_known.if_;
        let taken = eval_form(&mut rt, &[if_, int(1), int(10), int(20)]);
        assert_eq!(taken, int(10));
        let not_taken = eval_form(&mut rt, &[if_, NIL, int(10), int(20)]);
        assert_eq!(not_taken, int(20));
        // Two-armed if defaults to nil.
        let short = eval_form(&mut rt, &[if_, NIL, int(10)]);
        assert_eq!(short, NIL);
    }

    #[test]
    fn test_progn_returns_last() {
        let mut rt = Runtime::new();
        let progn = rt.well_known.progn;
        let out = eval_form(&mut rt, &[progn, int(1), int(2), int(3)]);
        assert_eq!(out, int(3));
        let empty = eval_form(&mut rt, &[progn]);
        assert_eq!(empty, NIL);
    }

    #[test]
    fn test_set_and_setq() {
        let mut rt = Runtime::new();
        let quote = rt.well_known.quote;
        let set = rt.well_known.set;
        let x = rt.intern(b"lib-x");
        let quoted = rt.list(&[quote, x]);
        eval_form(&mut rt, &[set, quoted, int(3)]);
        assert_eq!(rt.get(x), int(3));

        let setq = rt.intern(b"setq");
        eval_form(&mut rt, &[setq, x, int(4)]);
        assert_eq!(rt.get(x), int(4));
        assert!(!rt.has_error());
    }

    #[test]
    fn test_arithmetic() {
        let mut rt = Runtime::new();
        let plus = rt.intern(b"+");
        let minus = rt.intern(b"-");
        let times = rt.intern(b"*");
        assert_eq!(eval_form(&mut rt, &[plus, int(1), int(2)]), int(3));
        assert_eq!(eval_form(&mut rt, &[minus, int(1), int(2)]), int(-1));
        assert_eq!(eval_form(&mut rt, &[times, int(6), int(7)]), int(42));
    }

    #[test]
    fn test_arithmetic_type_error() {
        let mut rt = Runtime::new();
        let plus = rt.intern(b"+");
        let quote = rt.well_known.quote;
        let sym = rt.intern(b"not-a-number");
        let quoted = rt.list(&[quote, sym]);
        eval_form(&mut rt, &[plus, int(1), quoted]);
        assert!(rt.take_error().unwrap().message.contains("integer"));
    }

    #[test]
    fn test_arithmetic_overflow_errors() {
        let mut rt = Runtime::new();
        let times = rt.intern(b"*");
        let big = int(karst_core::value::INTEGER_MAX);
        eval_form(&mut rt, &[times, big, big]);
        assert!(rt.take_error().unwrap().message.contains("overflow"));
    }

    #[test]
    fn test_cons_car_cdr_natives() {
        let mut rt = Runtime::new();
        let (c, a, d) = (rt.intern(b"cons"), rt.intern(b"car"), rt.intern(b"cdr"));
        let pair = eval_form(&mut rt, &[c, int(1), int(2)]);
        assert_eq!(rt.car(pair), int(1));

        let quote = rt.well_known.quote;
        let quoted = rt.list(&[quote, pair]);
        assert_eq!(eval_form(&mut rt, &[a, quoted]), int(1));
        let quoted = rt.list(&[quote, pair]);
        assert_eq!(eval_form(&mut rt, &[d, quoted]), int(2));
    }

    #[test]
    fn test_defun_and_funcall() {
        let mut rt = Runtime::new();
        // (defun twice (n) (+ n n)); (funcall (quote twice) 21) => 42
        let defun = rt.well_known.defun;
        let (twice, n, plus) = (rt.intern(b"twice"), rt.intern(b"n"), rt.intern(b"+"));
        let params = rt.list(&[n]);
        let body = rt.list(&[plus, n, n]);
        eval_form(&mut rt, &[defun, twice, params, body]);
        assert!(!rt.has_error());
        let installed = rt.fget(twice);
        assert!(rt.is_func(installed));

        let funcall = rt.intern(b"funcall");
        let quote = rt.well_known.quote;
        let quoted = rt.list(&[quote, twice]);
        let out = eval_form(&mut rt, &[funcall, quoted, int(21)]);
        assert_eq!(out, int(42));
    }

    #[test]
    fn test_defmacro_defines_working_macro() {
        let mut rt = Runtime::new();
        // (defmacro ignore-first (a b) b): expands (ignore-first X Y) to
        // the unevaluated form bound to b... which is Y itself.
        let defmacro = rt.intern(b"defmacro");
        let (name, a, b) = (rt.intern(b"ignore-first"), rt.intern(b"a"), rt.intern(b"b"));
        let params = rt.list(&[a, b]);
        eval_form(&mut rt, &[defmacro, name, params, b]);
        assert!(!rt.has_error());
        assert!(rt.symbol_is_macro(name));

        // (ignore-first zzz 7) evaluates to 7; zzz is never evaluated as
        // a call even though it has no function binding.
        let zzz = rt.intern(b"zzz");
        let out = eval_form(&mut rt, &[name, zzz, int(7)]);
        assert_eq!(out, int(7));
        assert!(!rt.has_error());
    }

    #[test]
    fn test_eval_native() {
        let mut rt = Runtime::new();
        // (eval (quote (+ 1 2))) => 3
        let eval_sym = rt.intern(b"eval");
        let quote = rt.well_known.quote;
        let plus = rt.intern(b"+");
        let sum = rt.list(&[plus, int(1), int(2)]);
        let quoted = rt.list(&[quote, sum]);
        let out = eval_form(&mut rt, &[eval_sym, quoted]);
        assert_eq!(out, int(3));
    }

    #[test]
    fn test_and_macro() {
        let mut rt = Runtime::new();
        let and = rt.intern(b"and");
        assert_eq!(eval_form(&mut rt, &[and, int(1), int(2), int(3)]), int(3));
        assert_eq!(eval_form(&mut rt, &[and, int(1), NIL, int(3)]), NIL);
        assert_eq!(eval_form(&mut rt, &[and]), NIL);
        assert_eq!(eval_form(&mut rt, &[and, int(5)]), int(5));
    }

    #[test]
    fn test_let_binds_locally() {
        let mut rt = Runtime::new();
        // (let ((x 10) (y 32)) (+ x y)) => 42
        let let_ = rt.intern(b"let");
        let (x, y, plus) = (rt.intern(b"let-x"), rt.intern(b"let-y"), rt.intern(b"+"));
        let b1 = rt.list(&[x, int(10)]);
        let b2 = rt.list(&[y, int(32)]);
        let binds = rt.list(&[b1, b2]);
        let body = rt.list(&[plus, x, y]);
        let out = eval_form(&mut rt, &[let_, binds, body]);
        assert_eq!(out, int(42));
        // The bindings do not leak.
        assert_eq!(rt.get(x), NIL);
        assert_eq!(rt.get(y), NIL);
    }

    #[test]
    fn test_truthful() {
        assert!(!truthful(NIL));
        assert!(truthful(int(0)));
        assert!(truthful(int(1)));
    }
}
