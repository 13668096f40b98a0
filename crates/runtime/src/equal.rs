//! Structural equality
//!
//! `eq` is raw word equality and lives on `Value` itself (`==`). `equal`
//! compares structure: pairs recurse, arrays compare elementwise, bytes
//! compare contents, closures compare their parts, natives compare
//! function pointers.

use karst_core::{Sort, Value};

use crate::heap::Heavy;
use crate::runtime::Runtime;

impl Runtime {
    /// Structural equality.
    pub fn equal(&mut self, a: Value, b: Value) -> bool {
        if a.sort() != b.sort() {
            return false;
        }
        match a.sort() {
            Sort::Double | Sort::Integer | Sort::Symbol => a == b,
            Sort::Ref => {
                if a == b {
                    return true;
                }
                let (ha, hb) = match (self.deref(a), self.deref(b)) {
                    (Some(ha), Some(hb)) => (ha, hb),
                    _ => {
                        self.fail("bad ref");
                        return false;
                    }
                };
                match (ha, hb) {
                    (Heavy::Cell(x), Heavy::Cell(y)) => {
                        let (x, y) = (*x, *y);
                        self.equal(x, y)
                    }
                    (
                        Heavy::Cons { car: ca, cdr: da },
                        Heavy::Cons { car: cb, cdr: db },
                    ) => {
                        let (ca, da, cb, db) = (*ca, *da, *cb, *db);
                        self.equal(ca, cb) && self.equal(da, db)
                    }
                    (Heavy::Array(xs), Heavy::Array(ys)) => {
                        if xs.len() != ys.len() {
                            return false;
                        }
                        let pairs: Vec<(Value, Value)> =
                            xs.iter().copied().zip(ys.iter().copied()).collect();
                        pairs.into_iter().all(|(x, y)| self.equal(x, y))
                    }
                    (Heavy::Bytes { .. }, Heavy::Bytes { .. }) => {
                        self.bytes_slice(a) == self.bytes_slice(b)
                    }
                    (
                        Heavy::Func { params: pa, env: ea, body: ba },
                        Heavy::Func { params: pb, env: eb, body: bb },
                    ) => {
                        let (pa, ea, ba, pb, eb, bb) = (*pa, *ea, *ba, *pb, *eb, *bb);
                        self.equal(pa, pb) && self.equal(ea, eb) && self.equal(ba, bb)
                    }
                    (Heavy::Native(f), Heavy::Native(g)) => std::ptr::fn_addr_eq(*f, *g),
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use karst_core::NIL;

    #[test]
    fn test_equal_on_words() {
        let mut rt = Runtime::new();
        assert!(rt.equal(Value::integer(4), Value::integer(4)));
        assert!(!rt.equal(Value::integer(4), Value::integer(5)));
        let d = Value::double(2.5).unwrap();
        assert!(rt.equal(d, d));
        // Same numeric value, different sort.
        assert!(!rt.equal(Value::integer(2), Value::double(2.0).unwrap()));
    }

    #[test]
    fn test_equal_on_distinct_conses() {
        let mut rt = Runtime::new();
        let a = rt.list(&[Value::integer(1), Value::integer(2)]);
        let b = rt.list(&[Value::integer(1), Value::integer(2)]);
        assert_ne!(a, b); // not eq
        assert!(rt.equal(a, b)); // but equal
        let c = rt.list(&[Value::integer(1), Value::integer(3)]);
        assert!(!rt.equal(a, c));
    }

    #[test]
    fn test_equal_on_bytes() {
        let mut rt = Runtime::new();
        let a = rt.bytes_new(b"abc");
        let b = rt.bytes_new(b"abc");
        let c = rt.bytes_new(b"abd");
        assert!(rt.equal(a, b));
        assert!(!rt.equal(a, c));
    }

    #[test]
    fn test_equal_on_arrays() {
        let mut rt = Runtime::new();
        let a = rt.array_new(vec![Value::integer(1), Value::integer(2)]);
        let b = rt.array_new(vec![Value::integer(1), Value::integer(2)]);
        let short = rt.array_new(vec![Value::integer(1)]);
        assert!(rt.equal(a, b));
        assert!(!rt.equal(a, short));
    }

    #[test]
    fn test_equal_on_natives() {
        let mut rt = Runtime::new();
        fn one(_: &mut Runtime, _: Value) -> Value {
            Value::integer(1)
        }
        fn two(_: &mut Runtime, _: Value) -> Value {
            Value::integer(2)
        }
        let a = rt.native_new(one);
        let b = rt.native_new(one);
        let c = rt.native_new(two);
        assert!(rt.equal(a, b));
        assert!(!rt.equal(a, c));
    }

    #[test]
    fn test_equal_mixed_heavy_sorts() {
        let mut rt = Runtime::new();
        let pair = rt.cons(NIL, NIL);
        let bytes = rt.bytes_new(b"");
        assert!(!rt.equal(pair, bytes));
    }
}
