//! Cons cells and list utilities

use karst_core::{NIL, Value};

use crate::heap::Heavy;
use crate::runtime::Runtime;

/// Truth test: everything except nil is true.
pub fn truthful(v: Value) -> bool {
    v != NIL
}

impl Runtime {
    /// Allocate a pair.
    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        self.heavy_new(Heavy::Cons { car, cdr })
    }

    /// First element of a pair. Non-cons values yield nil quietly; a
    /// malformed ref records an error.
    pub fn car(&mut self, v: Value) -> Value {
        if !v.is_reference() {
            return NIL;
        }
        match self.deref(v) {
            Some(Heavy::Cons { car, .. }) => *car,
            Some(_) => NIL,
            None => {
                self.fail("bad ref");
                NIL
            }
        }
    }

    /// Rest of a pair; same conventions as [`Runtime::car`].
    pub fn cdr(&mut self, v: Value) -> Value {
        if !v.is_reference() {
            return NIL;
        }
        match self.deref(v) {
            Some(Heavy::Cons { cdr, .. }) => *cdr,
            Some(_) => NIL,
            None => {
                self.fail("bad ref");
                NIL
            }
        }
    }

    /// Overwrite the car of a pair. Fails on frozen pairs.
    pub fn setcar(&mut self, v: Value, new: Value) {
        if self.ref_frozen(v) {
            self.fail("attempted to mutate frozen object");
            return;
        }
        match self.deref_mut(v) {
            Some(Heavy::Cons { car, .. }) => *car = new,
            Some(_) => self.fail("setcar on non-cons value"),
            None => self.fail("bad ref"),
        }
    }

    /// Overwrite the cdr of a pair. Fails on frozen pairs.
    pub fn setcdr(&mut self, v: Value, new: Value) {
        if self.ref_frozen(v) {
            self.fail("attempted to mutate frozen object");
            return;
        }
        match self.deref_mut(v) {
            Some(Heavy::Cons { cdr, .. }) => *cdr = new,
            Some(_) => self.fail("setcdr on non-cons value"),
            None => self.fail("bad ref"),
        }
    }

    /// Build a proper list from `items`.
    pub fn list(&mut self, items: &[Value]) -> Value {
        let mut ret = NIL;
        for &item in items.iter().rev() {
            ret = self.cons(item, ret);
        }
        ret
    }

    /// `xs ++ ys` without mutating either input. The spine of `xs` is
    /// copied; `ys` is shared.
    pub fn append(&mut self, xs: Value, ys: Value) -> Value {
        let items = self.list_items(xs);
        let mut ret = ys;
        for &item in items.iter().rev() {
            ret = self.cons(item, ret);
        }
        ret
    }

    /// Reverse a proper list.
    pub fn reverse(&mut self, xs: Value) -> Value {
        let mut ret = NIL;
        let mut cur = xs;
        while self.is_cons(cur) {
            let head = self.car(cur);
            ret = self.cons(head, ret);
            cur = self.cdr(cur);
        }
        ret
    }

    /// Identity membership: the canonical truth symbol if some element of
    /// `xs` is `eq` to `needle`, nil otherwise.
    pub fn contains_eq(&mut self, needle: Value, xs: Value) -> Value {
        let mut cur = xs;
        while self.is_cons(cur) {
            if self.car(cur) == needle {
                return self.well_known.t;
            }
            cur = self.cdr(cur);
        }
        NIL
    }

    /// Number of pairs in the spine of a proper list.
    pub fn list_len(&mut self, xs: Value) -> usize {
        let mut n = 0;
        let mut cur = xs;
        while self.is_cons(cur) {
            n += 1;
            cur = self.cdr(cur);
        }
        n
    }

    /// Collect the elements of a proper list. An improper tail is ignored.
    pub(crate) fn list_items(&mut self, xs: Value) -> Vec<Value> {
        let mut items = Vec::new();
        let mut cur = xs;
        while self.is_cons(cur) {
            items.push(self.car(cur));
            cur = self.cdr(cur);
        }
        items
    }
}
