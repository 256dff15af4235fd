// Instance-tracking payload shared by the integration suites.
//
// Every `Counted` registers a unique id in a thread-local live set when it
// is constructed (including by `clone`) and removes it on drop. Tests use
// this to count constructions, detect leaks and double drops, and inject a
// panic into the Nth upcoming `clone`.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

thread_local! {
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
    static CONSTRUCTED: Cell<usize> = const { Cell::new(0) };
    static LIVE: RefCell<BTreeSet<u64>> = const { RefCell::new(BTreeSet::new()) };
    static CLONES_BEFORE_FAILURE: Cell<Option<usize>> = const { Cell::new(None) };
}

pub const INJECTED: &str = "injected clone failure";

pub struct Counted {
    id: u64,
    pub value: i32,
}

impl Counted {
    pub fn new(value: i32) -> Self {
        let id = NEXT_ID.with(|n| {
            let id = n.get();
            n.set(id + 1);
            id
        });
        CONSTRUCTED.with(|c| c.set(c.get() + 1));
        LIVE.with(|l| l.borrow_mut().insert(id));
        Counted { id, value }
    }
}

impl Clone for Counted {
    fn clone(&self) -> Self {
        CLONES_BEFORE_FAILURE.with(|f| match f.get() {
            Some(0) => {
                f.set(None);
                panic!("{}", INJECTED);
            }
            Some(n) => f.set(Some(n - 1)),
            None => {}
        });
        Counted::new(self.value)
    }
}

impl Drop for Counted {
    fn drop(&mut self) {
        let was_live = LIVE.with(|l| l.borrow_mut().remove(&self.id));
        assert!(was_live, "instance {} dropped twice", self.id);
    }
}

impl fmt::Debug for Counted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl PartialEq for Counted {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Counted {}

impl PartialOrd for Counted {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Counted {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl Hash for Counted {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

pub fn live() -> usize {
    LIVE.with(|l| l.borrow().len())
}

pub fn constructed() -> usize {
    CONSTRUCTED.with(Cell::get)
}

/// Let `n` clones succeed, then panic in the next one.
pub fn fail_clone_after(n: usize) {
    CLONES_BEFORE_FAILURE.with(|f| f.set(Some(n)));
}

pub fn clear_clone_failure() {
    CLONES_BEFORE_FAILURE.with(|f| f.set(None));
}

/// Asserts on drop that every instance alive now is still alive and that
/// nothing created inside the scope outlived it.
pub struct NoNewInstances {
    before: BTreeSet<u64>,
}

impl NoNewInstances {
    pub fn new() -> Self {
        NoNewInstances {
            before: LIVE.with(|l| l.borrow().clone()),
        }
    }
}

impl Drop for NoNewInstances {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        let now = LIVE.with(|l| l.borrow().clone());
        assert_eq!(now, self.before, "live instances changed across scope");
    }
}

/// Counts constructions from the point it was created.
pub struct Constructions(usize);

impl Constructions {
    pub fn start() -> Self {
        Constructions(constructed())
    }

    pub fn since(&self) -> usize {
        constructed() - self.0
    }
}

pub fn counted(values: impl IntoIterator<Item = i32>) -> Vec<Counted> {
    values.into_iter().map(Counted::new).collect()
}

pub fn values<'a>(items: impl IntoIterator<Item = &'a Counted>) -> Vec<i32> {
    items.into_iter().map(|c| c.value).collect()
}

/// Run `f`, expecting it to panic with the injected clone failure.
pub fn expect_injected_panic<R>(f: impl FnOnce() -> R) {
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    clear_clone_failure();
    let err = match res {
        Ok(_) => panic!("expected an injected clone failure"),
        Err(err) => err,
    };
    let msg = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or_default();
    assert_eq!(msg, INJECTED);
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
