//! Thread-local storage as an explicit registry: a map from [`ThreadId`] to the
//! thread's private instance.
//!
//! Every declared [`ThreadLocal`] keeps its own map, so two variables of the
//! same type never share an instance. The first touch from a thread installs an
//! exit hook in that thread which evicts its instances once it terminates.

use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

type Slots<T> = Mutex<HashMap<ThreadId, T>>;

pub struct ThreadLocal<T> {
    init: fn() -> T,
    slots: OnceLock<Slots<T>>,
}

impl<T: Send + 'static> ThreadLocal<T> {
    pub const fn new(init: fn() -> T) -> Self {
        Self {
            init,
            slots: OnceLock::new(),
        }
    }

    fn slots(&self) -> &Slots<T> {
        self.slots.get_or_init(|| Mutex::new(HashMap::new()))
    }

    /// Runs `caller` with the calling thread's instance, creating it on first touch.
    ///
    /// The registry stays locked while `caller` runs, so `caller` must not touch
    /// this same variable again.
    pub fn with<R>(&'static self, caller: impl FnOnce(&T) -> R) -> R {
        let thread_id = thread::current().id();
        let mut map = self.slots().lock().unwrap_or_else(PoisonError::into_inner);
        let value = match map.entry(thread_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                // Fails only while this thread is already tearing down its
                // locals; the instance then outlives the thread.
                let _ = EXIT_HOOK.try_with(|hook| hook.watch(self));
                entry.insert((self.init)())
            }
        };
        caller(value)
    }

    /// Number of threads currently holding an instance.
    pub fn instances(&self) -> usize {
        self.slots()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

trait Evict {
    fn evict(&self, thread_id: ThreadId);
}

impl<T: Send + 'static> Evict for ThreadLocal<T> {
    fn evict(&self, thread_id: ThreadId) {
        let value = self
            .slots()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&thread_id);
        drop(value);
    }
}

struct ExitHook {
    thread_id: ThreadId,
    watched: RefCell<Vec<&'static dyn Evict>>,
}

impl ExitHook {
    fn watch(&self, registry: &'static dyn Evict) {
        self.watched.borrow_mut().push(registry);
    }
}

impl Drop for ExitHook {
    fn drop(&mut self) {
        for registry in self.watched.get_mut().drain(..) {
            registry.evict(self.thread_id);
        }
    }
}

thread_local! {
    static EXIT_HOOK: ExitHook = ExitHook {
        thread_id: thread::current().id(),
        watched: RefCell::new(Vec::new()),
    };
}

#[cfg(test)]
mod tests {
    use crate::thread_local_simple::ThreadLocal;
    use std::cell::{Cell, RefCell};
    use std::thread::spawn;

    #[test]
    fn each_thread_sees_its_own_value() {
        static RNG: ThreadLocal<RefCell<u32>> = ThreadLocal::new(|| RefCell::new(1));

        fn increment() {
            RNG.with(|c| {
                *c.borrow_mut() += 1;
            })
        }

        fn counter_value() -> u32 {
            RNG.with(|c| *c.borrow())
        }

        let handles = (1..5)
            .map(|_| {
                spawn(move || {
                    for _ in 0..10 {
                        increment();
                    }
                    counter_value()
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 11);
        }

        assert_eq!(counter_value(), 1);
    }

    #[test]
    fn instance_is_evicted_when_thread_exits() {
        static SLOT: ThreadLocal<Cell<u64>> = ThreadLocal::new(|| Cell::new(0));

        spawn(|| {
            SLOT.with(|c| c.set(3));
            assert_eq!(SLOT.instances(), 1);
        })
        .join()
        .unwrap();

        assert_eq!(SLOT.instances(), 0);
    }

    #[test]
    fn variables_of_the_same_type_do_not_alias() {
        static A: ThreadLocal<Cell<u64>> = ThreadLocal::new(|| Cell::new(0));
        static B: ThreadLocal<Cell<u64>> = ThreadLocal::new(|| Cell::new(0));

        A.with(|c| c.set(5));
        assert_eq!(B.with(Cell::get), 0);
        assert_eq!(A.with(Cell::get), 5);
    }
}
