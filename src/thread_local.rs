//! Thread-local storage built on POSIX thread-specific data keys.
//!
//! Each [`ThreadLocal`] owns one pthread key. A thread's first access boxes a
//! fresh value from the declared initializer and stores the pointer under the
//! key; the key's destructor frees it when that thread exits.

use libc::{
    c_void, pthread_getspecific, pthread_key_create, pthread_key_delete, pthread_key_t,
    pthread_setspecific,
};
use std::marker::PhantomData;
use std::sync::OnceLock;

pub struct ThreadLocal<T> {
    key: pthread_key_t,
    init: fn() -> T,
    _marker: PhantomData<fn() -> T>,
}

unsafe extern "C" fn destructor<T>(ptr: *mut c_void) {
    if !ptr.is_null() {
        drop(unsafe { Box::from_raw(ptr as *mut T) })
    }
}

impl<T> ThreadLocal<T> {
    /// Allocates a new key. Running out of keys is fatal.
    pub fn new(init: fn() -> T) -> ThreadLocal<T> {
        let mut key: pthread_key_t = 0;
        let ret = unsafe { pthread_key_create(&mut key, Some(destructor::<T>)) };
        assert_eq!(ret, 0, "pthread_key_create failed");
        Self {
            init,
            key,
            _marker: PhantomData,
        }
    }

    /// Runs `caller` with the calling thread's instance, creating it on first touch.
    pub fn with<R>(&self, caller: impl FnOnce(&T) -> R) -> R {
        let ptr = unsafe { pthread_getspecific(self.key) };
        let value_ptr = if ptr.is_null() {
            let raw = Box::into_raw(Box::new((self.init)()));
            let ret = unsafe { pthread_setspecific(self.key, raw as *mut c_void) };
            if ret != 0 {
                drop(unsafe { Box::from_raw(raw) });
                panic!("pthread_setspecific failed: {ret}");
            }
            raw
        } else {
            ptr as *mut T
        };
        // The pointer is only ever stored under this thread's slot, so no other
        // thread can reach it.
        caller(unsafe { &*value_ptr })
    }
}

impl<T> Drop for ThreadLocal<T> {
    // Instances still held by other live threads are leaked, never freed twice.
    fn drop(&mut self) {
        let ptr = unsafe { pthread_getspecific(self.key) };
        unsafe { pthread_key_delete(self.key) };
        if !ptr.is_null() {
            drop(unsafe { Box::from_raw(ptr as *mut T) });
        }
    }
}

/// A `static`-friendly handle that allocates its key on first use.
pub struct LocalKey<T> {
    inner: OnceLock<ThreadLocal<T>>,
    init: fn() -> T,
}

impl<T> LocalKey<T> {
    pub const fn new(init: fn() -> T) -> LocalKey<T> {
        LocalKey {
            inner: OnceLock::new(),
            init,
        }
    }

    fn get(&'static self) -> &'static ThreadLocal<T> {
        self.inner.get_or_init(|| ThreadLocal::new(self.init))
    }

    pub fn with<R>(&'static self, caller: impl FnOnce(&T) -> R) -> R {
        self.get().with(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::{self, spawn};

    #[test]
    fn each_thread_sees_its_own_value() {
        static RNG: LocalKey<RefCell<u32>> = LocalKey::new(|| RefCell::new(1));

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
                    for _ in 0..5 {
                        increment();
                    }
                    counter_value()
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 6);
        }

        assert_eq!(counter_value(), 1);
    }

    #[test]
    fn value_is_dropped_when_thread_exits() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked;

        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let local = ThreadLocal::new(|| Tracked);
        thread::scope(|s| {
            s.spawn(|| local.with(|_| ())).join().unwrap();
        });
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);

        local.with(|_| ());
        drop(local);
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn separate_keys_do_not_alias() {
        let a = ThreadLocal::new(|| Cell::new(0u64));
        let b = ThreadLocal::new(|| Cell::new(0u64));
        a.with(|c| c.set(7));
        assert_eq!(b.with(Cell::get), 0);
        assert_eq!(a.with(Cell::get), 7);
    }
}
