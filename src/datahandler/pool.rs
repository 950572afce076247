//! Generic object pool
//!
//! Used for connections: checkout hands out an idle object or creates a new
//! one while the pool is below its maximum size. The returned guard checks
//! the object back in when dropped.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};

type Factory<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

struct Slots<T> {
    idle: Vec<T>,
    /// Objects created and not discarded, checked out or idle
    total: usize,
}

/// A bounded pool of reusable objects
pub struct Pool<T> {
    slots: Mutex<Slots<T>>,
    max_size: usize,
    factory: Factory<T>,
}

impl<T> Pool<T> {
    /// Create a pool that builds objects with `factory`
    pub fn new<F>(max_size: usize, factory: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            slots: Mutex::new(Slots {
                idle: Vec::new(),
                total: 0,
            }),
            max_size,
            factory: Box::new(factory),
        }
    }

    /// Maximum number of live objects
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of idle objects
    pub fn idle(&self) -> usize {
        self.slots.lock().idle.len()
    }

    /// Number of live objects, idle or checked out
    pub fn size(&self) -> usize {
        self.slots.lock().total
    }

    /// Take an object from the pool
    pub fn checkout(&self) -> Result<Pooled<'_, T>> {
        let mut slots = self.slots.lock();
        if let Some(item) = slots.idle.pop() {
            trace!(idle = slots.idle.len(), "pooled object reused");
            return Ok(Pooled {
                pool: self,
                item: Some(item),
            });
        }
        if slots.total >= self.max_size {
            return Err(Error::PoolExhausted(format!(
                "all {} objects are checked out",
                self.max_size
            )));
        }
        let item = (self.factory)()?;
        slots.total += 1;
        trace!(size = slots.total, "pooled object created");
        Ok(Pooled {
            pool: self,
            item: Some(item),
        })
    }

    fn checkin(&self, item: T) {
        self.slots.lock().idle.push(item);
    }

    fn forget(&self) {
        let mut slots = self.slots.lock();
        slots.total = slots.total.saturating_sub(1);
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("Pool")
            .field("max_size", &self.max_size)
            .field("total", &slots.total)
            .field("idle", &slots.idle.len())
            .finish()
    }
}

/// Checked-out object; returns to the pool on drop
pub struct Pooled<'p, T> {
    pool: &'p Pool<T>,
    item: Option<T>,
}

impl<T> Pooled<'_, T> {
    /// Drop the object instead of returning it, freeing its slot
    pub fn discard(mut self) {
        self.item = None;
        self.pool.forget();
    }
}

impl<T: fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled").field("item", &self.item).finish()
    }
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `discard` and `drop` empty the slot, and both consume the guard
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled object used after release"),
        }
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled object used after release"),
        }
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            self.pool.checkin(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_pool(max_size: usize) -> (Pool<usize>, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let pool = Pool::new(max_size, move || Ok(counter.fetch_add(1, Ordering::SeqCst)));
        (pool, created)
    }

    #[test]
    fn test_checkin_on_drop_and_reuse() {
        let (pool, created) = counting_pool(2);
        {
            let first = pool.checkout().unwrap();
            assert_eq!(*first, 0);
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);
        let again = pool.checkout().unwrap();
        assert_eq!(*again, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhausted() {
        let (pool, _) = counting_pool(2);
        let a = pool.checkout().unwrap();
        let b = pool.checkout().unwrap();
        let err = pool.checkout().unwrap_err();
        assert!(matches!(err, Error::PoolExhausted(_)));
        drop(a);
        assert!(pool.checkout().is_ok());
        drop(b);
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_debug_output() {
        let (pool, _) = counting_pool(1);
        let item = pool.checkout().unwrap();
        assert_eq!(format!("{:?}", item), "Pooled { item: Some(0) }");
        drop(item);
        assert_eq!(format!("{:?}", pool), "Pool { max_size: 1, total: 1, idle: 1 }");
    }

    #[test]
    fn test_discard_frees_slot() {
        let (pool, created) = counting_pool(1);
        pool.checkout().unwrap().discard();
        assert_eq!(pool.size(), 0);
        assert_eq!(pool.idle(), 0);
        assert_eq!(*pool.checkout().unwrap(), 1);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_factory_error_does_not_take_slot() {
        let pool: Pool<u8> = Pool::new(1, || Err(Error::Database("down".to_string())));
        assert!(pool.checkout().is_err());
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn test_shared_between_threads() {
        let (pool, _) = counting_pool(4);
        let pool = Arc::new(pool);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    let mut item = pool.checkout().unwrap();
                    *item += 100;
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.size() <= 4);
        assert_eq!(pool.idle(), pool.size());
    }
}
