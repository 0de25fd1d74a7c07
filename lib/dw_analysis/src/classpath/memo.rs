//! Lazily computed, shareable class properties.

use crate::classpath::errors::{ClassPathError, ClassPathResult};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

/// A memoization cell for a derived class property (interfaces, vtable, field layout).
///
/// The first successful computation is kept for the lifetime of the cell; failures are not
/// cached. A thread that asks for a value it is already computing gets a
/// [`ClassPathError::Cycle`] instead of recursing forever (e.g. on cyclic class hierarchies).
/// Several threads may compute the same value concurrently; the first one stored wins and every
/// caller observes that value.
#[derive(Debug)]
pub(crate) struct Memo<T> {
    value: OnceLock<Arc<T>>,
    computing: Mutex<Vec<ThreadId>>,
}

impl<T> Memo<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: OnceLock::new(),
            computing: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get_or_try_init<F>(&self, what: &str, compute: F) -> ClassPathResult<Arc<T>>
    where
        F: FnOnce() -> ClassPathResult<T>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        let me = thread::current().id();
        {
            let mut computing = self.computing.lock().unwrap_or_else(PoisonError::into_inner);
            if computing.contains(&me) {
                return Err(ClassPathError::Cycle(what.to_string()));
            }
            computing.push(me);
        }

        let result = compute();

        self.computing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id| *id != me);

        let value = result?;
        Ok(self.value.get_or_init(|| Arc::new(value)).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computed_once() {
        let memo: Memo<usize> = Memo::new();
        assert_eq!(*memo.get_or_try_init("a", || Ok(1)).unwrap(), 1);
        assert_eq!(*memo.get_or_try_init("a", || Ok(2)).unwrap(), 1);
    }

    #[test]
    fn test_errors_not_cached() {
        let memo: Memo<usize> = Memo::new();
        assert!(memo
            .get_or_try_init("a", || Err(ClassPathError::UnresolvedClass("La;".into())))
            .is_err());
        assert_eq!(*memo.get_or_try_init("a", || Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_reentrance_is_a_cycle() {
        let memo: Memo<usize> = Memo::new();
        let res = memo.get_or_try_init("La;", || {
            let inner = memo.get_or_try_init("La;", || Ok(0));
            assert!(matches!(inner, Err(ClassPathError::Cycle(_))));
            Ok(5)
        });
        assert_eq!(*res.unwrap(), 5);
    }

    #[test]
    fn test_concurrent_readers_converge() {
        let memo: Arc<Memo<usize>> = Arc::new(Memo::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let memo = memo.clone();
                thread::spawn(move || *memo.get_or_try_init("x", || Ok(i)).unwrap())
            })
            .collect();
        let values: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(values.iter().all(|v| *v == values[0]));
    }
}
