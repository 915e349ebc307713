//! Per-worker borrowable sinks with end-of-stream reduction.
//!
//! A [`SinkPool`] hands each worker an owned `T` for the duration of one
//! chunk; the worker mutates it lock-free and returns it before blocking.
//! At end-of-stream the released sinks are drained serially and folded into
//! one value with a caller-supplied associative reduce.
//!
//! Used for trimming statistics (reduce = pointwise add) and for per-worker
//! RNGs (reduce = keep the first; each worker owns its stream).

use parking_lot::Mutex;

struct PoolInner<T> {
    free: Vec<Box<T>>,
    factory: Box<dyn FnMut() -> T + Send>,
}

/// Pool of owned `T` instances protected by a single mutex.
pub struct SinkPool<T> {
    inner: Mutex<PoolInner<T>>,
}

impl<T> SinkPool<T> {
    /// Create a pool that builds sinks on demand with `factory`.
    pub fn new(factory: impl FnMut() -> T + Send + 'static) -> Self {
        Self { inner: Mutex::new(PoolInner { free: Vec::new(), factory: Box::new(factory) }) }
    }

    /// Borrow a sink, building a fresh one if none is free.
    pub fn get(&self) -> Box<T> {
        let mut inner = self.inner.lock();
        match inner.free.pop() {
            Some(sink) => sink,
            None => Box::new((inner.factory)()),
        }
    }

    /// Release a sink back to the pool.
    pub fn put(&self, sink: Box<T>) {
        self.inner.lock().free.push(sink);
    }

    /// Drain every released sink and fold them into one value.
    ///
    /// Must only be called once all workers have returned their sinks; any
    /// sink still borrowed is not included. An empty pool yields a freshly
    /// built value.
    pub fn finalize(&self, mut reduce: impl FnMut(&mut T, T)) -> Box<T> {
        let mut inner = self.inner.lock();
        let mut drained = std::mem::take(&mut inner.free);
        let mut result = match drained.pop() {
            Some(sink) => sink,
            None => Box::new((inner.factory)()),
        };
        for sink in drained {
            reduce(&mut result, *sink);
        }
        result
    }
}
