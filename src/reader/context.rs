//! Bounded pool of read contexts.
//!
//! A read context owns a private reopened input stream and the decode
//! buffers reused across block loads. Contexts are created lazily up to the
//! pool bound; once the bound is reached `acquire` blocks until another
//! thread returns one.

use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};

use crate::block::DecodeBuffers;
use crate::store::IndexInput;
use crate::Result;

/// Thread-private decode state.
pub struct ReadContext {
    /// Private stream over the columnstore file.
    pub input: Box<dyn IndexInput>,
    /// Buffers reused across block decodes.
    pub buffers: DecodeBuffers,
}

struct PoolState {
    idle: Vec<ReadContext>,
    created: usize,
}

/// Pool of at most `capacity` read contexts.
pub struct ReadContextPool {
    source: Mutex<Box<dyn IndexInput>>,
    state: Mutex<PoolState>,
    available: Condvar,
    capacity: usize,
}

impl ReadContextPool {
    /// Create a pool over `source`.
    pub fn new(source: Box<dyn IndexInput>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            source: Mutex::new(source),
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(capacity),
                created: 0,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Maximum number of contexts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of contexts created so far.
    pub fn created(&self) -> usize {
        self.state.lock().created
    }

    /// Take a context, waiting if all of them are in use.
    pub fn acquire(&self) -> Result<PooledContext<'_>> {
        let mut state = self.state.lock();
        loop {
            if let Some(ctx) = state.idle.pop() {
                return Ok(PooledContext {
                    pool: self,
                    ctx: Some(ctx),
                });
            }

            if state.created < self.capacity {
                state.created += 1;
                drop(state);
                return match self.create() {
                    Ok(ctx) => Ok(PooledContext {
                        pool: self,
                        ctx: Some(ctx),
                    }),
                    Err(e) => {
                        self.state.lock().created -= 1;
                        self.available.notify_one();
                        Err(e)
                    }
                };
            }

            self.available.wait(&mut state);
        }
    }

    fn create(&self) -> Result<ReadContext> {
        let input = self.source.lock().reopen()?;
        Ok(ReadContext {
            input,
            buffers: DecodeBuffers::new(),
        })
    }

    fn release(&self, ctx: ReadContext) {
        self.state.lock().idle.push(ctx);
        self.available.notify_one();
    }
}

impl std::fmt::Debug for ReadContextPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ReadContextPool")
            .field("capacity", &self.capacity)
            .field("created", &state.created)
            .field("idle", &state.idle.len())
            .finish()
    }
}

/// A context checked out of the pool, returned on drop.
pub struct PooledContext<'a> {
    pool: &'a ReadContextPool,
    ctx: Option<ReadContext>,
}

impl Deref for PooledContext<'_> {
    type Target = ReadContext;

    fn deref(&self) -> &ReadContext {
        // only taken in drop
        self.ctx.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut ReadContext {
        self.ctx.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DataInput, Directory, MemoryDirectory};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn pool(capacity: usize) -> ReadContextPool {
        let dir = MemoryDirectory::new();
        dir.put("f", Bytes::from_static(b"0123456789"));
        ReadContextPool::new(dir.open("f").unwrap(), capacity)
    }

    #[test]
    fn test_contexts_are_reused() {
        let pool = pool(4);
        {
            let mut ctx = pool.acquire().unwrap();
            ctx.input.seek(3).unwrap();
            assert_eq!(ctx.input.read_u8().unwrap(), b'3');
        }
        {
            let _ctx = pool.acquire().unwrap();
        }
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn test_contexts_have_private_streams() {
        let pool = pool(2);
        let mut a = pool.acquire().unwrap();
        let mut b = pool.acquire().unwrap();
        a.input.seek(5).unwrap();
        assert_eq!(b.input.read_u8().unwrap(), b'0');
        assert_eq!(a.input.read_u8().unwrap(), b'5');
        assert_eq!(pool.created(), 2);
    }

    #[test]
    fn test_acquire_blocks_at_capacity() {
        let pool = Arc::new(pool(1));
        let held = pool.acquire().unwrap();
        let acquired = Arc::new(AtomicUsize::new(0));

        let handle = {
            let pool = Arc::clone(&pool);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _ctx = pool.acquire().unwrap();
                acquired.fetch_add(1, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(acquired.load(Ordering::SeqCst), 0);

        drop(held);
        handle.join().unwrap();
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
        assert_eq!(pool.created(), 1);
    }
}
