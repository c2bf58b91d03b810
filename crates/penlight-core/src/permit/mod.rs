//! Permit pool for bounding concurrent work.
//!
//! A `PermitPool` hands out at most `capacity` permits at a time:
//! - `try_acquire()` takes a permit only if one is free and nobody is queued
//! - `acquire()` waits in FIFO order behind earlier callers
//! - dropping a `Permit` returns it to the pool and wakes the queue head
//! - `close()` fails every waiting and future `acquire()`

mod pool;

pub use pool::{Permit, PermitError, PermitPool, SlotId};
