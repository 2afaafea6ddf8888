//! Storage-facing traits implemented by the persistence adapters and the
//! in-process cursor store.

mod traits;

pub use traits::*;
