//! Domain-level building blocks shared across the API, monitor and storage
//! crates: configuration, the tenant/wallet model, storage traits and the
//! in-process services (cursor store, command cooldowns, telemetry).

pub mod config;
pub mod model;
pub mod services;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use storage::*;
