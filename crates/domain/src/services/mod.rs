//! Shared service helpers such as the cursor store, command cooldowns and
//! telemetry wiring.

pub mod cooldown;
pub mod cursor;
pub mod telemetry;

pub use cooldown::*;
pub use cursor::*;
pub use telemetry::*;
