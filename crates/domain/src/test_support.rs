use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_GUARD: Mutex<()> = Mutex::new(());

/// Serializes every test that touches process environment variables. A
/// panicking holder does not wedge the remaining tests.
pub(crate) fn env_lock() -> MutexGuard<'static, ()> {
    ENV_GUARD.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_lock_survives_a_panicking_holder() {
        let handle = std::thread::spawn(|| {
            let _guard = env_lock();
            panic!("holder failed mid-test");
        });
        assert!(handle.join().is_err());

        let _guard = env_lock();
        assert!(ENV_GUARD.is_poisoned());
    }
}
