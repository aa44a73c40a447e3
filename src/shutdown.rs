use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Something the relay loop can poll for a stop request and sleep against.
///
/// Delays go through `wait` so a stop request cuts them short.
pub trait Interrupt {
    fn is_triggered(&self) -> bool;

    /// Sleep for up to `delay`. Returns `false` if interrupted.
    fn wait(&self, delay: Duration) -> bool;
}

/// Process-wide shutdown flag, set from the signal handler.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter.
    pub fn request(&self) {
        let (lock, cvar) = &*self.inner;
        match lock.lock() {
            Ok(mut requested) => *requested = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
        cvar.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        let (lock, _) = &*self.inner;
        match lock.lock() {
            Ok(requested) => *requested,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Interrupt for ShutdownSignal {
    fn is_triggered(&self) -> bool {
        self.is_requested()
    }

    fn wait(&self, delay: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let Ok(guard) = lock.lock() else {
            return false;
        };
        match cvar.wait_timeout_while(guard, delay, |requested| !*requested) {
            Ok((requested, _)) => !*requested,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn wait_runs_full_delay_when_not_requested() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        assert!(signal.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn request_interrupts_wait() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.request();
        });

        let start = Instant::now();
        assert!(!signal.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(signal.is_triggered());
        handle.join().unwrap();
    }
}
