//! Stoppable worker threads.

use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Shutdown signal shared between a `ThreadHandle` and its thread.
pub struct Signal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl Signal {
    fn new() -> Signal {
        Signal {
            stopped: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    fn stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(|p| p.into_inner());
        *stopped = true;
        self.cvar.notify_all();
    }

    /// Whether shutdown has been requested.
    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Block for up to `timeout`, returning early on shutdown.
    ///
    /// Returns true if shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock().unwrap_or_else(|p| p.into_inner());
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            stopped = match self.cvar.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *stopped
    }
}

/// Handle to a thread that runs until told to stop.
pub struct ThreadHandle {
    /// JoinHandle for the executing thread.
    handle: thread::JoinHandle<()>,

    /// Shutdown signal the thread is expected to poll.
    signal: Arc<Signal>,
}

impl ThreadHandle {
    /// Join the given Thread, blocking until it exits.
    ///
    /// Returns false if the thread panicked.
    pub fn join(self) -> bool {
        self.handle.join().is_ok()
    }

    /// Gracefully shutdown the given Thread, blocking until it exits.
    ///
    /// Note - It is the responsibility of the developer to ensure that thread
    /// logic polls the `Signal` it was handed.
    pub fn shutdown(self) -> bool {
        self.signal.stop();
        self.join()
    }
}

/// Spawns a new named thread executing the provided closure.
///
/// Fails only when the operating system refuses to create the thread.
pub fn spawn<F>(name: &str, f: F) -> io::Result<ThreadHandle>
where
    F: Send + 'static + FnOnce(&Signal),
{
    let signal = Arc::new(Signal::new());
    let thread_signal = Arc::clone(&signal);
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || f(&thread_signal))?;

    Ok(ThreadHandle {
        handle: handle,
        signal: signal,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn shutdown_stops_loop_and_joins() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let thread_ticks = Arc::clone(&ticks);
        let handle = spawn("ticker", move |signal| {
            while !signal.is_stopped() {
                thread_ticks.fetch_add(1, Ordering::SeqCst);
                if signal.wait(Duration::from_millis(5)) {
                    break;
                }
            }
        }).unwrap();

        while ticks.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.shutdown());
        let after = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(after, ticks.load(Ordering::SeqCst));
    }

    #[test]
    fn shutdown_interrupts_long_wait() {
        let handle = spawn("sleeper", |signal| {
            signal.wait(Duration::from_secs(3_600));
        }).unwrap();

        let start = Instant::now();
        assert!(handle.shutdown());
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn wait_times_out_without_shutdown() {
        let signal = Signal::new();
        assert!(!signal.wait(Duration::from_millis(10)));
        assert!(!signal.is_stopped());
        signal.stop();
        assert!(signal.wait(Duration::from_secs(3_600)));
    }

    #[test]
    fn join_reports_panic() {
        let handle = spawn("doomed", |_| panic!("boom")).unwrap();
        assert!(!handle.join());
    }
}
