//! Lifecycle of executor child processes.
//!
//! A notebook stage can run for hours and spawns its own kernel. If the
//! runner is interrupted, the whole tree must go with it:
//!
//! - every executor is spawned as the leader of a new process group and
//!   gets `PR_SET_PDEATHSIG` so it dies with its parent
//! - running PIDs are tracked in a global registry
//! - on SIGINT/SIGTERM/SIGHUP (or when the `ProcessGuard` drops) each
//!   tracked group gets SIGTERM, then SIGKILL after a grace period

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

/// Grace period between SIGTERM and SIGKILL on normal shutdown
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shorter grace period when a signal interrupted us
pub const SIGNAL_GRACE: Duration = Duration::from_secs(3);

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// PIDs of executor processes that are still running
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    terminating: bool,
}

impl ChildRegistry {
    /// The process-wide registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!(pid, "tracking executor process");
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!(pid, "executor process finished");
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Stop every tracked process group. Runs at most once per registry.
    pub fn terminate_all(&mut self, grace: Duration) {
        if self.terminating {
            return;
        }
        self.terminating = true;

        if self.pids.is_empty() {
            return;
        }

        let pids: Vec<u32> = self.pids.drain().collect();
        info!(count = pids.len(), "stopping running notebook executors");

        for &pid in &pids {
            signal_tree(pid, Signal::SIGTERM);
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if !pids.iter().any(|&pid| is_process_alive(pid)) {
                info!("executors stopped");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for &pid in pids.iter().filter(|&&pid| is_process_alive(pid)) {
            warn!(pid, "executor ignored SIGTERM, killing");
            signal_tree(pid, Signal::SIGKILL);
        }
    }
}

/// Signal a whole process group, falling back to the leader alone
fn signal_tree(pid: u32, sig: Signal) {
    if let Err(e) = signal::kill(Pid::from_raw(-(pid as i32)), sig) {
        debug!(pid, error = %e, "group signal failed, signalling leader");
        if let Err(e) = signal::kill(Pid::from_raw(pid as i32), sig) {
            warn!(pid, error = %e, signal = ?sig, "could not signal executor");
        }
    }
}

/// Running or sleeping; zombies count as dead
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // state is the first field after the parenthesised command name
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_none_or(|state| !matches!(state, "Z" | "X")),
        Err(_) => true,
    }
}

/// Terminates tracked executors when dropped
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(SHUTDOWN_GRACE);
        }
    }
}

/// Install SIGINT/SIGTERM/SIGHUP handling on a background thread.
///
/// On a signal the running executors are stopped and the process exits
/// with `128 + signal`.
pub fn init_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!(signal = sig, "interrupted, cleaning up");
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(SIGNAL_GRACE);
            }
            // a prompt may hold raw mode; its guard never drops on exit
            crate::prompt::restore_terminal();
            std::process::exit(128 + sig);
        }
    });

    Ok(())
}

/// Spawn configuration for executor processes
pub trait CommandProcessGroup {
    /// Lead a new process group and die with the parent
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        self.process_group(0);
        // SAFETY: prctl is async-signal-safe and touches no parent state
        unsafe {
            self.pre_exec(|| {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        self
    }
}
