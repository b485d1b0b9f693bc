//! Child-process termination with graceful-to-forceful escalation.

use std::io;
use std::process::Child;
use std::time::{Duration, Instant};

/// Stop a child process, escalating from SIGTERM to SIGKILL.
///
/// Sends a graceful termination signal, waits up to `grace`, then kills.
/// Bounded: never blocks past `grace` plus the kill itself.
pub fn stop_child(child: &mut Child, grace: Duration) -> io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    if send_term(child) && wait_for_exit(child, grace)? {
        return Ok(());
    }

    log::warn!(
        "Engine process {} did not exit within {:?}, killing",
        child.id(),
        grace
    );
    child.kill()?;
    child.wait()?;
    Ok(())
}

/// Send SIGTERM; returns false if the signal could not be delivered.
#[cfg(unix)]
fn send_term(child: &Child) -> bool {
    unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_term(_child: &Child) -> bool {
    // No graceful signal available; fall through to the hard kill.
    false
}

/// Wait for a child to exit, polling at a short interval.
fn wait_for_exit(child: &mut Child, timeout: Duration) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if child.try_wait()?.is_some() {
            return Ok(true);
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    Ok(child.try_wait()?.is_some())
}
