//! Signal masking and terminal-ownership primitives (spec.md §5).
//!
//! `SignalMaskGuard` is the critical-section primitive: block `SIGCHLD`
//! on construction, restore the previous mask on `Drop`. `unblock_and_wait`
//! is the only blocking wait primitive anywhere in the shell — it puts
//! `SIGCHLD` back, sleeps until a signal arrives, and restores the mask,
//! all as one atomic kernel operation (`sigsuspend`), so a signal that
//! arrives between "check state" and "go to sleep" is never missed.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::reaper;

/// Set by the installed `SIGINT` handler; polled by the main loop right
/// after a blocking line-read returns (spec.md §9: Rust has no
/// `setjmp`/`longjmp`, so interrupt recovery is a polled flag instead).
pub static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Installs the shell's own signal dispositions: ignore the job-control
/// signals a shell must never react to directly, take over `SIGINT` for
/// prompt-recovery, and install the real reaper.
pub fn install_shell_dispositions() -> io::Result<()> {
    unsafe {
        ignore(libc::SIGTTOU)?;
        ignore(libc::SIGTTIN)?;
        ignore(libc::SIGTSTP)?;
        ignore(libc::SIGQUIT)?;
    }

    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handle_sigint as usize;
    action.sa_flags = libc::SA_RESTART;
    unsafe {
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    reaper::install()
}

unsafe fn ignore(signal: libc::c_int) -> io::Result<()> {
    let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
    if previous == libc::SIG_ERR {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Blocks `SIGCHLD` for the lifetime of the guard, restoring the prior
/// mask on drop. Any `SIGCHLD` flagged by the handler before or during
/// the critical section is drained on construction so the job table
/// reflects reality before the caller reads it.
pub struct SignalMaskGuard {
    previous: libc::sigset_t,
}

impl SignalMaskGuard {
    pub fn block() -> io::Result<Self> {
        let mut set: libc::sigset_t = unsafe { std::mem::zeroed() };
        let mut previous: libc::sigset_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGCHLD);
            if libc::sigprocmask(libc::SIG_BLOCK, &set, &mut previous) != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        reaper::drain_pending();
        Ok(SignalMaskGuard { previous })
    }
}

impl Drop for SignalMaskGuard {
    fn drop(&mut self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.previous, std::ptr::null_mut());
        }
    }
}

/// The race-free "unblock and sleep until a signal arrives" primitive.
/// Must only be called while `SIGCHLD` is blocked (i.e. while a
/// `SignalMaskGuard` is held) — `sigsuspend` temporarily installs an
/// empty mask, waits for any signal, then restores the caller's mask.
pub fn unblock_and_wait() {
    let empty: libc::sigset_t = unsafe { std::mem::zeroed() };
    unsafe {
        libc::sigsuspend(&empty);
    }
    reaper::drain_pending();
}

/// Hands the controlling terminal to `target_pgid` on construction,
/// reclaims it for the shell's own process group on drop.
pub struct ForegroundTerminalGuard {
    shell_pgid: libc::pid_t,
}

impl ForegroundTerminalGuard {
    pub fn new(target_pgid: libc::pid_t) -> io::Result<Self> {
        let shell_pgid = unsafe { libc::getpgrp() };
        let guard = ForegroundTerminalGuard { shell_pgid };
        set_terminal_foreground(target_pgid)?;
        Ok(guard)
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        let _ = set_terminal_foreground(self.shell_pgid);
    }
}

/// No-op when stdin isn't a terminal, so integration tests over piped
/// stdin never touch `tcsetpgrp`.
pub fn set_terminal_foreground(pgid: libc::pid_t) -> io::Result<()> {
    if unsafe { libc::isatty(libc::STDIN_FILENO) } != 1 {
        return Ok(());
    }

    loop {
        let rc = unsafe { libc::tcsetpgrp(libc::STDIN_FILENO, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::ENOTTY) | Some(libc::ESRCH) => return Ok(()),
            _ => return Err(err),
        }
    }
}

pub fn send_continue(pgid: libc::pid_t) -> io::Result<()> {
    send_signal(pgid, libc::SIGCONT)
}

pub fn send_terminate(pgid: libc::pid_t) -> io::Result<()> {
    send_signal(pgid, libc::SIGTERM)
}

fn send_signal(pgid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::kill(-pgid, signal) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::ESRCH) => return Ok(()),
            _ => return Err(err),
        }
    }
}
