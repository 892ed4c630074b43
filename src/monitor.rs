//! Foreground monitor and resume loop (spec.md §4.5).
//!
//! Once a job is in slot 0, the monitor hands it the controlling
//! terminal, nudges it with `SIGCONT` in case it was created already
//! stopped, then samples its aggregate state in a block/sleep/drain loop
//! until it either finishes or stops. `fg`/`bg` share the same resume
//! primitive from `builtins.rs`.

use crate::job::JobState;
use crate::reaper;
use crate::signals::{self, ForegroundTerminalGuard, SignalMaskGuard};
use crate::status;

/// Runs the monitor loop for whatever job currently sits in the
/// foreground slot, returning the shell-style exit code once it
/// finishes, or 0 if it stops and is moved to the background.
pub fn run_foreground(command_text: String) -> i32 {
    let pgid = match reaper::table().lock().unwrap().foreground() {
        Some(job) => job.pgid,
        None => return 0,
    };

    let terminal = match ForegroundTerminalGuard::new(pgid) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("jobsh: {err}");
            return 1;
        }
    };
    if let Err(err) = signals::send_continue(pgid) {
        eprintln!("jobsh: {err}");
    }
    wait_out_resume_race(pgid);

    let code = wait_for_foreground(&command_text);
    drop(terminal);
    code
}

/// Right after `SIGCONT` is sent, the table can still read the job's
/// pre-resume `Stopped` state for a little while — the kernel's
/// `WCONTINUED` notification hasn't reached the reaper yet. Without this,
/// `wait_for_foreground`'s first sample would read that stale `Stopped`
/// and ship the job straight back to the background. Resend `SIGCONT`
/// and block until some signal arrives, same as the original's
/// `while (STOPPED == jobstate(FG)) { kill(SIGCONT); sigsuspend(); }`.
fn wait_out_resume_race(pgid: libc::pid_t) {
    loop {
        let mask = match SignalMaskGuard::block() {
            Ok(mask) => mask,
            Err(_) => return,
        };

        let still_stopped = {
            let table = reaper::table().lock().unwrap();
            table.foreground().map(|job| job.state()) == Some(JobState::Stopped)
        };
        if !still_stopped {
            return;
        }

        let _ = signals::send_continue(pgid);
        signals::unblock_and_wait();
        drop(mask);
    }
}

fn wait_for_foreground(command_text: &str) -> i32 {
    loop {
        let mask = match SignalMaskGuard::block() {
            Ok(mask) => mask,
            Err(err) => {
                eprintln!("jobsh: {err}");
                return 1;
            }
        };

        let mut table = reaper::table().lock().unwrap();
        let state = match table.foreground() {
            Some(job) => job.state(),
            None => return 0,
        };

        match state {
            JobState::Finished => {
                let job = table.take_foreground().expect("checked above");
                drop(table);
                drop(mask);
                return job
                    .exit_status()
                    .and_then(status::exit_code_from_wait_status)
                    .unwrap_or(0);
            }
            JobState::Stopped => {
                let job = table.take_foreground().expect("checked above");
                let id = table.insert_background(job);
                println!("[{id}] suspended '{command_text}'");
                drop(table);
                drop(mask);
                return 0;
            }
            JobState::Running => {
                drop(table);
                signals::unblock_and_wait();
                drop(mask);
            }
        }
    }
}

/// Shared resume path for the `fg` and `bg` builtins: sends `SIGCONT` to
/// the job's group, and for `fg` moves it into the foreground slot and
/// re-enters the monitor loop. The lookup and signal delivery happen
/// with `SIGCHLD` blocked (spec.md §4.2), so the reaper can't reap the
/// job out from under this function between the two.
pub fn resume(id: usize, foreground: bool) -> Result<i32, String> {
    let mask = SignalMaskGuard::block().map_err(|err| format!("jobsh: {err}"))?;

    let (pgid, command_text) = {
        let table = reaper::table().lock().unwrap();
        let job = table
            .get(id)
            .ok_or_else(|| format!("jobsh: fg/bg: no such job %{id}"))?;
        (job.pgid, job.command.clone())
    };

    signals::send_continue(pgid).map_err(|err| format!("jobsh: {err}"))?;

    if !foreground {
        if let Some(job) = reaper::table().lock().unwrap().get_mut(id) {
            for process in &mut job.processes {
                process.state = crate::job::ProcessState::Running;
            }
        }
        drop(mask);
        println!("[{id}] continue '{command_text}'");
        return Ok(0);
    }

    let job = reaper::table()
        .lock()
        .unwrap()
        .remove(id)
        .ok_or_else(|| format!("jobsh: fg: no such job %{id}"))?;
    reaper::table().lock().unwrap().set_foreground(job);
    drop(mask);
    println!("[{id}] continue '{command_text}'");
    Ok(run_foreground(command_text))
}
