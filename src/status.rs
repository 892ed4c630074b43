/// Formats a finished job's report line (spec.md §8 end-to-end scenarios
/// 2 and 5): `[id] exited 'cmd', status=N` for a normal exit, `[id]
/// killed 'cmd' by signal N` for a signal termination.
pub fn describe_finished(id: usize, command: &str, raw_status: Option<libc::c_int>) -> String {
    match raw_status {
        Some(raw) if unsafe { libc::WIFSIGNALED(raw) } => {
            let signal = unsafe { libc::WTERMSIG(raw) };
            format!("[{id}] killed '{command}' by signal {signal}")
        }
        Some(raw) => {
            let code = unsafe { libc::WEXITSTATUS(raw) };
            format!("[{id}] exited '{command}', status={code}")
        }
        None => format!("[{id}] exited '{command}', status=0"),
    }
}

#[cfg(unix)]
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if unsafe { libc::WIFEXITED(raw_status) } {
        return Some(unsafe { libc::WEXITSTATUS(raw_status) });
    }

    if unsafe { libc::WIFSIGNALED(raw_status) } {
        let signal = unsafe { libc::WTERMSIG(raw_status) };
        return Some(128 + signal);
    }

    None
}
