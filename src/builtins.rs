//! Builtins (spec.md §4.2): resolved by exact match on the first argv
//! word before any fork happens, and only when the command is a single
//! stage — none of these run inside a pipeline.

use crate::job::JobState;
use crate::monitor;
use crate::reaper;
use crate::signals::{self, SignalMaskGuard};
use crate::status;

const BUILTINS: &[&str] = &["quit", "cd", "jobs", "fg", "bg", "kill"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Runs `argv[0]` as a builtin if it is one. `None` means "not a
/// builtin" — the caller falls through to the launcher.
pub fn dispatch(argv: &[String]) -> Option<i32> {
    let (name, args) = argv.split_first()?;
    match name.as_str() {
        "quit" => Some(builtin_quit()),
        "cd" => Some(builtin_cd(args)),
        "jobs" => Some(builtin_jobs()),
        "fg" => Some(builtin_resume(args, true)),
        "bg" => Some(builtin_resume(args, false)),
        "kill" => builtin_kill(args),
        _ => None,
    }
}

/// `cd` (spec.md §4.2 / spec.md:63): a leading `~/` is replaced with
/// `$HOME/`; with no argument, changes to `$HOME`. `HOME` unset is an
/// error in both cases — cwd is left unchanged (spec.md:178).
fn builtin_cd(args: &[String]) -> i32 {
    let target = match args.first() {
        Some(dir) => match dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{home}/{rest}"),
                Err(err) => {
                    eprintln!("cd: {err}: {dir}");
                    return 1;
                }
            },
            None => dir.clone(),
        },
        None => match std::env::var("HOME") {
            Ok(home) => home,
            Err(err) => {
                eprintln!("cd: {err}: HOME");
                return 1;
            }
        },
    };

    if let Err(err) = std::env::set_current_dir(&target) {
        eprintln!("cd: {err}: {target}");
        return 1;
    }
    0
}

/// `quit` shuts the shell down: every tracked job, foreground and
/// background, is sent `SIGTERM` and reaped before exit, and each job's
/// finish is reported the same way the end-of-prompt watcher reports a
/// background job finishing (spec.md §4.6 "Shutdown sequence" — both the
/// `quit` and EOF paths print terminated jobs before the shell exits).
fn builtin_quit() -> ! {
    let mask = SignalMaskGuard::block().expect("blocking SIGCHLD for shutdown");
    let pgids: Vec<libc::pid_t> = {
        let table = reaper::table().lock().unwrap();
        let mut pgids: Vec<libc::pid_t> = table.foreground().map(|j| j.pgid).into_iter().collect();
        pgids.extend(table.jobs_sorted().into_iter().map(|(_, job)| job.pgid));
        pgids
    };

    for pgid in pgids {
        let _ = signals::send_terminate(pgid);
    }

    loop {
        let all_finished = {
            let table = reaper::table().lock().unwrap();
            table.foreground().is_none()
                && table
                    .jobs_sorted()
                    .into_iter()
                    .all(|(_, job)| job.state() == JobState::Finished)
        };
        if all_finished {
            break;
        }
        signals::unblock_and_wait();
    }

    let finished: Vec<(usize, String, Option<libc::c_int>)> = {
        let table = reaper::table().lock().unwrap();
        table
            .jobs_sorted()
            .into_iter()
            .map(|(id, job)| (id, job.command.clone(), job.exit_status()))
            .collect()
    };
    for (id, command, raw_status) in finished {
        reaper::table().lock().unwrap().remove(id);
        println!("{}", status::describe_finished(id, &command, raw_status));
    }

    drop(mask);
    std::process::exit(0);
}

fn builtin_jobs() -> i32 {
    let table = reaper::table().lock().unwrap();
    for (id, job) in table.jobs_sorted() {
        let label = match job.state() {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Finished => "Done",
        };
        println!("[{id}] {label} {}", job.command);
    }
    0
}

fn resolve_job_id(args: &[String]) -> Result<usize, String> {
    match args.first() {
        Some(arg) => arg
            .strip_prefix('%')
            .unwrap_or(arg)
            .parse::<usize>()
            .map_err(|_| format!("jobsh: no such job: {arg}")),
        None => reaper::table()
            .lock()
            .unwrap()
            .most_recent_active()
            .ok_or_else(|| "jobsh: fg/bg: no current job".to_string()),
    }
}

fn builtin_resume(args: &[String], foreground: bool) -> i32 {
    let id = match resolve_job_id(args) {
        Ok(id) => id,
        Err(err) => {
            eprintln!("{err}");
            return 1;
        }
    };

    match monitor::resume(id, foreground) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

/// `kill %N` (spec.md §4.2): the leading `%` is mandatory. A bare `kill`
/// or a target without the `%` prefix (e.g. `kill 1234`) isn't this
/// builtin's job at all — `None` sends it down the ordinary fallthrough
/// path to exec the real `kill(1)`, mirroring `do_kill`'s `-1` return in
/// the original. Only once the `%` form is recognized does this function
/// own the call: it sends termination to the job's group, sending
/// continue first if the job is currently stopped so the termination is
/// actually delivered rather than queued against a stopped group.
fn builtin_kill(args: &[String]) -> Option<i32> {
    let target = args.first()?;
    let job_id = target.strip_prefix('%')?;

    let Ok(id) = job_id.parse::<usize>() else {
        eprintln!("jobsh: kill: {target}: no such job");
        return Some(1);
    };

    let mask = SignalMaskGuard::block().ok()?;
    let job_info = {
        let table = reaper::table().lock().unwrap();
        table.get(id).map(|job| (job.pgid, job.state()))
    };
    let Some((pgid, state)) = job_info else {
        drop(mask);
        eprintln!("jobsh: kill: {target}: no such job");
        return Some(1);
    };

    if state == JobState::Stopped {
        if let Err(err) = signals::send_continue(pgid) {
            eprintln!("jobsh: kill: {err}");
        }
    }
    let result = match signals::send_terminate(pgid) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("jobsh: kill: {err}");
            1
        }
    };
    drop(mask);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_builtin_names() {
        for name in BUILTINS {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("ls"));
    }

    #[test]
    fn dispatch_falls_through_for_unknown_command() {
        let argv = vec!["ls".to_string(), "-la".to_string()];
        assert!(dispatch(&argv).is_none());
    }

    #[test]
    fn cd_with_no_args_goes_home() {
        let original = std::env::current_dir().unwrap();
        let argv = vec!["cd".to_string()];
        let code = dispatch(&argv).unwrap();
        assert_eq!(code, 0);
        std::env::set_current_dir(original).unwrap();
    }

    #[test]
    fn cd_to_nonexistent_dir_is_error() {
        let argv = vec!["cd".to_string(), "/no/such/directory/jobsh-test".to_string()];
        assert_eq!(dispatch(&argv), Some(1));
    }

    #[test]
    fn jobs_with_empty_table_succeeds() {
        let argv = vec!["jobs".to_string()];
        assert_eq!(dispatch(&argv), Some(0));
    }

    #[test]
    fn cd_expands_leading_tilde_slash() {
        let original = std::env::current_dir().unwrap();
        let home = std::env::var("HOME").unwrap();
        let argv = vec!["cd".to_string(), "~/".to_string()];
        let code = dispatch(&argv).unwrap();
        assert_eq!(code, 0);
        assert_eq!(std::env::current_dir().unwrap(), std::path::PathBuf::from(home));
        std::env::set_current_dir(original).unwrap();
    }

    #[test]
    fn kill_without_percent_prefix_falls_through() {
        let argv = vec!["kill".to_string(), "1234".to_string()];
        assert!(dispatch(&argv).is_none());
    }

    #[test]
    fn bare_kill_falls_through() {
        let argv = vec!["kill".to_string()];
        assert!(dispatch(&argv).is_none());
    }

    #[test]
    fn kill_with_percent_prefix_on_missing_job_is_handled_in_process() {
        let argv = vec!["kill".to_string(), "%999".to_string()];
        assert_eq!(dispatch(&argv), Some(1));
    }
}
