//! Pipeline launcher (spec.md §4.3).
//!
//! Forks one child per stage, wires stdin/stdout through an `os_pipe`
//! hop between stages (or a redirection's fd in place of the pipe end at
//! the first/last stage), and places every child in one process group.
//! Uses a raw `fork` + manual PATH search rather than
//! `std::process::Command`: a failed exec must be observable by the
//! child printing to stderr and exiting, with the parent reaping that as
//! an ordinary `Finished` transition (spec.md §7) — `Command`'s internal
//! exec-failure pipe would instead surface it as a `spawn()` error before
//! the parent ever sees a pid.

use std::ffi::CString;
use std::os::unix::io::{IntoRawFd, RawFd};

use crate::job::Job;
use crate::monitor;
use crate::reaper;
use crate::redirect::Redirections;
use crate::signals::SignalMaskGuard;

/// One resolved pipeline stage: its argv and any redirections that
/// target it directly (only meaningful on the first stage for stdin and
/// the last stage for stdout).
pub struct Stage {
    pub argv: Vec<String>,
    pub redirections: Redirections,
}

/// Launches a pipeline of one or more stages. Returns the exit code: the
/// launched job's exit status if run in the foreground, or 0 immediately
/// after backgrounding it.
pub fn launch(stages: Vec<Stage>, background: bool, command_text: String) -> i32 {
    if stages.iter().any(|s| s.argv.is_empty()) {
        eprintln!("jobsh: syntax error: empty command in pipeline");
        return 2;
    }

    let mask = match SignalMaskGuard::block() {
        Ok(mask) => mask,
        Err(err) => {
            eprintln!("jobsh: {err}");
            return 1;
        }
    };

    let original_mask = unsafe {
        let mut current: libc::sigset_t = std::mem::zeroed();
        libc::pthread_sigmask(0, std::ptr::null(), &mut current);
        current
    };

    let stage_count = stages.len();
    let mut job = Job::new(0, command_text.clone());
    let mut pgid: libc::pid_t = 0;
    let mut prev_read: Option<RawFd> = None;

    for (index, stage) in stages.into_iter().enumerate() {
        let is_last = index + 1 == stage_count;

        let next_pipe = if is_last {
            None
        } else {
            match os_pipe::pipe() {
                Ok((reader, writer)) => Some((reader.into_raw_fd(), writer.into_raw_fd())),
                Err(err) => {
                    eprintln!("jobsh: pipe: {err}");
                    drop(mask);
                    return 1;
                }
            }
        };

        let stdin_fd = stage.redirections.input.or(prev_read);
        let stdout_fd = stage
            .redirections
            .output
            .or(next_pipe.map(|(_, writer)| writer));
        let target_pgid = if index == 0 { 0 } else { pgid };

        match unsafe { libc::fork() } {
            -1 => {
                eprintln!("jobsh: fork: {}", std::io::Error::last_os_error());
                drop(mask);
                return 1;
            }
            0 => {
                run_child(stage.argv, stdin_fd, stdout_fd, target_pgid, &original_mask);
            }
            pid => {
                let _ = unsafe { libc::setpgid(pid, target_pgid) };
                if index == 0 {
                    pgid = pid;
                }
                job.push_process(pid);

                if let Some(fd) = prev_read {
                    unsafe { libc::close(fd) };
                }
                if let Some(fd) = stage.redirections.output {
                    unsafe { libc::close(fd) };
                }
                if let Some(fd) = stage.redirections.input {
                    unsafe { libc::close(fd) };
                }
                prev_read = next_pipe.map(|(reader, writer)| {
                    unsafe { libc::close(writer) };
                    reader
                });
            }
        }
    }

    job.pgid = pgid;

    if background {
        let id = reaper::table().lock().unwrap().insert_background(job);
        println!("[{id}] running '{command_text}' {pgid}");
        drop(mask);
        0
    } else {
        reaper::table().lock().unwrap().set_foreground(job);
        drop(mask);
        monitor::run_foreground(command_text)
    }
}

/// Runs in the forked child: wires descriptors, joins the process
/// group, restores default dispositions, then tries a builtin before
/// falling through to exec. Never returns. A pipeline stage can be a
/// builtin too (`echo x | cd /tmp`) — it just runs in that stage's own
/// child and its effects die with it, same as the original's
/// unconditional `builtin_command` call in `do_stage`.
fn run_child(
    argv: Vec<String>,
    stdin_fd: Option<RawFd>,
    stdout_fd: Option<RawFd>,
    target_pgid: libc::pid_t,
    original_mask: &libc::sigset_t,
) -> ! {
    unsafe {
        if let Some(fd) = stdin_fd {
            libc::dup2(fd, libc::STDIN_FILENO);
            if fd != libc::STDIN_FILENO {
                libc::close(fd);
            }
        }
        if let Some(fd) = stdout_fd {
            libc::dup2(fd, libc::STDOUT_FILENO);
            if fd != libc::STDOUT_FILENO {
                libc::close(fd);
            }
        }

        libc::signal(libc::SIGCHLD, libc::SIG_DFL);
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
        libc::signal(libc::SIGTTIN, libc::SIG_DFL);
        libc::signal(libc::SIGTTOU, libc::SIG_DFL);
        libc::signal(libc::SIGQUIT, libc::SIG_DFL);
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        // Rust's runtime ignores SIGPIPE in the shell itself so writes to a
        // closed pipe surface as an EPIPE error instead of killing it; exec'd
        // children expect the usual default (terminate on EPIPE write).
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        libc::pthread_sigmask(libc::SIG_SETMASK, original_mask, std::ptr::null_mut());

        libc::setpgid(0, target_pgid);
    }

    if let Some(code) = crate::builtins::dispatch(&argv) {
        std::process::exit(code);
    }

    exec_with_path_search(&argv);
    eprintln!("jobsh: {}: command not found", argv[0]);
    std::process::exit(127);
}

/// Tries `execv` directly if argv[0] contains a `/`, otherwise searches
/// `PATH`. Only returns if every attempt failed.
fn exec_with_path_search(argv: &[String]) -> ! {
    let cargs: Vec<CString> = argv
        .iter()
        .map(|s| CString::new(s.as_str()).unwrap_or_default())
        .collect();
    let mut c_argv: Vec<*const libc::c_char> =
        cargs.iter().map(|s| s.as_ptr()).collect();
    c_argv.push(std::ptr::null());

    let program = &argv[0];
    if program.contains('/') {
        let path = CString::new(program.as_str()).unwrap_or_default();
        unsafe { libc::execv(path.as_ptr(), c_argv.as_ptr()) };
        eprintln!("jobsh: {program}: {}", std::io::Error::last_os_error());
        std::process::exit(127);
    }

    let path_var = std::env::var("PATH").unwrap_or_default();
    for dir in path_var.split(':') {
        let candidate = if dir.is_empty() {
            program.clone()
        } else {
            format!("{dir}/{program}")
        };
        let Ok(cpath) = CString::new(candidate) else {
            continue;
        };
        unsafe { libc::execv(cpath.as_ptr(), c_argv.as_ptr()) };
    }

    eprintln!("jobsh: {program}: command not found");
    std::process::exit(127);
}
