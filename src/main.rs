#[cfg(not(unix))]
compile_error!("jobsh's job-control core (process groups, tcsetpgrp, SIGCHLD) has no portable non-Unix equivalent");

mod builtins;
mod editor;
mod job;
mod launcher;
mod monitor;
mod parser;
mod reaper;
mod redirect;
mod signals;
mod status;
mod token;

use std::io;
use std::sync::atomic::Ordering;

use editor::LineEditor;
use launcher::Stage;
use token::Token;

fn main() {
    // Fallback for contexts signals::install_shell_dispositions can't fully
    // cover — e.g. a raw-mode editor session where the terminal driver has
    // already stopped delivering SIGINT by the time this runs.
    ctrlc::set_handler(|| {
        if !editor::EDITOR_ACTIVE.load(Ordering::Relaxed) {
            println!();
            let _ = io::Write::flush(&mut io::stdout());
        }
    })
    .expect("failed to install Ctrl-C fallback handler");

    if let Err(err) = signals::install_shell_dispositions() {
        eprintln!("jobsh: failed to install signal handlers: {err}");
        std::process::exit(1);
    }

    let mut editor = LineEditor::new();
    let mut last_exit_code: i32 = 0;

    loop {
        report_finished_jobs();

        let prompt = match std::env::current_dir() {
            Ok(cwd) => format!("{}: ", cwd.display()),
            Err(_) => "# ".to_string(),
        };

        let line = match editor.read_line(&prompt) {
            Ok(Some(line)) => line,
            Ok(None) => {
                println!();
                break;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                signals::INTERRUPTED.store(false, Ordering::Relaxed);
                println!();
                continue;
            }
            Err(err) => {
                eprintln!("jobsh: {err}");
                break;
            }
        };

        if signals::INTERRUPTED.swap(false, Ordering::Relaxed) {
            // A SIGINT landed between prompt draw and line submission; discard
            // whatever was read and redraw (spec.md §9's polled-flag stand-in
            // for setjmp/longjmp-based interrupt recovery).
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        editor.add_to_history(trimmed);

        last_exit_code = run_line(trimmed);
    }

    shutdown();
    std::process::exit(last_exit_code);
}

fn run_line(line: &str) -> i32 {
    let mut tokens = token::tokenize(line);
    let background = token::strip_trailing_background(&mut tokens);
    let stages_tokens = token::split_pipeline(tokens);

    let mut stages = Vec::with_capacity(stages_tokens.len());
    for stage_tokens in stages_tokens {
        if stage_tokens.iter().all(|t| !matches!(t, Token::Word(_))) {
            eprintln!("jobsh: syntax error: empty command");
            return 2;
        }
        match redirect::extract_redirections(&stage_tokens) {
            Ok((argv, redirections)) => stages.push(Stage { argv, redirections }),
            Err(msg) => {
                eprintln!("{msg}");
                return 2;
            }
        }
    }

    if stages.is_empty() {
        return 0;
    }

    // Builtins only ever resolve as the n=1 case; they never run as one
    // stage of a larger pipeline (spec.md §4.2). A trailing `&` doesn't
    // exempt them — `jobs &`, `cd /tmp &`, etc. still dispatch in-process.
    if stages.len() == 1 {
        if let Some(code) = builtins::dispatch(&stages[0].argv) {
            return code;
        }
    }

    // Reconstructed from the extracted argv, stages joined by ` | `
    // (spec.md §8's round-trip law) — this is what `jobs`/watcher reports
    // show, not the raw input line with its redirections and `&` intact.
    let command_text = stages
        .iter()
        .map(|s| s.argv.join(" "))
        .collect::<Vec<_>>()
        .join(" | ");

    launcher::launch(stages, background, command_text)
}

/// Between prompts, reports any background job the reaper already marked
/// Finished, then drops it from the table (spec.md §4.6 "end-of-prompt
/// watcher").
fn report_finished_jobs() {
    let _mask = match signals::SignalMaskGuard::block() {
        Ok(mask) => mask,
        Err(_) => return,
    };

    let finished: Vec<(usize, String, Option<libc::c_int>)> = {
        let table = reaper::table().lock().unwrap();
        table
            .jobs_sorted()
            .into_iter()
            .filter(|(_, job)| job.state() == job::JobState::Finished)
            .map(|(id, job)| (id, job.command.clone(), job.exit_status()))
            .collect()
    };

    for (id, command, raw_status) in finished {
        reaper::table().lock().unwrap().remove(id);
        println!("{}", status::describe_finished(id, &command, raw_status));
    }
}

/// `quit`/EOF shutdown (spec.md §4.6): terminate every tracked job and
/// wait for the reaper to confirm they're gone before exiting.
fn shutdown() {
    let mask = match signals::SignalMaskGuard::block() {
        Ok(mask) => mask,
        Err(_) => return,
    };

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
                    .all(|(_, job)| job.state() == job::JobState::Finished)
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
}
