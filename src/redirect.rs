//! I/O redirection extraction (spec.md §4.1).
//!
//! Walks a stage's tagged tokens, pulling `<file`/`>file`/`>>file` out of
//! the argument list and opening the files they name. At most one input
//! fd and one output fd survive per stage; a later redirection of the
//! same direction closes and replaces the earlier one.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{IntoRawFd, RawFd};

use crate::token::Token;

/// The open file descriptors a stage's argv should be wired to before
/// exec, if any redirection targeted that direction.
#[derive(Debug, Default)]
pub struct Redirections {
    pub input: Option<RawFd>,
    pub output: Option<RawFd>,
}

/// Split a stage's tokens into plain argv words and opened redirections.
///
/// A trailing `<`/`>`/`>>` with no following word is a syntax error
/// (spec.md §9's open question, resolved: reject rather than silently
/// drop). A file that fails to open is reported to stderr and left
/// unset rather than aborting the whole stage, matching spec.md §7's
/// "I/O open failure" category.
pub fn extract_redirections(tokens: &[Token]) -> Result<(Vec<String>, Redirections), String> {
    let mut args = Vec::new();
    let mut redirections = Redirections::default();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        match token {
            Token::Word(word) => args.push(word.clone()),
            Token::Input => {
                let path = expect_path(iter.next(), "<")?;
                set_input(&mut redirections, open_read(&path));
            }
            Token::Output => {
                let path = expect_path(iter.next(), ">")?;
                set_output(&mut redirections, open_write(&path, false));
            }
            Token::Append => {
                let path = expect_path(iter.next(), ">>")?;
                set_output(&mut redirections, open_write(&path, true));
            }
            Token::Pipe | Token::Background => {
                return Err("jobsh: syntax error: unexpected operator in command".to_string());
            }
        }
    }

    Ok((args, redirections))
}

fn expect_path(next: Option<&Token>, operator: &str) -> Result<String, String> {
    match next {
        Some(Token::Word(word)) => Ok(word.clone()),
        _ => Err(format!("jobsh: syntax error near unexpected token `{operator}'")),
    }
}

fn set_input(redirections: &mut Redirections, fd: Option<RawFd>) {
    if let Some(old) = redirections.input.take() {
        unsafe {
            libc::close(old);
        }
    }
    redirections.input = fd;
}

fn set_output(redirections: &mut Redirections, fd: Option<RawFd>) {
    if let Some(old) = redirections.output.take() {
        unsafe {
            libc::close(old);
        }
    }
    redirections.output = fd;
}

fn open_read(path: &str) -> Option<RawFd> {
    match OpenOptions::new().read(true).open(path) {
        Ok(file) => Some(file.into_raw_fd()),
        Err(err) => {
            eprintln!("jobsh: {path}: {err}");
            None
        }
    }
}

fn open_write(path: &str, append: bool) -> Option<RawFd> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).mode(0o644);
    if append {
        opts.append(true);
    } else {
        opts.truncate(true);
    }
    match opts.open(path) {
        Ok(file) => Some(file.into_raw_fd()),
        Err(err) => {
            eprintln!("jobsh: {path}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn extract(line: &str) -> Result<(Vec<String>, Redirections), String> {
        extract_redirections(&tokenize(line))
    }

    #[test]
    fn simple_stdout_redirect() {
        let (args, redirs) = extract("echo hello > /tmp/jobsh-test-out.txt").unwrap();
        assert_eq!(args, vec!["echo", "hello"]);
        assert!(redirs.output.is_some());
        assert!(redirs.input.is_none());
    }

    #[test]
    fn append_redirect() {
        let (args, redirs) = extract("echo hello >> /tmp/jobsh-test-out.txt").unwrap();
        assert_eq!(args, vec!["echo", "hello"]);
        assert!(redirs.output.is_some());
    }

    #[test]
    fn stdin_redirect() {
        let (args, redirs) = extract("sort < /etc/hostname").unwrap();
        assert_eq!(args, vec!["sort"]);
        assert!(redirs.input.is_some());
    }

    #[test]
    fn missing_filename_is_syntax_error() {
        assert!(extract("echo >").is_err());
        assert!(extract("< ").is_err());
    }

    #[test]
    fn later_redirection_replaces_earlier() {
        let (args, redirs) =
            extract("echo hi > /tmp/jobsh-test-a.txt > /tmp/jobsh-test-b.txt").unwrap();
        assert_eq!(args, vec!["echo", "hi"]);
        assert!(redirs.output.is_some());
    }

    #[test]
    fn unopenable_path_leaves_fd_unset_but_does_not_error() {
        let (args, redirs) = extract("cat < /no/such/directory/file").unwrap();
        assert_eq!(args, vec!["cat"]);
        assert!(redirs.input.is_none());
    }

    #[test]
    fn no_redirections_is_plain_argv() {
        let (args, redirs) = extract("echo hello world").unwrap();
        assert_eq!(args, vec!["echo", "hello", "world"]);
        assert!(redirs.input.is_none());
        assert!(redirs.output.is_none());
    }
}
