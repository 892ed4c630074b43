use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_jobsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn jobsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "quit").expect("write quit");
    }

    child.wait_with_output().expect("wait output")
}

#[test]
fn external_to_external_pipeline_outputs() {
    let output = run_shell(&["echo hello | sort"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"), "stdout was: {stdout}");
}

#[test]
fn output_redirection_writes_file_and_nothing_to_terminal() {
    let temp_dir =
        std::env::temp_dir().join(format!("jobsh_redirect_test_{}", std::process::id()));
    std::fs::create_dir_all(&temp_dir).unwrap();
    let out_path = temp_dir.join("output.txt");

    let cmd = format!("echo hi > {}", out_path.display());
    let output = run_shell(&[cmd.as_str()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        !stdout.contains("hi"),
        "redirected output leaked to terminal: {stdout}"
    );

    let contents = std::fs::read_to_string(&out_path).expect("read redirected file");
    assert_eq!(contents, "hi\n");

    let _ = std::fs::remove_dir_all(&temp_dir);
}

#[test]
fn input_redirection_feeds_stdin() {
    let temp_dir =
        std::env::temp_dir().join(format!("jobsh_stdin_test_{}", std::process::id()));
    std::fs::create_dir_all(&temp_dir).unwrap();
    let input_path = temp_dir.join("input.txt");
    std::fs::write(&input_path, "one\ntwo\nthree\n").unwrap();

    let cmd = format!("wc -l < {}", input_path.display());
    let output = run_shell(&[cmd.as_str()]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('3'), "stdout was: {stdout}");

    let _ = std::fs::remove_dir_all(&temp_dir);
}

#[test]
fn missing_redirection_target_is_syntax_error() {
    let output = run_shell(&["echo hi >"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("syntax error"),
        "stderr was: {stderr}"
    );
}

#[test]
fn single_foreground_command_leaves_no_diagnostic_output() {
    let output = run_shell(&["echo hello"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hello"), "stdout was: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.is_empty(), "stderr was: {stderr}");
}
