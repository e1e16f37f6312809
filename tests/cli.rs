#![cfg(feature = "cli")]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::tempdir;

fn explang_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_explang"))
}

fn run_explang(args: &[&str], stdin: Option<&str>, home: &Path) -> (i32, String, String) {
    let mut cmd = Command::new(explang_bin());
    cmd.args(args)
        .env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("EXPLANG_LOG")
        .env_remove("EXPLANG_MAX_DEPTH")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().expect("spawn explang");
    if let Some(input) = stdin {
        use std::io::Write;
        child
            .stdin
            .as_mut()
            .expect("stdin")
            .write_all(input.as_bytes())
            .expect("write stdin");
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().expect("wait");
    let code = output.status.code().unwrap_or(-1);
    (
        code,
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

fn write_file(path: &Path, contents: &str) {
    fs::write(path, contents).expect("write file");
}

#[test]
fn cli_help_and_version_work() {
    let dir = tempdir().unwrap();

    let (code, out, _err) = run_explang(&["--help"], None, dir.path());
    assert_eq!(code, 0);
    assert!(out.contains("explang"));
    assert!(out.contains("fmt"));

    let (code, out, _err) = run_explang(&["--version"], None, dir.path());
    assert_eq!(code, 0);
    assert!(out.trim().starts_with("explang"));
}

#[test]
fn cli_run_prints_program_output() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("ok.exp");
    write_file(&file, "var x = 41\nprint(x + 1, x)\n");
    let path = file.to_str().unwrap();

    let (code, out, err) = run_explang(&["run", path], None, dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    assert_eq!(out, "42 41\n");

    // File argument without a subcommand
    let (code, out, err) = run_explang(&[path], None, dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    assert_eq!(out, "42 41\n");
}

#[test]
fn cli_runtime_error_shows_position_and_context() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("boom.exp");
    write_file(&file, "print(1)\nvar b = 1 / 0\nprint(b)\n");

    let (code, out, err) = run_explang(&["run", file.to_str().unwrap()], None, dir.path());
    assert_eq!(code, 1);
    assert_eq!(out, "1\n");
    assert!(err.contains("2:11: division by zero in '/'"), "stderr: {err}");
    assert!(err.contains("> 2 | var b = 1 / 0"), "stderr: {err}");
}

#[test]
fn cli_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.exp");

    let (code, _out, err) = run_explang(&["run", missing.to_str().unwrap()], None, dir.path());
    assert_eq!(code, 1);
    assert!(err.contains("cannot read"));
}

#[test]
fn cli_check_reports_syntax_errors() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.exp");
    let bad = dir.path().join("bad.exp");
    write_file(&good, "fun f(a) { return a }\n");
    write_file(&bad, "var = 3\n");

    let (code, out, err) = run_explang(&["check", good.to_str().unwrap()], None, dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    assert!(out.contains("Lexing passed"));
    assert!(out.contains("Parsing passed"));

    let (code, _out, err) = run_explang(&["check", bad.to_str().unwrap()], None, dir.path());
    assert_eq!(code, 1);
    assert!(err.contains("1:5: unexpected '='"), "stderr: {err}");
}

#[test]
fn cli_tokens_and_ast() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("tree.exp");
    write_file(&file, "var x = -1\n");
    let path = file.to_str().unwrap();

    let (code, out, err) = run_explang(&["tokens", path], None, dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    assert!(out.contains("var"));
    assert!(out.contains("Total: 6 tokens"));

    let (code, out, err) = run_explang(&["ast", "--json", path], None, dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    let tree: serde_json::Value = serde_json::from_str(&out).unwrap();
    let stmt = &tree["block"]["statements"][0];
    assert_eq!(stmt["kind"], "VarDecl");
    assert_eq!(stmt["initializer"]["value"], -1);

    let (code, out, _err) = run_explang(&["ast", path], None, dir.path());
    assert_eq!(code, 0);
    assert!(out.contains("VarDecl"));
}

#[test]
fn cli_fmt_check_and_write() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("messy.exp");
    write_file(&file, "var x=1;print( x )");
    let path = file.to_str().unwrap();

    let (code, out, _err) = run_explang(&["fmt", "--check", path], None, dir.path());
    assert_eq!(code, 1);
    assert!(out.contains("needs formatting"));
    assert_eq!(fs::read_to_string(&file).unwrap(), "var x=1;print( x )");

    let (code, _out, err) = run_explang(&["fmt", path], None, dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    assert_eq!(fs::read_to_string(&file).unwrap(), "var x = 1\nprint(x)\n");

    let (code, out, _err) = run_explang(&["fmt", "--check", path], None, dir.path());
    assert_eq!(code, 0);
    assert!(out.contains("already formatted"));
}

#[test]
fn cli_trace_reports_steps_on_stderr() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("trace.exp");
    write_file(&file, "fun id(x) { return x }\nprint(id(3))\n");

    let (code, out, err) = run_explang(&["trace", file.to_str().unwrap()], None, dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    assert_eq!(out, "3\n");
    assert!(err.contains("[line 1] fun id(x)"));
    assert!(err.contains("[line 2] call id(3)"));
    assert!(err.contains("Trace complete"));

    let (code, _out, err) =
        run_explang(&["trace", "--verbose", file.to_str().unwrap()], None, dir.path());
    assert_eq!(code, 0);
    assert!(err.contains("push scope"));
}

#[test]
fn cli_max_depth_flag_limits_recursion() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("deep.exp");
    write_file(
        &file,
        "fun down(n) { if (n == 0) { return 0 } return down(n - 1) }\nprint(down(100))\n",
    );
    let path = file.to_str().unwrap();

    let (code, out, _err) = run_explang(&["run", path], None, dir.path());
    assert_eq!(code, 0);
    assert_eq!(out, "0\n");

    let (code, _out, err) = run_explang(&["--max-depth", "10", "run", path], None, dir.path());
    assert_eq!(code, 1);
    assert!(err.contains("maximum call depth of 10"), "stderr: {err}");
}

#[test]
fn cli_log_flag_rejects_bad_filters() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("ok.exp");
    write_file(&file, "print(1)\n");

    let (code, _out, err) =
        run_explang(&["--log", "shouty", "run", file.to_str().unwrap()], None, dir.path());
    assert_eq!(code, 2);
    assert!(err.contains("Invalid log level"));
}

#[test]
fn cli_repl_scripted_session() {
    let dir = tempdir().unwrap();
    let script = "var x = 2\nfun f(a) {\n    return a * x\n}\nprint(f(21))\n:env\nreturn x + 1\nprint(nope)\n:reset\n:env\n:quit\n";

    let (code, out, err) = run_explang(&["repl"], Some(script), dir.path());
    assert_eq!(code, 0, "stderr: {err}");
    assert!(out.contains("42"));
    assert!(out.contains("x = 2"));
    assert!(out.contains("fun f(a)"));
    assert!(out.contains("=> 3"));
    assert!(out.contains("Interpreter reset."));
    assert!(out.contains("Nothing declared yet."));
    assert!(err.contains("'nope' is not in scope"));
}

#[test]
fn cli_no_args_starts_repl_and_exits_on_eof() {
    let dir = tempdir().unwrap();
    let (code, out, _err) = run_explang(&[], Some("print(5)\n"), dir.path());
    assert_eq!(code, 0);
    assert!(out.contains("5"));
}
