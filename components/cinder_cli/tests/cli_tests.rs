//! End-to-end tests for the `cinder` binary.
//!
//! Writes scripts to temporary files, runs the compiled binary against
//! them, and checks output and exit codes.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn run_script(source: &str) -> std::process::Output {
    let mut file = NamedTempFile::new().expect("create temp script");
    file.write_all(source.as_bytes()).expect("write script");
    Command::new(env!("CARGO_BIN_EXE_cinder"))
        .arg(file.path())
        .output()
        .expect("run cinder")
}

#[test]
fn test_runs_script_and_exits_zero() {
    let output = run_script("print 1 + 2 * 3;");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "7\n");
}

#[test]
fn test_compile_error_exits_65() {
    let output = run_script("print ;");
    assert_eq!(output.status.code(), Some(65));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"));
    assert!(stderr.contains("Expect expression."));
}

#[test]
fn test_runtime_error_exits_70() {
    let output = run_script("print missing;");
    assert_eq!(output.status.code(), Some(70));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Runtime Error: Undefined variable 'missing'."));
    assert!(stderr.contains("[line 1] in script"));
}

#[test]
fn test_missing_file_exits_74() {
    let output = Command::new(env!("CARGO_BIN_EXE_cinder"))
        .arg("no-such-script.cin")
        .output()
        .expect("run cinder");
    assert_eq!(output.status.code(), Some(74));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Could not read file"));
}

#[test]
fn test_multi_statement_program() {
    let source = "\
fun fib(n){ if (n < 2) return n; return fib(n-1) + fib(n-2); }
print fib(10);
class A { m() { print \"A\"; } }
class B < A { m() { super.m(); print \"B\"; } }
B().m();
";
    let output = run_script(source);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "55\nA\nB\n");
}
