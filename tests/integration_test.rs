// ABOUTME: End-to-end tests that run the compiled binary against .lox fixture files

use std::io::Write;
use std::process::Command;

fn run_script(source: &str) -> (String, String, i32) {
    let mut file = tempfile::Builder::new().suffix(".lox").tempfile().expect("create fixture file");
    file.write_all(source.as_bytes()).expect("write fixture file");

    let output = Command::new(env!("CARGO_BIN_EXE_loxrs"))
        .arg(file.path())
        .output()
        .expect("run loxrs binary");

    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn closure_counter_increments_across_calls() {
    let (stdout, _stderr, code) = run_script(
        r#"
        fun makeCounter() { var i = 0; fun c() { i = i + 1; return i; } return c; }
        var k = makeCounter(); print k(); print k(); print k();
        "#,
    );
    assert_eq!(stdout, "1\n2\n3\n");
    assert_eq!(code, 0);
}

#[test]
fn inheritance_resolves_super_call() {
    let (stdout, _stderr, code) = run_script(
        r#"
        class A { greet() { return "A"; } }
        class B < A { greet() { return super.greet() + "B"; } }
        print B().greet();
        "#,
    );
    assert_eq!(stdout, "AB\n");
    assert_eq!(code, 0);
}

#[test]
fn list_sort_then_reverse_chains_without_mutating_in_place() {
    let (stdout, _stderr, code) = run_script(
        r#"
        list xs = [3, 1, 2];
        print xs.sort().reverse();
        "#,
    );
    assert_eq!(stdout, "[3, 2, 1]\n");
    assert_eq!(code, 0);
}

#[test]
fn string_slice_assignment_splices_in_place() {
    let (stdout, _stderr, code) = run_script(
        r#"
        var s = "hello";
        s[1..3] = "ELL";
        print s;
        "#,
    );
    assert_eq!(stdout, "hELLo\n");
    assert_eq!(code, 0);
}

#[test]
fn attempt_handle_catches_by_superclass_filter() {
    let (stdout, _stderr, code) = run_script(
        r#"
        class MyErr < Error {}
        attempt { report MyErr(); } handle (Error) { print "caught"; }
        "#,
    );
    assert_eq!(stdout, "caught\n");
    assert_eq!(code, 0);
}

#[test]
fn calling_with_too_few_arguments_is_a_runtime_error() {
    let (stdout, stderr, code) = run_script(
        r#"
        fun f(a, b) { return a + b; }
        f(1);
        "#,
    );
    assert_eq!(stdout, "");
    assert!(stderr.contains("Expected minimum 2 arguments but got 1"));
    assert_eq!(code, 70);
}

#[test]
fn division_by_zero_exits_with_runtime_error_code() {
    let (_stdout, stderr, code) = run_script("print 1 / 0;");
    assert!(stderr.contains("Division by zero"));
    assert_eq!(code, 70);
}

#[test]
fn list_out_of_range_index_reports_runtime_error() {
    let (_stdout, stderr, code) = run_script(
        r#"
        list xs = [1, 2];
        print xs[5];
        "#,
    );
    assert!(stderr.contains("Index out of range"));
    assert_eq!(code, 70);
}

#[test]
fn unterminated_string_is_a_static_exit_code() {
    let (_stdout, _stderr, code) = run_script("print \"unterminated;");
    assert_eq!(code, 65);
}

#[test]
fn non_lox_extension_is_a_usage_error() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().expect("create fixture file");
    file.write_all(b"print 1;").expect("write fixture file");

    let output = Command::new(env!("CARGO_BIN_EXE_loxrs"))
        .arg(file.path())
        .output()
        .expect("run loxrs binary");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn missing_file_exits_with_not_found_code() {
    let output = Command::new(env!("CARGO_BIN_EXE_loxrs"))
        .arg("/nonexistent/path/does-not-exist.lox")
        .output()
        .expect("run loxrs binary");

    assert_eq!(output.status.code(), Some(66));
}
