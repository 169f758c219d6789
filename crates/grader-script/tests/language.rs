//! End-to-end checks of the snippet language through the public API

use grader_script::{
    dedent_block, parse_expression, Environment, FaultKind, FsLoader, Interpreter, Output,
    Transcript, Value,
};
use std::sync::Arc;

fn run_in(env: &mut Environment, src: &str) -> Option<Value> {
    Interpreter::new().run(&dedent_block(src), env).unwrap()
}

#[test]
fn dedented_snippet_defines_usable_functions() {
    let mut env = Environment::new();
    run_in(
        &mut env,
        r"
        def fib(n):
            a, b = 0, 1
            for _ in range(n):
                a, b = b, a + b
            return a
        ",
    );
    assert_eq!(run_in(&mut env, "fib(20)"), Some(Value::Int(6765)));
    // the loop variable was local to the call
    assert!(!env.contains("a"));
}

#[test]
fn higher_order_functions() {
    let mut env = Environment::new();
    run_in(
        &mut env,
        "
        def compose(f, g):
            return lambda x: f(g(x))
        inc = lambda x: x + 1
        sq = lambda x: x * x
        ",
    );
    assert_eq!(run_in(&mut env, "compose(inc, sq)(3)"), Some(Value::Int(10)));
    assert_eq!(run_in(&mut env, "compose(sq, inc)(3)"), Some(Value::Int(16)));
}

#[test]
fn module_is_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("hog.py"),
        "GOAL = 100\n\ndef roll(n):\n    return min(n, 6)\n",
    )
    .unwrap();
    let interp = Interpreter::new().with_loader(Arc::new(FsLoader::new(dir.path())));
    let mut env = Environment::new();
    interp.run("from hog import *", &mut env).unwrap();
    assert_eq!(env.get("GOAL"), Some(&Value::Int(100)));
    assert_eq!(interp.run("roll(9)", &mut env).unwrap(), Some(Value::Int(6)));
}

#[test]
fn expected_output_expressions_compare_by_value() {
    let env = Environment::new();
    let interp = Interpreter::new();
    let expected = interp.eval(&parse_expression("[1, 2.0, 'x']").unwrap(), &env).unwrap();
    let actual = interp
        .eval(&parse_expression("[2 - 1, 4 / 2, 'x']").unwrap(), &env)
        .unwrap();
    assert_eq!(expected, actual);
    assert_eq!(actual.repr(), "[1, 2.0, 'x']");
}

#[test]
fn print_transcript_is_shared_between_clones() {
    let transcript = Transcript::new();
    let interp = Interpreter::new().with_output(Output::Capture(transcript.clone()));
    let other = interp.clone();
    interp.run("print('first')", &mut Environment::new()).unwrap();
    other.run("print('second')", &mut Environment::new()).unwrap();
    assert_eq!(transcript.lines(), vec!["first", "second"]);
}

#[test]
fn syntax_errors_report_a_line() {
    let err = Interpreter::new()
        .run("x = 1\nif x\n    y = 2", &mut Environment::new())
        .unwrap_err();
    assert_eq!(err.kind, FaultKind::SyntaxError);
    assert!(err.message.starts_with("line 2"), "{}", err.message);
}

#[test]
fn interrupt_from_another_thread_stops_an_infinite_loop() {
    let interp = Interpreter::new();
    let interrupt = interp.interrupt().clone();
    let worker = std::thread::spawn(move || interp.run("while True:\n    pass", &mut Environment::new()));
    std::thread::sleep(std::time::Duration::from_millis(50));
    interrupt.trip();
    let err = worker.join().unwrap().unwrap_err();
    assert_eq!(err.kind, FaultKind::Interrupted);
}
