//! Running unlocked stores end to end

use grader_kernel::{
    AmbleKey, FailureKind, GraderConfig, GraderError, Orchestrator, Phase, SuiteFailure,
    UnlockedStore,
};
use grader_test_utils::{
    capturing_evaluator, case, explained, init_test_tracing, store, test, test_config,
    with_postamble, with_preamble, ScriptedInteraction,
};
use std::time::{Duration, Instant};

fn run(config: GraderConfig, store: &UnlockedStore, question: Option<&str>) -> (String, grader_kernel::BatchReport) {
    let (evaluator, _) = capturing_evaluator(&config);
    let mut out = Vec::new();
    let report = Orchestrator::with_evaluator(config, evaluator)
        .run_tests(store, question, &mut out)
        .unwrap();
    (String::from_utf8(out).unwrap(), report)
}

fn quick() -> GraderConfig {
    test_config(Duration::from_secs(5))
}

#[test]
fn single_passing_case() {
    init_test_tracing();
    let store = store(vec![test("q1", vec![vec![case("1 + 1", &["2"])]])]);
    let (out, report) = run(quick(), &store, Some("q1"));
    assert!(report.passed());
    assert!(out.starts_with("Test q1\n=======\n"), "{out}");
    assert!(out.contains("1/1 suites passed\nAll unlocked tests passed!\n"), "{out}");
    assert!(out.contains("Remember that the tests in this autograder are not exhaustive"));
}

#[test]
fn mismatch_fails_with_display() {
    let store = store(vec![test(
        "q1",
        vec![vec![explained(case("2 * 3", &["5"]), "multiply")]],
    )]);
    let (out, report) = run(quick(), &store, None);
    let test = &report.tests[0];
    assert!(!test.passed());
    let Some(SuiteFailure::Case(failure)) = &test.failure else {
        panic!("expected a case failure");
    };
    assert!(matches!(failure.kind, FailureKind::Mismatch { .. }));
    assert!(out.contains(">>> 2 * 3\n6\n# Error: expected 5 got 6\n# Explanation: multiply\n"), "{out}");
    assert!(out.contains("0/1 suites passed"));
    assert!(!out.contains("All unlocked tests passed!"));
}

#[test]
fn failure_stops_at_the_failing_step() {
    let store = store(vec![test(
        "q1",
        vec![vec![case("x = 1\n$ x\n$ x + 1\nx = 1 // 0\n$ x", &["1", "3", "1"])]],
    )]);
    let (_, report) = run(quick(), &store, None);
    let Some(SuiteFailure::Case(failure)) = &report.tests[0].failure else {
        panic!("expected a case failure");
    };
    assert_eq!(failure.step, 1);
    assert_eq!(failure.transcript.len(), 2);
}

#[test]
fn runaway_case_times_out_within_the_deadline() {
    let deadline = Duration::from_millis(150);
    let store = store(vec![test(
        "loop",
        vec![vec![case("def spin():\n    while True:\n        pass\n$ spin()", &["1"])]],
    )]);
    let started = Instant::now();
    let (out, report) = run(test_config(deadline), &store, None);
    assert!(started.elapsed() < deadline + Duration::from_secs(2));
    assert_eq!(
        report.tests[0].failure.as_ref().map(SuiteFailure::kind),
        Some(&FailureKind::Timeout { deadline })
    );
    assert!(out.contains("# Error: evaluation exceeded 0.15 seconds"), "{out}");
}

#[test]
fn teardown_runs_once_even_after_a_fault() {
    let config = quick();
    let (evaluator, transcript) = capturing_evaluator(&config);
    let store = store(vec![with_postamble(
        test("q1", vec![vec![case("1 / 0", &["1"]), case("2", &["2"])]]),
        AmbleKey::All,
        "print('teardown')",
    )]);
    let mut out = Vec::new();
    let report = Orchestrator::with_evaluator(config, evaluator)
        .run_tests(&store, None, &mut out)
        .unwrap();
    assert!(!report.passed());
    assert_eq!(transcript.count("teardown"), 1);
}

#[test]
fn setup_combines_all_and_suite_preambles() {
    let authored = with_preamble(
        with_preamble(
            test(
                "q1",
                vec![vec![case("a + b", &["3"])], vec![case("a", &["1"])]],
            ),
            AmbleKey::All,
            "a = 1",
        ),
        AmbleKey::Suite(0),
        "b = 2",
    );
    let (out, report) = run(quick(), &store(vec![authored]), None);
    assert!(report.passed(), "{out}");
    assert!(out.contains("2/2 suites passed"));
}

#[test]
fn setup_fault_fails_the_suite() {
    let authored = with_preamble(
        test("q1", vec![vec![case("1", &["1"])]]),
        AmbleKey::All,
        "undefined_helper()",
    );
    let (out, report) = run(quick(), &store(vec![authored]), None);
    let Some(SuiteFailure::Setup { kind, .. }) = &report.tests[0].failure else {
        panic!("expected a setup failure");
    };
    assert!(matches!(kind, FailureKind::Fault { phase: Phase::Setup, .. }));
    assert!(out.contains("# Error: setup raised NameError"), "{out}");
}

#[test]
fn cases_get_fresh_environments_unless_shared() {
    let authored = test(
        "q1",
        vec![vec![case("counter = 5\n$ counter", &["5"]), case("counter", &["5"])]],
    );
    let store = store(vec![authored]);

    let (_, isolated) = run(quick(), &store, None);
    assert!(!isolated.passed());

    let (_, shared) = run(quick().with_share_case_bindings(true), &store, None);
    assert!(shared.passed());
}

#[test]
fn runs_are_idempotent() {
    let store = store(vec![
        test("q1", vec![vec![case("x = [1, 2]\n$ len(x)", &["2"])]]),
        test("q2", vec![vec![case("max(3, 9)", &["8"])]]),
    ]);
    let config = quick().with_continue_on_failure(true);
    let (first_out, first) = run(config.clone(), &store, None);
    let (second_out, second) = run(config, &store, None);
    assert_eq!(first_out, second_out);
    assert_eq!(
        first.tests.iter().map(|t| t.suites_passed).collect::<Vec<_>>(),
        second.tests.iter().map(|t| t.suites_passed).collect::<Vec<_>>()
    );
}

#[test]
fn batch_stops_at_first_failed_test_unless_all() {
    let store = store(vec![
        test("q1", vec![vec![case("1", &["2"])]]),
        test("q2", vec![vec![case("2", &["2"])]]),
    ]);
    let (out, report) = run(quick(), &store, None);
    assert!(report.stopped_early);
    assert_eq!(report.tests.len(), 1);
    assert!(!out.contains("Remember that"));

    let (_, report) = run(quick().with_continue_on_failure(true), &store, None);
    assert!(!report.stopped_early);
    assert_eq!(report.tests.len(), 2);
}

#[test]
fn locked_cases_are_noted() {
    let mut authored = test("q3", vec![vec![case("1", &["1"])]]);
    authored.total_cases = Some(4);
    let (out, report) = run(quick(), &store(vec![authored]), None);
    assert!(report.passed());
    assert_eq!(report.tests[0].locked_remaining, 3);
    assert!(out.contains("Note: q3 still has 3 locked cases."));
}

#[test]
fn unknown_question_is_an_error() {
    let config = quick();
    let (evaluator, _) = capturing_evaluator(&config);
    let err = Orchestrator::with_evaluator(config, evaluator)
        .run_tests(&store(vec![]), Some("q9"), &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, GraderError::UnknownTest(name) if name == "q9"));
}

#[test]
fn project_imports_seed_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("hog.py"),
        "def roll(n):\n    return n % 6 + 1\n",
    )
    .unwrap();
    let mut store = store(vec![test("q1", vec![vec![case("roll(7)", &["2"])]])]);
    store.project_info.imports.push("from hog import *".into());

    let config = quick().with_module_root(dir.path());
    let mut out = Vec::new();
    let report = Orchestrator::new(config)
        .run_tests(&store, None, &mut out)
        .unwrap();
    assert!(report.passed(), "{}", String::from_utf8_lossy(&out));
}

#[test]
fn failing_import_is_fatal() {
    let mut store = store(vec![test("q1", vec![vec![case("1", &["1"])]])]);
    store.project_info.imports.push("from missing_module import *".into());
    let err = Orchestrator::new(quick())
        .run_tests(&store, None, &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, GraderError::Orchestration(_)));
}

#[test]
fn indexing_a_large_list_stays_linear() {
    let store = store(vec![test(
        "q1",
        vec![vec![case(
            "x = list(range(50000))\ns = 0\nfor i in range(50000):\n    s += x[i]\n$ s",
            &["1249975000"],
        )]],
    )]);
    let (out, report) = run(test_config(Duration::from_secs(10)), &store, None);
    assert!(report.passed(), "{out}");
}

#[test]
fn deeply_nested_values_fail_the_case() {
    let store = store(vec![test(
        "q1",
        vec![vec![case(
            "x = []\nfor i in range(60000):\n    x = [x]\n$ len(x)",
            &["1"],
        )]],
    )]);
    let (out, report) = run(quick(), &store, None);
    let Some(SuiteFailure::Case(failure)) = &report.tests[0].failure else {
        panic!("expected a case failure");
    };
    assert!(
        matches!(&failure.kind, FailureKind::Fault { phase: Phase::Statement, class, .. } if class == "RecursionError"),
        "{out}"
    );
}

#[test]
fn console_opens_over_the_failure_environment() {
    let store = store(vec![test(
        "q1",
        vec![vec![case("secret = 41\n$ secret + 2", &["42"])]],
    )]);
    let config = quick().with_interactive(true);
    let (evaluator, _) = capturing_evaluator(&config);
    let mut console = ScriptedInteraction::new(["secret", "exit()"]);
    let mut out = Vec::new();
    let report = Orchestrator::with_evaluator(config, evaluator)
        .with_console(&mut console)
        .run_tests(&store, None, &mut out)
        .unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(!report.passed());
    assert_eq!(console.remaining(), 0);
    assert!(
        out.contains("# Error: expected 42 got 43\n\n# Interactive console\n# Type exit() to quit\n41\n"),
        "{out}"
    );
    assert!(out.contains("0/1 suites passed"));
}

#[test]
fn console_stays_closed_unless_interactive() {
    let store = store(vec![test("q1", vec![vec![case("1", &["2"])]])]);
    let config = quick();
    let (evaluator, _) = capturing_evaluator(&config);
    let mut console = ScriptedInteraction::new(["exit()"]);
    let mut out = Vec::new();
    Orchestrator::with_evaluator(config, evaluator)
        .with_console(&mut console)
        .run_tests(&store, None, &mut out)
        .unwrap();
    assert_eq!(console.remaining(), 1);
    assert!(console.prompts.is_empty());
}

#[test]
fn teardown_fault_leaves_the_suite_result_alone() {
    let store = store(vec![with_postamble(
        test("q1", vec![vec![case("1 + 1", &["2"])]]),
        AmbleKey::All,
        "cleanup()",
    )]);
    let (out, report) = run(quick(), &store, None);
    assert!(report.passed(), "{out}");
    let suite = &report.tests[0].suites[0];
    assert!(suite.passed());
    assert!(matches!(
        &suite.teardown_fault,
        Some(FailureKind::Fault { phase: Phase::Teardown, class, .. }) if class == "NameError"
    ));
    assert!(out.contains("1/1 suites passed\nAll unlocked tests passed!\n"), "{out}");
}
