//! Unlock flow over locked/unlocked store pairs

use grader_kernel::{
    run_unlock, AmbleKey, GraderResult, LockedStore, Orchestrator, UnlockEvent, UnlockGate,
    UnlockState, UnlockedStore,
};
use grader_test_utils::{
    case, locked_pair, store, test, test_config, with_preamble, ScriptedInteraction,
};
use std::time::Duration;

fn drive(
    locked: &mut LockedStore,
    unlocked: &mut UnlockedStore,
    name: &str,
    answers: &[&str],
) -> (UnlockState, String, usize) {
    let mut gate = UnlockGate::open(locked, unlocked, name).unwrap();
    let mut input = ScriptedInteraction::new(answers.iter().copied());
    let mut out = Vec::new();
    let mut saves = 0;
    let mut count_saves = |_: &LockedStore, _: &UnlockedStore| -> GraderResult<()> {
        saves += 1;
        Ok(())
    };
    let state = run_unlock(&mut gate, &mut input, &mut out, &mut count_saves).unwrap();
    (state, String::from_utf8(out).unwrap(), saves)
}

#[test]
fn wrong_answer_retries_then_right_answer_unlocks() {
    let authored = store(vec![test("q1", vec![vec![case("2 + 2", &["4"])]])]);
    let (mut locked, mut unlocked) = locked_pair(&authored);

    let mut gate = UnlockGate::open(&mut locked, &mut unlocked, "q1").unwrap();
    assert_eq!(gate.submit("5").unwrap(), UnlockEvent::Retry);
    assert_eq!(gate.submit("4").unwrap(), UnlockEvent::CaseUnlocked { suite: 0 });
    assert_eq!(gate.state(), UnlockState::FullyUnlocked);
    drop(gate);

    let unlocked_case = &unlocked.find("q1").unwrap().suites[0][0];
    assert_eq!(unlocked_case.input, "2 + 2");
    assert_eq!(unlocked_case.outputs, vec!["4"]);
    assert!(locked.find("q1").unwrap().suites[0].is_empty());
}

#[test]
fn protocol_messages() {
    let authored = store(vec![with_preamble(
        test(
            "q1",
            vec![vec![case("x = 3\n$ x * 2", &["6"]), case("x - 1", &["2"])]],
        ),
        AmbleKey::All,
        "x = 3",
    )]);
    let (mut locked, mut unlocked) = locked_pair(&authored);
    let (state, out, saves) = drive(&mut locked, &mut unlocked, "q1", &["7", "6", "2"]);

    assert_eq!(state, UnlockState::FullyUnlocked);
    assert_eq!(saves, 2);
    assert_eq!(
        out,
        "Unlocking tests for q1\n\
         ======================\n\
         At each \"?\", type in what you would expect the output to be if you had implemented q1\n\
         Type exit() to quit\n\
         \n\
         >>> x = 3\n\
         >>> x = 3\n\
         >>> x * 2\n\
         Not quite...try again!\n\
         Congratulations, you have unlocked this case!\n\
         \n\
         >>> x - 1\n\
         Congratulations, you have unlocked this case!\n\
         \n\
         You have unlocked all of the tests for this question!\n"
    );
}

#[test]
fn shared_preamble_is_shown_once() {
    let authored = with_preamble(
        with_preamble(
            test(
                "q1",
                vec![vec![case("a", &["1"])], vec![case("a + b", &["3"])]],
            ),
            AmbleKey::All,
            "a = 1",
        ),
        AmbleKey::Suite(1),
        "b = 2",
    );
    let (mut locked, mut unlocked) = locked_pair(&store(vec![authored]));
    let (state, out, _) = drive(&mut locked, &mut unlocked, "q1", &["1", "3"]);

    assert_eq!(state, UnlockState::FullyUnlocked);
    assert_eq!(out.matches(">>> a = 1\n").count(), 1, "{out}");
    assert!(
        out.contains("unlocked this case!\n\n>>> b = 2\n>>> a + b\n"),
        "{out}"
    );
    assert_eq!(
        unlocked.find("q1").unwrap().preamble.get(&AmbleKey::Suite(1)).map(String::as_str),
        Some("b = 2")
    );
}

#[test]
fn exit_cancels_and_keeps_earlier_unlocks() {
    let authored = store(vec![test(
        "q1",
        vec![vec![case("1", &["1"]), case("2", &["2"]), case("3", &["3"])]],
    )]);
    let (mut locked, mut unlocked) = locked_pair(&authored);
    let (state, out, saves) = drive(&mut locked, &mut unlocked, "q1", &["1", "exit()"]);

    assert_eq!(state, UnlockState::Cancelled);
    assert_eq!(saves, 1);
    assert!(out.ends_with("\nExiting unlocker...\n"), "{out}");
    assert_eq!(unlocked.find("q1").unwrap().suites[0].len(), 1);
    assert_eq!(locked.find("q1").unwrap().suites[0].len(), 2);
}

#[test]
fn end_of_input_cancels() {
    let authored = store(vec![test("q1", vec![vec![case("1", &["1"])]])]);
    let (mut locked, mut unlocked) = locked_pair(&authored);
    let (state, _, saves) = drive(&mut locked, &mut unlocked, "q1", &[]);
    assert_eq!(state, UnlockState::Cancelled);
    assert_eq!(saves, 0);
}

#[test]
fn later_answers_never_unlock_first() {
    let authored = store(vec![test(
        "q1",
        vec![vec![case("'a'", &["'a'"])], vec![case("'b'", &["'b'"])]],
    )]);
    let (mut locked, mut unlocked) = locked_pair(&authored);
    let mut gate = UnlockGate::open(&mut locked, &mut unlocked, "q1").unwrap();
    assert_eq!(gate.submit("'b'").unwrap(), UnlockEvent::Retry);
    assert_eq!(gate.state(), UnlockState::Locked { suite: 0, slot: 0 });
    assert_eq!(gate.submit("'a'").unwrap(), UnlockEvent::CaseUnlocked { suite: 0 });
    assert_eq!(gate.state(), UnlockState::Locked { suite: 1, slot: 0 });
}

#[test]
fn unlocked_cases_then_run() {
    let authored = store(vec![test(
        "q1",
        vec![vec![case("def sq(x):\n    return x * x\n$ sq(3)\n$ sq(-2)", &["9", "4"])]],
    )]);
    let (mut locked, mut unlocked) = locked_pair(&authored);
    let (state, _, _) = drive(&mut locked, &mut unlocked, "q1", &["9", "4"]);
    assert_eq!(state, UnlockState::FullyUnlocked);

    let mut out = Vec::new();
    let report = Orchestrator::new(test_config(Duration::from_secs(5)))
        .run_tests(&unlocked, Some("q1"), &mut out)
        .unwrap();
    assert!(report.passed(), "{}", String::from_utf8_lossy(&out));
    assert_eq!(report.tests[0].locked_remaining, 0);
}

#[test]
fn stores_survive_a_save_between_cases() {
    let dir = tempfile::tempdir().unwrap();
    let locked_path = dir.path().join("locked_tests.json");
    let unlocked_path = dir.path().join("unlocked_tests.json");
    let authored = store(vec![test("q1", vec![vec![case("1", &["1"]), case("2", &["2"])]])]);
    let (mut locked, mut unlocked) = locked_pair(&authored);

    {
        let mut gate = UnlockGate::open(&mut locked, &mut unlocked, "q1").unwrap();
        let mut input = ScriptedInteraction::new(["1", "exit()"]);
        let mut save = |l: &LockedStore, u: &UnlockedStore| -> GraderResult<()> {
            l.save(&locked_path)?;
            u.save(&unlocked_path)
        };
        run_unlock(&mut gate, &mut input, &mut Vec::new(), &mut save).unwrap();
    }

    let reloaded_locked = LockedStore::load(&locked_path).unwrap();
    let reloaded_unlocked = UnlockedStore::load(&unlocked_path).unwrap();
    assert_eq!(reloaded_locked.find("q1").unwrap().suites[0].len(), 1);
    assert_eq!(reloaded_unlocked.find("q1").unwrap().suites[0][0].outputs, vec!["1"]);
}
