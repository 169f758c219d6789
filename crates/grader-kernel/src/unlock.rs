//! Answer-gated unlocking
//!
//! [`UnlockGate`] walks the locked cases of one test strictly in order:
//! suite by suite, and within a suite always the front case, slot by slot.
//! Every slot of the front case must be answered correctly before that case
//! moves to the unlocked store. Wrong answers are retries, never errors.

use crate::console::{is_exit, Interaction};
use crate::error::{GraderError, GraderResult};
use crate::hash::{normalize_answer, AnswerDigest, HashKey};
use crate::report::{underline, write_source, PS1};
use crate::script::CaseScript;
use crate::store::{AmbleKey, Case, LockedStore, UnlockedStore};
use std::io::Write;

/// Printed whenever a session ends before the test is fully unlocked
pub const EXIT_MESSAGE: &str = "Exiting unlocker...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockState {
    /// Waiting for the answer to `slot` of the front case of `suite`
    Locked { suite: usize, slot: usize },
    FullyUnlocked,
    Cancelled,
}

/// Result of submitting one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockEvent {
    Retry,
    SlotSolved { suite: usize, slot: usize },
    CaseUnlocked { suite: usize },
    FullyUnlocked,
    Cancelled,
}

/// Unlock state machine over one test of a store pair
#[derive(Debug)]
pub struct UnlockGate<'s> {
    locked: &'s mut LockedStore,
    unlocked: &'s mut UnlockedStore,
    key: HashKey,
    locked_index: usize,
    unlocked_index: usize,
    state: UnlockState,
    answers: Vec<String>,
}

impl<'s> UnlockGate<'s> {
    /// Start unlocking test `name`
    ///
    /// Creates the test in the unlocked store from the locked metadata when
    /// it is missing there.
    ///
    /// # Errors
    /// [`GraderError::MissingHashKey`] or [`GraderError::UnknownTest`]
    pub fn open(
        locked: &'s mut LockedStore,
        unlocked: &'s mut UnlockedStore,
        name: &str,
    ) -> GraderResult<Self> {
        let key = locked.hash_key.clone().ok_or(GraderError::MissingHashKey)?;
        let locked_index = locked
            .position(name)
            .ok_or_else(|| GraderError::UnknownTest(name.to_string()))?;
        let source = &locked.tests[locked_index];

        let unlocked_index = if let Some(index) = unlocked.position(name) {
            index
        } else {
            unlocked.tests.push(source.skeleton());
            unlocked.tests.len() - 1
        };
        let target = &mut unlocked.tests[unlocked_index];
        for (amble, text) in &source.preamble {
            target.preamble.entry(*amble).or_insert_with(|| text.clone());
        }
        for (amble, text) in &source.postamble {
            target.postamble.entry(*amble).or_insert_with(|| text.clone());
        }

        let mut gate = Self {
            locked,
            unlocked,
            key,
            locked_index,
            unlocked_index,
            state: UnlockState::FullyUnlocked,
            answers: Vec::new(),
        };
        gate.state = gate.next_state(0);
        Ok(gate)
    }

    #[must_use]
    pub fn state(&self) -> UnlockState {
        self.state
    }

    #[must_use]
    pub fn test_name(&self) -> &str {
        self.locked.tests[self.locked_index].display_name()
    }

    /// Front case of the current suite
    #[must_use]
    pub fn current_case(&self) -> Option<&Case<AnswerDigest>> {
        match self.state {
            UnlockState::Locked { suite, .. } => {
                self.locked.tests[self.locked_index].suites[suite].first()
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn stores(&self) -> (&LockedStore, &UnlockedStore) {
        (&*self.locked, &*self.unlocked)
    }

    /// Check `answer` against the current slot
    ///
    /// # Errors
    /// [`GraderError::Digest`] if the hash key is unusable
    pub fn submit(&mut self, answer: &str) -> GraderResult<UnlockEvent> {
        let UnlockState::Locked { suite, slot } = self.state else {
            return Ok(self.terminal_event());
        };
        if is_exit(answer) {
            return Ok(self.cancel());
        }
        let answer = normalize_answer(answer);
        let Some(digest) = self.current_case().and_then(|c| c.outputs.get(slot)).copied() else {
            return Err(GraderError::orchestration(format!(
                "no locked slot {slot} in suite {suite}"
            )));
        };
        if !self.key.verify(answer, &digest)? {
            tracing::debug!(suite, slot, "wrong answer");
            return Ok(UnlockEvent::Retry);
        }

        self.answers.push(answer.to_string());
        let slots = self.current_case().map_or(0, |c| c.outputs.len());
        if slot + 1 < slots {
            self.state = UnlockState::Locked {
                suite,
                slot: slot + 1,
            };
            return Ok(UnlockEvent::SlotSolved { suite, slot });
        }

        self.unlock_front(suite);
        self.state = self.next_state(suite);
        Ok(UnlockEvent::CaseUnlocked { suite })
    }

    /// Abandon the current case; cases already unlocked stay unlocked
    pub fn cancel(&mut self) -> UnlockEvent {
        self.answers.clear();
        self.state = UnlockState::Cancelled;
        UnlockEvent::Cancelled
    }

    fn terminal_event(&self) -> UnlockEvent {
        match self.state {
            UnlockState::Cancelled => UnlockEvent::Cancelled,
            _ => UnlockEvent::FullyUnlocked,
        }
    }

    /// Move the front case of `suite` to the unlocked store with the collected answers
    fn unlock_front(&mut self, suite: usize) {
        let locked_suite = &mut self.locked.tests[self.locked_index].suites[suite];
        if locked_suite.is_empty() {
            return;
        }
        let case = locked_suite.remove(0);
        let target = &mut self.unlocked.tests[self.unlocked_index];
        while target.suites.len() <= suite {
            target.suites.push(Vec::new());
        }
        target.suites[suite].push(Case {
            input: case.input,
            outputs: std::mem::take(&mut self.answers),
            explanation: case.explanation,
        });
        tracing::info!(test = %target.name, suite, "case unlocked");
    }

    /// First slot to answer at or after `suite`; cases without slots unlock on arrival
    fn next_state(&mut self, from: usize) -> UnlockState {
        let mut suite = from;
        loop {
            let front_slots = self.locked.tests[self.locked_index]
                .suites
                .get(suite)
                .map(|cases| cases.first().map(|case| case.outputs.len()));
            match front_slots {
                None => return UnlockState::FullyUnlocked,
                Some(None) => suite += 1,
                Some(Some(0)) => {
                    self.answers.clear();
                    self.unlock_front(suite);
                }
                Some(Some(_)) => return UnlockState::Locked { suite, slot: 0 },
            }
        }
    }
}

/// Drive `gate` from typed input until it is fully unlocked or cancelled
///
/// `persist` is called after every unlocked case with both stores.
///
/// # Errors
/// Propagates IO, digest and persistence errors
pub fn run_unlock(
    gate: &mut UnlockGate<'_>,
    input: &mut dyn Interaction,
    out: &mut dyn Write,
    persist: &mut dyn FnMut(&LockedStore, &UnlockedStore) -> GraderResult<()>,
) -> GraderResult<UnlockState> {
    let name = gate.test_name().to_string();
    writeln!(out, "{}", underline(&format!("Unlocking tests for {name}"), '='))?;
    writeln!(
        out,
        "At each \"?\", type in what you would expect the output to be if you had implemented {name}"
    )?;
    writeln!(out, "Type exit() to quit")?;
    writeln!(out)?;

    let mut shown_suite = None;
    loop {
        let UnlockState::Locked { suite, slot } = gate.state() else {
            break;
        };
        let Some(case) = gate.current_case() else {
            break;
        };
        if shown_suite != Some(suite) {
            let test = &gate.locked.tests[gate.locked_index];
            let shared = shown_suite.is_none().then(|| test.preamble_part(AmbleKey::All));
            for part in [shared.flatten(), test.preamble_part(AmbleKey::Suite(suite))]
                .into_iter()
                .flatten()
            {
                write_source(out, &part)?;
            }
            shown_suite = Some(suite);
        }
        let script = CaseScript::parse(&case.input);
        if let Some(step) = script.steps.get(slot) {
            write_source(out, &step.statement_source())?;
            writeln!(out, "{PS1}{}", step.prompt)?;
        }

        loop {
            let event = match input.read_line("? ")? {
                Some(line) => gate.submit(&line)?,
                None => gate.cancel(),
            };
            match event {
                UnlockEvent::Retry => writeln!(out, "Not quite...try again!")?,
                UnlockEvent::SlotSolved { .. } => break,
                UnlockEvent::CaseUnlocked { .. } => {
                    let (locked, unlocked) = gate.stores();
                    persist(locked, unlocked)?;
                    writeln!(out, "Congratulations, you have unlocked this case!")?;
                    writeln!(out)?;
                    break;
                }
                UnlockEvent::FullyUnlocked | UnlockEvent::Cancelled => break,
            }
        }
    }

    match gate.state() {
        UnlockState::Cancelled => {
            writeln!(out)?;
            writeln!(out, "{EXIT_MESSAGE}")?;
        }
        _ => writeln!(out, "You have unlocked all of the tests for this question!")?,
    }
    Ok(gate.state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Test, TestName};

    fn locked_store(key: &HashKey, cases: &[(&str, &[&str])]) -> LockedStore {
        let mut test = Test::new(TestName::One("q1".into()));
        test.suites.push(
            cases
                .iter()
                .map(|(input, answers)| Case {
                    input: (*input).to_string(),
                    outputs: answers.iter().map(|a| key.digest(a).unwrap()).collect(),
                    explanation: None,
                })
                .collect(),
        );
        LockedStore {
            hash_key: Some(key.clone()),
            tests: vec![test],
            ..LockedStore::default()
        }
    }

    #[test]
    fn wrong_then_right_answer() {
        let key = HashKey::new("k");
        let mut locked = locked_store(&key, &[("2 + 2", &["4"])]);
        let mut unlocked = UnlockedStore::default();
        let mut gate = UnlockGate::open(&mut locked, &mut unlocked, "q1").unwrap();
        assert_eq!(gate.submit("5").unwrap(), UnlockEvent::Retry);
        assert_eq!(gate.state(), UnlockState::Locked { suite: 0, slot: 0 });
        assert_eq!(gate.submit("4\n").unwrap(), UnlockEvent::CaseUnlocked { suite: 0 });
        assert_eq!(gate.state(), UnlockState::FullyUnlocked);
        drop(gate);
        assert_eq!(unlocked.tests[0].suites[0][0].outputs, vec!["4"]);
        assert!(locked.tests[0].suites[0].is_empty());
    }

    #[test]
    fn later_case_answer_does_not_skip_ahead() {
        let key = HashKey::new("k");
        let mut locked = locked_store(&key, &[("1 + 1", &["2"]), ("3 * 3", &["9"])]);
        let mut unlocked = UnlockedStore::default();
        let mut gate = UnlockGate::open(&mut locked, &mut unlocked, "q1").unwrap();
        assert_eq!(gate.submit("9").unwrap(), UnlockEvent::Retry);
        assert_eq!(gate.submit("2").unwrap(), UnlockEvent::CaseUnlocked { suite: 0 });
        assert_eq!(gate.state(), UnlockState::Locked { suite: 0, slot: 0 });
        assert_eq!(gate.current_case().unwrap().input, "3 * 3");
    }

    #[test]
    fn multi_slot_case_needs_every_slot() {
        let key = HashKey::new("k");
        let mut locked = locked_store(&key, &[("x = 1\n$ x\n$ x + 1", &["1", "2"])]);
        let mut unlocked = UnlockedStore::default();
        let mut gate = UnlockGate::open(&mut locked, &mut unlocked, "q1").unwrap();
        assert_eq!(gate.submit("1").unwrap(), UnlockEvent::SlotSolved { suite: 0, slot: 0 });
        assert_eq!(gate.submit("1").unwrap(), UnlockEvent::Retry);
        gate.cancel();
        assert_eq!(gate.state(), UnlockState::Cancelled);
        assert_eq!(gate.submit("2").unwrap(), UnlockEvent::Cancelled);
        drop(gate);
        assert!(unlocked.tests[0].suites.is_empty());
        assert_eq!(locked.tests[0].suites[0].len(), 1);
    }

    #[test]
    fn missing_key_and_unknown_test() {
        let key = HashKey::new("k");
        let mut locked = locked_store(&key, &[]);
        let mut unlocked = UnlockedStore::default();
        assert!(matches!(
            UnlockGate::open(&mut locked, &mut unlocked, "q7"),
            Err(GraderError::UnknownTest(_))
        ));
        locked.hash_key = None;
        assert!(matches!(
            UnlockGate::open(&mut locked, &mut unlocked, "q1"),
            Err(GraderError::MissingHashKey)
        ));
    }

    #[test]
    fn empty_suites_are_skipped() {
        let key = HashKey::new("k");
        let mut locked = locked_store(&key, &[]);
        locked.tests[0].suites.push(vec![Case {
            input: "7".into(),
            outputs: vec![key.digest("7").unwrap()],
            explanation: None,
        }]);
        let mut unlocked = UnlockedStore::default();
        let gate = UnlockGate::open(&mut locked, &mut unlocked, "q1").unwrap();
        assert_eq!(gate.state(), UnlockState::Locked { suite: 1, slot: 0 });
    }
}
