//! Turning an authored store into a locked/unlocked pair

use crate::error::GraderResult;
use crate::hash::HashKey;
use crate::store::{Case, LockedStore, Test, UnlockedStore};

/// Lock every case of `authored` under `key`
///
/// The locked store holds every case with digested outputs. The unlocked
/// store keeps the tests' metadata with no cases, and `total_cases` set so
/// runs can report how many cases are still locked.
///
/// # Errors
/// Returns [`crate::GraderError::Digest`] if `key` is unusable
pub fn lock_store(
    authored: &UnlockedStore,
    key: &HashKey,
) -> GraderResult<(LockedStore, UnlockedStore)> {
    let mut locked = LockedStore {
        hash_key: Some(key.clone()),
        project_info: authored.project_info.clone(),
        tests: Vec::with_capacity(authored.tests.len()),
    };
    let mut unlocked = UnlockedStore {
        hash_key: None,
        project_info: authored.project_info.clone(),
        tests: Vec::with_capacity(authored.tests.len()),
    };

    for test in &authored.tests {
        let total = test.total_cases.unwrap_or_else(|| test.case_count());
        let mut locked_test: Test<_> = test.skeleton();
        locked_test.total_cases = Some(total);
        for suite in &test.suites {
            let cases = suite
                .iter()
                .map(|case| {
                    let outputs = case
                        .outputs
                        .iter()
                        .map(|answer| key.digest(answer))
                        .collect::<GraderResult<Vec<_>>>()?;
                    Ok(Case {
                        input: case.input.clone(),
                        outputs,
                        explanation: case.explanation.clone(),
                    })
                })
                .collect::<GraderResult<Vec<_>>>()?;
            locked_test.suites.push(cases);
        }

        let mut skeleton: Test<String> = test.skeleton();
        skeleton.total_cases = Some(total);
        tracing::debug!(test = test.display_name(), cases = total, "test locked");
        locked.tests.push(locked_test);
        unlocked.tests.push(skeleton);
    }
    Ok((locked, unlocked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TestName;

    #[test]
    fn locked_outputs_verify_against_authored_answers() {
        let mut test = Test::new(TestName::Aliases(vec!["q2".into(), "2".into()]));
        test.suites.push(vec![Case {
            input: "x = [1]\n$ x\n$ len(x)".into(),
            outputs: vec!["[1]".into(), "1".into()],
            explanation: None,
        }]);
        let authored = UnlockedStore {
            tests: vec![test],
            ..UnlockedStore::default()
        };
        let key = HashKey::new("lock-key");
        let (locked, unlocked) = lock_store(&authored, &key).unwrap();

        locked.validate().unwrap();
        let case = &locked.tests[0].suites[0][0];
        assert!(key.verify("[1]", &case.outputs[0]).unwrap());
        assert!(key.verify("1", &case.outputs[1]).unwrap());
        assert_eq!(locked.hash_key.as_ref(), Some(&key));

        let skeleton = unlocked.find("2").unwrap();
        assert!(skeleton.suites.is_empty());
        assert_eq!(skeleton.total_cases, Some(1));
        assert_eq!(skeleton.locked_remaining(), 1);
    }
}
