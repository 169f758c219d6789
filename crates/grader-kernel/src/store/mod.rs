//! Persisted test stores
//!
//! Locked and unlocked stores share one record shape, parameterised by the
//! output slot type: [`AnswerDigest`] for locked cases, expected-output
//! source text for unlocked ones. A locked case therefore cannot be handed
//! to the case runner.
//!
//! Stores are read whole and rewritten whole, through a temporary file that
//! is renamed over the target.

mod amble;

pub use amble::AmbleKey;

use crate::error::{GraderResult, StoreError};
use crate::hash::{AnswerDigest, HashKey};
use crate::script::CaseScript;
use grader_script::dedent;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Store whose outputs are keyed-hash digests
pub type LockedStore = TestStore<AnswerDigest>;
/// Store whose outputs are expected-output source expressions
pub type UnlockedStore = TestStore<String>;

/// Project-wide settings shared by every test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Statements run once to seed the shared environment
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

/// A test name, or a list of aliases whose first entry is displayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestName {
    One(String),
    Aliases(Vec<String>),
}

impl TestName {
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            TestName::One(name) => name,
            TestName::Aliases(names) => names.first().map_or("", String::as_str),
        }
    }

    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        match self {
            TestName::One(name) => name == query,
            TestName::Aliases(names) => names.iter().any(|n| n == query),
        }
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<O> {
    Many(Vec<O>),
    One(O),
}

fn one_or_many<'de, D, O>(deserializer: D) -> Result<Vec<O>, D::Error>
where
    D: Deserializer<'de>,
    O: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(outputs) => outputs,
        OneOrMany::One(output) => vec![output],
    })
}

/// One test case: an input script and one output per step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: Deserialize<'de>", serialize = "O: Serialize"))]
pub struct Case<O> {
    pub input: String,
    #[serde(deserialize_with = "one_or_many")]
    pub outputs: Vec<O>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl<O> Case<O> {
    #[must_use]
    pub fn script(&self) -> CaseScript {
        CaseScript::parse(&self.input)
    }
}

/// An ordered list of cases
pub type Suite<O> = Vec<Case<O>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: Deserialize<'de>", serialize = "O: Serialize"))]
pub struct Test<O> {
    pub name: TestName,
    #[serde(default)]
    pub suites: Vec<Suite<O>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub preamble: BTreeMap<AmbleKey, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub postamble: BTreeMap<AmbleKey, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Declared number of cases, locked ones included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cases: Option<usize>,
}

impl<O> Test<O> {
    #[must_use]
    pub fn new(name: TestName) -> Self {
        Self {
            name,
            suites: Vec::new(),
            preamble: BTreeMap::new(),
            postamble: BTreeMap::new(),
            note: None,
            total_cases: None,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.display_name()
    }

    /// `preamble["all"]` followed by `preamble[suite]`
    #[must_use]
    pub fn setup_for(&self, suite: usize) -> String {
        join_ambles(&self.preamble, suite)
    }

    /// `preamble[key]` alone, dedented
    #[must_use]
    pub fn preamble_part(&self, key: AmbleKey) -> Option<String> {
        self.preamble.get(&key).map(|src| dedent(src).join("\n"))
    }

    /// `postamble["all"]` followed by `postamble[suite]`
    #[must_use]
    pub fn teardown_for(&self, suite: usize) -> String {
        join_ambles(&self.postamble, suite)
    }

    #[must_use]
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(Vec::len).sum()
    }

    /// Cases declared by `total_cases` but not present here
    #[must_use]
    pub fn locked_remaining(&self) -> usize {
        self.total_cases
            .map_or(0, |total| total.saturating_sub(self.case_count()))
    }

    /// Copy of the metadata with no cases
    #[must_use]
    pub fn skeleton<P>(&self) -> Test<P> {
        Test {
            name: self.name.clone(),
            suites: Vec::new(),
            preamble: self.preamble.clone(),
            postamble: self.postamble.clone(),
            note: self.note.clone(),
            total_cases: self.total_cases,
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        for (s, suite) in self.suites.iter().enumerate() {
            for (c, case) in suite.iter().enumerate() {
                let steps = case.script().len();
                if steps != case.outputs.len() {
                    return Err(StoreError::malformed(
                        self.display_name(),
                        format!(
                            "suite {s} case {c} has {steps} steps but {} outputs",
                            case.outputs.len()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn join_ambles(ambles: &BTreeMap<AmbleKey, String>, suite: usize) -> String {
    [AmbleKey::All, AmbleKey::Suite(suite)]
        .iter()
        .filter_map(|key| ambles.get(key))
        .flat_map(|src| dedent(src))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A persisted collection of tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: Deserialize<'de>", serialize = "O: Serialize"))]
pub struct TestStore<O> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_key: Option<HashKey>,
    #[serde(default)]
    pub project_info: ProjectInfo,
    #[serde(default)]
    pub tests: Vec<Test<O>>,
}

impl<O> Default for TestStore<O> {
    fn default() -> Self {
        Self {
            hash_key: None,
            project_info: ProjectInfo::default(),
            tests: Vec::new(),
        }
    }
}

impl<O> TestStore<O> {
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tests.iter().position(|t| t.name.matches(name))
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Test<O>> {
        self.tests.iter().find(|t| t.name.matches(name))
    }

    /// Check slot counts against step counts for every case
    ///
    /// # Errors
    /// Returns [`StoreError::Malformed`] for the first offending case
    pub fn validate(&self) -> Result<(), StoreError> {
        self.tests.iter().try_for_each(Test::validate)
    }
}

impl<O: Serialize + DeserializeOwned> TestStore<O> {
    /// Read, parse and validate a store file
    ///
    /// # Errors
    /// Returns [`StoreError`] for unreadable, unparsable or malformed stores
    pub fn load(path: impl AsRef<Path>) -> GraderResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| StoreError::io_error(path, e))?;
        let store: Self =
            serde_json::from_str(&text).map_err(|e| StoreError::json_error(path, e))?;
        store.validate()?;
        tracing::debug!(path = %path.display(), tests = store.tests.len(), "store loaded");
        Ok(store)
    }

    /// Rewrite the whole store at `path`
    ///
    /// # Errors
    /// Returns [`StoreError`] if serialization or any file operation fails
    pub fn save(&self, path: impl AsRef<Path>) -> GraderResult<()> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).map_err(|e| StoreError::json_error(path, e))?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| StoreError::io_error(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::io_error(path, e))?;
        tracing::debug!(path = %path.display(), "store saved");
        Ok(())
    }
}
