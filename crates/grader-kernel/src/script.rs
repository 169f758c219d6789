//! Splitting a case input into evaluation steps

use grader_script::dedent;

/// Marker that starts a prompt line
pub const PROMPT_MARKER: &str = "$ ";

/// One evaluation step: statements to run, then a prompt to compare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub statements: Vec<String>,
    pub prompt: String,
}

impl Step {
    /// Statements joined back into one source block
    #[must_use]
    pub fn statement_source(&self) -> String {
        self.statements.join("\n")
    }
}

/// A case input split into steps
///
/// A line starting with `$ ` is a prompt. When no line is marked the last
/// line is the only prompt. Lines after the last prompt are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaseScript {
    pub steps: Vec<Step>,
}

impl CaseScript {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let lines = dedent(input);
        let marked = lines.iter().any(|l| l.starts_with(PROMPT_MARKER));
        let mut steps = Vec::new();
        let mut pending = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let is_prompt = if marked {
                line.starts_with(PROMPT_MARKER)
            } else {
                i + 1 == lines.len()
            };
            if is_prompt {
                steps.push(Step {
                    statements: std::mem::take(&mut pending),
                    prompt: line.trim_start_matches(['$', ' ']).to_string(),
                });
            } else {
                pending.push(line.clone());
            }
        }
        Self { steps }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
