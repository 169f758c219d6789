//! Source text normalisation

/// Split a (possibly multiline) snippet into lines, removing common indentation.
///
/// Leading blank lines and trailing whitespace of the whole text are dropped.
/// The indentation width of the first remaining line is then stripped from the
/// front of every line; lines indented less than that lose only the
/// whitespace they have.
#[must_use]
pub fn dedent(src: &str) -> Vec<String> {
    let trimmed = src.trim_start_matches(['\n', '\r']).trim_end();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let width = trimmed
        .chars()
        .take_while(|c| c.is_whitespace() && *c != '\n')
        .count();

    trimmed
        .lines()
        .map(|line| {
            let strip = line
                .chars()
                .take(width)
                .take_while(|c| c.is_whitespace())
                .map(char::len_utf8)
                .sum::<usize>();
            line[strip..].to_string()
        })
        .collect()
}

/// [`dedent`] joined back into one newline-terminated block
#[must_use]
pub fn dedent_block(src: &str) -> String {
    let mut out = String::new();
    for line in dedent(src) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_first_line_indentation() {
        let lines = dedent("\n    x = 1\n    if x:\n        y = 2\n");
        assert_eq!(lines, vec!["x = 1", "if x:", "    y = 2"]);
    }

    #[test]
    fn empty_source_has_no_lines() {
        assert!(dedent("   \n\n  ").is_empty());
        assert_eq!(dedent_block(""), "");
    }

    #[test]
    fn less_indented_lines_lose_only_their_whitespace() {
        let lines = dedent("    a\n  b\nc");
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn uniform_indent_round_trips(
            body in proptest::collection::vec("[a-z][a-z0-9 =+]{0,12}", 1..6),
            indent in 0usize..8,
        ) {
            let pad = " ".repeat(indent);
            let src: String = body
                .iter()
                .map(|l| format!("{pad}{}\n", l.trim_end()))
                .collect();
            let expected: Vec<String> = body.iter().map(|l| l.trim_end().to_string()).collect();
            // trailing blank lines are trimmed along with the text's tail
            let mut expected = expected;
            while expected.last().is_some_and(String::is_empty) {
                expected.pop();
            }
            prop_assert_eq!(dedent(&src), expected);
        }
    }
}
