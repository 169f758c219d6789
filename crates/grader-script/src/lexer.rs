//! Tokenizer with indentation tracking
//!
//! Produces a flat token stream where block structure is made explicit by
//! `Indent`/`Dedent` tokens. Newlines inside brackets are ignored.

use crate::error::{ScriptError, ScriptResult};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) tok: Tok,
    pub(crate) line: usize,
}

// Longest operators first so that `**` wins over `*`.
const OPERATORS: &[&str] = &[
    "**=", "//=", "==", "!=", "<=", ">=", "**", "//", "+=", "-=", "*=", "/=", "%=", "->", "+",
    "-", "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".",
];

pub(crate) fn tokenize(src: &str) -> ScriptResult<Vec<Token>> {
    let mut out = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut depth = 0usize;

    for (idx, raw) in src.lines().enumerate() {
        let line_no = idx + 1;
        let width = raw.chars().take_while(|c| *c == ' ' || *c == '\t').count();
        let body = &raw[width..];
        let logical_start = depth == 0;

        if logical_start {
            if body.is_empty() || body.starts_with('#') {
                continue;
            }
            let current = *indents.last().unwrap_or(&0);
            if width > current {
                indents.push(width);
                out.push(Token { tok: Tok::Indent, line: line_no });
            } else {
                while width < *indents.last().unwrap_or(&0) {
                    indents.pop();
                    out.push(Token { tok: Tok::Dedent, line: line_no });
                }
                if width != *indents.last().unwrap_or(&0) {
                    return Err(ScriptError::syntax(
                        line_no,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }
        }

        scan_line(body, line_no, &mut depth, &mut out)?;

        if depth == 0 && !matches!(out.last(), Some(Token { tok: Tok::Newline, .. }) | None) {
            out.push(Token { tok: Tok::Newline, line: line_no });
        }
    }

    let last_line = src.lines().count().max(1);
    if depth > 0 {
        return Err(ScriptError::syntax(last_line, "unexpected end of input inside brackets"));
    }
    while indents.len() > 1 {
        indents.pop();
        out.push(Token { tok: Tok::Dedent, line: last_line });
    }
    out.push(Token { tok: Tok::Eof, line: last_line });
    Ok(out)
}

fn scan_line(body: &str, line: usize, depth: &mut usize, out: &mut Vec<Token>) -> ScriptResult<()> {
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == ' ' || c == '\t' || c == '\r' {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let (tok, next) = scan_number(&chars, i, line)?;
            out.push(Token { tok, line });
            i = next;
            continue;
        }
        if c == '\'' || c == '"' {
            let (text, next) = scan_string(&chars, i, line)?;
            out.push(Token { tok: Tok::Str(text), line });
            i = next;
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            out.push(Token { tok: Tok::Name(name), line });
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        let Some(&op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
            return Err(ScriptError::syntax(line, format!("invalid character '{c}'")));
        };
        match op {
            "(" | "[" | "{" => *depth += 1,
            ")" | "]" | "}" => {
                *depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ScriptError::syntax(line, format!("unmatched '{op}'")))?;
            }
            _ => {}
        }
        out.push(Token { tok: Tok::Op(op), line });
        i += op.chars().count();
    }
    Ok(())
}

fn scan_number(chars: &[char], start: usize, line: usize) -> ScriptResult<(Tok, usize)> {
    let mut i = start;
    let mut is_float = false;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let tok = if is_float {
        Tok::Float(
            text.parse()
                .map_err(|_| ScriptError::syntax(line, format!("invalid number '{text}'")))?,
        )
    } else {
        Tok::Int(
            text.parse()
                .map_err(|_| ScriptError::syntax(line, format!("integer literal too large '{text}'")))?,
        )
    };
    Ok((tok, i))
}

fn scan_string(chars: &[char], start: usize, line: usize) -> ScriptResult<(String, usize)> {
    let quote = chars[start];
    let mut i = start + 1;
    let mut text = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((text, i + 1));
        }
        if c == '\\' {
            let escaped = chars
                .get(i + 1)
                .ok_or_else(|| ScriptError::syntax(line, "unterminated string literal"))?;
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '0' => text.push('\0'),
                '\\' | '\'' | '"' => text.push(*escaped),
                other => {
                    text.push('\\');
                    text.push(*other);
                }
            }
            i += 2;
            continue;
        }
        text.push(c);
        i += 1;
    }
    Err(ScriptError::syntax(line, "unterminated string literal"))
}
