//! Splits SQL text into code and opaque regions.
//!
//! Opaque regions are never searched for placeholders or keywords:
//!
//! - `'...'` strings (with `''` escapes, and `\'` escapes after an `E` prefix),
//! - `"..."` identifiers,
//! - `$$...$$` and `$tag$...$tag$` dollar-quoted strings,
//! - `-- ...` line comments (up to, not including, the newline),
//! - `/* ... */` block comments, which may nest.
//!
//! An unterminated region runs to the end of the text. All delimiters are ASCII,
//! so every region boundary is a char boundary.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    Code,
    Literal,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub span: Range<usize>,
}

impl Lexeme {
    pub fn is_code(&self) -> bool {
        self.kind == LexemeKind::Code
    }
}

/// Split `sql` into consecutive regions covering the whole text.
pub fn lex(sql: &str) -> Vec<Lexeme> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match opaque_at(bytes, i) {
            Some((kind, end)) => {
                if code_start < i {
                    out.push(Lexeme {
                        kind: LexemeKind::Code,
                        span: code_start..i,
                    });
                }
                out.push(Lexeme { kind, span: i..end });
                i = end;
                code_start = end;
            }
            None => i += 1,
        }
    }
    if code_start < bytes.len() {
        out.push(Lexeme {
            kind: LexemeKind::Code,
            span: code_start..bytes.len(),
        });
    }

    out
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

fn opaque_at(b: &[u8], i: usize) -> Option<(LexemeKind, usize)> {
    match b[i] {
        b'-' if b.get(i + 1) == Some(&b'-') => Some((LexemeKind::Comment, line_end(b, i))),
        b'/' if b.get(i + 1) == Some(&b'*') => Some((LexemeKind::Comment, block_end(b, i))),
        b'\'' => Some((LexemeKind::Literal, quoted_end(b, i, backslash_escapes(b, i)))),
        b'"' => Some((LexemeKind::Literal, quoted_end(b, i, false))),
        b'$' if i == 0 || !(is_word_byte(b[i - 1]) || b[i - 1] == b'$') => {
            let len = dollar_tag_len(b, i)?;
            Some((LexemeKind::Literal, dollar_end(b, i, len)))
        }
        _ => None,
    }
}

fn line_end(b: &[u8], i: usize) -> usize {
    b[i..]
        .iter()
        .position(|&c| c == b'\n')
        .map_or(b.len(), |p| i + p)
}

fn block_end(b: &[u8], i: usize) -> usize {
    let mut depth = 0usize;
    let mut j = i;
    while j + 1 < b.len() {
        match (b[j], b[j + 1]) {
            (b'/', b'*') => {
                depth += 1;
                j += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                j += 2;
                if depth == 0 {
                    return j;
                }
            }
            _ => j += 1,
        }
    }
    b.len()
}

/// `E'...'` and `e'...'` strings treat backslash as an escape.
fn backslash_escapes(b: &[u8], i: usize) -> bool {
    i > 0 && matches!(b[i - 1], b'E' | b'e') && (i == 1 || !is_word_byte(b[i - 2]))
}

fn quoted_end(b: &[u8], i: usize, backslash: bool) -> usize {
    let quote = b[i];
    let mut j = i + 1;
    while j < b.len() {
        if backslash && b[j] == b'\\' {
            j += 2;
            continue;
        }
        if b[j] == quote {
            if b.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    b.len()
}

/// Length of the opening `$tag$` delimiter at `i`, if there is one. A `$` followed
/// by a digit is a positional parameter, not a delimiter.
fn dollar_tag_len(b: &[u8], i: usize) -> Option<usize> {
    let mut j = i + 1;
    match b.get(j) {
        Some(b'$') => return Some(2),
        Some(&c) if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 => j += 1,
        _ => return None,
    }
    while j < b.len() && is_word_byte(b[j]) {
        j += 1;
    }
    (b.get(j) == Some(&b'$')).then(|| j + 1 - i)
}

fn dollar_end(b: &[u8], i: usize, len: usize) -> usize {
    let tag = &b[i..i + len];
    let body = i + len;
    b[body..]
        .windows(len)
        .position(|w| w == tag)
        .map_or(b.len(), |p| body + p + len)
}
