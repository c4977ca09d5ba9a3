//! Placeholder scanning.
//!
//! Finds `@N` and `@name` references in a template. A run of two or more `@`
//! characters is a driver-native variable (`@@ROWCOUNT`, `@@user1`) and produces
//! no token; the run and the identifier after it are left in the text verbatim.
//! Quoted text and comments are skipped (see [`lex`](super::lexer::lex)).

use super::lexer::{Lexeme, lex};
use std::ops::Range;

/// What a placeholder refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `@0`, `@1`, ... a slot in the raw argument list.
    Index(usize),
    /// `@name`, a field of a named argument bag.
    Name(String),
}

/// One placeholder occurrence in template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte range of the whole `@ref` occurrence.
    pub span: Range<usize>,
    pub reference: Reference,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Tokenize placeholders in `sql`, in textual order.
pub fn scan(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for lexeme in lex(sql).into_iter().filter(Lexeme::is_code) {
        scan_code(sql, lexeme.span, &mut tokens);
    }
    tokens
}

fn scan_code(sql: &str, span: Range<usize>, tokens: &mut Vec<Token>) {
    let offset = span.start;
    let code = &sql[span];
    let mut chars = code.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '@' {
            continue;
        }
        let mut run = 1;
        while matches!(chars.peek(), Some((_, '@'))) {
            chars.next();
            run += 1;
        }

        let word_start = pos + run;
        let mut word_end = word_start;
        while let Some(&(i, next)) = chars.peek() {
            if !is_word_char(next) {
                break;
            }
            word_end = i + next.len_utf8();
            chars.next();
        }

        if run > 1 || word_end == word_start {
            continue;
        }

        let word = &code[word_start..word_end];
        let reference = if word.bytes().all(|b| b.is_ascii_digit()) {
            // Overlong indices can never be in range.
            Reference::Index(word.parse().unwrap_or(usize::MAX))
        } else {
            Reference::Name(word.to_string())
        };
        tokens.push(Token {
            span: offset + pos..offset + word_end,
            reference,
        });
    }
}
