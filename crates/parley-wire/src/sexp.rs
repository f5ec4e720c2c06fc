//! Minimal s-expression reader for solver responses.
//!
//! Covers the subset of SMT-LIB concrete syntax that shows up in solver
//! *output*: atoms, lists, `"…"` string literals (with `""` escapes) and
//! `|…|` quoted symbols. Atoms keep their delimiters verbatim; use
//! [`Sexp::string_content`] or [`Sexp::symbol_name`] to strip them.

use std::fmt;

use thiserror::Error;

/// One parsed s-expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sexp {
    /// An atom, kept exactly as written (including `"` or `|` delimiters).
    Atom(String),
    /// A parenthesized list of child expressions.
    List(Vec<Sexp>),
}

/// Reader failure with the byte offset where it happened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SexpError {
    #[error("unexpected end of input")]
    UnexpectedEnd,
    #[error("unbalanced `)` at byte {0}")]
    UnbalancedClose(usize),
    #[error("unterminated {kind} starting at byte {at}")]
    Unterminated { kind: &'static str, at: usize },
    #[error("trailing content after s-expression: `{0}`")]
    Trailing(String),
}

impl Sexp {
    /// The atom text, if this node is an atom.
    pub fn atom(&self) -> Option<&str> {
        match self {
            Sexp::Atom(text) => Some(text.as_str()),
            Sexp::List(_) => None,
        }
    }

    /// The child slice, if this node is a list.
    pub fn list(&self) -> Option<&[Sexp]> {
        match self {
            Sexp::Atom(_) => None,
            Sexp::List(items) => Some(items.as_slice()),
        }
    }

    /// Content of a `"…"` string literal atom, with `""` escapes resolved.
    pub fn string_content(&self) -> Option<String> {
        let text = self.atom()?;
        let inner = text.strip_prefix('"')?.strip_suffix('"')?;
        Some(inner.replace("\"\"", "\""))
    }

    /// Symbol name with `|…|` quoting stripped; plain atoms come back as-is.
    pub fn symbol_name(&self) -> Option<&str> {
        let text = self.atom()?;
        if text.starts_with('"') {
            return None;
        }
        Some(
            text.strip_prefix('|')
                .and_then(|t| t.strip_suffix('|'))
                .unwrap_or(text),
        )
    }
}

impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexp::Atom(text) => f.write_str(text),
            Sexp::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Parse exactly one s-expression; trailing non-whitespace is an error.
pub fn parse(input: &str) -> Result<Sexp, SexpError> {
    let bytes = input.as_bytes();
    let mut pos = skip_whitespace(bytes, 0);
    let (sexp, next) = parse_at(input, pos)?;
    pos = skip_whitespace(bytes, next);
    if pos < bytes.len() {
        return Err(SexpError::Trailing(input[pos..].trim().to_string()));
    }
    Ok(sexp)
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn parse_at(input: &str, pos: usize) -> Result<(Sexp, usize), SexpError> {
    let bytes = input.as_bytes();
    if pos >= bytes.len() {
        return Err(SexpError::UnexpectedEnd);
    }
    match bytes[pos] {
        b'(' => parse_list(input, pos),
        b')' => Err(SexpError::UnbalancedClose(pos)),
        b'"' => parse_delimited(input, pos, "string literal"),
        b'|' => parse_delimited(input, pos, "quoted symbol"),
        _ => parse_plain_atom(input, pos),
    }
}

fn parse_list(input: &str, open: usize) -> Result<(Sexp, usize), SexpError> {
    let bytes = input.as_bytes();
    let mut items = Vec::new();
    let mut pos = skip_whitespace(bytes, open + 1);
    loop {
        if pos >= bytes.len() {
            return Err(SexpError::Unterminated {
                kind: "list",
                at: open,
            });
        }
        if bytes[pos] == b')' {
            return Ok((Sexp::List(items), pos + 1));
        }
        let (item, next) = parse_at(input, pos)?;
        items.push(item);
        pos = skip_whitespace(bytes, next);
    }
}

fn parse_delimited(
    input: &str,
    open: usize,
    kind: &'static str,
) -> Result<(Sexp, usize), SexpError> {
    let bytes = input.as_bytes();
    let delim = bytes[open];
    let mut pos = open + 1;
    while pos < bytes.len() {
        if bytes[pos] == delim {
            // SMT-LIB escapes `"` inside strings by doubling it.
            if delim == b'"' && bytes.get(pos + 1) == Some(&b'"') {
                pos += 2;
                continue;
            }
            let text = input[open..=pos].to_string();
            return Ok((Sexp::Atom(text), pos + 1));
        }
        pos += 1;
    }
    Err(SexpError::Unterminated { kind, at: open })
}

fn parse_plain_atom(input: &str, start: usize) -> Result<(Sexp, usize), SexpError> {
    let bytes = input.as_bytes();
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'(' | b')' | b'"' | b'|' => break,
            c if c.is_ascii_whitespace() => break,
            _ => pos += 1,
        }
    }
    Ok((Sexp::Atom(input[start..pos].to_string()), pos))
}
