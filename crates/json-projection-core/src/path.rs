//! Output-path grammar and parser.
//!
//! Output paths address slots in the projected document:
//!
//! ```text
//! path    := "$" segment+
//! segment := "." key ( "[" (index | query) "]" )*
//! key     := [A-Za-z_][A-Za-z0-9_]*
//! index   := [0-9]+
//! query   := "?(" pred ( "&&" pred )* ")"
//! pred    := "@." key "==" literal
//! literal := "'…'" | "\"…\"" | [0-9]+ | true | false | null
//! ```
//!
//! The parser is a character-level tokenizer rather than a `findall`-style
//! regex scan, so a malformed path is rejected with the byte offset of the
//! offending character instead of being silently skipped over.

use std::iter::Peekable;
use std::str::CharIndices;

use serde_json::Value;

use crate::error::ProjectError;

// ---------------------------------------------------------------------------
// Parsed path model
// ---------------------------------------------------------------------------

/// One `.key[index][?(…)]` step of a parsed output path.
///
/// `index` and `query` may both be present, meaning: among the list elements
/// matching `query`, select the element at position `index`. When a segment
/// carries several bracket suffixes of the same kind, the last one wins.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    pub key: String,
    pub index: Option<usize>,
    pub query: Option<Vec<Predicate>>,
}

/// A single `@.key == literal` equality predicate inside a query.
///
/// String literals are stored with their quotes stripped; integer literals
/// become JSON numbers; `true`/`false`/`null` become the corresponding JSON
/// values. Predicate evaluation compares without further coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub key: String,
    pub value: Value,
}

/// Parse an output path into its ordered segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, ProjectError> {
    Tokenizer::new(path).parse()
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

struct Tokenizer<'a> {
    path: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(path: &'a str) -> Self {
        Tokenizer {
            path,
            chars: path.char_indices().peekable(),
        }
    }

    fn error(&self, offset: usize, message: &str) -> ProjectError {
        ProjectError::PathSyntax {
            path: self.path.to_string(),
            message: format!("{message} at byte {offset}"),
        }
    }

    fn eof_error(&self, message: &str) -> ProjectError {
        self.error(self.path.len(), message)
    }

    fn parse(mut self) -> Result<Vec<PathSegment>, ProjectError> {
        match self.chars.next() {
            Some((_, '$')) => {}
            _ => return Err(self.error(0, "expected `$` root")),
        }

        let mut segments = Vec::new();
        while let Some(&(offset, ch)) = self.chars.peek() {
            if ch != '.' {
                return Err(self.error(offset, "expected `.` before segment key"));
            }
            self.chars.next();
            segments.push(self.segment()?);
        }

        if segments.is_empty() {
            return Err(self.eof_error("path needs at least one segment"));
        }
        Ok(segments)
    }

    fn segment(&mut self) -> Result<PathSegment, ProjectError> {
        let key = self.key()?;
        let mut index = None;
        let mut query = None;

        while let Some(&(_, '[')) = self.chars.peek() {
            self.chars.next();
            match self.chars.peek() {
                Some(&(_, c)) if c.is_ascii_digit() => index = Some(self.index()?),
                Some(&(_, '?')) => {
                    self.chars.next();
                    query = Some(self.query()?);
                }
                Some(&(offset, _)) => {
                    return Err(self.error(offset, "expected index or `?(` query after `[`"))
                }
                None => return Err(self.eof_error("unterminated `[`")),
            }
            match self.chars.next() {
                Some((_, ']')) => {}
                Some((offset, _)) => return Err(self.error(offset, "expected closing `]`")),
                None => return Err(self.eof_error("expected closing `]`")),
            }
        }

        Ok(PathSegment { key, index, query })
    }

    fn key(&mut self) -> Result<String, ProjectError> {
        let mut key = String::new();
        match self.chars.peek() {
            Some(&(_, c)) if c.is_ascii_alphabetic() || c == '_' => {
                key.push(c);
                self.chars.next();
            }
            Some(&(offset, _)) => {
                return Err(self.error(offset, "key must start with a letter or `_`"))
            }
            None => return Err(self.eof_error("expected segment key")),
        }
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                key.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Ok(key)
    }

    fn index(&mut self) -> Result<usize, ProjectError> {
        let start = match self.chars.peek() {
            Some(&(offset, _)) => offset,
            None => self.path.len(),
        };
        let mut digits = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        digits
            .parse::<usize>()
            .map_err(|_| self.error(start, "index out of range"))
    }

    /// Parses the query body after the `?` has been consumed.
    fn query(&mut self) -> Result<Vec<Predicate>, ProjectError> {
        match self.chars.next() {
            Some((_, '(')) => {}
            Some((offset, _)) => return Err(self.error(offset, "expected `(` after `?`")),
            None => return Err(self.eof_error("expected `(` after `?`")),
        }

        let mut predicates = vec![self.predicate()?];
        loop {
            self.skip_spaces();
            match self.chars.peek() {
                Some(&(_, ')')) => {
                    self.chars.next();
                    return Ok(predicates);
                }
                Some(&(offset, '&')) => {
                    self.chars.next();
                    match self.chars.next() {
                        Some((_, '&')) => {}
                        _ => return Err(self.error(offset, "expected `&&` between predicates")),
                    }
                    predicates.push(self.predicate()?);
                }
                Some(&(offset, _)) => {
                    return Err(self.error(offset, "expected `&&` or `)` in query"))
                }
                None => return Err(self.eof_error("unterminated query")),
            }
        }
    }

    fn predicate(&mut self) -> Result<Predicate, ProjectError> {
        self.skip_spaces();
        match self.chars.next() {
            Some((_, '@')) => {}
            Some((offset, _)) => {
                return Err(self.error(offset, "predicate must start with `@.`"))
            }
            None => return Err(self.eof_error("predicate must start with `@.`")),
        }
        match self.chars.next() {
            Some((_, '.')) => {}
            Some((offset, _)) => {
                return Err(self.error(offset, "predicate must start with `@.`"))
            }
            None => return Err(self.eof_error("predicate must start with `@.`")),
        }

        let key = self.key()?;

        self.skip_spaces();
        for _ in 0..2 {
            match self.chars.next() {
                Some((_, '=')) => {}
                Some((offset, _)) => return Err(self.error(offset, "expected `==` in predicate")),
                None => return Err(self.eof_error("expected `==` in predicate")),
            }
        }
        self.skip_spaces();

        let value = self.literal()?;
        Ok(Predicate { key, value })
    }

    fn literal(&mut self) -> Result<Value, ProjectError> {
        match self.chars.peek() {
            Some(&(_, quote @ ('\'' | '"'))) => {
                self.chars.next();
                let mut text = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, c)) if c == quote => return Ok(Value::String(text)),
                        Some((_, c)) => text.push(c),
                        None => return Err(self.eof_error("unterminated string literal")),
                    }
                }
            }
            Some(&(offset, c)) if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&(_, c)) = self.chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                let number: u64 = digits
                    .parse()
                    .map_err(|_| self.error(offset, "integer literal out of range"))?;
                Ok(Value::Number(number.into()))
            }
            Some(&(offset, c)) if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&(_, c)) = self.chars.peek() {
                    if c.is_ascii_alphabetic() {
                        word.push(c);
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    _ => Err(self.error(offset, "expected `true`, `false`, or `null`")),
                }
            }
            Some(&(offset, _)) => Err(self.error(offset, "expected literal")),
            None => Err(self.eof_error("expected literal")),
        }
    }

    fn skip_spaces(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seg(key: &str, index: Option<usize>, query: Option<Vec<Predicate>>) -> PathSegment {
        PathSegment {
            key: key.to_string(),
            index,
            query,
        }
    }

    fn pred(key: &str, value: Value) -> Predicate {
        Predicate {
            key: key.to_string(),
            value,
        }
    }

    // -----------------------------------------------------------------------
    // Plain paths
    // -----------------------------------------------------------------------

    #[test]
    fn test_plain_key_chain() {
        let segments = parse_path("$.a.b_2.c").unwrap();
        assert_eq!(
            segments,
            vec![
                seg("a", None, None),
                seg("b_2", None, None),
                seg("c", None, None),
            ]
        );
    }

    #[test]
    fn test_index_segment() {
        let segments = parse_path("$.items[3].name").unwrap();
        assert_eq!(
            segments,
            vec![seg("items", Some(3), None), seg("name", None, None)]
        );
    }

    #[test]
    fn test_repeated_index_last_wins() {
        let segments = parse_path("$.a[1][2]").unwrap();
        assert_eq!(segments, vec![seg("a", Some(2), None)]);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn test_query_single_predicate_strips_quotes() {
        let segments = parse_path("$.reports[?(@.title=='Residences Report')].residences").unwrap();
        assert_eq!(
            segments,
            vec![
                seg(
                    "reports",
                    None,
                    Some(vec![pred("title", json!("Residences Report"))]),
                ),
                seg("residences", None, None),
            ]
        );
    }

    #[test]
    fn test_query_multiple_predicates_and_literal_kinds() {
        let segments =
            parse_path(r#"$.rows[?(@.kind == "x" && @.count==2 && @.live==true && @.gone==null)]"#)
                .unwrap();
        assert_eq!(
            segments,
            vec![seg(
                "rows",
                None,
                Some(vec![
                    pred("kind", json!("x")),
                    pred("count", json!(2)),
                    pred("live", json!(true)),
                    pred("gone", json!(null)),
                ]),
            )]
        );
    }

    #[test]
    fn test_query_and_index_both_present() {
        let segments = parse_path("$.rows[?(@.k=='v')][1]").unwrap();
        assert_eq!(
            segments,
            vec![seg("rows", Some(1), Some(vec![pred("k", json!("v"))]))]
        );

        // Order of the bracket suffixes does not matter
        let segments = parse_path("$.rows[1][?(@.k=='v')]").unwrap();
        assert_eq!(
            segments,
            vec![seg("rows", Some(1), Some(vec![pred("k", json!("v"))]))]
        );
    }

    // -----------------------------------------------------------------------
    // Rejections
    // -----------------------------------------------------------------------

    #[test]
    fn test_rejects_malformed_paths() {
        for path in [
            "",
            "a.b",
            "$",
            "$.",
            "$.1a",
            "$.a[",
            "$.a[]",
            "$.a[x]",
            "$.a b",
            "$.a[?(@.x='v')]",
            "$.a[?(@.x=='v']",
            "$.a[?(x=='v')]",
            "$.a[?(@.x==frob)]",
            "$.a[?(@.x=='v' & @.y==1)]",
        ] {
            let err = parse_path(path).unwrap_err();
            match err {
                ProjectError::PathSyntax { path: p, .. } => assert_eq!(p, path),
                other => panic!("expected PathSyntax for {path:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_error_message_carries_offset() {
        let err = parse_path("$.a[x]").unwrap_err();
        let display = format!("{}", err);
        assert!(display.contains("byte 4"), "got: {display}");
    }
}
