//! Line-pattern engine shared by the text formats
//!
//! A [`LineCursor`] hands out trimmed logical lines, skipping blank lines
//! and comments, with room for one pushed-back line. A [`PatternSet`]
//! classifies a line by its leading keyword. Counted blocks ("N rows
//! follow") are read with [`LineCursor::read_rows`], which reports a block
//! cut short by end of file or by the next keyword as truncated input.

pub mod asc;
pub mod cob;
pub mod obj;
pub mod plg;

use crate::error::{ImportError, Location, Result};
use crate::io::source::ByteSource;

/// Line reader with blank/comment skipping and one line of pushback
pub struct LineCursor<'s> {
    source: &'s mut dyn ByteSource,
    line: usize,
    pushed: Option<(usize, String)>,
    comments: &'static [&'static str],
}

impl<'s> LineCursor<'s> {
    /// Cursor treating lines starting with any of `comments` as comments
    pub fn new(source: &'s mut dyn ByteSource, comments: &'static [&'static str]) -> Self {
        Self {
            source,
            line: 0,
            pushed: None,
            comments,
        }
    }

    /// 1-based number of the line most recently returned
    pub fn line_number(&self) -> usize {
        self.line
    }

    pub fn location(&self) -> Location {
        Location::Line(self.line)
    }

    /// Next trimmed line, including blank and comment lines
    pub fn next_raw(&mut self) -> Result<Option<String>> {
        if let Some((line, text)) = self.pushed.take() {
            self.line = line;
            return Ok(Some(text));
        }
        match self.source.read_line()? {
            Some(text) => {
                self.line += 1;
                Ok(Some(text.trim().to_string()))
            }
            None => Ok(None),
        }
    }

    /// Next line that is neither blank nor a comment
    pub fn next_line(&mut self) -> Result<Option<String>> {
        while let Some(text) = self.next_raw()? {
            if text.is_empty() || self.is_comment(&text) {
                continue;
            }
            return Ok(Some(text));
        }
        Ok(None)
    }

    fn is_comment(&self, text: &str) -> bool {
        self.comments.iter().any(|prefix| text.starts_with(prefix))
    }

    /// Return `text` so that the next read yields it again.
    ///
    /// Only one line can be pending; a second push replaces the first.
    pub fn push_back(&mut self, text: String) {
        debug_assert!(self.pushed.is_none(), "pushback slot already in use");
        self.pushed = Some((self.line, text));
    }

    /// Read exactly `count` rows with `parse`.
    ///
    /// A row for which `stop` holds is pushed back and ends the block early,
    /// as does end of input; both are reported as truncation. A row `parse`
    /// rejects is malformed.
    pub fn read_rows<T>(
        &mut self,
        count: usize,
        what: &str,
        stop: impl Fn(&str) -> bool,
        parse: impl FnMut(&str) -> Option<T>,
    ) -> Result<Vec<T>> {
        let rows = self.read_rows_at(count, what, stop, parse)?;
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    /// Like [`read_rows`](Self::read_rows), pairing each row with its line
    pub fn read_rows_at<T>(
        &mut self,
        count: usize,
        what: &str,
        stop: impl Fn(&str) -> bool,
        mut parse: impl FnMut(&str) -> Option<T>,
    ) -> Result<Vec<(Location, T)>> {
        let mut rows = Vec::with_capacity(count.min(1 << 16));
        while rows.len() < count {
            let Some(text) = self.next_line()? else {
                return Err(ImportError::truncated(
                    self.location(),
                    format!("{what}: {count} rows declared, {} present", rows.len()),
                ));
            };
            if stop(&text) {
                self.push_back(text);
                return Err(ImportError::truncated(
                    self.location(),
                    format!("{what}: {count} rows declared, {} present", rows.len()),
                ));
            }
            match parse(&text) {
                Some(row) => rows.push((self.location(), row)),
                None => {
                    return Err(ImportError::malformed(
                        self.location(),
                        format!("{what}: cannot parse '{text}'"),
                    ))
                }
            }
        }
        Ok(rows)
    }
}

/// Ordered keyword table; the first matching keyword wins
#[derive(Debug, Clone)]
pub struct PatternSet<K> {
    patterns: Vec<(&'static str, K)>,
}

impl<K: Copy> PatternSet<K> {
    pub fn new() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Add a case-insensitive keyword that must end at a word boundary
    pub fn keyword(mut self, keyword: &'static str, kind: K) -> Self {
        self.patterns.push((keyword, kind));
        self
    }

    /// Classify `line`, returning the kind and the text after the keyword
    pub fn classify<'l>(&self, line: &'l str) -> Option<(K, &'l str)> {
        self.patterns.iter().find_map(|&(keyword, kind)| {
            let head = line.get(..keyword.len())?;
            if !head.eq_ignore_ascii_case(keyword) {
                return None;
            }
            let rest = &line[keyword.len()..];
            match rest.chars().next() {
                Some(c) if c.is_alphanumeric() || c == '_' => None,
                _ => Some((kind, rest.trim_start())),
            }
        })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.classify(line).is_some()
    }
}

impl<K: Copy> Default for PatternSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Whitespace and comma separated tokens
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

/// Exactly `n` leading numbers of a row; extra tokens are ignored
pub fn parse_floats(text: &str, n: usize) -> Option<Vec<f64>> {
    let values: Vec<f64> = tokens(text)
        .take(n)
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (values.len() == n).then_some(values)
}

/// Polygon row of the form `n i1 .. in`
pub fn parse_polygon(text: &str) -> Option<Vec<usize>> {
    let mut it = tokens(text);
    let n: usize = it.next()?.parse().ok()?;
    let indices: Vec<usize> = it
        .take(n)
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (indices.len() == n).then_some(indices)
}

/// `label:value` pairs of a row such as `X:1.0 Y: 2.0 Z:3`.
///
/// A label whose value is not glued to it takes the next token, unless
/// that token is itself a label.
pub fn labelled_fields(text: &str) -> Vec<(&str, &str)> {
    let mut fields = Vec::new();
    let mut it = text.split_whitespace().peekable();
    while let Some(token) = it.next() {
        let Some((label, value)) = token.split_once(':') else {
            continue;
        };
        let value = if value.is_empty() {
            match it.peek() {
                Some(next) if !next.contains(':') => it.next().unwrap_or_default(),
                _ => "",
            }
        } else {
            value
        };
        fields.push((label, value));
    }
    fields
}

/// Value of the first field named `label` (case-insensitive)
pub fn field<'a>(fields: &[(&'a str, &'a str)], label: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(l, _)| l.eq_ignore_ascii_case(label))
        .map(|&(_, v)| v)
}

/// Text between the first pair of double quotes, or the trimmed text
pub fn unquote(text: &str) -> &str {
    let text = text.trim();
    match (text.find('"'), text.rfind('"')) {
        (Some(a), Some(b)) if b > a => &text[a + 1..b],
        _ => text,
    }
}
