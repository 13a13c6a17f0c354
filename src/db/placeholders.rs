//! Placeholder scanning for SQL text.
//!
//! Splits SQL into literal text, `:name` driver binds and `{name}` text
//! slots. Quoted strings, quoted identifiers and comments are copied through
//! untouched, so a colon inside `'12:30'` or `-- note: x` is never a bind.
//! `::` casts and `:=` assignments are not binds either.

use std::collections::BTreeSet;

/// One piece of a parsed SQL string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `:name`, bound by the driver
    Bind(String),
    /// `{name}`, interpolated as text at bind time
    Slot(String),
}

/// Parsed SQL text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlText {
    segments: Vec<Segment>,
}

impl SqlText {
    /// Parse a query template; both `:name` and `{name}` are recognized.
    pub fn template(sql: &str) -> Self {
        Self {
            segments: scan(sql, true),
        }
    }

    /// Parse user SQL; only `:name` binds are recognized.
    pub fn raw(sql: &str) -> Self {
        Self {
            segments: scan(sql, false),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All placeholder names, binds and slots alike.
    pub fn placeholder_names(&self) -> BTreeSet<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Bind(n) | Segment::Slot(n) => Some(n.clone()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Bind names in first-appearance order, without duplicates.
    pub fn bind_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for segment in &self.segments {
            if let Segment::Bind(n) = segment
                && !names.contains(n)
            {
                names.push(n.clone());
            }
        }
        names
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#'
}

fn q_quote_close(open: char) -> char {
    match open {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        '<' => '>',
        other => other,
    }
}

fn scan(sql: &str, slots: bool) -> Vec<Segment> {
    let chars: Vec<char> = sql.chars().collect();
    let len = chars.len();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0usize;

    let flush = |literal: &mut String, segments: &mut Vec<Segment>| {
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(literal)));
        }
    };

    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        // Line comment
        if c == '-' && next == Some('-') {
            let end = chars[i..]
                .iter()
                .position(|&ch| ch == '\n')
                .map_or(len, |p| i + p);
            literal.extend(&chars[i..end]);
            i = end;
            continue;
        }

        // Block comment
        if c == '/' && next == Some('*') {
            let mut j = i + 2;
            while j < len && !(chars[j] == '*' && chars.get(j + 1) == Some(&'/')) {
                j += 1;
            }
            let end = (j + 2).min(len);
            literal.extend(&chars[i..end]);
            i = end;
            continue;
        }

        // Oracle q'[...]' literals
        if (c == 'q' || c == 'Q')
            && next == Some('\'')
            && (i == 0 || !is_ident_char(chars[i - 1]))
            && let Some(&open) = chars.get(i + 2)
        {
            let close = q_quote_close(open);
            let mut j = i + 3;
            while j < len && !(chars[j] == close && chars.get(j + 1) == Some(&'\'')) {
                j += 1;
            }
            let end = (j + 2).min(len);
            literal.extend(&chars[i..end]);
            i = end;
            continue;
        }

        // Quoted strings and identifiers; doubled quotes stay inside
        if c == '\'' || c == '"' || c == '`' {
            let mut j = i + 1;
            while j < len {
                if chars[j] == c {
                    if chars.get(j + 1) == Some(&c) {
                        j += 2;
                        continue;
                    }
                    break;
                }
                j += 1;
            }
            let end = (j + 1).min(len);
            literal.extend(&chars[i..end]);
            i = end;
            continue;
        }

        if c == ':' {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let starts_name = next.is_some_and(|n| n.is_ascii_alphabetic() || n == '_');
            let starts_digit = next.is_some_and(|n| n.is_ascii_digit());
            if prev != Some(':')
                && !prev.is_some_and(is_ident_char)
                && (starts_name || starts_digit)
            {
                let mut j = i + 1;
                if starts_digit {
                    while j < len && chars[j].is_ascii_digit() {
                        j += 1;
                    }
                } else {
                    while j < len && is_ident_char(chars[j]) {
                        j += 1;
                    }
                }
                flush(&mut literal, &mut segments);
                segments.push(Segment::Bind(chars[i + 1..j].iter().collect()));
                i = j;
                continue;
            }
            // `::`, `:=` and stray colons
            literal.push(c);
            if next == Some(':') || next == Some('=') {
                literal.push(chars[i + 1]);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }

        if slots && c == '{' {
            let mut j = i + 1;
            while j < len && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            if j > i + 1 && chars.get(j) == Some(&'}') && !chars[i + 1].is_ascii_digit() {
                flush(&mut literal, &mut segments);
                segments.push(Segment::Slot(chars[i + 1..j].iter().collect()));
                i = j + 1;
                continue;
            }
        }

        literal.push(c);
        i += 1;
    }

    flush(&mut literal, &mut segments);
    segments
}
