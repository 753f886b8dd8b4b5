//! Identifiers and their SQL case-sensitivity rules.
//!
//! A `regular` identifier (`foo`) matches names case-insensitively, a
//! `delimited` one (`"foo"`) only matches the identical spelling.

use std::fmt;

/// How an identifier part compares against names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CaseSensitivity {
    /// Unquoted identifier, compared case-insensitively.
    Regular,
    /// Quoted identifier, compared exactly.
    Delimited,
}

/// One part of a (possibly qualified) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentPart {
    pub text: String,
    pub case: CaseSensitivity,
}

impl IdentPart {
    /// A regular (case-insensitive) part.
    pub fn regular(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            case: CaseSensitivity::Regular,
        }
    }

    /// A delimited (case-sensitive) part.
    pub fn delimited(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            case: CaseSensitivity::Delimited,
        }
    }

    pub fn is_delimited(&self) -> bool {
        self.case == CaseSensitivity::Delimited
    }

    /// Whether `name` is matched by this part under its case rule.
    pub fn matches(&self, name: &str) -> bool {
        match self.case {
            CaseSensitivity::Delimited => self.text == name,
            CaseSensitivity::Regular => fold_case(&self.text) == fold_case(name),
        }
    }

    /// Normalized key used for caching lookups: regular parts are folded.
    pub fn normalized(&self) -> String {
        match self.case {
            CaseSensitivity::Delimited => format!("\"{}\"", self.text),
            CaseSensitivity::Regular => fold_case(&self.text),
        }
    }
}

impl fmt::Display for IdentPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.case {
            CaseSensitivity::Regular => write!(f, "{}", self.text),
            CaseSensitivity::Delimited => write!(f, "\"{}\"", self.text.replace('"', "\"\"")),
        }
    }
}

/// A dotted identifier such as `catalog.schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub parts: Vec<IdentPart>,
}

impl Identifier {
    /// A single-part regular identifier.
    pub fn regular(text: impl Into<String>) -> Self {
        Self {
            parts: vec![IdentPart::regular(text)],
        }
    }

    /// A single-part delimited identifier.
    pub fn delimited(text: impl Into<String>) -> Self {
        Self {
            parts: vec![IdentPart::delimited(text)],
        }
    }

    /// A qualified identifier made of regular parts.
    pub fn qualified<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(IdentPart::regular).collect(),
        }
    }

    pub fn from_parts(parts: Vec<IdentPart>) -> Self {
        Self { parts }
    }

    pub fn first(&self) -> Option<&IdentPart> {
        self.parts.first()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
