//! Collapses recognized place names into a fixed set of group labels.
//!
//! Each label owns a list of case-insensitive patterns. A mention is matched
//! against every pattern of every label in dictionary order and keeps the
//! last label that matched, so more specific labels belong at the end.

use std::fs;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct LabelEntry {
    pub label: String,
    patterns: Vec<Regex>,
}

impl LabelEntry {
    pub fn matches(&self, mention: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(mention))
    }
}

#[derive(Debug, Clone)]
pub struct LabelDictionary {
    entries: Vec<LabelEntry>,
}

/// Built-in labels with Russian name stems.
const BUILTIN: &[(&str, &[&str])] = &[
    ("usa", &["сша", "америк", r"соединенн\w* штат", "вашингтон"]),
    ("ukraine", &["украин", "киев"]),
    ("belarus", &["беларус", "белорус", "минск"]),
    ("germany", &["германи", "фрг", "берлин"]),
    ("france", &["франци", "париж"]),
    ("uk", &["великобритани", "британи", "англи", "лондон"]),
    ("italy", &["итали"]),
    ("china", &["китай", "кнр", "пекин"]),
    ("japan", &["япони", "токио"]),
    ("turkey", &["турци", "анкар"]),
    ("syria", &["сири", "дамаск"]),
    ("israel", &["израил"]),
    ("iran", &["иран", "тегеран"]),
    ("baltics", &["латви", "литв", "эстони", "прибалти"]),
    ("eu", &["евросоюз", r"^ес$", r"европейск\w* союз"]),
];

impl LabelDictionary {
    pub fn from_pairs<L, P>(pairs: impl IntoIterator<Item = (L, Vec<P>)>) -> Result<Self>
    where
        L: Into<String>,
        P: AsRef<str>,
    {
        let mut entries = Vec::new();
        for (label, patterns) in pairs {
            let label = label.into();
            let compiled = patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p.as_ref())
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| PipelineError::Pattern {
                            label: label.clone(),
                            source,
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            entries.push(LabelEntry {
                label,
                patterns: compiled,
            });
        }
        Ok(Self { entries })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_pairs(BUILTIN.iter().map(|(l, ps)| (*l, ps.to_vec())))
    }

    /// Loads `{ "<label>": ["<pattern>", ...], ... }`, keeping file order.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = |message: String| PipelineError::Schema {
            path: path.to_path_buf(),
            message,
        };
        let object = value
            .as_object()
            .ok_or_else(|| schema("expected an object of label -> patterns".into()))?;

        let mut pairs = Vec::with_capacity(object.len());
        for (label, patterns) in object {
            let list = patterns
                .as_array()
                .ok_or_else(|| schema(format!("patterns of '{label}' must be a list")))?;
            let strings = list
                .iter()
                .map(|p| {
                    p.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| schema(format!("non-string pattern for '{label}'")))
                })
                .collect::<Result<Vec<String>>>()?;
            pairs.push((label.clone(), strings));
        }
        if pairs.is_empty() {
            return Err(schema("label dictionary is empty".into()));
        }
        Self::from_pairs(pairs)
    }

    /// Loads `path` when given, otherwise returns the built-in dictionary.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Self::builtin(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label of a single mention; the last matching entry wins.
    pub fn resolve(&self, mention: &str) -> Option<&str> {
        let mention = mention.trim().to_lowercase();
        if mention.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .rev()
            .find(|e| e.matches(&mention))
            .map(|e| e.label.as_str())
    }
}
