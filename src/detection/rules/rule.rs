//! Rule definitions for the rule engine.
//!
//! A rule is a named set of string patterns plus a condition over which of
//! those patterns were found.

use memchr::memmem;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Pattern type for string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Plain text (case-sensitive)
    Text,
    /// Plain text (case-insensitive)
    TextNocase,
    /// Hex bytes pattern
    Hex,
    /// Regular expression over raw bytes
    Regex,
    /// Wide string (UTF-16LE)
    Wide,
}

/// A string pattern in a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringPattern {
    /// Pattern identifier (e.g., "$a")
    pub id: String,
    /// The pattern content
    pub pattern: String,
    /// Pattern type
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    #[serde(skip)]
    compiled: Option<Regex>,
    #[serde(skip)]
    literal: Option<Vec<u8>>,
}

impl StringPattern {
    fn with_type(id: &str, pattern: &str, pattern_type: PatternType) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
            pattern_type,
            compiled: None,
            literal: None,
        }
    }

    pub fn text(id: &str, pattern: &str) -> Self {
        Self::with_type(id, pattern, PatternType::Text)
    }

    pub fn text_nocase(id: &str, pattern: &str) -> Self {
        Self::with_type(id, pattern, PatternType::TextNocase)
    }

    pub fn hex(id: &str, hex: &str) -> Self {
        Self::with_type(id, hex, PatternType::Hex)
    }

    pub fn regex(id: &str, pattern: &str) -> Self {
        Self::with_type(id, pattern, PatternType::Regex)
    }

    pub fn wide(id: &str, pattern: &str) -> Self {
        Self::with_type(id, pattern, PatternType::Wide)
    }

    /// Whether `compile` has run successfully.
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some() || self.literal.is_some()
    }

    /// Compile the pattern for matching.
    pub fn compile(&mut self) -> Result<(), String> {
        if self.pattern.is_empty() {
            return Err(format!("pattern {} is empty", self.id));
        }

        match self.pattern_type {
            PatternType::Text => {
                self.literal = Some(self.pattern.as_bytes().to_vec());
            }
            PatternType::TextNocase => {
                let escaped = regex::escape(&self.pattern);
                self.compiled = Some(
                    Regex::new(&format!("(?i){}", escaped))
                        .map_err(|e| format!("Failed to compile pattern {}: {}", self.id, e))?,
                );
            }
            PatternType::Regex => {
                self.compiled = Some(
                    Regex::new(&self.pattern)
                        .map_err(|e| format!("Failed to compile regex {}: {}", self.id, e))?,
                );
            }
            PatternType::Hex => {
                self.literal = Some(Self::parse_hex(&self.pattern)?);
            }
            PatternType::Wide => {
                let wide: Vec<u8> = self
                    .pattern
                    .encode_utf16()
                    .flat_map(|c| c.to_le_bytes())
                    .collect();
                self.literal = Some(wide);
            }
        }
        Ok(())
    }

    /// Parse hex string to bytes.
    fn parse_hex(hex: &str) -> Result<Vec<u8>, String> {
        let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();

        if hex.contains('?') {
            return Err("Hex wildcards are not supported".to_string());
        }

        hex::decode(&hex).map_err(|e| format!("Invalid hex: {}", e))
    }

    /// Offsets at which the pattern occurs in `data`.
    pub fn matches(&self, data: &[u8]) -> Vec<usize> {
        if let Some(ref literal) = self.literal {
            return memmem::find_iter(data, literal).collect();
        }

        match self.compiled {
            Some(ref regex) => regex.find_iter(data).map(|m| m.start()).collect(),
            None => Vec::new(),
        }
    }
}

/// Rule metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMeta {
    pub description: Option<String>,
    pub author: Option<String>,
    pub reference: Option<String>,
    /// Severity level (informational only)
    pub severity: Option<String>,
    /// Category (e.g., "trojan", "ransomware")
    pub category: Option<String>,
    /// Additional key-value metadata
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

/// Condition over pattern hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// All patterns must match
    All,
    /// Any pattern must match
    Any,
    /// At least N patterns must match
    AtLeast(usize),
    /// Specific pattern must match
    Pattern(String),
    /// MZ header
    IsPe,
    /// ELF magic
    IsElf,
    /// File size bounds, inclusive
    FileSize { min: Option<u64>, max: Option<u64> },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluate the condition against match results.
    pub fn evaluate(&self, matches: &HashMap<String, Vec<usize>>, data: &[u8]) -> bool {
        match self {
            Condition::All => !matches.is_empty() && matches.values().all(|m| !m.is_empty()),
            Condition::Any => matches.values().any(|m| !m.is_empty()),
            Condition::AtLeast(n) => matches.values().filter(|m| !m.is_empty()).count() >= *n,
            Condition::Pattern(id) => matches.get(id).is_some_and(|m| !m.is_empty()),
            Condition::IsPe => data.starts_with(b"MZ"),
            Condition::IsElf => data.starts_with(&[0x7F, b'E', b'L', b'F']),
            Condition::FileSize { min, max } => {
                let size = data.len() as u64;
                min.map_or(true, |m| size >= m) && max.map_or(true, |m| size <= m)
            }
            Condition::And(a, b) => a.evaluate(matches, data) && b.evaluate(matches, data),
            Condition::Or(a, b) => a.evaluate(matches, data) || b.evaluate(matches, data),
            Condition::Not(c) => !c.evaluate(matches, data),
        }
    }

    /// Pattern ids this condition refers to by name.
    fn referenced_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Condition::Pattern(id) => out.push(id),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.referenced_ids(out);
                b.referenced_ids(out);
            }
            Condition::Not(c) => c.referenced_ids(out),
            _ => {}
        }
    }
}

fn default_true() -> bool {
    true
}

/// A detection rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, reported as the threat name
    pub name: String,
    #[serde(default)]
    pub meta: RuleMeta,
    pub strings: Vec<StringPattern>,
    pub condition: Condition,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Rule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            meta: RuleMeta::default(),
            strings: Vec::new(),
            condition: Condition::Any,
            enabled: true,
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.meta.description = Some(desc.to_string());
        self
    }

    pub fn with_severity(mut self, severity: &str) -> Self {
        self.meta.severity = Some(severity.to_string());
        self
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.meta.category = Some(category.to_string());
        self
    }

    pub fn with_string(mut self, pattern: StringPattern) -> Self {
        self.strings.push(pattern);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Compile all patterns and check condition references.
    pub fn compile(&mut self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("rule name is empty".to_string());
        }

        let mut ids = HashSet::new();
        for pattern in &mut self.strings {
            if !ids.insert(pattern.id.clone()) {
                return Err(format!("duplicate pattern id {}", pattern.id));
            }
            pattern.compile()?;
        }

        let mut referenced = Vec::new();
        self.condition.referenced_ids(&mut referenced);
        if let Some(missing) = referenced
            .into_iter()
            .find(|id| !self.strings.iter().any(|s| s.id == *id))
        {
            return Err(format!("condition references unknown pattern {}", missing));
        }

        Ok(())
    }

    /// Match the rule against data.
    pub fn matches(&self, data: &[u8]) -> Option<RuleMatch> {
        if !self.enabled {
            return None;
        }

        let pattern_matches: HashMap<String, Vec<usize>> = self
            .strings
            .iter()
            .map(|p| (p.id.clone(), p.matches(data)))
            .collect();

        if self.condition.evaluate(&pattern_matches, data) {
            Some(RuleMatch {
                rule_name: self.name.clone(),
                meta: self.meta.clone(),
                matches: pattern_matches,
            })
        } else {
            None
        }
    }
}

/// Result of a rule match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_name: String,
    pub meta: RuleMeta,
    /// Pattern matches with offsets
    pub matches: HashMap<String, Vec<usize>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_pattern_is_byte_exact() {
        let mut pattern = StringPattern::text("$a", "malware");
        pattern.compile().unwrap();

        assert_eq!(pattern.matches(b"This is malware detected"), vec![8]);
        assert!(pattern.matches(b"This is MALWARE detected").is_empty());
        assert_eq!(pattern.matches(b"\xff\xfemalware"), vec![2]);
    }

    #[test]
    fn test_text_nocase_pattern() {
        let mut pattern = StringPattern::text_nocase("$a", "MALWARE");
        pattern.compile().unwrap();
        assert_eq!(pattern.matches(b"This is Malware detected").len(), 1);
    }

    #[test]
    fn test_hex_and_wide_patterns() {
        let mut mz = StringPattern::hex("$mz", "4D 5A");
        mz.compile().unwrap();
        assert_eq!(mz.matches(&[0x4D, 0x5A, 0x90, 0x00]), vec![0]);

        let mut wide = StringPattern::wide("$w", "ab");
        wide.compile().unwrap();
        assert_eq!(wide.matches(&[0, b'a', 0, b'b', 0]), vec![1]);
    }

    #[test]
    fn test_bad_patterns_fail_to_compile() {
        assert!(StringPattern::hex("$h", "4D??").compile().is_err());
        assert!(StringPattern::hex("$h", "XYZ").compile().is_err());
        assert!(StringPattern::regex("$r", "(unclosed").compile().is_err());
        assert!(StringPattern::text("$t", "").compile().is_err());
    }

    #[test]
    fn test_regex_pattern() {
        let mut pattern = StringPattern::regex("$ip", r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}");
        pattern.compile().unwrap();
        assert_eq!(pattern.matches(b"Connect to 192.168.1.1 for C2").len(), 1);
    }

    #[test]
    fn test_rule_matching() {
        let mut rule = Rule::new("TestMalware")
            .with_severity("high")
            .with_string(StringPattern::text_nocase("$ransom", "your files have been encrypted"))
            .with_condition(Condition::And(
                Box::new(Condition::IsPe),
                Box::new(Condition::Pattern("$ransom".to_string())),
            ));
        rule.compile().unwrap();

        let mut data = b"MZ\x90\x00".to_vec();
        data.extend(b"Warning: YOUR FILES HAVE BEEN ENCRYPTED!");
        assert!(rule.matches(&data).is_some());

        rule.enabled = false;
        assert!(rule.matches(&data).is_none());
    }

    #[test]
    fn test_unknown_condition_reference_rejected() {
        let mut rule = Rule::new("Broken")
            .with_string(StringPattern::text("$a", "x"))
            .with_condition(Condition::Pattern("$b".to_string()));
        assert!(rule.compile().is_err());
    }

    #[test]
    fn test_duplicate_pattern_ids_rejected() {
        let mut rule = Rule::new("Twice")
            .with_string(StringPattern::text("$a", "first"))
            .with_string(StringPattern::text("$a", "second"))
            .with_condition(Condition::All);
        let err = rule.compile().unwrap_err();
        assert!(err.contains("duplicate pattern id $a"));
    }

    #[test]
    fn test_conditions() {
        let mut matches = HashMap::new();
        matches.insert("$a".to_string(), vec![0]);
        matches.insert("$b".to_string(), vec![10]);
        matches.insert("$c".to_string(), vec![]);

        assert!(!Condition::All.evaluate(&matches, &[]));
        assert!(Condition::Any.evaluate(&matches, &[]));
        assert!(Condition::AtLeast(2).evaluate(&matches, &[]));
        assert!(!Condition::AtLeast(3).evaluate(&matches, &[]));
        assert!(Condition::IsElf.evaluate(&HashMap::new(), &[0x7F, b'E', b'L', b'F']));
        assert!(!Condition::IsPe.evaluate(&HashMap::new(), &[0x7F, b'E', b'L', b'F']));
        assert!(Condition::FileSize { min: Some(2), max: Some(4) }.evaluate(&HashMap::new(), b"abc"));
    }

    #[test]
    fn test_rule_json_shape() {
        let json = r#"{
            "name": "Marker",
            "strings": [{ "id": "$m", "pattern": "marker", "type": "text" }],
            "condition": { "at_least": 1 }
        }"#;
        let mut rule: Rule = serde_json::from_str(json).unwrap();
        assert!(rule.enabled);
        rule.compile().unwrap();
        assert!(rule.matches(b"a marker here").is_some());
    }
}
