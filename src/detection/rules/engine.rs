//! Rule engine: loads, compiles and runs detection rules.
//!
//! The engine is initialised once from a rule database directory (a set of
//! `*.json` files, each holding an array of rules) on top of a small built-in
//! rule set.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::rule::{Condition, Rule, RuleMatch, StringPattern};
use crate::core::error::{Error, Result};
use crate::detection::signature::{EICAR_NAME, EICAR_STRING};

/// Extension of rule database files.
const RULE_FILE_EXTENSION: &str = "json";

/// Compiled rule set.
pub struct RuleEngine {
    rules: Vec<Rule>,
    rules_by_name: HashMap<String, usize>,
    /// Files the database was loaded from
    sources: Vec<PathBuf>,
}

impl RuleEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            rules_by_name: HashMap::new(),
            sources: Vec::new(),
        }
    }

    /// Create an engine with the built-in rules only.
    pub fn with_builtin_rules() -> Result<Self> {
        let mut engine = Self::new();
        for rule in builtin_rules() {
            engine.add_rule(rule)?;
        }
        Ok(engine)
    }

    /// Bring up the engine from a rule database directory.
    ///
    /// Errors map onto the three engine bootstrap failures: no database
    /// (`DatabaseNotFound`), unreadable or malformed files (`SignatureLoad`)
    /// and rules that do not compile (`RuleCompilation`).
    pub fn load_database(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::DatabaseNotFound(dir.to_path_buf()));
        }

        let entries = fs::read_dir(dir)
            .map_err(|e| Error::SignatureLoad(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == RULE_FILE_EXTENSION)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::DatabaseNotFound(dir.to_path_buf()));
        }

        let mut engine = Self::with_builtin_rules()?;
        for file in &files {
            let added = engine.load_rules_file(file)?;
            log::debug!("Loaded {} rule(s) from {}", added, file.display());
        }

        log::info!(
            "Rule engine ready: {} rule(s) from {} file(s)",
            engine.rule_count(),
            files.len()
        );
        Ok(engine)
    }

    /// Add a rule, replacing any existing rule with the same name.
    pub fn add_rule(&mut self, mut rule: Rule) -> Result<()> {
        rule.compile()
            .map_err(|e| Error::RuleCompilation(format!("Rule '{}': {}", rule.name, e)))?;

        match self.rules_by_name.get(&rule.name) {
            Some(&index) => {
                log::debug!("Rule '{}' overrides an earlier definition", rule.name);
                self.rules[index] = rule;
            }
            None => {
                self.rules_by_name.insert(rule.name.clone(), self.rules.len());
                self.rules.push(rule);
            }
        }

        Ok(())
    }

    /// Load rules from a JSON file, returning how many were added.
    pub fn load_rules_file(&mut self, path: &Path) -> Result<usize> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::SignatureLoad(format!("{}: {}", path.display(), e)))?;

        let rules: Vec<Rule> = serde_json::from_str(&content)
            .map_err(|e| Error::SignatureLoad(format!("{}: {}", path.display(), e)))?;

        let count = rules.len();
        for rule in rules {
            self.add_rule(rule)?;
        }
        self.sources.push(path.to_path_buf());

        Ok(count)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn get_rule(&self, name: &str) -> Option<&Rule> {
        self.rules_by_name
            .get(name)
            .and_then(|&idx| self.rules.get(idx))
    }

    /// Enable or disable a rule.
    pub fn set_rule_enabled(&mut self, name: &str, enabled: bool) -> bool {
        if let Some(&idx) = self.rules_by_name.get(name) {
            if let Some(rule) = self.rules.get_mut(idx) {
                rule.enabled = enabled;
                return true;
            }
        }
        false
    }

    /// Scan data against all rules, reporting every match in rule order.
    pub fn scan_data(&self, data: &[u8]) -> Vec<RuleMatch> {
        self.rules.iter().filter_map(|rule| rule.matches(data)).collect()
    }

    pub fn list_rules(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Rules that ship with the engine regardless of database contents.
fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule::new(EICAR_NAME)
            .with_description("EICAR anti-virus test file")
            .with_severity("info")
            .with_category("test")
            .with_string(StringPattern::text("$eicar", EICAR_STRING))
            .with_condition(Condition::Any),
        Rule::new("Ransomware.Note.Generic")
            .with_description("Ransom note strings inside an executable")
            .with_severity("critical")
            .with_category("ransomware")
            .with_string(StringPattern::text_nocase("$r1", "your files have been encrypted"))
            .with_string(StringPattern::text_nocase("$r2", "decrypt your files"))
            .with_string(StringPattern::text_nocase("$r3", "bitcoin"))
            .with_string(StringPattern::text_nocase("$r4", "pay the ransom"))
            .with_condition(Condition::And(
                Box::new(Condition::IsPe),
                Box::new(Condition::AtLeast(2)),
            )),
        Rule::new("Spyware.Keylogger.Generic")
            .with_description("Keyboard capture API cluster")
            .with_severity("high")
            .with_category("spyware")
            .with_string(StringPattern::text("$k1", "GetAsyncKeyState"))
            .with_string(StringPattern::text("$k2", "GetKeyboardState"))
            .with_string(StringPattern::text("$k3", "SetWindowsHookEx"))
            .with_condition(Condition::And(
                Box::new(Condition::IsPe),
                Box::new(Condition::All),
            )),
        Rule::new("Trojan.Injector.Generic")
            .with_description("Remote process injection API cluster")
            .with_severity("high")
            .with_category("trojan")
            .with_string(StringPattern::text("$i1", "VirtualAllocEx"))
            .with_string(StringPattern::text("$i2", "WriteProcessMemory"))
            .with_string(StringPattern::text("$i3", "CreateRemoteThread"))
            .with_condition(Condition::And(
                Box::new(Condition::IsPe),
                Box::new(Condition::AtLeast(3)),
            )),
        Rule::new("Miner.Stratum.Generic")
            .with_description("Cryptocurrency miner pool configuration")
            .with_severity("medium")
            .with_category("miner")
            .with_string(StringPattern::text_nocase("$p1", "stratum+tcp://"))
            .with_string(StringPattern::text_nocase("$p2", "stratum+ssl://"))
            .with_string(StringPattern::text_nocase("$x1", "xmrig"))
            .with_string(StringPattern::text_nocase("$x2", "randomx"))
            .with_condition(Condition::AtLeast(2)),
    ]
}
