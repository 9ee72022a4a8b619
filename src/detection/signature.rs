//! Named byte-pattern signatures and the read-only store that holds them.

use crate::core::config::{PatternEncoding, SignatureEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// EICAR test file standard string.
/// This is the industry-standard test file for antivirus software.
pub const EICAR_STRING: &str =
    "X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Threat name reported for the EICAR test string.
pub const EICAR_NAME: &str = "EICAR-Test";

/// Signatures compiled into the binary.
const BUILTIN_SIGNATURES: &[(&str, &[u8])] = &[(EICAR_NAME, EICAR_STRING.as_bytes())];

/// A named byte pattern searched for as a substring of file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Threat family name, unique within a store
    pub name: String,
    /// Exact byte sequence
    #[serde(with = "hex_bytes")]
    pub pattern: Vec<u8>,
}

impl Signature {
    pub fn new(name: impl Into<String>, pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }

    /// Build a signature from a config entry.
    pub fn from_entry(entry: &SignatureEntry) -> std::result::Result<Self, String> {
        let pattern = match entry.encoding {
            PatternEncoding::Text => entry.pattern.as_bytes().to_vec(),
            PatternEncoding::Hex => {
                let compact: String = entry
                    .pattern
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                hex::decode(compact).map_err(|e| format!("invalid hex: {}", e))?
            }
        };

        if pattern.is_empty() {
            return Err("pattern is empty".to_string());
        }

        Ok(Self::new(entry.name.clone(), pattern))
    }
}

/// Read-only mapping from threat name to pattern.
///
/// Iteration order is ascending by name, which is the order the basic engine
/// tries patterns in.
#[derive(Debug, Clone)]
pub struct SignatureStore {
    signatures: BTreeMap<String, Vec<u8>>,
}

impl SignatureStore {
    /// Load the built-in signature set. Never fails.
    pub fn load() -> Self {
        let signatures = BUILTIN_SIGNATURES
            .iter()
            .map(|(name, pattern)| (name.to_string(), pattern.to_vec()))
            .collect();
        Self { signatures }
    }

    /// Load the built-in set plus configured extras.
    ///
    /// Bad entries are skipped with a warning; built-in names cannot be
    /// shadowed.
    pub fn load_with(extra: &[SignatureEntry]) -> Self {
        let mut store = Self::load();

        for entry in extra {
            match Signature::from_entry(entry) {
                Ok(sig) => {
                    if store.signatures.contains_key(&sig.name) {
                        log::warn!("Ignoring signature '{}': name already registered", sig.name);
                        continue;
                    }
                    log::debug!("Registered signature '{}' ({} bytes)", sig.name, sig.pattern.len());
                    store.signatures.insert(sig.name, sig.pattern);
                }
                Err(reason) => {
                    log::warn!("Ignoring signature '{}': {}", entry.name, reason);
                }
            }
        }

        store
    }

    /// Built-in set plus statically known extra signatures.
    pub fn with_signatures(extra: impl IntoIterator<Item = Signature>) -> Self {
        let mut store = Self::load();
        for sig in extra {
            if sig.pattern.is_empty() {
                continue;
            }
            store.signatures.entry(sig.name).or_insert(sig.pattern);
        }
        store
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.signatures.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signatures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Iterate `(name, pattern)` pairs in store order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.signatures
            .iter()
            .map(|(name, pattern)| (name.as_str(), pattern.as_slice()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.signatures.keys().map(String::as_str).collect()
    }

    /// Owned copies of every signature, in store order.
    pub fn to_signatures(&self) -> Vec<Signature> {
        self.iter()
            .map(|(name, pattern)| Signature::new(name, pattern))
            .collect()
    }
}

impl Default for SignatureStore {
    fn default() -> Self {
        Self::load()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_store_has_eicar() {
        let store = SignatureStore::load();
        assert!(!store.is_empty());
        assert_eq!(store.get(EICAR_NAME), Some(EICAR_STRING.as_bytes()));
    }

    #[test]
    fn test_load_with_extras() {
        let extras = vec![
            SignatureEntry {
                name: "Test.Hex".to_string(),
                pattern: "de ad be ef".to_string(),
                encoding: PatternEncoding::Hex,
            },
            SignatureEntry {
                name: "Test.Text".to_string(),
                pattern: "evil-marker".to_string(),
                encoding: PatternEncoding::Text,
            },
            SignatureEntry {
                name: "Test.BadHex".to_string(),
                pattern: "zz".to_string(),
                encoding: PatternEncoding::Hex,
            },
            SignatureEntry {
                name: EICAR_NAME.to_string(),
                pattern: "shadow".to_string(),
                encoding: PatternEncoding::Text,
            },
        ];

        let store = SignatureStore::load_with(&extras);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("Test.Hex"), Some(&[0xde, 0xad, 0xbe, 0xef][..]));
        assert_eq!(store.get("Test.Text"), Some(&b"evil-marker"[..]));
        assert!(!store.contains("Test.BadHex"));
        assert_eq!(store.get(EICAR_NAME), Some(EICAR_STRING.as_bytes()));
    }

    #[test]
    fn test_store_order_is_by_name() {
        let store = SignatureStore::with_signatures(vec![
            Signature::new("Zeta", b"z".to_vec()),
            Signature::new("Alpha", b"a".to_vec()),
        ]);
        assert_eq!(store.names(), vec!["Alpha", EICAR_NAME, "Zeta"]);
    }

    #[test]
    fn test_signature_serialization() {
        let sig = Signature::new("Test", b"\x01\x02".to_vec());
        let json = serde_json::to_string(&sig).unwrap();
        assert!(json.contains("0102"));
        let parsed: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sig);
    }
}
