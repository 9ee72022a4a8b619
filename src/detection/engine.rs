//! Scan engine adapters.
//!
//! [`ScanEngine`] is the single-method capability the scan orchestrator talks
//! to. Two implementations exist:
//!
//! - [`BasicEngine`]: raw substring search against the [`SignatureStore`]
//! - [`AdvancedEngine`]: delegates to a pre-loaded [`ExternalEngine`]
//!
//! The variant is chosen once by [`EngineSelection`] before a scan starts.

use crate::core::config::DetectionConfig;
use crate::core::error::{Error, Result};
use crate::core::types::Verdict;
use crate::detection::rules::RuleEngine;
use crate::detection::signature::SignatureStore;
use memchr::memmem;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Classifies one file's contents against known threats.
pub trait ScanEngine: Send + Sync {
    /// Short name of the engine variant.
    fn name(&self) -> &str;

    /// Classify a file. Errors mean "no verdict could be reached".
    fn scan_file(&self, path: &Path) -> Result<Verdict>;

    /// Threat name for a file, or `None` for clean and unreadable files.
    fn classify(&self, path: &Path) -> Option<String> {
        match self.scan_file(path) {
            Ok(Verdict::Infected(name)) => Some(name),
            Ok(Verdict::Clean) => None,
            Err(e) => {
                log::debug!("No verdict for {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// A pre-initialised external detection engine.
pub trait ExternalEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Every threat name matching `data`, primary classification first.
    fn scan_all(&self, data: &[u8]) -> Vec<String>;
}

impl ExternalEngine for RuleEngine {
    fn name(&self) -> &str {
        "rules"
    }

    fn scan_all(&self, data: &[u8]) -> Vec<String> {
        self.scan_data(data)
            .into_iter()
            .map(|m| m.rule_name)
            .collect()
    }
}

fn read_target(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => Error::permission_denied(path, e),
        _ => Error::file_read(path, e),
    })
}

/// Substring matcher over the signature store.
pub struct BasicEngine {
    store: Arc<SignatureStore>,
}

impl BasicEngine {
    pub fn new(store: Arc<SignatureStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    /// First signature, in store order, whose pattern occurs in `data`.
    pub fn match_bytes(&self, data: &[u8]) -> Option<&str> {
        self.store
            .iter()
            .find(|(_, pattern)| memmem::find(data, pattern).is_some())
            .map(|(name, _)| name)
    }
}

impl ScanEngine for BasicEngine {
    fn name(&self) -> &str {
        "basic"
    }

    fn scan_file(&self, path: &Path) -> Result<Verdict> {
        let data = read_target(path)?;
        Ok(self.match_bytes(&data).map(str::to_string).into())
    }
}

/// Adapter over an external engine; surfaces only the first classification.
pub struct AdvancedEngine {
    external: Arc<dyn ExternalEngine>,
}

impl AdvancedEngine {
    pub fn new(external: Arc<dyn ExternalEngine>) -> Self {
        Self { external }
    }

    pub fn external(&self) -> &dyn ExternalEngine {
        self.external.as_ref()
    }
}

impl ScanEngine for AdvancedEngine {
    fn name(&self) -> &str {
        "advanced"
    }

    fn scan_file(&self, path: &Path) -> Result<Verdict> {
        let data = read_target(path)?;
        let mut names = self.external.scan_all(&data);

        if names.len() > 1 {
            log::debug!(
                "{}: {} matches ({}), reporting the first",
                path.display(),
                names.len(),
                names.join(", ")
            );
        }

        Ok(if names.is_empty() {
            Verdict::Clean
        } else {
            Verdict::Infected(names.swap_remove(0))
        })
    }
}

/// One-time notice that detection fell back to basic mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// No rule database was found
    NoDatabase { path: PathBuf },
    /// The database exists but could not be read or parsed
    DatabaseLoadFailed { reason: String },
    /// The database loaded but its rules failed to compile
    EngineCompileFailed { reason: String },
}

impl Advisory {
    /// Map an engine bootstrap error onto an advisory.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::DatabaseNotFound(path) => Advisory::NoDatabase { path: path.clone() },
            Error::RuleCompilation(reason) => Advisory::EngineCompileFailed {
                reason: reason.clone(),
            },
            Error::SignatureLoad(reason) => Advisory::DatabaseLoadFailed {
                reason: reason.clone(),
            },
            other => Advisory::DatabaseLoadFailed {
                reason: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::NoDatabase { path } => write!(
                f,
                "No rule database found at {}; using basic signature detection",
                path.display()
            ),
            Advisory::DatabaseLoadFailed { reason } => write!(
                f,
                "Rule database failed to load ({}); using basic signature detection",
                reason
            ),
            Advisory::EngineCompileFailed { reason } => write!(
                f,
                "Rule engine failed to compile ({}); using basic signature detection",
                reason
            ),
        }
    }
}

/// The engine chosen for upcoming scans, plus any pending advisory.
pub struct EngineSelection {
    engine: Arc<dyn ScanEngine>,
    advisory: Option<Advisory>,
}

impl EngineSelection {
    /// Use the external engine if one is available, otherwise basic mode.
    pub fn select(external: Option<Arc<dyn ExternalEngine>>, store: Arc<SignatureStore>) -> Self {
        match external {
            Some(external) => {
                log::info!("Using advanced detection ({})", external.name());
                Self {
                    engine: Arc::new(AdvancedEngine::new(external)),
                    advisory: None,
                }
            }
            None => Self::basic(store, None),
        }
    }

    /// Resolve a bootstrap attempt, falling back to basic mode on failure.
    pub fn from_bootstrap(
        bootstrap: Result<Arc<dyn ExternalEngine>>,
        store: Arc<SignatureStore>,
    ) -> Self {
        match bootstrap {
            Ok(external) => Self::select(Some(external), store),
            Err(e) => {
                let advisory = Advisory::from_error(&e);
                log::warn!("{}", advisory);
                Self::basic(store, Some(advisory))
            }
        }
    }

    /// Pick the engine according to configuration.
    pub fn from_config(config: &DetectionConfig, store: Arc<SignatureStore>) -> Self {
        if !config.advanced_engine {
            return Self::basic(store, None);
        }

        let bootstrap = RuleEngine::load_database(&config.rules_dir())
            .map(|engine| Arc::new(engine) as Arc<dyn ExternalEngine>);
        Self::from_bootstrap(bootstrap, store)
    }

    fn basic(store: Arc<SignatureStore>, advisory: Option<Advisory>) -> Self {
        log::info!("Using basic signature detection ({} signatures)", store.len());
        Self {
            engine: Arc::new(BasicEngine::new(store)),
            advisory,
        }
    }

    /// The chosen engine.
    pub fn engine(&self) -> Arc<dyn ScanEngine> {
        Arc::clone(&self.engine)
    }

    pub fn is_advanced(&self) -> bool {
        self.engine.name() == "advanced"
    }

    /// Take the fallback advisory. Returns `Some` at most once.
    pub fn take_advisory(&mut self) -> Option<Advisory> {
        self.advisory.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::signature::{Signature, EICAR_NAME, EICAR_STRING};
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    fn basic() -> BasicEngine {
        BasicEngine::new(Arc::new(SignatureStore::load()))
    }

    struct FixedEngine(Vec<String>);

    impl ExternalEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        fn scan_all(&self, _data: &[u8]) -> Vec<String> {
            self.0.clone()
        }
    }

    #[test]
    fn test_basic_detects_embedded_eicar() {
        let mut content = b"header bytes\n".to_vec();
        content.extend_from_slice(EICAR_STRING.as_bytes());
        content.extend_from_slice(b"\ntrailer");
        let file = file_with(&content);

        assert_eq!(basic().classify(file.path()).as_deref(), Some(EICAR_NAME));
    }

    #[test]
    fn test_basic_is_case_sensitive() {
        let file = file_with(EICAR_STRING.to_lowercase().as_bytes());
        assert_eq!(basic().classify(file.path()), None);
    }

    #[test]
    fn test_basic_clean_file() {
        let file = file_with(b"This is a clean file with no malware");
        assert_eq!(basic().scan_file(file.path()).unwrap(), Verdict::Clean);
    }

    #[test]
    fn test_unreadable_file_has_no_verdict() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone.bin");

        let engine = basic();
        assert!(engine.scan_file(&missing).is_err());
        assert_eq!(engine.classify(&missing), None);
    }

    #[test]
    fn test_basic_reports_first_match_in_store_order() {
        let store = SignatureStore::with_signatures(vec![
            Signature::new("Zz.Second", b"beta".to_vec()),
            Signature::new("Aa.First", b"alpha".to_vec()),
        ]);
        let engine = BasicEngine::new(Arc::new(store));
        assert_eq!(engine.match_bytes(b"beta then alpha"), Some("Aa.First"));
    }

    #[test]
    fn test_advanced_surfaces_first_name() {
        let external = Arc::new(FixedEngine(vec!["Family.One".into(), "Family.Two".into()]));
        let engine = AdvancedEngine::new(external);
        let file = file_with(b"anything");

        assert_eq!(engine.classify(file.path()).as_deref(), Some("Family.One"));
        assert_eq!(engine.name(), "advanced");
    }

    #[test]
    fn test_advanced_clean_and_unreadable() {
        let engine = AdvancedEngine::new(Arc::new(FixedEngine(Vec::new())));
        let file = file_with(b"anything");
        assert_eq!(engine.classify(file.path()), None);

        let engine = AdvancedEngine::new(Arc::new(FixedEngine(vec!["X".into()])));
        assert_eq!(engine.classify(Path::new("/definitely/not/here")), None);
    }

    #[test]
    fn test_selection_without_external_engine() {
        let mut selection = EngineSelection::select(None, Arc::new(SignatureStore::load()));
        assert!(!selection.is_advanced());
        assert!(selection.take_advisory().is_none());
    }

    #[test]
    fn test_selection_with_external_engine() {
        let rules = RuleEngine::with_builtin_rules().unwrap();
        let selection =
            EngineSelection::select(Some(Arc::new(rules)), Arc::new(SignatureStore::load()));
        assert!(selection.is_advanced());

        let file = file_with(EICAR_STRING.as_bytes());
        assert_eq!(selection.engine().classify(file.path()).as_deref(), Some(EICAR_NAME));
    }

    #[test]
    fn test_fallback_advisories_are_one_time() {
        let store = Arc::new(SignatureStore::load());
        let cases = vec![
            (
                Error::DatabaseNotFound(PathBuf::from("/rules")),
                "No rule database found",
            ),
            (Error::SignatureLoad("bad json".into()), "failed to load"),
            (Error::RuleCompilation("bad regex".into()), "failed to compile"),
        ];

        for (err, text) in cases {
            let mut selection = EngineSelection::from_bootstrap(Err(err), Arc::clone(&store));
            assert!(!selection.is_advanced());

            let advisory = selection.take_advisory().expect("advisory");
            assert!(advisory.to_string().contains(text), "{}", advisory);
            assert!(selection.take_advisory().is_none());
        }
    }

    #[test]
    fn test_from_config() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SignatureStore::load());

        let config = DetectionConfig {
            advanced_engine: true,
            rules_dir: Some(dir.path().join("missing")),
            extra_signatures: Vec::new(),
        };
        let mut selection = EngineSelection::from_config(&config, Arc::clone(&store));
        assert!(matches!(
            selection.take_advisory(),
            Some(Advisory::NoDatabase { .. })
        ));

        std::fs::write(
            dir.path().join("rules.json"),
            r#"[{ "name": "Test.Marker", "strings": [{ "id": "$m", "pattern": "marker", "type": "text" }], "condition": "any" }]"#,
        )
        .unwrap();
        let config = DetectionConfig {
            rules_dir: Some(dir.path().to_path_buf()),
            ..config
        };
        let mut selection = EngineSelection::from_config(&config, Arc::clone(&store));
        assert!(selection.is_advanced());
        assert!(selection.take_advisory().is_none());

        let disabled = DetectionConfig {
            advanced_engine: false,
            ..config
        };
        assert!(!EngineSelection::from_config(&disabled, store).is_advanced());
    }
}
