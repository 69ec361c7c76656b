use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use jsonschema::Validator;
use serde_json::Value;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::name::SchemaName;

/// A compiled schema together with the document it was compiled from.
pub struct SchemaDocument {
    name: SchemaName,
    raw: Value,
    validator: Validator,
    source: Option<PathBuf>,
}

impl SchemaDocument {
    pub fn name(&self) -> SchemaName {
        self.name
    }

    /// The schema as written in the store.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// File the document was read from, if it came from the store.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub(crate) fn validator(&self) -> &Validator {
        &self.validator
    }
}

impl fmt::Debug for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDocument")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Name-keyed registry of compiled JSON Schema documents.
///
/// Built once at startup and read-only afterwards; share it behind an `Arc`.
pub struct SchemaRegistry {
    documents: HashMap<SchemaName, SchemaDocument>,
    missing: BTreeMap<SchemaName, String>,
    config: RegistryConfig,
}

impl SchemaRegistry {
    /// Create an empty registry with default config.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry with explicit config.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            documents: HashMap::new(),
            missing: BTreeMap::new(),
            config,
        }
    }

    /// Register a schema from a JSON string.
    pub fn register(&mut self, name: SchemaName, schema_json: &str) -> Result<()> {
        let schema: Value = serde_json::from_str(schema_json)?;
        self.register_value(name, schema)
    }

    /// Register a schema from a JSON value.
    pub fn register_value(&mut self, name: SchemaName, schema: Value) -> Result<()> {
        self.insert(name, schema, None)
    }

    /// Load every known schema from `root`.
    ///
    /// Never fails: a schema that cannot be loaded is logged and recorded in
    /// [`missing`](Self::missing).
    pub fn load(root: &Path) -> Self {
        Self::load_with_config(root, RegistryConfig::default())
    }

    /// Load every known schema from `root` with explicit config.
    pub fn load_with_config(root: &Path, config: RegistryConfig) -> Self {
        let mut registry = Self::with_config(config);

        for name in SchemaName::ALL {
            let path = root.join(name.relative_path());
            match registry.load_file(name, &path) {
                Ok(()) => {
                    tracing::debug!(schema = %name, path = %path.display(), "loaded schema");
                }
                Err(err) => {
                    tracing::warn!(schema = %name, error = %err, "could not load schema");
                    registry.missing.insert(name, err.to_string());
                }
            }
        }

        tracing::info!(
            root = %root.display(),
            loaded = registry.documents.len(),
            missing = registry.missing.len(),
            "schema registry ready"
        );
        registry
    }

    /// Build a registry from embedded schema strings.
    pub fn from_embedded(schemas: &[(SchemaName, &str)]) -> Result<Self> {
        let mut registry = Self::new();
        for (name, schema) in schemas {
            registry.register(*name, schema)?;
        }
        Ok(registry)
    }

    pub fn lookup(&self, name: SchemaName) -> Option<&SchemaDocument> {
        self.documents.get(&name)
    }

    pub fn has_schema(&self, name: SchemaName) -> bool {
        self.documents.contains_key(&name)
    }

    /// Names with a loaded document, sorted.
    pub fn names(&self) -> Vec<SchemaName> {
        let mut names: Vec<SchemaName> = self.documents.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Schemas that failed to load, with the reason.
    pub fn missing(&self) -> &BTreeMap<SchemaName, String> {
        &self.missing
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn load_file(&mut self, name: SchemaName, path: &Path) -> Result<()> {
        let content = read_schema_file(path, &self.config)
            .map_err(|reason| SchemaError::LoadFailed { name, reason })?;
        let schema: Value =
            serde_json::from_str(&content).map_err(|err| SchemaError::LoadFailed {
                name,
                reason: format!("{} is not valid JSON: {err}", path.display()),
            })?;
        self.insert(name, schema, Some(path.to_path_buf()))
    }

    fn insert(&mut self, name: SchemaName, raw: Value, source: Option<PathBuf>) -> Result<()> {
        let validator =
            jsonschema::validator_for(&raw).map_err(|err| SchemaError::CompileFailed {
                name,
                reason: err.to_string(),
            })?;

        self.missing.remove(&name);
        self.documents.insert(
            name,
            SchemaDocument {
                name,
                raw,
                validator,
                source,
            },
        );
        Ok(())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("loaded", &self.names())
            .field("missing", &self.missing)
            .field("config", &self.config)
            .finish()
    }
}

fn read_schema_file(path: &Path, config: &RegistryConfig) -> std::result::Result<String, String> {
    let path_metadata = std::fs::symlink_metadata(path)
        .map_err(|err| format!("{}: {err}", path.display()))?;

    if path_metadata.file_type().is_symlink() && !config.allow_symlinks {
        return Err(format!("refusing to load schema symlink: {}", path.display()));
    }

    let file = std::fs::File::open(path)
        .map_err(|err| format!("failed opening {}: {err}", path.display()))?;
    let opened_metadata = file
        .metadata()
        .map_err(|err| format!("{}: {err}", path.display()))?;

    if !opened_metadata.is_file() {
        return Err(format!("not a regular file: {}", path.display()));
    }
    if opened_metadata.len() > config.max_schema_file_size as u64 {
        return Err(format!(
            "schema file too large ({} bytes, max {}): {}",
            opened_metadata.len(),
            config.max_schema_file_size,
            path.display()
        ));
    }

    let max_bytes = config.max_schema_file_size;
    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| format!("failed reading {}: {err}", path.display()))?;
    // The file may grow between the metadata check and the read.
    if content.len() > max_bytes {
        return Err(format!(
            "schema file too large while reading: {}",
            path.display()
        ));
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const READING_SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "value": { "type": "number" },
            "unit": { "type": "string" }
        },
        "required": ["value", "unit"]
    }"#;

    fn make_temp_schema_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "unspub-schema-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_schema(root: &Path, name: SchemaName, contents: &str) {
        let path = root.join(name.relative_path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents.as_bytes()).unwrap();
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = SchemaRegistry::new();
        registry.register(SchemaName::Reading, READING_SCHEMA).unwrap();

        let document = registry.lookup(SchemaName::Reading).unwrap();
        assert_eq!(document.name(), SchemaName::Reading);
        assert!(document.source().is_none());
        assert!(registry.lookup(SchemaName::Kpi).is_none());
    }

    #[test]
    fn invalid_schema_fails_compile() {
        let mut registry = SchemaRegistry::new();
        let invalid = r#"{"type":"definitely-not-a-type"}"#;

        assert!(matches!(
            registry.register(SchemaName::Value, invalid),
            Err(SchemaError::CompileFailed { name: SchemaName::Value, .. })
        ));
        assert!(!registry.has_schema(SchemaName::Value));
    }

    #[test]
    fn invalid_json_source_is_reported() {
        let mut registry = SchemaRegistry::new();
        assert!(matches!(
            registry.register(SchemaName::Value, "{not json"),
            Err(SchemaError::InvalidJson(_))
        ));
    }

    #[test]
    fn from_embedded_loads_schemas() {
        let registry = SchemaRegistry::from_embedded(&[
            (SchemaName::Reading, READING_SCHEMA),
            (SchemaName::Value, r#"{"type":"object"}"#),
        ])
        .unwrap();

        assert_eq!(registry.names(), vec![SchemaName::Reading, SchemaName::Value]);
        assert_eq!(registry.len(), 2);
        assert!(registry.missing().is_empty());
    }

    #[test]
    fn load_tolerates_partial_store() {
        let root = make_temp_schema_root("partial");
        write_schema(&root, SchemaName::Reading, READING_SCHEMA);
        write_schema(&root, SchemaName::Kpi, "{ broken");

        let registry = SchemaRegistry::load(&root);

        assert_eq!(registry.names(), vec![SchemaName::Reading]);
        assert_eq!(registry.missing().len(), SchemaName::ALL.len() - 1);
        assert!(registry.missing()[&SchemaName::Kpi].contains("not valid JSON"));
        assert!(registry
            .lookup(SchemaName::Reading)
            .and_then(SchemaDocument::source)
            .is_some());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn load_from_missing_root_is_empty_not_an_error() {
        let root = std::env::temp_dir().join(format!(
            "unspub-schema-absent-{}",
            std::process::id()
        ));

        let registry = SchemaRegistry::load(&root);
        assert!(registry.is_empty());
        assert_eq!(registry.missing().len(), SchemaName::ALL.len());
    }

    #[test]
    fn shipped_schema_store_loads_completely() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schemas");
        let registry = SchemaRegistry::load(&root);

        assert_eq!(registry.names(), SchemaName::ALL.to_vec());
        assert!(registry.missing().is_empty(), "{:?}", registry.missing());
    }

    #[test]
    fn schema_file_size_limit_is_enforced() {
        let root = make_temp_schema_root("size-limit");
        write_schema(&root, SchemaName::Reading, READING_SCHEMA);

        let config = RegistryConfig {
            max_schema_file_size: 8,
            ..RegistryConfig::default()
        };
        let registry = SchemaRegistry::load_with_config(&root, config);

        assert!(!registry.has_schema(SchemaName::Reading));
        assert!(registry.missing()[&SchemaName::Reading].contains("too large"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_store_loads_by_default() {
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schemas");
        let shipped = std::fs::canonicalize(shipped).unwrap();
        let root = make_temp_schema_root("symlink-store");
        for name in SchemaName::ALL {
            let link = root.join(name.relative_path());
            std::fs::create_dir_all(link.parent().unwrap()).unwrap();
            std::os::unix::fs::symlink(shipped.join(name.relative_path()), &link).unwrap();
        }

        let registry = SchemaRegistry::load(&root);
        assert_eq!(registry.names(), SchemaName::ALL.to_vec());
        assert!(registry.missing().is_empty(), "{:?}", registry.missing());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_schema_is_refused_when_disallowed() {
        let root = make_temp_schema_root("symlink");
        let target = root.join("target.json");
        std::fs::write(&target, READING_SCHEMA.as_bytes()).unwrap();
        let link = root.join(SchemaName::Reading.relative_path());
        std::fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let strict = SchemaRegistry::load_with_config(
            &root,
            RegistryConfig {
                allow_symlinks: false,
                ..RegistryConfig::default()
            },
        );
        assert!(!strict.has_schema(SchemaName::Reading));
        assert!(strict.missing()[&SchemaName::Reading].contains("symlink"));

        assert!(SchemaRegistry::load(&root).has_schema(SchemaName::Reading));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn late_registration_clears_missing_entry() {
        let root = make_temp_schema_root("late");
        let mut registry = SchemaRegistry::load(&root);
        assert!(registry.missing().contains_key(&SchemaName::Value));

        registry
            .register(SchemaName::Value, r#"{"type":"object"}"#)
            .unwrap();
        assert!(!registry.missing().contains_key(&SchemaName::Value));

        let _ = std::fs::remove_dir_all(&root);
    }
}
