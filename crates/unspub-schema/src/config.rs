/// Controls how schema documents are read from the schema store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum bytes allowed per schema file.
    pub max_schema_file_size: usize,
    /// When false, schema paths that are symlinks are refused. Mounted
    /// config volumes link every file, so this defaults to true.
    pub allow_symlinks: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_schema_file_size: 256 * 1024,
            allow_symlinks: true,
        }
    }
}
