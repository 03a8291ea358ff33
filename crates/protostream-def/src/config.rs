/// Limits applied when loading schema documents from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum bytes allowed for a schema file.
    pub max_schema_file_size: usize,
    /// Maximum number of message plus enum definitions in one document.
    pub max_definitions: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_schema_file_size: 1024 * 1024,
            max_definitions: 4096,
        }
    }
}
