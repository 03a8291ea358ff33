/// Default bound on message and group nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// What the decoder does with fields the schema does not define.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownFieldPolicy {
    /// Hand the raw tag and payload to [`crate::Handler::on_unknown_field`].
    #[default]
    Preserve,
    /// Consume and drop them. The handler never sees them.
    Skip,
}

/// Decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Deepest nesting of submessages and groups accepted, not counting the
    /// top-level message.
    pub max_depth: usize,
    pub unknown_fields: UnknownFieldPolicy,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_fields: UnknownFieldPolicy::Preserve,
        }
    }
}

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeConfig {
    /// Write every repeated packable field as a packed run, not only the
    /// fields declared packed.
    pub pack_repeated: bool,
    /// Fail with `MissingRequired` when a required field has no value.
    pub check_required: bool,
    pub max_depth: usize,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            pack_repeated: false,
            check_required: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
