use melt_ident::IdentError;

/// Errors from the value system and registry-adjacent operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An identifier failed to parse or construct.
    #[error(transparent)]
    Ident(#[from] IdentError),

    /// Checked sequence or component access past the end.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A value JSON shape the codec does not recognize.
    #[error("malformed value json: {detail}")]
    BadJson { detail: String },

    /// An object id in persisted content with no live object behind it.
    #[error("unresolvable object id {0:?}")]
    UnresolvedId(String),

    /// A payload kind string with no registered loader.
    #[error("unknown payload kind {0:?}")]
    UnknownPayloadKind(String),

    /// A symbol name violating the symbol grammar.
    #[error("invalid symbol name {name:?}: {reason}")]
    BadSymbolName { name: String, reason: &'static str },

    /// A symbol name already bound to another owner.
    #[error("symbol {0:?} already registered")]
    SymbolClash(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
