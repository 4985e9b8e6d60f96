/// Errors from identifier construction and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentError {
    /// A serial value outside the legal `[MIN_SERIAL, MAX_SERIAL)` band.
    #[error("serial {0} out of range")]
    OutOfRange(u64),

    /// A bucket index at or past `MAX_BUCKET`.
    #[error("bucket {0} out of range")]
    BadBucket(u32),

    /// Malformed serial or pair-id text.
    #[error("malformed identifier text {text:?}: {reason}")]
    BadFormat { text: String, reason: &'static str },

    /// A pair id with exactly one null half.
    #[error("half-null pair id (hi={hi}, lo={lo})")]
    HalfNull { hi: u64, lo: u64 },
}
