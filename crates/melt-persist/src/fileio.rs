//! Idempotent writes for the generated bootstrap artifacts.

use std::fs;
use std::path::Path;

use crate::error::{PersistError, Result};

/// What an idempotent write ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file already held exactly this content; nothing was touched.
    Unchanged,
    /// The file did not exist and was created.
    Created,
    /// The old file was moved aside (same name with a `~` suffix) and the
    /// new content written.
    Replaced,
}

/// Write `content` to `path` unless it is already there byte-for-byte.
/// A differing old file is kept as a `~`-suffixed backup.
pub fn write_idempotent(path: &Path, content: &str) -> Result<WriteOutcome> {
    let outcome = match fs::read(path) {
        Ok(old) if old == content.as_bytes() => return Ok(WriteOutcome::Unchanged),
        Ok(_) => {
            let mut backup = path.as_os_str().to_owned();
            backup.push("~");
            fs::rename(path, &backup).map_err(|e| PersistError::io(path, e))?;
            WriteOutcome::Replaced
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => WriteOutcome::Created,
        Err(e) => return Err(PersistError::io(path, e)),
    };
    fs::write(path, content).map_err(|e| PersistError::io(path, e))?;
    Ok(outcome)
}
