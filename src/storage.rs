//! Timestamp-named audio files.

use std::fs::OpenOptions;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

const MAX_NAME_ATTEMPTS: u32 = 100;

/// Write `bytes` to a new `<prefix>_<timestamp>.wav` file inside `dir`.
///
/// Existing files are never overwritten: a numeric suffix is added when the
/// timestamp is already taken. A partially written file is removed on error.
pub fn write_timestamped(dir: &Path, prefix: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let file_name = if attempt == 0 {
            format!("{prefix}_{stamp}.wav")
        } else {
            format!("{prefix}_{stamp}_{attempt}.wav")
        };
        let path = dir.join(file_name);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        };

        if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }
        return Ok(path);
    }

    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for {prefix} in {}", dir.display()),
    ))
}
