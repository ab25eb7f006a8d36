//! Save-File Store
//!
//! Reads and writes the snapshot file on disk. Failures here are reported,
//! never fatal: a missed write is retried on the next autosave cycle, and a
//! missed read just starts the engine empty (catch-up absorbs the gap).

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::persist::codec::SaveFile;

/// Save-file I/O and decode errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Filesystem failure reading or writing the save file.
    #[error("save file I/O failed: {0}")]
    Io(#[from] io::Error),

    /// Save file contents are not a valid snapshot.
    #[error("save file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read the save file at `path`.
///
/// A missing or empty file is the valid "no games, never saved" state, not
/// an error; anything unparseable is.
pub fn read_save_file(path: &Path) -> Result<SaveFile, PersistError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no save file; starting empty");
            return Ok(SaveFile::default());
        }
        Err(err) => return Err(err.into()),
    };

    if contents.trim().is_empty() {
        return Ok(SaveFile::default());
    }

    Ok(serde_json::from_str(&contents)?)
}

/// Write `save` to `path`.
///
/// Writes a sibling temp file first and renames it into place, so a crash
/// mid-write leaves the previous snapshot intact.
pub fn write_save_file(path: &Path, save: &SaveFile) -> Result<(), PersistError> {
    let json = serde_json::to_string(save)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    fs::write(tmp, json)?;
    fs::rename(tmp, path)?;
    debug!(path = %path.display(), "snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::codec::GameRecord;
    use std::collections::BTreeMap;

    #[test]
    fn absent_file_reads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let save = read_save_file(&dir.path().join("saves.json")).unwrap();
        assert!(save.games.is_empty());
        assert_eq!(save.last_saved, None);
    }

    #[test]
    fn empty_file_reads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.json");
        fs::write(&path, "").unwrap();
        let save = read_save_file(&path).unwrap();
        assert!(save.games.is_empty());
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.json");
        fs::write(&path, "]][[").unwrap();
        assert!(matches!(
            read_save_file(&path),
            Err(PersistError::Malformed(_))
        ));
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.json");

        let mut games = BTreeMap::new();
        games.insert(
            "42".to_string(),
            GameRecord {
                message_id: 7,
                display_name: "p".into(),
                time_started: 1_700_000_000_000,
                sweets: 12.3,
                counts: BTreeMap::from([("cursor".to_string(), 3)]),
            },
        );
        let save = SaveFile {
            games,
            last_saved: Some(1_700_000_300_000),
        };

        write_save_file(&path, &save).unwrap();
        let read_back = read_save_file(&path).unwrap();
        assert_eq!(read_back, save);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn rewrite_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.json");

        write_save_file(&path, &SaveFile::default()).unwrap();
        let save = SaveFile {
            games: BTreeMap::new(),
            last_saved: Some(5),
        };
        write_save_file(&path, &save).unwrap();

        assert_eq!(read_save_file(&path).unwrap().last_saved, Some(5));
    }
}
