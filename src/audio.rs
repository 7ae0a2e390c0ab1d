//! Pronunciation clips, one `<card-id>.webm` file per card

use log::debug;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

use crate::storage::{StoreError, validate_card_id, write_atomic};

/// MIME type clips are recorded and served with
pub const AUDIO_CONTENT_TYPE: &str = "audio/webm";

/// URL a client fetches a card's clip from
pub fn audio_url(card_id: &str) -> String {
    format!("/api/audio/{}", card_id)
}

/// Directory of audio clips at `<data>/audio`
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref().join("audio");
        create_dir_all(&dir)?;
        Ok(AudioStore { dir })
    }

    fn clip_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_card_id(id)?;
        Ok(self.dir.join(format!("{}.webm", id)))
    }

    /// Write (or overwrite) the clip for `id`
    pub fn save(&self, id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.clip_path(id)?;
        write_atomic(&path, bytes)?;
        debug!("Stored {} bytes of audio for {}", bytes.len(), id);
        Ok(())
    }

    /// Clip bytes, or `None` when the card has no recording
    pub fn load(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.clip_path(id)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the clip for `id`; returns whether a file was deleted
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        match fs::remove_file(self.clip_path(id)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_delete() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path()).unwrap();

        assert_eq!(store.load("card-1").unwrap(), None);
        store.save("card-1", b"webm").unwrap();
        assert_eq!(store.load("card-1").unwrap().as_deref(), Some(&b"webm"[..]));
        assert!(dir.path().join("audio/card-1.webm").exists());

        store.save("card-1", b"webm2").unwrap();
        assert_eq!(store.load("card-1").unwrap().as_deref(), Some(&b"webm2"[..]));
        assert_eq!(fs::read_dir(dir.path().join("audio")).unwrap().count(), 1);

        assert!(store.delete("card-1").unwrap());
        assert!(!store.delete("card-1").unwrap());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = tempdir().unwrap();
        let store = AudioStore::new(dir.path()).unwrap();
        assert!(matches!(
            store.save("../users", b"x"),
            Err(StoreError::InvalidId(_))
        ));
        assert!(store.load("a.b").is_err());
    }

    #[test]
    fn test_audio_url() {
        assert_eq!(audio_url("abc"), "/api/audio/abc");
    }
}
