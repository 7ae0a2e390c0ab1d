//! Flat-file persistence
//!
//! Every user owns one pretty-printed JSON array of cards at
//! `<data>/cards/<username>.json`. Files are rewritten whole through a
//! temporary file in the same directory, so a crash mid-write leaves the
//! previous version in place.

use chrono::Utc;
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

use crate::card::{Card, CardDraft};

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]{0,63}$").unwrap();
    static ref CARD_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_\-]{1,64}$").unwrap();
}

/// Errors raised by the file-backed stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("A card with id {0} already exists")]
    DuplicateId(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed data file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of the cards a practice session draws from
pub trait CardRepository {
    /// All cards visible to `username`, in stored order
    fn list_cards(&self, username: &str) -> Result<Vec<Card>, StoreError>;
}

/// Check that a username is usable as a file name
pub fn validate_username(username: &str) -> Result<(), StoreError> {
    if USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(StoreError::InvalidUsername(username.to_string()))
    }
}

/// Check that a card id is usable as an audio file name
pub fn validate_card_id(id: &str) -> Result<(), StoreError> {
    if CARD_ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

/// Read a JSON file, returning `T::default()` when it does not exist yet
pub fn read_json_or_default<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    match fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

/// Replace a JSON file with the pretty-printed `value`
pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}

/// Replace `path` with `bytes` via a temporary file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-user card files under `<data>/cards`
#[derive(Debug)]
pub struct CardStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl CardStore {
    /// Open the store, creating `<data_dir>/cards` if needed
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref().join("cards");
        create_dir_all(&dir)?;
        Ok(CardStore {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn user_file(&self, username: &str) -> Result<PathBuf, StoreError> {
        validate_username(username)?;
        Ok(self.dir.join(format!("{}.json", username)))
    }

    fn load(&self, username: &str) -> Result<Vec<Card>, StoreError> {
        read_json_or_default(&self.user_file(username)?)
    }

    fn save(&self, username: &str, cards: &[Card]) -> Result<(), StoreError> {
        write_json_pretty(&self.user_file(username)?, cards)
    }

    /// Store a new card and return it with its id and timestamps filled in
    ///
    /// # Errors
    /// * `MissingField` if the term or meaning is blank
    /// * `InvalidId` if the client supplied an id that cannot name a clip
    /// * `DuplicateId` if the client supplied an id any user already has
    pub fn add_card(&self, username: &str, draft: CardDraft) -> Result<Card, StoreError> {
        require_sides(&draft)?;

        let _guard = lock(&self.write_lock);
        let mut cards = self.load(username)?;

        let id = match draft.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {
                validate_card_id(id)?;
                // Clips are keyed by card id alone, so ids are unique across users
                if !self.owners_of(id)?.is_empty() {
                    return Err(StoreError::DuplicateId(id.to_string()));
                }
                id.to_string()
            }
            _ => Uuid::new_v4().to_string(),
        };

        let card = draft.into_card(id, Utc::now());
        cards.push(card.clone());
        self.save(username, &cards)?;

        debug!("Added card {} for {}", card.id, username);
        Ok(card)
    }

    /// Update an existing card identified by `draft.id`
    pub fn update_card(&self, username: &str, draft: CardDraft) -> Result<Card, StoreError> {
        let id = draft
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(StoreError::MissingField("id"))?;
        require_sides(&draft)?;

        let _guard = lock(&self.write_lock);
        let mut cards = self.load(username)?;

        let card = cards
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| StoreError::CardNotFound(id.clone()))?;
        card.apply(draft, Utc::now());
        let updated = card.clone();

        self.save(username, &cards)?;
        debug!("Updated card {} for {}", id, username);
        Ok(updated)
    }

    /// Remove a card, returning it if it existed
    pub fn delete_card(&self, username: &str, id: &str) -> Result<Option<Card>, StoreError> {
        let _guard = lock(&self.write_lock);
        let mut cards = self.load(username)?;

        let Some(index) = cards.iter().position(|c| c.id == id) else {
            warn!("Delete requested for unknown card {} of {}", id, username);
            return Ok(None);
        };
        let removed = cards.remove(index);

        self.save(username, &cards)?;
        debug!("Deleted card {} for {}", id, username);
        Ok(Some(removed))
    }
}

impl CardStore {
    /// Users holding a card with this id
    ///
    /// Normally at most one; data written before ids were unique across
    /// users may yield several.
    pub fn owners_of(&self, id: &str) -> Result<Vec<String>, StoreError> {
        validate_card_id(id)?;

        let mut owners = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(username) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_username(username).is_err() {
                continue;
            }
            let cards: Vec<Card> = read_json_or_default(&path)?;
            if cards.iter().any(|c| c.id == id) {
                owners.push(username.to_string());
            }
        }
        Ok(owners)
    }
}

impl CardRepository for CardStore {
    fn list_cards(&self, username: &str) -> Result<Vec<Card>, StoreError> {
        self.load(username)
    }
}

fn require_sides(draft: &CardDraft) -> Result<(), StoreError> {
    if draft.term.trim().is_empty() {
        return Err(StoreError::MissingField("term"));
    }
    if draft.meaning.trim().is_empty() {
        return Err(StoreError::MissingField("meaning"));
    }
    Ok(())
}
