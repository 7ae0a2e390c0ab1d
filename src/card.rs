use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category assigned when a card is saved without one
pub const DEFAULT_CATEGORY: &str = "General";

/// Whether a card holds a single word or a longer phrase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    #[default]
    Word,
    Phrase,
}

/// One vocabulary unit as stored in a user's card file
///
/// Files written by older versions of the application used `german` and
/// `arabic` for the two sides of the card; both keys are still accepted on
/// read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Opaque unique identifier, also names the card's audio file
    pub id: String,

    /// Word in the language being learned (the expected answer)
    #[serde(alias = "german")]
    pub term: String,

    /// Translation in the learner's native language (the prompt)
    #[serde(alias = "arabic")]
    pub meaning: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// A pronunciation clip exists for this card
    #[serde(default)]
    pub has_audio: bool,

    #[serde(rename = "type", default)]
    pub kind: CardKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Card {
    /// Hint text, treating a stored empty string as no hint
    pub fn hint(&self) -> Option<&str> {
        self.hint
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
    }

    /// Both sides are filled in, so the card can be quizzed
    pub fn is_practicable(&self) -> bool {
        !self.term.trim().is_empty() && !self.meaning.trim().is_empty()
    }

    /// Overwrite the editable fields from a draft
    ///
    /// `has_audio` and `kind` keep their current value when the draft leaves
    /// them out; the other optional fields fall back to their defaults.
    pub fn apply(&mut self, draft: CardDraft, now: DateTime<Utc>) {
        self.term = draft.term;
        self.meaning = draft.meaning;
        self.hint = clean_hint(draft.hint);
        self.category = clean_category(draft.category);
        self.tags = clean_tags(draft.tags.unwrap_or_default());
        if let Some(has_audio) = draft.has_audio {
            self.has_audio = has_audio;
        }
        if let Some(kind) = draft.kind {
            self.kind = kind;
        }
        self.updated_at = Some(now);
    }
}

/// Card fields as submitted by a client for create and update
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "german")]
    pub term: String,
    #[serde(default, alias = "arabic")]
    pub meaning: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub has_audio: Option<bool>,
    #[serde(rename = "type", default)]
    pub kind: Option<CardKind>,
}

impl CardDraft {
    /// Build a brand new card with the given id
    pub fn into_card(self, id: String, now: DateTime<Utc>) -> Card {
        Card {
            id,
            term: self.term,
            meaning: self.meaning,
            hint: clean_hint(self.hint),
            category: clean_category(self.category),
            tags: clean_tags(self.tags.unwrap_or_default()),
            has_audio: self.has_audio.unwrap_or(false),
            kind: self.kind.unwrap_or_default(),
            created_at: Some(now),
            updated_at: None,
        }
    }
}

fn clean_hint(hint: Option<String>) -> Option<String> {
    hint.map(|h| h.trim().to_string()).filter(|h| !h.is_empty())
}

fn clean_category(category: Option<String>) -> String {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(default_category)
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Dashboard search over a user's cards
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CardFilter {
    /// Case-insensitive substring matched against term, meaning and tags
    #[serde(default, alias = "search")]
    pub q: Option<String>,

    /// Exact category; `"all"` or absent disables the filter
    #[serde(default)]
    pub category: Option<String>,
}

impl CardFilter {
    /// Matching cards, newest first
    ///
    /// Cards are stored in insertion order, so newest first is the stored
    /// order reversed.
    pub fn apply(&self, cards: &[Card]) -> Vec<Card> {
        let needle = self
            .q
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .filter(|q| !q.is_empty());
        let category = self
            .category
            .as_deref()
            .filter(|c| !c.is_empty() && *c != "all");

        cards
            .iter()
            .rev()
            .filter(|card| match &needle {
                Some(needle) => {
                    card.term.to_lowercase().contains(needle)
                        || card.meaning.to_lowercase().contains(needle)
                        || card
                            .tags
                            .iter()
                            .any(|t| t.to_lowercase().contains(needle))
                }
                None => true,
            })
            .filter(|card| category.is_none_or(|c| card.category == c))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, term: &str, meaning: &str) -> Card {
        CardDraft {
            term: term.to_string(),
            meaning: meaning.to_string(),
            ..Default::default()
        }
        .into_card(id.to_string(), Utc::now())
    }

    #[test]
    fn test_legacy_keys_are_accepted() {
        let json = r#"{
            "id": "c1",
            "german": "Apfel",
            "arabic": "تفاحة",
            "hint": "",
            "category": "A1-1",
            "tags": ["food"],
            "hasAudio": true,
            "type": "word",
            "createdAt": "2025-01-02T10:00:00.000Z"
        }"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.term, "Apfel");
        assert_eq!(card.meaning, "تفاحة");
        assert_eq!(card.hint(), None);
        assert!(card.has_audio);
        assert_eq!(card.category, "A1-1");
        assert!(card.created_at.is_some());
    }

    #[test]
    fn test_missing_optional_fields_get_defaults() {
        let card: Card =
            serde_json::from_str(r#"{"id":"c2","term":"Haus","meaning":"house"}"#).unwrap();
        assert_eq!(card.category, DEFAULT_CATEGORY);
        assert_eq!(card.kind, CardKind::Word);
        assert!(card.tags.is_empty());
        assert!(!card.has_audio);
    }

    #[test]
    fn test_draft_cleans_fields() {
        let draft = CardDraft {
            term: "Hund".into(),
            meaning: "dog".into(),
            hint: Some("  ".into()),
            category: Some("".into()),
            tags: Some(vec![" pets ".into(), "".into()]),
            ..Default::default()
        };
        let card = draft.into_card("c3".into(), Utc::now());
        assert_eq!(card.hint, None);
        assert_eq!(card.category, DEFAULT_CATEGORY);
        assert_eq!(card.tags, vec!["pets".to_string()]);
    }

    #[test]
    fn test_apply_keeps_audio_flag_when_absent() {
        let mut c = card("c4", "Katze", "cat");
        c.has_audio = true;
        c.kind = CardKind::Phrase;
        c.apply(
            CardDraft {
                term: "Katze".into(),
                meaning: "the cat".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(c.has_audio);
        assert_eq!(c.kind, CardKind::Phrase);
        assert_eq!(c.meaning, "the cat");
        assert!(c.updated_at.is_some());
    }

    #[test]
    fn test_filter_search_and_category() {
        let mut a = card("a", "Apfel", "apple");
        a.tags = vec!["Obst".into()];
        let mut b = card("b", "Birne", "pear");
        b.category = "A2-1".into();
        let c = card("c", "Brot", "bread");
        let cards = vec![a, b, c];

        let all = CardFilter::default().apply(&cards);
        let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let by_tag = CardFilter {
            q: Some("obst".into()),
            category: None,
        }
        .apply(&cards);
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].id, "a");

        let by_category = CardFilter {
            q: None,
            category: Some("A2-1".into()),
        }
        .apply(&cards);
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].id, "b");

        let everything = CardFilter {
            q: Some("".into()),
            category: Some("all".into()),
        }
        .apply(&cards);
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn test_practicable() {
        assert!(card("x", "a", "b").is_practicable());
        assert!(!card("y", " ", "b").is_practicable());
    }
}
