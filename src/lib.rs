/*!
# Vocabulary Cards

A flashcard trainer for term/meaning pairs with recorded pronunciation,
served over HTTP and playable from the terminal.

## Architecture

### Practice engine
- **Sampler** - Uniform shuffle of the card pool, truncated to the session size
- **State machine** - Setup → Active → Results, with an Empty state when there is nothing to practise
- **Evaluator** - Trimmed, case-insensitive comparison of the typed answer against the term
- **Scorer** - Running score, error log and accuracy; each card counts at most once

### Storage
- One pretty-printed JSON array of cards per user under `cards/<username>.json`
- Users (argon2 hashes) in `users.json`
- Audio clips as `audio/<card id>.webm`; card ids are unique across users
- Writes go through a temporary file and a rename

### Web layer (feature `web`)
- axum router with cookie sessions and an auth middleware
- Card CRUD with search and category filters
- Audio upload/download
- Per-user practice engines driven through the `/api/practice` routes

## Modules

- **card**: Card model, drafts and dashboard filtering
- **storage**: Per-user card files and shared JSON helpers
- **audio**: Pronunciation clip storage
- **practice**: Sampler, state machine, evaluator and scorer
- **config**: Environment-driven settings
- **login**: Users, password hashing, sessions and auth handlers
- **error**: HTTP error mapping
- **app**: Routing and card/audio/practice handlers

## REST API Endpoints

- `/api/auth/{signup,login,logout,me}` - Account and session management
- `/api/cards` - List (`?q=&category=`), create, update, delete
- `/api/audio/{id}` - Fetch, upload (multipart `audio`), delete
- `/api/practice` - Current practice snapshot
- `/api/practice/{start,submit,retype,hint,advance,exit,restart,reload}` - Practice actions
*/

pub mod audio;
pub mod card;
pub mod config;
pub mod practice;
pub mod storage;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod error;
#[cfg(feature = "web")]
pub mod login;

pub use card::{Card, CardDraft, CardFilter, CardKind};
pub use config::Config;
pub use practice::{PracticeEngine, PracticeError, PracticeSnapshot, PracticeView};
pub use storage::{CardRepository, CardStore, StoreError};
