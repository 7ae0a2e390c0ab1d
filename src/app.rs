use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::audio::{AUDIO_CONTENT_TYPE, AudioStore};
use crate::card::{Card, CardDraft, CardFilter};
use crate::config::Config;
use crate::error::AppError;
use crate::login::{
    CurrentUser, SessionStore, UserStore, handle_login, handle_logout, handle_me, handle_signup,
    require_auth,
};
use crate::practice::{PracticeEngine, PracticeError, PracticeSnapshot};
use crate::storage::{self, CardRepository, CardStore, StoreError};

/// Largest accepted audio upload
const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

/// Everything the handlers share
pub struct AppState {
    pub config: Config,
    pub users: UserStore,
    pub cards: CardStore,
    pub audio: AudioStore,
    pub sessions: SessionStore,
    practice: Mutex<HashMap<String, PracticeEngine<StdRng>>>,
}

impl AppState {
    /// Open every store under `config.data_dir`
    pub fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let users = UserStore::new(&config.data_dir)?;
        let cards = CardStore::new(&config.data_dir)?;
        let audio = AudioStore::new(&config.data_dir)?;

        Ok(Arc::new(AppState {
            config,
            users,
            cards,
            audio,
            sessions: SessionStore::default(),
            practice: Mutex::new(HashMap::new()),
        }))
    }

    /// Run `action` against the user's practice engine and return the
    /// resulting snapshot
    ///
    /// The engine is created from the user's stored cards on first use.
    fn with_practice<F>(&self, username: &str, action: F) -> Result<PracticeSnapshot, AppError>
    where
        F: FnOnce(&mut PracticeEngine<StdRng>, &CardStore) -> Result<(), PracticeError>,
    {
        let mut engines = storage::lock(&self.practice);
        let engine = engines
            .entry(username.to_string())
            .or_insert_with(|| PracticeEngine::load(&self.cards, username, StdRng::from_entropy()));
        action(engine, &self.cards)?;
        Ok(engine.snapshot())
    }

    /// Hand the user's current cards to their practice engine, if any
    fn refresh_practice(&self, username: &str) {
        let mut engines = storage::lock(&self.practice);
        if let Some(engine) = engines.get_mut(username) {
            refresh(engine, &self.cards, username);
        }
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/api/cards",
            get(list_cards)
                .post(create_card)
                .put(update_card)
                .delete(delete_card),
        )
        .route(
            "/api/audio/:id",
            get(get_audio).post(upload_audio).delete(delete_audio),
        )
        .route("/api/practice", get(practice_snapshot))
        .route("/api/practice/start", post(practice_start))
        .route("/api/practice/submit", post(practice_submit))
        .route("/api/practice/retype", post(practice_retype))
        .route("/api/practice/hint", post(practice_hint))
        .route("/api/practice/advance", post(practice_advance))
        .route("/api/practice/exit", post(practice_exit))
        .route("/api/practice/restart", post(practice_restart))
        .route("/api/practice/reload", post(practice_reload))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/auth/signup", post(handle_signup))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/auth/me", get(handle_me))
        .merge(protected)
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .with_state(state)
}

/// Serve the application until the process is stopped
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ---- cards ----

async fn list_cards(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Query(filter): Query<CardFilter>,
) -> Result<Json<Vec<Card>>, AppError> {
    let cards = state.cards.list_cards(&username)?;
    Ok(Json(filter.apply(&cards)))
}

async fn create_card(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(draft): Json<CardDraft>,
) -> Result<Json<Card>, AppError> {
    let card = state.cards.add_card(&username, draft)?;
    state.refresh_practice(&username);
    Ok(Json(card))
}

async fn update_card(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(draft): Json<CardDraft>,
) -> Result<Json<Card>, AppError> {
    let card = state.cards.update_card(&username, draft)?;
    state.refresh_practice(&username);
    Ok(Json(card))
}

#[derive(Deserialize)]
struct DeleteCard {
    id: String,
}

async fn delete_card(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(payload): Json<DeleteCard>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(card) = state.cards.delete_card(&username, &payload.id)? {
        if card.has_audio {
            remove_orphaned_clip(&state, &card.id);
        }
        state.refresh_practice(&username);
    }
    Ok(Json(json!({ "message": "Deleted" })))
}

/// Drop a deleted card's clip unless another account still holds the id
fn remove_orphaned_clip(state: &AppState, id: &str) {
    let result = state.cards.owners_of(id).and_then(|owners| {
        if owners.is_empty() {
            state.audio.delete(id).map(|_| ())
        } else {
            warn!("Keeping audio {} still referenced by {:?}", id, owners);
            Ok(())
        }
    });
    if let Err(e) = result {
        warn!("Could not remove audio of deleted card {}: {}", id, e);
    }
}

// ---- audio ----

/// Only the sole holder of a card id may change its clip
fn require_clip_owner(state: &AppState, username: &str, id: &str) -> Result<(), AppError> {
    let owners = state.cards.owners_of(id)?;
    if !owners.iter().any(|owner| owner == username) {
        return Err(StoreError::CardNotFound(id.to_string()).into());
    }
    if owners.len() > 1 {
        return Err(AppError::Conflict(format!(
            "Card id {} is used by more than one account",
            id
        )));
    }
    Ok(())
}

async fn get_audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    match state.audio.load(&id)? {
        Some(bytes) => Ok(([(header::CONTENT_TYPE, AUDIO_CONTENT_TYPE)], bytes).into_response()),
        None => Err(AppError::NotFound("Audio not found".to_string())),
    }
}

async fn upload_audio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    require_clip_owner(&state, &username, &id)?;

    let mut clip = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("audio") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            clip = Some(bytes);
        }
    }

    let clip = clip
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("No audio file provided".to_string()))?;
    state.audio.save(&id, &clip)?;

    info!("{} uploaded audio {} ({} bytes)", username, id, clip.len());
    Ok(Json(json!({ "success": true })))
}

async fn delete_audio(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_clip_owner(&state, &username, &id)?;
    state.audio.delete(&id)?;
    Ok(Json(json!({ "success": true })))
}

// ---- practice ----

#[derive(Deserialize)]
struct StartRequest {
    #[serde(default)]
    limit: Option<usize>,
    /// Raw text of the custom-size field
    #[serde(default)]
    custom: Option<String>,
    #[serde(default)]
    all: bool,
}

#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    answer: String,
}

async fn practice_snapshot(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    Ok(Json(state.with_practice(&username, |_, _| Ok(()))?))
}

async fn practice_start(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(request): Json<StartRequest>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    let snapshot = state.with_practice(&username, |engine, _| {
        if request.all {
            engine.start_all()
        } else if let Some(custom) = &request.custom {
            engine.start_custom(custom)
        } else {
            engine.start(request.limit.unwrap_or(0))
        }
    })?;
    Ok(Json(snapshot))
}

async fn practice_submit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    let snapshot = state.with_practice(&username, |engine, _| {
        engine.submit(&request.answer).map(|_| ())
    })?;
    Ok(Json(snapshot))
}

async fn practice_retype(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    Ok(Json(state.with_practice(&username, |engine, _| engine.retype())?))
}

async fn practice_hint(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    let snapshot = state.with_practice(&username, |engine, _| engine.reveal_hint().map(|_| ()))?;
    Ok(Json(snapshot))
}

async fn practice_advance(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    let snapshot = state.with_practice(&username, |engine, _| engine.advance().map(|_| ()))?;
    Ok(Json(snapshot))
}

/// Swap in freshly stored cards; a failed read leaves nothing to practise
fn refresh(engine: &mut PracticeEngine<StdRng>, cards: &CardStore, username: &str) {
    match cards.list_cards(username) {
        Ok(fresh) => engine.reload(fresh),
        Err(e) => {
            warn!("Could not reload cards for {}: {}", username, e);
            engine.reload(Vec::new());
        }
    }
}

async fn practice_exit(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    let snapshot = state.with_practice(&username, |engine, cards| {
        engine.exit()?;
        refresh(engine, cards, &username);
        Ok(())
    })?;
    Ok(Json(snapshot))
}

async fn practice_restart(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    let snapshot = state.with_practice(&username, |engine, cards| {
        engine.restart()?;
        refresh(engine, cards, &username);
        Ok(())
    })?;
    Ok(Json(snapshot))
}

async fn practice_reload(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(username)): Extension<CurrentUser>,
) -> Result<Json<PracticeSnapshot>, AppError> {
    let snapshot = state.with_practice(&username, |engine, cards| {
        refresh(engine, cards, &username);
        Ok(())
    })?;
    Ok(Json(snapshot))
}
