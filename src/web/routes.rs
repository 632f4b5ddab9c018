//! HTTP plumbing: routing, sessions and turning view results into responses.
//!
//! Views are synchronous and touch sled directly, so each one runs on the
//! blocking pool. The session is loaded before the view and saved after it,
//! carrying any flash messages across redirects.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use log::{debug, error};
use serde::Deserialize;

use crate::accounts::{AccountStore, Session};
use crate::config::Config;
use crate::game::{CharacterId, GameError, GameStore};
use crate::logutil::{escape_log, session_tag};
use crate::validation::parse_session_id;

use super::context::{AuthChange, RequestContext, ViewError};
use super::forms::{CreateCharacterForm, LoginForm, SettingsForm, UpdateCharacterForm};
use super::render::{render_error, render_page};
use super::views::{Route, ViewResponse, ViewResult, Views};

pub const SESSION_COOKIE: &str = "roster_session";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<GameStore>,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
        .route("/characters", get(index))
        .route("/characters/new", get(create_form).post(create))
        .route("/characters/:id", get(detail))
        .route("/characters/:id/edit", get(update_form).post(update))
        .route("/characters/:id/select", post(select))
        .route("/inventory", get(inventory))
        .route("/settings", get(settings_form).post(settings))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

/// Unparseable ids are treated like ids that do not exist.
fn character_id(raw: &str) -> Result<CharacterId, ViewError> {
    raw.parse::<CharacterId>()
        .map_err(|_| GameError::not_found("character", escape_log(raw)).into())
}

/// Resume the cookie's session, or start a fresh one when it is missing,
/// unknown or idle for too long.
fn load_session(
    accounts: &AccountStore,
    cookie: Option<&str>,
    timeout_minutes: u32,
) -> Result<Session, GameError> {
    if let Some(id) = cookie.and_then(parse_session_id) {
        if let Some(mut session) = accounts.get_session(&id)? {
            if !session.is_expired(timeout_minutes) {
                session.touch();
                return Ok(session);
            }
            debug!("Session {} expired", session_tag(&session.id));
            accounts.delete_session(&id)?;
        }
    }
    Ok(Session::new())
}

fn error_response(status: StatusCode, title: &str, message: &str, user: Option<&str>) -> Response {
    (status, Html(render_error(title, message, user))).into_response()
}

/// Run `view` against the session and shape its outcome into a response.
/// Also returns the session the response cookie should name, or `None` when
/// there is nothing worth keeping.
fn handle<F>(
    state: &AppState,
    cookie: Option<&str>,
    method: &Method,
    path: String,
    view: F,
) -> Result<(Option<Session>, Response), GameError>
where
    F: FnOnce(&Views<'_>, &mut RequestContext) -> ViewResult,
{
    let accounts = state.store.accounts();
    let mut session = load_session(accounts, cookie, state.config.server.session_timeout)?;
    let mut ctx = RequestContext::new(session.username.clone(), path.clone());

    let views = Views::new(&state.store, &state.config.game);
    let result = view(&views, &mut ctx);

    match ctx.take_auth_change() {
        Some(AuthChange::LoggedIn(username)) => {
            accounts.delete_session(&session.id)?;
            let previous = session_tag(&session.id);
            let carried = std::mem::take(&mut session.flash);
            session = Session::new();
            session.username = Some(username);
            session.flash = carried;
            debug!("Rotated session {} to {}", previous, session_tag(&session.id));
        }
        Some(AuthChange::LoggedOut) => {
            accounts.delete_session(&session.id)?;
            session = Session::new();
        }
        None => {}
    }

    let response = match result {
        Ok(ViewResponse::Render(page)) => {
            let mut flashes = std::mem::take(&mut session.flash);
            flashes.extend(ctx.take_flash());
            Html(render_page(&page, ctx.user(), &flashes)).into_response()
        }
        Ok(ViewResponse::Redirect(route)) => {
            session.flash.extend(ctx.take_flash());
            Redirect::to(&route.path()).into_response()
        }
        Err(ViewError::LoginRequired { next }) => {
            session.flash.extend(ctx.take_flash());
            // Only a GET can be replayed after logging in.
            let next = (*method == Method::GET).then_some(next);
            Redirect::to(&Route::Login { next }.path()).into_response()
        }
        Err(e) if e.is_not_found() => {
            debug!("{} {}: {}", method, escape_log(&path), e);
            error_response(
                StatusCode::NOT_FOUND,
                "Not found",
                "That page does not exist.",
                ctx.user(),
            )
        }
        Err(e) if e.is_forbidden() => error_response(
            StatusCode::FORBIDDEN,
            "Forbidden",
            "You do not have access to that.",
            ctx.user(),
        ),
        Err(e) => {
            error!("{} {} failed: {}", method, escape_log(&path), e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error",
                "Something went wrong. Please try again later.",
                ctx.user(),
            )
        }
    };

    if session.needs_storage() {
        accounts.save_session(&session)?;
        Ok((Some(session), response))
    } else {
        accounts.delete_session(&session.id)?;
        Ok((None, response))
    }
}

async fn dispatch<F>(state: AppState, jar: CookieJar, method: Method, uri: Uri, view: F) -> Response
where
    F: FnOnce(&Views<'_>, &mut RequestContext) -> ViewResult + Send + 'static,
{
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let task_state = state.clone();
    let task_method = method.clone();
    let task_path = path.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        handle(&task_state, cookie.as_deref(), &task_method, task_path, view)
    })
    .await;

    match outcome {
        Ok(Ok((Some(session), response))) => {
            let cookie = Cookie::build((SESSION_COOKIE, session.id.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.config.server.cookie_secure);
            (jar.add(cookie), response).into_response()
        }
        Ok(Ok((None, response))) if jar.get(SESSION_COOKIE).is_some() => {
            (jar.remove(Cookie::build(SESSION_COOKIE).path("/")), response).into_response()
        }
        Ok(Ok((None, response))) => response,
        Ok(Err(e)) => {
            error!("Session handling for {} {} failed: {}", method, escape_log(&path), e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error",
                "Something went wrong. Please try again later.",
                None,
            )
        }
        Err(e) => {
            error!("View task for {} {} aborted: {}", method, escape_log(&path), e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error",
                "Something went wrong. Please try again later.",
                None,
            )
        }
    }
}

async fn home(State(state): State<AppState>, jar: CookieJar, method: Method, uri: Uri) -> Response {
    dispatch(state, jar, method, uri, |views, ctx| views.home(ctx)).await
}

async fn login_form(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Query(query): Query<NextQuery>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| {
        views.login_form(ctx, query.next)
    })
    .await
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Form(form): Form<LoginForm>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| views.login(ctx, form)).await
}

async fn logout(State(state): State<AppState>, jar: CookieJar, method: Method, uri: Uri) -> Response {
    dispatch(state, jar, method, uri, |views, ctx| views.logout(ctx)).await
}

async fn index(State(state): State<AppState>, jar: CookieJar, method: Method, uri: Uri) -> Response {
    dispatch(state, jar, method, uri, |views, ctx| views.index(ctx)).await
}

async fn create_form(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
) -> Response {
    dispatch(state, jar, method, uri, |views, ctx| views.create_form(ctx)).await
}

async fn create(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Form(form): Form<CreateCharacterForm>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| views.create(ctx, form)).await
}

async fn detail(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| {
        views.detail(ctx, character_id(&id)?)
    })
    .await
}

async fn update_form(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| {
        views.update_form(ctx, character_id(&id)?)
    })
    .await
}

async fn update(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Path(id): Path<String>,
    Form(form): Form<UpdateCharacterForm>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| {
        views.update(ctx, character_id(&id)?, form)
    })
    .await
}

async fn select(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Path(id): Path<String>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| {
        views.select(ctx, character_id(&id)?)
    })
    .await
}

async fn inventory(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
) -> Response {
    dispatch(state, jar, method, uri, |views, ctx| views.inventory(ctx)).await
}

async fn settings_form(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
) -> Response {
    dispatch(state, jar, method, uri, |views, ctx| views.settings_form(ctx)).await
}

async fn settings(
    State(state): State<AppState>,
    jar: CookieJar,
    method: Method,
    uri: Uri,
    Form(form): Form<SettingsForm>,
) -> Response {
    dispatch(state, jar, method, uri, move |views, ctx| views.settings(ctx, form)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameStoreBuilder;
    use tempfile::TempDir;

    #[test]
    fn bad_ids_are_not_found() {
        assert!(character_id("abc").unwrap_err().is_not_found());
        assert_eq!(character_id("12").expect("id"), 12);
    }

    #[test]
    fn unknown_and_expired_sessions_are_replaced() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        let accounts = store.accounts();

        let fresh = load_session(accounts, Some("not-a-uuid"), 30).expect("session");
        assert!(!fresh.is_authenticated());

        let mut stale = Session::new();
        stale.username = Some("alice".into());
        stale.last_seen = chrono::Utc::now() - chrono::Duration::minutes(90);
        accounts.save_session(&stale).expect("save");
        let cookie = stale.id.to_string();

        let replaced = load_session(accounts, Some(&cookie), 30).expect("session");
        assert_ne!(replaced.id, stale.id);
        assert!(!replaced.is_authenticated());
        assert!(accounts.get_session(&stale.id).expect("get").is_none());
    }

    #[test]
    fn empty_anonymous_sessions_are_not_stored() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        let state = AppState {
            store: Arc::new(store),
            config: Arc::new(Config::default()),
        };

        let (session, response) = handle(
            &state,
            None,
            &Method::GET,
            "/characters".into(),
            |views, ctx| views.index(ctx),
        )
        .expect("handled");
        assert!(session.is_none());
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(state.store.accounts().count_sessions(), 0);
    }
}
