//! Request handlers.
//!
//! Handlers parse the request, then run the host operation on the blocking
//! pool since every store does synchronous file or database I/O.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use identity::{Credential, AUTH_COOKIE_NAME};
use serde::Deserialize;

use super::AppState;
use crate::error::{HostError, HostResult};
use crate::host::{Dashboard, FileHost, FileListing};

/// Login and registration form.
#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// A `filename` carried in a query string or form body.
#[derive(Debug, Deserialize)]
pub struct FileNameParams {
    #[serde(default)]
    pub filename: String,
}

/// Runs a host operation on the blocking pool.
async fn run_blocking<T, F>(host: &Arc<FileHost>, f: F) -> HostResult<T>
where
    F: FnOnce(&FileHost) -> HostResult<T> + Send + 'static,
    T: Send + 'static,
{
    let host = Arc::clone(host);
    tokio::task::spawn_blocking(move || f(&host))
        .await
        .map_err(|e| HostError::Internal(format!("blocking task failed: {}", e)))?
}

/// Resolves the user named by the `auth` cookie.
async fn authenticated_user(state: &AppState, jar: &CookieJar) -> HostResult<String> {
    let cookie = jar.get(AUTH_COOKIE_NAME).map(|c| c.value().to_string());
    run_blocking(&state.host, move |host| {
        host.authenticate(cookie.as_deref())
            .map(|credential| credential.username)
            .ok_or(HostError::Unauthenticated)
    })
    .await
}

/// Runs a host operation as the user named by the `auth` cookie.
///
/// Fails with [`HostError::Unauthenticated`] when the cookie is missing or
/// its credentials do not validate.
async fn as_user<T, F>(state: &AppState, jar: &CookieJar, f: F) -> HostResult<T>
where
    F: FnOnce(&FileHost, &str) -> HostResult<T> + Send + 'static,
    T: Send + 'static,
{
    let cookie = jar.get(AUTH_COOKIE_NAME).map(|c| c.value().to_string());
    run_blocking(&state.host, move |host| {
        let credential = host
            .authenticate(cookie.as_deref())
            .ok_or(HostError::Unauthenticated)?;
        f(host, &credential.username)
    })
    .await
}

/// A 302 redirect. axum's `Redirect` only offers 303/307/308.
fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

fn auth_cookie(credential: &Credential) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE_NAME, credential.to_cookie_value()))
        .path("/")
        .http_only(true)
        .build()
}

fn require_file_name(name: String) -> HostResult<String> {
    if name.is_empty() {
        return Err(HostError::InvalidRequest("filename is required".to_string()));
    }
    Ok(name)
}

/// `GET /`
pub async fn dashboard(State(state): State<AppState>, jar: CookieJar) -> HostResult<Json<Dashboard>> {
    let cookie = jar.get(AUTH_COOKIE_NAME).map(|c| c.value().to_string());
    let dashboard = run_blocking(&state.host, move |host| host.dashboard(cookie.as_deref())).await?;
    Ok(Json(dashboard))
}

/// `POST /`
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> HostResult<(CookieJar, Response)> {
    let credential =
        run_blocking(&state.host, move |host| host.login(&form.username, &form.password)).await?;
    Ok((jar.add(auth_cookie(&credential)), found("/")))
}

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> HostResult<(CookieJar, Response)> {
    let credential =
        run_blocking(&state.host, move |host| host.register(&form.username, &form.password))
            .await?;
    Ok((jar.add(auth_cookie(&credential)), found("/")))
}

/// `GET /logout`
pub async fn logout(jar: CookieJar) -> (CookieJar, Response) {
    let jar = jar.remove(Cookie::build(AUTH_COOKIE_NAME).path("/").build());
    (jar, found("/"))
}

/// `POST /upload`
///
/// The cookie is checked before any of the body is read.
pub async fn upload(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> HostResult<Response> {
    let user = authenticated_user(&state, &jar).await?;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| HostError::InvalidRequest("file field has no file name".to_string()))?;
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((name, data));
        break;
    }

    let (name, data) =
        upload.ok_or_else(|| HostError::InvalidRequest("missing file field".to_string()))?;

    run_blocking(&state.host, move |host| host.upload(&user, &name, &data)).await?;
    Ok(found("/"))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> HostError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HostError::PayloadTooLarge(err.body_text())
    } else {
        HostError::InvalidRequest(err.body_text())
    }
}

/// `GET /files`
pub async fn list_files(
    State(state): State<AppState>,
    jar: CookieJar,
) -> HostResult<Json<Vec<FileListing>>> {
    let files = as_user(&state, &jar, |host, user| host.list_for(user)).await?;
    Ok(Json(files))
}

/// `POST /delete`
pub async fn delete_file(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(params): Form<FileNameParams>,
) -> HostResult<Response> {
    let name = require_file_name(params.filename)?;
    as_user(&state, &jar, move |host, user| host.delete(user, &name)).await?;
    Ok(found("/"))
}

/// `GET /download?filename=`
pub async fn download(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FileNameParams>,
) -> HostResult<Response> {
    let name = require_file_name(params.filename)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        name.replace('\\', "\\\\").replace('"', "\\\"")
    );
    let data = as_user(&state, &jar, move |host, user| host.download(user, &name)).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}

/// `GET /openFile?filename=`
pub async fn open_file(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FileNameParams>,
) -> HostResult<Response> {
    let name = require_file_name(params.filename)?;
    let data = as_user(&state, &jar, move |host, user| host.open_file(user, &name)).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], data).into_response())
}

/// `POST /saveFile?filename=`
pub async fn save_file(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<FileNameParams>,
    body: Bytes,
) -> HostResult<StatusCode> {
    let name = require_file_name(params.filename)?;
    as_user(&state, &jar, move |host, user| host.save_file(user, &name, &body)).await?;
    Ok(StatusCode::OK)
}
