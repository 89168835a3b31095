use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::state::AppState;

use super::dto::{
    FieldError, FormErrors, Notice, UserDetails, UserForm, UserList, UserListItem, UserLogs,
};
use super::service::ServiceError;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/create", get(create_form))
        .route("/users/edit/:id", get(edit_form))
        .route("/users/view/:id", get(view_user))
        .route("/users/delete/:id", get(delete_confirm))
        .route("/users/logs", get(all_logs))
        .route("/users/logs/:id", get(user_logs))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/users/create", post(create_user))
        .route("/users/edit/:id", post(edit_user))
        .route("/users/delete/:id", post(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    filter: Option<String>,
}

/// GET /users?filter=active|inactive|anything. Unknown or absent filters
/// resolve to "all". Service failures collapse to a generic error.
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<UserList>, (StatusCode, String)> {
    let filter = query
        .filter
        .as_deref()
        .unwrap_or("all")
        .trim()
        .to_lowercase();
    let result = match filter.as_str() {
        "active" => state.service.filter_by_active(true).map(|u| ("active", u)),
        "inactive" => state.service.filter_by_active(false).map(|u| ("inactive", u)),
        _ => state.service.get_all().map(|u| ("all", u)),
    };

    match result {
        Ok((label, users)) => Ok(Json(UserList {
            active_filter: label.to_string(),
            items: users.into_iter().map(UserListItem::from).collect(),
        })),
        Err(e) => {
            error!(error = %e, "list users failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()))
        }
    }
}

/// GET /users/create - an empty form model.
pub async fn create_form() -> Json<UserForm> {
    Json(UserForm::default())
}

/// POST /users/create. Invalid input echoes the form back with field
/// errors; success redirects to the list with a notice.
#[instrument(skip(state, form))]
pub async fn create_user(State(state): State<AppState>, Json(form): Json<UserForm>) -> Response {
    let errors = form.validate();
    if !errors.is_empty() {
        warn!(count = errors.len(), "create form invalid");
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(FormErrors { errors, form }))
            .into_response();
    }

    match state.service.create(form.to_new_user()) {
        Ok(user) => {
            info!(user_id = user.id, "user created");
            redirect_to_list(true, "User created successfully.")
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            let errors = vec![FieldError::form_level(
                "An error occurred while creating the user.",
            )];
            (StatusCode::INTERNAL_SERVER_ERROR, Json(FormErrors { errors, form }))
                .into_response()
        }
    }
}

/// GET /users/edit/{id} - the prefilled form, or 404.
#[instrument(skip(state))]
pub async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserForm>, (StatusCode, String)> {
    match state.service.get_by_id(id) {
        Ok(user) => Ok(Json(UserForm::from(&user))),
        Err(ServiceError::UserNotFound { .. }) => not_found(),
        Err(e) => {
            error!(error = %e, user_id = id, "edit form failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()))
        }
    }
}

/// POST /users/edit/{id}. Loads the existing record, overwrites its
/// mutable fields from the form and updates.
#[instrument(skip(state, form))]
pub async fn edit_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<UserForm>,
) -> Response {
    let errors = form.validate();
    if !errors.is_empty() {
        warn!(user_id = id, count = errors.len(), "edit form invalid");
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(FormErrors { errors, form }))
            .into_response();
    }

    let mut user = match state.service.get_by_id(id) {
        Ok(user) => user,
        Err(ServiceError::UserNotFound { .. }) => {
            return (StatusCode::NOT_FOUND, "User not found".to_string()).into_response();
        }
        Err(e) => {
            error!(error = %e, user_id = id, "edit user lookup failed");
            let errors = vec![FieldError::form_level(
                "An error occurred while updating the user.",
            )];
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(FormErrors { errors, form }))
                .into_response();
        }
    };

    form.apply_to(&mut user);
    match state.service.update(&user) {
        Ok(()) => {
            info!(user_id = id, "user updated");
            redirect_to_list(true, "User updated successfully.")
        }
        Err(e) => {
            error!(error = %e, user_id = id, "update user failed");
            let errors = vec![FieldError::form_level(
                "An error occurred while updating the user.",
            )];
            (StatusCode::INTERNAL_SERVER_ERROR, Json(FormErrors { errors, form }))
                .into_response()
        }
    }
}

/// GET /users/view/{id} - the read-only detail projection, or 404.
#[instrument(skip(state))]
pub async fn view_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDetails>, (StatusCode, String)> {
    match state.service.get_by_id(id) {
        Ok(user) => Ok(Json(UserDetails::from(user))),
        Err(ServiceError::UserNotFound { .. }) => not_found(),
        Err(e) => {
            error!(error = %e, user_id = id, "view user failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()))
        }
    }
}

/// GET /users/delete/{id} - the confirmation view, or 404.
#[instrument(skip(state))]
pub async fn delete_confirm(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserDetails>, (StatusCode, String)> {
    match state.service.get_by_id(id) {
        Ok(user) => Ok(Json(UserDetails::from(user))),
        Err(ServiceError::UserNotFound { .. }) => not_found(),
        Err(e) => {
            error!(error = %e, user_id = id, "delete confirm failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()))
        }
    }
}

/// POST /users/delete/{id}. Any failure, not-found included, carries an
/// error notice back to the list rather than blocking it.
#[instrument(skip(state))]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.service.delete(id) {
        Ok(()) => {
            info!(user_id = id, "user deleted");
            redirect_to_list(true, "User deleted successfully.")
        }
        Err(e) => {
            error!(error = %e, user_id = id, "delete user failed");
            redirect_to_list(false, "An error occurred while deleting the user.")
        }
    }
}

/// GET /users/logs - the full audit trail, insertion order.
#[instrument(skip(state))]
pub async fn all_logs(
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::store::Log>>, (StatusCode, String)> {
    match state.service.all_logs() {
        Ok(logs) => Ok(Json(logs)),
        Err(e) => {
            error!(error = %e, "all logs failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()))
        }
    }
}

/// GET /users/logs/{id} - one user's audit trail, 404 when the user does
/// not exist.
#[instrument(skip(state))]
pub async fn user_logs(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserLogs>, (StatusCode, String)> {
    let user = match state.service.get_by_id(id) {
        Ok(user) => user,
        Err(ServiceError::UserNotFound { .. }) => return not_found(),
        Err(e) => {
            error!(error = %e, user_id = id, "user logs lookup failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()));
        }
    };

    match state.service.logs_for_user(id) {
        Ok(logs) => Ok(Json(UserLogs {
            user_id: user.id,
            user_name: format!("{} {}", user.forename, user.surname),
            logs,
        })),
        Err(e) => {
            error!(error = %e, user_id = id, "user logs failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error".to_string()))
        }
    }
}

fn not_found<T>() -> Result<T, (StatusCode, String)> {
    Err((StatusCode::NOT_FOUND, "User not found".to_string()))
}

fn redirect_to_list(success: bool, message: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, HeaderValue::from_static("/users"));
    (
        StatusCode::SEE_OTHER,
        headers,
        Json(Notice {
            success,
            message: message.to_string(),
        }),
    )
        .into_response()
}
