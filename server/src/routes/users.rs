//! User collection routes.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::error::{AppError, Result};
use crate::handlers::{
    handle_bulk_delete, handle_create, handle_delete, handle_get, handle_list, handle_update,
    BulkDeleteRequest, BulkDeleteResponse,
};
use crate::AppState;
use tether_engine::{Attributes, Entity};

/// Create user routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_handler).post(create_handler))
        .route("/users/bulk-delete", post(bulk_delete_handler))
        .route(
            "/users/{id}",
            get(get_handler).patch(update_handler).delete(delete_handler),
        )
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// GET /users - All users in store order.
async fn list_handler(State(state): State<AppState>) -> Json<Vec<Entity>> {
    Json(handle_list(&state.store).await)
}

/// GET /users/{id}
async fn get_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Entity>> {
    Ok(Json(handle_get(&state.store, &id).await?))
}

/// POST /users - Create a user; responds 201 with the stored copy.
async fn create_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Attributes>, JsonRejection>,
) -> Result<(StatusCode, Json<Entity>)> {
    let user = handle_create(&state.store, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH /users/{id} - Shallow-merge the submitted fields.
async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<Attributes>, JsonRejection>,
) -> Result<Json<Entity>> {
    Ok(Json(handle_update(&state.store, &id, body(payload)?).await?))
}

/// DELETE /users/{id}
async fn delete_handler(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    handle_delete(&state.store, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/bulk-delete - Delete every listed id that exists.
async fn bulk_delete_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> Result<Json<BulkDeleteResponse>> {
    Ok(Json(handle_bulk_delete(&state.store, body(payload)?).await?))
}
