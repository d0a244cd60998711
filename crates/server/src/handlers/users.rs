//! User directory handlers (contact discovery).

use axum::{
    extract::{Path, State},
    Json,
};
use chatme_common::UserInfo;

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::Result;

/// GET /api/users
pub async fn list_users(_ctx: Ctx, State(state): State<AppState>) -> Json<Vec<UserInfo>> {
    Json(state.users.list())
}

/// GET /api/users/{user_id}
pub async fn get_user(
    _ctx: Ctx,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UserInfo>> {
    Ok(Json(state.users.get(&user_id)?))
}
