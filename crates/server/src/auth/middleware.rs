use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::auth::extract_token;
use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};

/// Reject the request before it reaches any store operation unless a valid
/// credential is presented.
pub async fn mw_require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    debug!("MIDDLEWARE: require_auth");

    let token = extract_token(req.headers()).ok_or(Error::Unauthenticated)?;
    let identity = state.verifier.verify(&token)?;

    req.extensions_mut().insert(Ctx::new(identity));

    Ok(next.run(req).await)
}
