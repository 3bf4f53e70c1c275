use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::debug;

use crate::{errors::AppError, token::TokenError, AppState};

pub async fn require_bearer_token(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(TypedHeader(auth)) = auth_header else {
        return Err(AppError::unauthorized(
            "missing_token",
            "missing authorization header",
        ));
    };

    match state.verifier.decode(auth.token()) {
        Ok(claims) => {
            debug!(iat = claims.iat, exp = claims.exp, "bearer token accepted");
            Ok(next.run(request).await)
        }
        Err(TokenError::Expired) => Err(AppError::unauthorized(
            "expired_token",
            "bearer token has expired",
        )),
        Err(TokenError::InvalidSignature) => Err(AppError::unauthorized(
            "invalid_signature",
            "bearer token signature is invalid",
        )),
        Err(_) => Err(AppError::unauthorized(
            "malformed_token",
            "bearer token is malformed",
        )),
    }
}
