use crate::{
    app::Db,
    config::Config,
    domain::{errors::ApiError, fields::AuthContext},
    repository::fetch_principal,
    utils::jwt::decode_auth_token,
};
use axum::{
    headers::{authorization::Bearer, Authorization},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    TypedHeader,
};

/// Resolves the bearer token into an [`AuthContext`] extension. The role is
/// read from `users` on every request, so a demoted or deleted account loses
/// access while its token is still valid.
pub async fn check_auth<B>(
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Response {
    let config = match request.extensions().get::<Config>() {
        Some(c) => c,
        None => return ApiError::ServerError.into_response(),
    };

    let Some(TypedHeader(auth)) = auth else {
        return ApiError::AuthenticationError.into_response();
    };

    let db = match request.extensions().get::<Db>() {
        Some(db) => db.inner(),
        None => return ApiError::ServerError.into_response(),
    };

    let user_id = match decode_auth_token(auth.token(), &config.jwt)
        .map_err(ApiError::from)
        .and_then(|claims| claims.user_id())
    {
        Ok(user_id) => user_id,
        Err(e) => return e.into_response(),
    };

    match fetch_principal(&db, user_id).await {
        Ok(Some(principal)) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Ok(None) => {
            tracing::info!("token subject {} no longer exists", user_id);
            ApiError::AuthenticationError.into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Lets the request through only for admin principals. Must run after [`check_auth`].
pub async fn require_admin<B>(request: Request<B>, next: Next<B>) -> Response {
    let checked = match request.extensions().get::<AuthContext>() {
        Some(principal) => principal.require_admin(),
        None => Err(ApiError::AuthenticationError),
    };

    match checked {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::info!("rejected non-admin request to {}", request.uri().path());
            e.into_response()
        }
    }
}
