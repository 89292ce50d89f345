use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::backend::{auth, handlers, AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/v1/signup", post(auth::sign_up))
        .route("/auth/v1/token", post(auth::sign_in))
        .route("/auth/v1/logout", post(auth::sign_out))
        .route("/auth/v1/user", get(auth::current_user).put(auth::update_user))
        .route("/auth/v1/recover", post(auth::recover))
        .route("/auth/v1/resend", post(auth::resend))
        .route("/auth/v1/verify", post(auth::verify))
}

pub fn rest_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/rest/v1/:table",
            get(handlers::list_rows).post(handlers::insert_row),
        )
        .route(
            "/rest/v1/:table/:id",
            patch(handlers::update_row).delete(handlers::delete_row),
        )
}
