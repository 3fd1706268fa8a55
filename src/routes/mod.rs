pub mod oauth;

use axum::extract::FromRef;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

use crate::oauth::OAuthManager;
use crate::registry::SubscriberRegistry;
use crate::telegram::DispatcherHandle;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubscriberRegistry>,
    pub oauth: Arc<OAuthManager>,
    pub dispatcher: DispatcherHandle,
}

impl FromRef<AppState> for Arc<SubscriberRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<AppState> for Arc<OAuthManager> {
    fn from_ref(state: &AppState) -> Self {
        state.oauth.clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/connect/:chat_id", get(oauth::start_oauth))
        .route("/oauth2callback", get(oauth::oauth_callback))
        .with_state(state)
}

async fn home() -> impl IntoResponse {
    "otp-relay-hub online"
}
