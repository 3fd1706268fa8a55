//! Token refresh against a loopback issuer.

use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;

use otp_relay_hub::error::CredentialError;
use otp_relay_hub::oauth::{OAuthConfig, OAuthManager, OAuthTokens};

/// Serve a minimal token endpoint on an ephemeral port and return its
/// address.
async fn spawn_issuer() -> SocketAddr {
    let app = Router::new().route(
        "/token",
        post(|| async {
            Json(json!({
                "access_token": "fresh-token",
                "token_type": "Bearer",
                "expires_in": 3600
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn manager_against(addr: SocketAddr) -> OAuthManager {
    let config = OAuthConfig {
        client_id: "id".into(),
        client_secret: "secret".into(),
        auth_url: format!("http://{addr}/auth"),
        token_url: format!("http://{addr}/token"),
        userinfo_url: format!("http://{addr}/userinfo"),
        redirect_uri: "http://localhost:5000/oauth2callback".into(),
        scopes: vec!["openid".into()],
    };
    OAuthManager::new(config).unwrap()
}

#[tokio::test]
async fn expired_token_is_refreshed_and_flagged_changed() {
    let addr = spawn_issuer().await;
    let manager = manager_against(addr);

    let stale = OAuthTokens {
        access_token: "stale-token".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Some(0),
        token_type: "Bearer".into(),
    };

    let (fresh, changed) = manager.ensure_valid(&stale).await.unwrap();
    assert!(changed);
    assert_eq!(fresh.access_token, "fresh-token");
    // issuer omitted the refresh token; the old one is kept
    assert_eq!(fresh.refresh_token.as_deref(), Some("refresh-1"));
    let expires_at = fresh.expires_at.unwrap();
    assert!(expires_at > chrono::Utc::now().timestamp());
}

#[tokio::test]
async fn valid_token_skips_the_issuer_entirely() {
    // no issuer running; a round trip would fail loudly
    let manager = manager_against("127.0.0.1:1".parse().unwrap());

    let live = OAuthTokens {
        access_token: "live-token".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Some(chrono::Utc::now().timestamp() + 3600),
        token_type: "Bearer".into(),
    };

    let (out, changed) = manager.ensure_valid(&live).await.unwrap();
    assert!(!changed);
    assert_eq!(out.access_token, "live-token");
}

#[tokio::test]
async fn expired_without_refresh_token_is_terminal() {
    let manager = manager_against("127.0.0.1:1".parse().unwrap());

    let dead = OAuthTokens {
        access_token: "stale-token".into(),
        refresh_token: None,
        expires_at: Some(0),
        token_type: "Bearer".into(),
    };

    match manager.ensure_valid(&dead).await {
        Err(CredentialError::Expired) => {}
        other => panic!("expected Expired, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_issuer_surfaces_a_refresh_error() {
    let manager = manager_against("127.0.0.1:1".parse().unwrap());

    let stale = OAuthTokens {
        access_token: "stale-token".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Some(0),
        token_type: "Bearer".into(),
    };

    match manager.ensure_valid(&stale).await {
        Err(CredentialError::Refresh(_)) => {}
        other => panic!("expected Refresh, got {other:?}"),
    }
}
