//! OAuth 2.0 credential store: authorization-code flow with PKCE,
//! userinfo lookup, and access-token refresh.

use anyhow::{anyhow, Context, Result};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::CredentialError;

/// Refresh when less than this many seconds of validity remain.
const EXPIRY_SKEW_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Google endpoints with the Gmail read/modify scope set.
    pub fn google(client_id: String, client_secret: String, base_url: &str) -> Self {
        OAuthConfig {
            client_id,
            client_secret,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            redirect_uri: format!("{}/oauth2callback", base_url.trim_end_matches('/')),
            scopes: vec![
                "https://www.googleapis.com/auth/userinfo.email".to_string(),
                "openid".to_string(),
                "https://www.googleapis.com/auth/gmail.modify".to_string(),
            ],
        }
    }
}

/// Refreshable token bundle held per subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds; `None` means the issuer gave no expiry.
    pub expires_at: Option<i64>,
    pub token_type: String,
}

impl OAuthTokens {
    /// Expired (or about to expire within the refresh skew).
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| exp < chrono::Utc::now().timestamp() + EXPIRY_SKEW_SECS)
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// Manages pending PKCE flows and token lifecycle against one issuer.
pub struct OAuthManager {
    config: OAuthConfig,
    oauth: BasicClient,
    http: reqwest::Client,
    // state -> (chat_id, pkce_verifier)
    pending_auths: RwLock<HashMap<String, (i64, PkceCodeVerifier)>>,
}

impl OAuthManager {
    pub fn new(config: OAuthConfig) -> Result<Self> {
        let oauth = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(config.auth_url.clone()).context("invalid auth url")?,
            Some(TokenUrl::new(config.token_url.clone()).context("invalid token url")?),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_uri.clone()).context("invalid redirect uri")?,
        );

        Ok(Self {
            config,
            oauth,
            http: reqwest::Client::new(),
            pending_auths: RwLock::new(HashMap::new()),
        })
    }

    /// Build the consent URL for a chat and remember the flow state.
    pub async fn start_auth_flow(&self, chat_id: i64) -> Result<String> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &self.config.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf_state) = auth_request.url();

        self.pending_auths
            .write()
            .await
            .insert(csrf_state.secret().clone(), (chat_id, pkce_verifier));

        Ok(auth_url.to_string())
    }

    /// Exchange the callback code for tokens. Returns the chat the flow
    /// was started for along with the token bundle.
    pub async fn handle_callback(&self, code: String, state: String) -> Result<(i64, OAuthTokens)> {
        let (chat_id, pkce_verifier) = self
            .pending_auths
            .write()
            .await
            .remove(&state)
            .ok_or_else(|| anyhow!("invalid or expired oauth state"))?;

        let token_result = self
            .oauth
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| anyhow!("token exchange failed: {e}"))?;

        Ok((chat_id, tokens_from_response(&token_result, None)))
    }

    /// Resolve the account email behind an access token.
    pub async fn fetch_account_email(&self, access_token: &str) -> Result<String> {
        let resp = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("userinfo request failed")?;
        let info: UserInfo = resp.json().await.context("userinfo decode failed")?;
        info.email
            .ok_or_else(|| anyhow!("userinfo response carried no email"))
    }

    /// Return a valid token bundle, refreshing when needed.
    ///
    /// The bool is `true` when the bundle changed and the caller should
    /// write it back to the registry.
    pub async fn ensure_valid(
        &self,
        tokens: &OAuthTokens,
    ) -> Result<(OAuthTokens, bool), CredentialError> {
        if !tokens.is_expired() {
            return Ok((tokens.clone(), false));
        }
        match tokens.refresh_token.as_deref() {
            Some(refresh) => {
                let refreshed = self.refresh(refresh).await?;
                Ok((refreshed, true))
            }
            None => Err(CredentialError::Expired),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens, CredentialError> {
        let token_result = self
            .oauth
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| CredentialError::Refresh(e.to_string()))?;

        Ok(tokens_from_response(&token_result, Some(refresh_token)))
    }
}

fn tokens_from_response(
    token_result: &oauth2::basic::BasicTokenResponse,
    fallback_refresh: Option<&str>,
) -> OAuthTokens {
    OAuthTokens {
        access_token: token_result.access_token().secret().clone(),
        refresh_token: token_result
            .refresh_token()
            .map(|t| t.secret().clone())
            // issuers often omit the refresh token on refresh; keep the old one
            .or_else(|| fallback_refresh.map(str::to_string)),
        expires_at: token_result
            .expires_in()
            .map(|d| chrono::Utc::now().timestamp() + d.as_secs() as i64),
        token_type: "Bearer".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(expires_at: Option<i64>, refresh: Option<&str>) -> OAuthTokens {
        OAuthTokens {
            access_token: "tok".into(),
            refresh_token: refresh.map(str::to_string),
            expires_at,
            token_type: "Bearer".into(),
        }
    }

    #[test]
    fn unexpired_token_is_valid() {
        let t = tokens(Some(chrono::Utc::now().timestamp() + 3600), None);
        assert!(!t.is_expired());
    }

    #[test]
    fn near_expiry_counts_as_expired() {
        let t = tokens(Some(chrono::Utc::now().timestamp() + 60), None);
        assert!(t.is_expired());
    }

    #[test]
    fn missing_expiry_is_treated_as_valid() {
        assert!(!tokens(None, None).is_expired());
    }

    #[tokio::test]
    async fn expired_without_refresh_token_errors() {
        let config = OAuthConfig::google("id".into(), "secret".into(), "http://localhost:5000");
        let manager = OAuthManager::new(config).unwrap();
        let t = tokens(Some(0), None);
        match manager.ensure_valid(&t).await {
            Err(CredentialError::Expired) => {}
            other => panic!("expected Expired, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_token_passes_through_unchanged() {
        let config = OAuthConfig::google("id".into(), "secret".into(), "http://localhost:5000");
        let manager = OAuthManager::new(config).unwrap();
        let t = tokens(Some(chrono::Utc::now().timestamp() + 3600), Some("r"));
        let (out, changed) = manager.ensure_valid(&t).await.unwrap();
        assert!(!changed);
        assert_eq!(out.access_token, "tok");
    }
}
