//! HTTP client for the hosted store. Implements both collaborator contracts
//! and keeps the signed-in session in a small JSON file so the next start can
//! recover it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::models::{
    AccessToken, CredentialsRequest, EmailRequest, ErrorBody, Identity, PasswordRequest, Session,
    SignUpRequest, VerifyRequest,
};
use crate::error::{ProviderError, StoreError};
use crate::sync::{DataStore, IdentityProvider, Record, Select, VerificationKind};

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    session_file: PathBuf,
}

/// A non-2xx answer, decoded from the `{code, message}` body when present.
#[derive(Debug)]
struct Rejection {
    status: u16,
    code: String,
    message: String,
}

enum Failure {
    Transport(String),
    Rejected(Rejection),
    Decode(String),
}

impl From<Failure> for ProviderError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Transport(msg) => ProviderError::Transport(msg),
            Failure::Decode(msg) => ProviderError::Transport(format!("unexpected response: {msg}")),
            Failure::Rejected(r) => ProviderError::Rejected {
                status: r.status,
                code: r.code,
                message: r.message,
            },
        }
    }
}

impl From<Failure> for StoreError {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Transport(msg) => StoreError::Transport(msg),
            Failure::Decode(msg) => StoreError::Decode(msg),
            Failure::Rejected(r) => StoreError::Rejected {
                status: r.status,
                code: r.code,
                message: r.message,
            },
        }
    }
}

async fn rejection(resp: Response) -> Rejection {
    let status = resp.status();
    let fallback = status.canonical_reason().unwrap_or("request failed").to_string();
    match resp.json::<ErrorBody>().await {
        Ok(body) => Rejection {
            status: status.as_u16(),
            code: body.code,
            message: body.message,
        },
        Err(_) => Rejection {
            status: status.as_u16(),
            code: format!("http_{}", status.as_u16()),
            message: fallback,
        },
    }
}

impl Client {
    pub fn new(base_url: &str, session_file: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_file: session_file.into(),
        })
    }

    pub fn session_file(&self) -> &Path {
        &self.session_file
    }

    fn request(&self, method: Method, path: &str, token: Option<&AccessToken>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, Failure> {
        let resp = builder
            .send()
            .await
            .map_err(|e| Failure::Transport(e.to_string()))?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(Failure::Rejected(rejection(resp).await))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, Failure> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| Failure::Decode(e.to_string()))
    }

    async fn store_session(&self, session: &Session) {
        let result = async {
            let json = serde_json::to_vec_pretty(session)?;
            tokio::fs::write(&self.session_file, json).await?;
            anyhow::Ok(())
        }
        .await;
        if let Err(err) = result {
            warn!(error = %err, path = %self.session_file.display(), "could not persist session");
        }
    }

    async fn forget_session(&self) {
        match tokio::fs::remove_file(&self.session_file).await {
            Ok(()) => debug!("stored session removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(error = %err, "could not remove stored session"),
        }
    }

    async fn load_session(&self) -> Option<Session> {
        let bytes = tokio::fs::read(&self.session_file).await.ok()?;
        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(error = %err, "stored session is unreadable; discarding it");
                self.forget_session().await;
                None
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for Client {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError> {
        let body = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
        };
        let req = self.request(Method::POST, "/auth/v1/signup", None).json(&body);
        Ok(self.send_json(req).await?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        let body = CredentialsRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let req = self.request(Method::POST, "/auth/v1/token", None).json(&body);
        let session: Session = self.send_json(req).await?;
        self.store_session(&session).await;
        Ok(session)
    }

    // The local copy goes first so sign-out holds even when the server is unreachable.
    async fn sign_out(&self, token: &AccessToken) -> Result<(), ProviderError> {
        self.forget_session().await;
        let req = self.request(Method::POST, "/auth/v1/logout", Some(token));
        self.send(req).await?;
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        let Some(stored) = self.load_session().await else {
            return Ok(None);
        };
        if stored.is_expired(Utc::now()) {
            debug!("stored session expired");
            self.forget_session().await;
            return Ok(None);
        }

        let req = self.request(Method::GET, "/auth/v1/user", Some(&stored.access_token));
        match self.send_json::<Identity>(req).await {
            Ok(user) => Ok(Some(Session { user, ..stored })),
            Err(Failure::Rejected(r)) if r.status == StatusCode::UNAUTHORIZED.as_u16() => {
                debug!("stored session no longer accepted");
                self.forget_session().await;
                Ok(None)
            }
            Err(other) => Err(other.into()),
        }
    }

    async fn verify(&self, token: &str, kind: VerificationKind) -> Result<Session, ProviderError> {
        let body = VerifyRequest {
            token: token.trim().to_string(),
            kind,
        };
        let req = self.request(Method::POST, "/auth/v1/verify", None).json(&body);
        let session: Session = self.send_json(req).await?;
        self.store_session(&session).await;
        Ok(session)
    }

    async fn reset_password(&self, email: &str) -> Result<(), ProviderError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.send(self.request(Method::POST, "/auth/v1/recover", None).json(&body))
            .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        token: &AccessToken,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        let body = PasswordRequest {
            password: password.to_string(),
        };
        let req = self.request(Method::PUT, "/auth/v1/user", Some(token)).json(&body);
        Ok(self.send_json(req).await?)
    }

    async fn resend_confirmation(&self, email: &str) -> Result<(), ProviderError> {
        let body = EmailRequest {
            email: email.to_string(),
        };
        self.send(self.request(Method::POST, "/auth/v1/resend", None).json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DataStore for Client {
    async fn select<R: Record>(
        &self,
        token: &AccessToken,
        query: &Select,
    ) -> Result<Vec<R>, StoreError> {
        let path = format!("/rest/v1/{}", R::TABLE);
        let req = self
            .request(Method::GET, &path, Some(token))
            .query(&query.to_query_pairs());
        Ok(self.send_json(req).await?)
    }

    async fn insert<R: Record, I: Serialize + Sync>(
        &self,
        token: &AccessToken,
        row: &I,
    ) -> Result<R, StoreError> {
        let path = format!("/rest/v1/{}", R::TABLE);
        let req = self.request(Method::POST, &path, Some(token)).json(row);
        Ok(self.send_json(req).await?)
    }

    async fn update<R: Record, P: Serialize + Sync>(
        &self,
        token: &AccessToken,
        id: &str,
        patch: &P,
    ) -> Result<R, StoreError> {
        let path = format!("/rest/v1/{}/{}", R::TABLE, id);
        let req = self.request(Method::PATCH, &path, Some(token)).json(patch);
        Ok(self.send_json(req).await?)
    }

    async fn delete<R: Record>(&self, token: &AccessToken, id: &str) -> Result<(), StoreError> {
        let path = format!("/rest/v1/{}/{}", R::TABLE, id);
        self.send(self.request(Method::DELETE, &path, Some(token)))
            .await?;
        Ok(())
    }
}
