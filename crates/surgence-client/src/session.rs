//! 登录与会话持久化
//!
//! 会话只在登录时建立、登出时清除。其他地方拿到的都是只读副本。

use std::path::{Path, PathBuf};
use surgence_core::{LoginRequest, LoginResponse, Result, Session, SurgenceError};
use tracing::{info, warn};

use crate::client::BackendClient;

impl BackendClient {
    /// 调用登录接口
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.post_json("auth/login", &request).await
    }
}

/// 会话文件
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取会话；文件不存在或内容损坏时返回访客会话
    pub async fn load(&self) -> Session {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Session::guest(),
            Err(e) => {
                warn!("Failed to read session file {}: {}", self.path.display(), e);
                return Session::guest();
            }
        };

        match serde_json::from_slice::<Session>(&bytes) {
            Ok(session) if session.is_authenticated() => session,
            Ok(_) => Session::guest(),
            Err(e) => {
                warn!("Ignoring corrupt session file {}: {}", self.path.display(), e);
                Session::guest()
            }
        }
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let body = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SurgenceError::Io(e)),
        }
    }

    /// 登录并保存会话
    pub async fn login(&self, client: &BackendClient, email: &str, password: &str) -> Result<Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SurgenceError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let response = client.login(email, password).await?;
        let session = Session::from_login(email.trim(), response);
        self.save(&session).await?;
        info!("Logged in as {} ({})", session.display_name(), session.role);
        Ok(session)
    }

    /// 登出：删除会话文件，返回访客会话
    pub async fn logout(&self) -> Result<Session> {
        self.clear().await?;
        info!("Logged out");
        Ok(Session::guest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::serve;
    use axum::extract::Json as JsonBody;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use surgence_core::Role;

    fn temp_store() -> SessionStore {
        let dir = std::env::temp_dir().join(format!("surgence-session-{}", uuid::Uuid::new_v4()));
        SessionStore::new(dir.join("session.json"))
    }

    fn auth_router() -> Router {
        Router::new().route(
            "/auth/login",
            post(|JsonBody(body): JsonBody<Value>| async move {
                if body["password"] == "correct horse" {
                    (
                        StatusCode::OK,
                        Json(json!({"access_token": "jwt-abc", "token_type": "bearer", "role": "surgical_team"})),
                    )
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid credentials"})))
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_missing_or_corrupt_file_is_guest() {
        let store = temp_store();
        assert_eq!(store.load().await, Session::guest());

        tokio::fs::create_dir_all(store.path().parent().unwrap()).await.unwrap();
        tokio::fs::write(store.path(), b"{not json").await.unwrap();
        assert_eq!(store.load().await, Session::guest());
    }

    #[tokio::test]
    async fn test_login_persists_and_logout_clears() {
        let client = serve(auth_router()).await;
        let store = temp_store();

        let session = store
            .login(&client, " nurse@hospital.org ", "correct horse")
            .await
            .unwrap();
        assert_eq!(session.role, Role::SurgicalTeam);
        assert_eq!(session.email.as_deref(), Some("nurse@hospital.org"));

        let loaded = store.load().await;
        assert_eq!(loaded, session);

        let after = store.logout().await.unwrap();
        assert!(!after.is_authenticated());
        assert_eq!(store.load().await, Session::guest());
        store.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_login_leaves_no_session() {
        let client = serve(auth_router()).await;
        let store = temp_store();

        let err = store.login(&client, "nurse@hospital.org", "wrong").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!store.path().exists());

        let err = store.login(&client, "", "x").await.unwrap_err();
        assert!(matches!(err, SurgenceError::Validation(_)));
    }
}
