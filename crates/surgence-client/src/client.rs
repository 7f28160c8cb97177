//! 后端 HTTP 客户端
//!
//! 只做请求封装：附加认证头、把非 2xx 响应转换成带 `detail` 的错误。
//! 不做缓存，也不重试。

use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use surgence_core::{Result, Session, SurgenceError};
use tracing::{debug, warn};

/// 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// 后端 API 客户端
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl BackendClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SurgenceError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session: Session::guest(),
        })
    }

    /// 绑定会话，之后的请求携带该会话的 Bearer token
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// 在 `path` 后追加一个经过百分号编码的路径段
    pub(crate) fn segment_url(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| SurgenceError::Config(format!("Invalid backend URL: {}", e)))?;
        let url_display = url.to_string();
        url.path_segments_mut()
            .map_err(|_| SurgenceError::Config(format!("Backend URL cannot be a base: {}", url_display)))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    /// 构造请求并添加认证头
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.authorize(self.http.request(method, self.url(path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.session.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::GET, path)).await
    }

    pub(crate) async fn get_json_at<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.send_json(self.authorize(self.http.get(url))).await
    }

    pub(crate) async fn get_json_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_json(self.request(Method::GET, path).query(query)).await
    }

    pub(crate) async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(self.request(Method::POST, path).json(body)).await
    }

    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            warn!("Backend request failed: {}", e);
            SurgenceError::Http(e.to_string())
        })?;

        let status = response.status();
        debug!("Backend responded {} for {}", status, response.url());
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SurgenceError::Api {
            status: status.as_u16(),
            detail: extract_detail(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string()),
        })
    }

    async fn send_json<T>(&self, request: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| SurgenceError::Http(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| SurgenceError::Decode(e.to_string()))
    }
}

/// 提取后端错误体中的 `detail`
///
/// `detail` 可能是字符串，也可能是字段校验错误数组（取每项的 `msg`）。
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) => Some(detail.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::Router;

    /// 在随机端口启动测试用后端，返回指向它的客户端
    pub async fn serve(router: Router) -> BackendClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        BackendClient::new(ClientConfig {
            base_url: format!("http://{}/", addr),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string_and_validation_array() {
        assert_eq!(
            extract_detail(r#"{"detail":"Patient not found"}"#).as_deref(),
            Some("Patient not found")
        );
        assert_eq!(
            extract_detail(r#"{"detail":[{"loc":["body","email"],"msg":"value is not a valid email address"}]}"#)
                .as_deref(),
            Some("value is not a valid email address")
        );
        assert_eq!(extract_detail("<html>502</html>"), None);
    }

    #[test]
    fn test_url_join_ignores_duplicate_slashes() {
        let client = BackendClient::new(ClientConfig {
            base_url: "http://backend:8000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("/patients/"), "http://backend:8000/patients/");
        assert_eq!(client.url("status/"), "http://backend:8000/status/");
    }

    #[test]
    fn test_segment_is_percent_encoded() {
        let client = BackendClient::new(ClientConfig {
            base_url: "http://backend:8000/api".to_string(),
            ..Default::default()
        })
        .unwrap();
        let url = client.segment_url("patients/", "A/B?c").unwrap();
        assert_eq!(url.as_str(), "http://backend:8000/api/patients/A%2FB%3Fc");
    }
}
