/// 浏览器登录兜底服务客户端
///
/// 直接登录因验证码失败时，由外部的浏览器服务完成登录并交回 cookie
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult, AuthError, TransportError};
use crate::utils::logging::truncate_text;
use crate::models::Credentials;

/// 浏览器登录较慢，超时放宽到 2 分钟
const BROWSER_LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// 兜底登录能力
#[async_trait]
pub trait LoginFallback: Send + Sync {
    /// 登录成功时返回门户 cookie
    async fn login(&self, credentials: &Credentials) -> AppResult<HashMap<String, String>>;
}

#[derive(Serialize)]
struct BrowserLoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// `/login` 响应
#[derive(Debug, Deserialize)]
pub struct BrowserLoginResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cookies: Option<HashMap<String, String>>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// 浏览器登录服务客户端
pub struct BrowserLoginClient {
    http: reqwest::Client,
    base_url: String,
}

impl BrowserLoginClient {
    /// 创建新的客户端
    ///
    /// # 参数
    /// - `base_url`: 服务地址，如 `http://browser-login:8000`
    pub fn new(base_url: impl Into<String>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(BROWSER_LOGIN_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 服务是否可用
    pub async fn health(&self) -> AppResult<bool> {
        let endpoint = self.endpoint("/health");
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| AppError::request_failed(&endpoint, e))?;
        Ok(response.status().is_success())
    }

    /// 完整的 `/login` 调用
    pub async fn browser_login(&self, credentials: &Credentials) -> AppResult<BrowserLoginResponse> {
        let endpoint = self.endpoint("/login");
        let response = self
            .http
            .post(&endpoint)
            .json(&BrowserLoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| AppError::request_failed(&endpoint, e))?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| {
                AuthError::FallbackFailed {
                    message: format!("响应无法解析: {}", e),
                }
                .into()
            }),
            StatusCode::UNAUTHORIZED => Err(AuthError::InvalidCredentials.into()),
            status => Err(AuthError::FallbackFailed {
                message: format!("服务返回状态码 {}", status.as_u16()),
            }
            .into()),
        }
    }

    /// 出勤页截图（PNG）
    pub async fn attendance_screenshot(&self, credentials: &Credentials) -> AppResult<Vec<u8>> {
        let endpoint = self.endpoint("/attendance-screenshot");
        let response = self
            .http
            .post(&endpoint)
            .json(&BrowserLoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| AppError::request_failed(&endpoint, e))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(AuthError::InvalidCredentials.into()),
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::FallbackFailed {
                    message: format!(
                        "截图失败 ({}): {}",
                        status.as_u16(),
                        truncate_text(&body, 200)
                    ),
                }
                .into());
            }
        }

        let image = response
            .bytes()
            .await
            .map_err(|e| AppError::request_failed(&endpoint, e))?;
        if image.is_empty() {
            return Err(AuthError::FallbackFailed {
                message: "截图为空".to_string(),
            }
            .into());
        }
        Ok(image.to_vec())
    }
}

#[async_trait]
impl LoginFallback for BrowserLoginClient {
    async fn login(&self, credentials: &Credentials) -> AppResult<HashMap<String, String>> {
        info!("[{}] 调用浏览器登录服务", credentials.masked());
        let response = self.browser_login(credentials).await?;
        if !response.success {
            warn!("[{}] 浏览器登录失败: {}", credentials.masked(), response.message);
            return Err(AuthError::FallbackFailed {
                message: response.message,
            }
            .into());
        }

        let cookies = response.cookies.unwrap_or_default();
        if cookies.is_empty() {
            return Err(AuthError::FallbackFailed {
                message: "服务未返回 cookie".to_string(),
            }
            .into());
        }
        Ok(cookies)
    }
}
