//! 传输层契约
//!
//! 每个凭据独占一个传输实例（及其 cookie jar），只暴露"发请求"的能力，
//! 不认识登录流程也不认识页面

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{AppResult, TransportError};

/// 门户认证 cookie
pub const SESSION_COOKIE: &str = ".ASPXAUTH";

/// HTTP 方法（门户只用到这两种）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// 发往门户的一次请求
#[derive(Debug, Clone)]
pub struct PortalRequest {
    pub method: Method,
    /// 完整 URL
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    /// 表单字段，POST 时按 urlencoded 发送
    pub form: Option<Vec<(String, String)>>,
}

impl PortalRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            form: Some(form),
        }
    }

    /// 门户请求：除 cookie 外门户还校验 `Referer` 与 `Origin`；
    /// POST 一律视为表单提交
    pub fn portal(
        base_url: &str,
        method: Method,
        endpoint: &str,
        form: Option<Vec<(String, String)>>,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let url = format!("{}{}", base_url, endpoint);
        let request = match method {
            Method::Get => Self::get(url),
            Method::Post => Self::post(url, form.unwrap_or_default()),
        };
        request
            .header("Referer", format!("{}/", base_url))
            .header("Origin", base_url)
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// 门户响应（已跟随重定向）
#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: u16,
    /// 跟随重定向后的最终地址
    pub final_url: String,
    pub body: String,
}

impl PortalResponse {
    /// 门户对 POST 也返回 200，其余状态码都视为门户异常
    pub fn ensure_ok(self, endpoint: &str) -> AppResult<Self> {
        if self.status != 200 {
            warn!("{} 返回状态码 {}，门户可能已宕机", endpoint, self.status);
            return Err(TransportError::UnexpectedStatus {
                endpoint: endpoint.to_string(),
                status: self.status,
            }
            .into());
        }
        Ok(self)
    }

    /// 最终地址的路径部分
    pub fn final_path(&self) -> String {
        reqwest::Url::parse(&self.final_url)
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| self.final_url.clone())
    }
}

/// 可替换的传输实现
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送请求，跟随重定向并读取完整响应体
    async fn execute(&self, request: PortalRequest) -> AppResult<PortalResponse>;

    /// cookie jar 中是否存在门户认证 cookie
    fn has_session_cookies(&self) -> bool;

    /// 导入外部获得的 cookie（浏览器登录兜底）
    fn import_cookies(&self, cookies: &HashMap<String, String>) -> AppResult<()>;
}

/// 为每个凭据创建一个全新的传输实例
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> AppResult<Arc<dyn Transport>>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> AppResult<Arc<dyn Transport>> + Send + Sync,
{
    fn create(&self) -> AppResult<Arc<dyn Transport>> {
        self()
    }
}
