//! 基于 reqwest 的传输实现

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use tracing::debug;

use super::transport::{Method, PortalRequest, PortalResponse, Transport, SESSION_COOKIE};
use crate::config::Config;
use crate::error::{AppError, AppResult, TransportError};

/// 轮换使用的浏览器 UA
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
];

const MAX_REDIRECTS: usize = 10;

/// 传输参数
#[derive(Debug, Clone)]
pub struct HttpTransportOptions {
    pub base_url: String,
    pub proxy: Option<String>,
    pub timeout: Duration,
}

impl HttpTransportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            proxy: config.forwarding_proxy.clone(),
            timeout: config.request_timeout(),
        }
    }
}

/// reqwest 传输
///
/// 每个实例持有独立的 cookie jar 和 UA 轮换计数
pub struct HttpTransport {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
    next_agent: Mutex<usize>,
}

impl HttpTransport {
    /// 创建新的传输实例
    ///
    /// # 参数
    /// - `options`: 门户地址、可选代理与超时
    pub fn new(options: &HttpTransportOptions) -> AppResult<Self> {
        let base_url = Url::parse(&options.base_url)
            .map_err(|e| TransportError::Build(format!("门户地址不合法: {}", e)))?;
        let jar = Arc::new(Jar::default());

        let mut builder = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(options.timeout);
        if let Some(proxy) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| TransportError::Build(format!("代理地址不合法: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self {
            client,
            jar,
            base_url,
            next_agent: Mutex::new(0),
        })
    }

    fn rotate_user_agent(&self) -> &'static str {
        let mut next = self.next_agent.lock().unwrap_or_else(|e| e.into_inner());
        let agent = USER_AGENTS[*next % USER_AGENTS.len()];
        *next = next.wrapping_add(1);
        agent
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: PortalRequest) -> AppResult<PortalResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        let has_agent = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"));
        if !has_agent {
            builder = builder.header(reqwest::header::USER_AGENT, self.rotate_user_agent());
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::request_failed(&request.url, e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::request_failed(&request.url, e))?;

        debug!(
            "{} {} -> {} ({})",
            request.method.as_str(),
            request.url,
            final_url,
            status
        );
        Ok(PortalResponse {
            status,
            final_url,
            body,
        })
    }

    fn has_session_cookies(&self) -> bool {
        self.jar
            .cookies(&self.base_url)
            .and_then(|header| header.to_str().map(str::to_string).ok())
            .map(|cookies| {
                cookies
                    .split(';')
                    .any(|pair| pair.trim().starts_with(&format!("{}=", SESSION_COOKIE)))
            })
            .unwrap_or(false)
    }

    fn import_cookies(&self, cookies: &HashMap<String, String>) -> AppResult<()> {
        for (name, value) in cookies {
            if name.is_empty() || name.contains(['=', ';']) {
                return Err(TransportError::Cookie(format!("cookie 名称不合法: {:?}", name)).into());
            }
            self.jar
                .add_cookie_str(&format!("{}={}; Path=/", name, value), &self.base_url);
        }
        debug!("导入 {} 个 cookie", cookies.len());
        Ok(())
    }
}
