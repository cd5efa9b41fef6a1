//! 集成测试用的内存门户、求解器与兜底服务

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use amizone_session::clients::{ChallengeSolver, LoginFallback};
use amizone_session::error::{AppResult, AuthError, SolverError};
use amizone_session::infrastructure::{
    Method, PortalRequest, PortalResponse, Transport, SESSION_COOKIE,
};
use amizone_session::models::{ChallengeKind, Credentials};
use async_trait::async_trait;

pub const BASE_URL: &str = "https://portal.test";
pub const PASSWORD: &str = "correct-horse";

pub fn login_page(turnstile_key: Option<&str>) -> String {
    let script = turnstile_key
        .map(|key| {
            format!(
                "<script>turnstile.render('#Capthcadiv', {{ sitekey: \"{}\" }});</script>",
                key
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body>
        <form id="loginform" action="/" method="post">
            <input name="__RequestVerificationToken" type="hidden" value="tok-123" />
            <input name="Salt" type="hidden" value="salty" />
            <input name="SecretNumber" type="hidden" value="42" />
            <input name="Signature" type="hidden" value="sig" />
            <input name="Challenge" type="hidden" value="chal" />
            <input name="_UserName" type="text" />
            <input name="_Password" type="password" />
        </form>{}
        </body></html>"#,
        script
    )
}

pub const DASHBOARD: &str = r#"
    <ul class="breadcrumb"><li class="active">Dashboard</li></ul>
    <ul id="tasks">
        <li><span class="sub-code">CSE303</span><span class="lbl">Compiler Design</span>
            <div class="class-count"><span>33/43 (76.74)</span></div></li>
    </ul>"#;

/// 登录成功后门户的表现
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Normal,
    /// 重定向成功但页面仍是登录页
    BodyShowsLogin,
    /// 重定向成功但没有下发认证 cookie
    NoCookie,
}

/// 所有传输实例共享的门户行为
pub struct Portal {
    pub login_page: String,
    pub outcome: LoginOutcome,
    pub pages: HashMap<String, String>,
    /// 按用户名设置的登录耗时
    pub login_delays: HashMap<String, Duration>,
    /// 业务页面的响应耗时
    pub page_delay: Option<Duration>,
    /// 下一次业务页面请求返回登录页（会话失效）
    pub expire_next: AtomicBool,
    /// 业务页面永远返回登录页
    pub always_expired: bool,
    pub login_page_fetches: AtomicUsize,
    pub login_posts: AtomicUsize,
}

impl Portal {
    pub fn new() -> Self {
        Self {
            login_page: login_page(None),
            outcome: LoginOutcome::Normal,
            pages: HashMap::new(),
            login_delays: HashMap::new(),
            page_delay: None,
            expire_next: AtomicBool::new(false),
            always_expired: false,
            login_page_fetches: AtomicUsize::new(0),
            login_posts: AtomicUsize::new(0),
        }
    }

    pub fn with_page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(path.to_string(), body.to_string());
        self
    }

    pub fn with_login_delay(mut self, username: &str, delay: Duration) -> Self {
        self.login_delays.insert(username.to_string(), delay);
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    pub fn posts(&self) -> usize {
        self.login_posts.load(Ordering::SeqCst)
    }
}

/// 单个账号的传输：独立的 "cookie jar" 与请求记录
pub struct FakeTransport {
    portal: Arc<Portal>,
    authenticated_cookie: AtomicBool,
    pub requests: Mutex<Vec<PortalRequest>>,
}

impl FakeTransport {
    pub fn new(portal: Arc<Portal>) -> Self {
        Self {
            portal,
            authenticated_cookie: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 模拟 cookie 被门户清除
    pub fn drop_cookies(&self) {
        self.authenticated_cookie.store(false, Ordering::SeqCst);
    }

    pub fn request_paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.trim_start_matches(BASE_URL).to_string())
            .collect()
    }

    pub fn last_form(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find_map(|r| r.form.clone())
            .unwrap_or_default()
    }

    fn respond(path: &str, status: u16, body: &str) -> PortalResponse {
        PortalResponse {
            status,
            final_url: format!("{}{}", BASE_URL, path),
            body: body.to_string(),
        }
    }
}

pub fn form_value<'a>(form: &'a [(String, String)], name: &str) -> Option<&'a str> {
    form.iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: PortalRequest) -> AppResult<PortalResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let target = request.url.trim_start_matches(BASE_URL).to_string();
        let path = target.split('?').next().unwrap_or_default().to_string();
        let portal = &self.portal;

        if path == "/" {
            return Ok(match request.method {
                Method::Get => {
                    portal.login_page_fetches.fetch_add(1, Ordering::SeqCst);
                    Self::respond("/", 200, &portal.login_page)
                }
                Method::Post => {
                    portal.login_posts.fetch_add(1, Ordering::SeqCst);
                    let form = request.form.unwrap_or_default();
                    let username = form_value(&form, "_UserName").unwrap_or_default().to_string();
                    if let Some(delay) = portal.login_delays.get(&username) {
                        tokio::time::sleep(*delay).await;
                    }
                    if form_value(&form, "_Password") != Some(PASSWORD) {
                        return Ok(Self::respond("/", 200, &portal.login_page));
                    }
                    if portal.outcome != LoginOutcome::NoCookie {
                        self.authenticated_cookie.store(true, Ordering::SeqCst);
                    }
                    let body = match portal.outcome {
                        LoginOutcome::BodyShowsLogin => portal.login_page.as_str(),
                        _ => DASHBOARD,
                    };
                    Self::respond("/Home", 200, body)
                }
            });
        }

        if let Some(delay) = portal.page_delay {
            tokio::time::sleep(delay).await;
        }

        let expired = portal.always_expired || portal.expire_next.swap(false, Ordering::SeqCst);
        if expired || !self.authenticated_cookie.load(Ordering::SeqCst) {
            self.authenticated_cookie.store(false, Ordering::SeqCst);
            return Ok(Self::respond("/", 200, &portal.login_page));
        }

        Ok(match portal.pages.get(&path) {
            Some(body) => Self::respond(&target, 200, body),
            None => Self::respond(&target, 404, "not found"),
        })
    }

    fn has_session_cookies(&self) -> bool {
        self.authenticated_cookie.load(Ordering::SeqCst)
    }

    fn import_cookies(&self, cookies: &HashMap<String, String>) -> AppResult<()> {
        if cookies.contains_key(SESSION_COOKIE) {
            self.authenticated_cookie.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// 固定返回结果的求解器
pub struct FakeSolver {
    pub token: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeSolver {
    pub fn solving(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChallengeSolver for FakeSolver {
    async fn solve(
        &self,
        _kind: ChallengeKind,
        _target_url: &str,
        _site_key: &str,
    ) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.token {
            Some(token) => Ok(token.clone()),
            None => Err(AuthError::ChallengeSolveFailed {
                attempts: 3,
                source: SolverError::Timeout {
                    after: Duration::from_secs(120),
                },
            }
            .into()),
        }
    }
}

/// 返回固定 cookie 的浏览器登录兜底
pub struct FakeFallback {
    pub cookies: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl FakeFallback {
    pub fn with_auth_cookie() -> Self {
        let mut cookies = HashMap::new();
        cookies.insert(SESSION_COOKIE.to_string(), "from-browser".to_string());
        cookies.insert("ASP.NET_SessionId".to_string(), "sid".to_string());
        Self {
            cookies,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LoginFallback for FakeFallback {
    async fn login(&self, _credentials: &Credentials) -> AppResult<HashMap<String, String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.cookies.clone())
    }
}

pub fn credentials(username: &str) -> Credentials {
    Credentials::new(username, PASSWORD)
}
