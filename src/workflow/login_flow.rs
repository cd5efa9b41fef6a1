//! 登录流程 - 流程层
//!
//! 一个账号的完整认证生命周期：决定复用还是重新登录，
//! 提交登录表单（必要时先求解验证码），再对结果分类
//!
//! 同一账号的登录尝试由账号自己的锁串行化；不同账号互不阻塞

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::clients::{ChallengeSolver, LoginFallback};
use crate::error::{AppError, AppResult, AuthError};
use crate::extract::{self, LoginFormSnapshot, VERIFICATION_TOKEN_FIELD};
use crate::infrastructure::{Method, PortalRequest, Transport};
use crate::models::{ChallengeKind, Credentials};
use crate::utils::logging::redact_form;

/// 登录页与登录表单提交地址
pub const LOGIN_PATH: &str = "/";
/// 上次成功登录后多久内允许直接复用 cookie
pub const SESSION_REUSE_WINDOW: Duration = Duration::from_secs(60 * 60);
/// 两次登录尝试的最小间隔
pub const LOGIN_THROTTLE: Duration = Duration::from_secs(2 * 60);

/// 账号的认证状态
#[derive(Debug, Default)]
struct LoginState {
    last_attempt: Option<Instant>,
    last_success: Option<Instant>,
    authenticated: bool,
    /// 每次登录成功加一
    generation: u64,
}

/// 登录流程
///
/// - 持有账号凭据与其独占的传输实例
/// - 可选的验证码求解器与浏览器登录兜底
/// - 不认识任何业务页面
pub struct LoginFlow {
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    base_url: String,
    solver: Option<Arc<dyn ChallengeSolver>>,
    fallback: Option<Arc<dyn LoginFallback>>,
    state: Mutex<LoginState>,
}

impl LoginFlow {
    /// 创建新的登录流程
    ///
    /// # 参数
    /// - `credentials`: 账号凭据
    /// - `transport`: 该账号独占的传输实例
    /// - `base_url`: 门户地址
    pub fn new(
        credentials: Credentials,
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            solver: None,
            fallback: None,
            state: Mutex::new(LoginState::default()),
        }
    }

    pub fn with_solver(mut self, solver: Option<Arc<dyn ChallengeSolver>>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_fallback(mut self, fallback: Option<Arc<dyn LoginFallback>>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 是否曾经登录成功
    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.authenticated
    }

    /// 确保账号处于登录状态
    ///
    /// # 参数
    /// - `force`: 忽略复用与节流规则，强制重新登录
    pub async fn ensure_authenticated(&self, force: bool) -> AppResult<()> {
        let mut state = self.state.lock().await;
        self.authenticate_locked(&mut state, force).await
    }

    /// 已完成的成功登录次数，发请求前记录，用于判断会话失效后是否已有人重新登录
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// 会话失效后强制重新登录
    ///
    /// 同一账号的多个在途请求可能同时发现会话失效；
    /// 如果在 `observed` 之后已有请求重新登录成功，直接复用，不再登录
    ///
    /// # 参数
    /// - `observed`: 发请求前 [`LoginFlow::generation`] 的值
    pub async fn renew_session(&self, observed: u64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.generation > observed {
            debug!("[{}] 会话已被其它请求刷新，跳过重新登录", self.credentials.masked());
            return Ok(());
        }
        self.authenticate_locked(&mut state, true).await
    }

    async fn authenticate_locked(&self, state: &mut LoginState, force: bool) -> AppResult<()> {
        let user = self.credentials.masked();

        if !force {
            let recent_success = state
                .last_success
                .map(|at| at.elapsed() < SESSION_REUSE_WINDOW)
                .unwrap_or(false);
            if recent_success && self.transport.has_session_cookies() {
                debug!("[{}] 复用现有会话", user);
                state.authenticated = true;
                return Ok(());
            }

            // 只有上一次尝试失败时才节流
            if let Some(last_attempt) = state.last_attempt {
                let since = last_attempt.elapsed();
                let last_succeeded = state
                    .last_success
                    .map(|at| at >= last_attempt)
                    .unwrap_or(false);
                if since < LOGIN_THROTTLE && !last_succeeded {
                    warn!("[{}] 距上次失败的登录尝试不足 2 分钟，跳过", user);
                    return Err(AuthError::Throttled {
                        retry_after: LOGIN_THROTTLE - since,
                    }
                    .into());
                }
            }
        }

        state.last_attempt = Some(Instant::now());

        let result = match self.submit_login().await {
            Err(AppError::Auth(AuthError::ChallengeSolveFailed { attempts, source })) => {
                match &self.fallback {
                    Some(fallback) => {
                        warn!(
                            "[{}] 验证码求解失败 ({} 次: {})，改用浏览器登录",
                            user, attempts, source
                        );
                        self.fallback_login(fallback.as_ref()).await
                    }
                    None => Err(AuthError::ChallengeSolveFailed { attempts, source }.into()),
                }
            }
            other => other,
        };

        if result.is_ok() {
            info!("[{}] ✓ 登录成功", user);
            state.authenticated = true;
            state.last_success = Some(Instant::now());
            state.generation += 1;
        }
        result
    }

    /// 获取登录页 → 解析表单 → 提交 → 分类结果
    async fn submit_login(&self) -> AppResult<()> {
        let user = self.credentials.masked();

        let page = self
            .transport
            .execute(PortalRequest::portal(&self.base_url, Method::Get, LOGIN_PATH, None))
            .await?
            .ensure_ok(LOGIN_PATH)?;

        let snapshot = extract::parse_login_form(&page.body);
        if let Some(missing) = snapshot.missing_field() {
            error!("[{}] 登录页缺少字段 {}", user, missing);
            return Err(AuthError::MalformedLoginPage { missing }.into());
        }

        let solution = match (&snapshot.site_key, &self.solver) {
            (Some(challenge), Some(solver)) => {
                info!("[{}] 🔍 检测到 {}，开始求解", user, challenge.kind.name());
                let token = solver
                    .solve(challenge.kind, &self.base_url, &challenge.site_key)
                    .await?;
                Some((challenge.kind, token))
            }
            (Some(challenge), None) => {
                warn!(
                    "[{}] 检测到 {} 但未配置求解器，直接提交",
                    user,
                    challenge.kind.name()
                );
                None
            }
            (None, _) => None,
        };

        let payload = login_payload(&self.credentials, &snapshot, solution);
        debug!("[{}] 提交登录表单: {}", user, redact_form(&payload));

        let response = self
            .transport
            .execute(PortalRequest::portal(
                &self.base_url,
                Method::Post,
                LOGIN_PATH,
                Some(payload),
            ))
            .await?
            .ensure_ok(LOGIN_PATH)?;

        if response.final_path() == LOGIN_PATH {
            info!("[{}] 登录后被重定向回登录页，凭据错误", user);
            return Err(AuthError::InvalidCredentials.into());
        }

        let body_signal = extract::is_logged_in(&response.body);
        let cookie_signal = self.transport.has_session_cookies();
        match (body_signal, cookie_signal) {
            (true, true) => Ok(()),
            (false, _) => {
                error!(
                    "[{}] 重定向表明登录成功，但返回页面仍是登录页，门户登录流程可能已变更",
                    user
                );
                Err(AuthError::ProtocolDrift {
                    detail: "登录后页面仍显示登录表单",
                }
                .into())
            }
            (true, false) => {
                error!(
                    "[{}] 重定向与页面都表明登录成功，但 cookie jar 中没有认证 cookie，门户认证 cookie 可能已变更",
                    user
                );
                Err(AuthError::ProtocolDrift {
                    detail: "cookie jar 中没有认证 cookie",
                }
                .into())
            }
        }
    }

    async fn fallback_login(&self, fallback: &dyn LoginFallback) -> AppResult<()> {
        let cookies = fallback.login(&self.credentials).await?;
        self.transport.import_cookies(&cookies)?;
        if !self.transport.has_session_cookies() {
            return Err(AuthError::FallbackFailed {
                message: "导入的 cookie 中没有认证 cookie".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// 组装登录表单
///
/// 验证码 token 放在门户期望的字段中，并用 `_QString=test` 标记已通过验证
fn login_payload(
    credentials: &Credentials,
    snapshot: &LoginFormSnapshot,
    solution: Option<(ChallengeKind, String)>,
) -> Vec<(String, String)> {
    let field = |name: &str, value: &str| (name.to_string(), value.to_string());

    let mut payload = vec![
        field(VERIFICATION_TOKEN_FIELD, &snapshot.verification_token),
        field("_UserName", &credentials.username),
        field("_Password", &credentials.password),
        field("honeypot", ""),
        field("Salt", &snapshot.salt),
        field("SecretNumber", &snapshot.secret_number),
        field("Signature", &snapshot.signature),
        field("Challenge", &snapshot.challenge),
    ];

    match solution {
        Some((ChallengeKind::Turnstile, token)) => {
            payload.push(field("RecaptchaToken", &token));
            payload.push(field("cf-turnstile-response", &token));
            payload.push(field("_QString", "test"));
        }
        Some((ChallengeKind::RecaptchaV2, token)) => {
            payload.push(field("g-recaptcha-response", &token));
            payload.push(field("_QString", "test"));
        }
        None => payload.push(field("_QString", "")),
    }
    payload
}
