//! 会话缓存 - 编排层
//!
//! 凭据 → 已登录会话的并发注册表
//!
//! - map 由一把读写锁保护，只在指针操作期间持有，从不跨网络 I/O
//! - 每个条目的首次登录由条目自己的 `OnceCell` 保证只执行一次
//! - 超过 TTL 的条目对读者不可见，并由后台清理任务移除

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::portal_session::PortalSession;
use crate::clients::{BrowserLoginClient, CapSolverClient, ChallengeSolver, LoginFallback};
use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError};
use crate::infrastructure::{HttpTransport, HttpTransportOptions, Transport, TransportFactory};
use crate::models::{Credentials, SessionKey};
use crate::workflow::LoginFlow;

/// 缓存参数
#[derive(Debug, Clone)]
pub struct SessionCacheOptions {
    pub base_url: String,
    pub ttl: Duration,
    pub sweep_interval: Duration,
    pub feedback_concurrency: usize,
}

impl SessionCacheOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            ttl: config.session_ttl(),
            sweep_interval: config.sweep_interval(),
            feedback_concurrency: config.feedback_concurrency,
        }
    }
}

/// 缓存条目
struct Slot {
    session: Arc<PortalSession>,
    /// 首次登录成功的时间；未完成时为空
    created_at: OnceCell<Instant>,
    last_used: Mutex<Instant>,
}

impl Slot {
    fn new(session: Arc<PortalSession>) -> Self {
        Self {
            session,
            created_at: OnceCell::new(),
            last_used: Mutex::new(Instant::now()),
        }
    }

    /// 已登录且未过期
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.created_at
            .get()
            .map(|at| at.elapsed() <= ttl)
            .unwrap_or(false)
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at
            .get()
            .map(|at| at.elapsed() > ttl)
            .unwrap_or(false)
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

/// 会话缓存
pub struct SessionCache {
    slots: RwLock<HashMap<SessionKey, Arc<Slot>>>,
    options: SessionCacheOptions,
    transports: Arc<dyn TransportFactory>,
    solver: Option<Arc<dyn ChallengeSolver>>,
    fallback: Option<Arc<dyn LoginFallback>>,
}

impl SessionCache {
    /// 创建新的缓存
    ///
    /// # 参数
    /// - `options`: TTL、清理周期等
    /// - `transports`: 为每个凭据创建独立的传输实例
    pub fn new(options: SessionCacheOptions, transports: Arc<dyn TransportFactory>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            options,
            transports,
            solver: None,
            fallback: None,
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

    /// 按配置组装：reqwest 传输，配置了 key 时启用 CapSolver，配置了地址时启用浏览器登录兜底
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let transport_options = HttpTransportOptions::from_config(config);
        let transports = move || -> AppResult<Arc<dyn Transport>> {
            let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&transport_options)?);
            Ok(transport)
        };

        let solver = match &config.capsolver_api_key {
            Some(key) => {
                let client = CapSolverClient::new(key, config.forwarding_proxy.as_deref())?;
                Some(Arc::new(client) as Arc<dyn ChallengeSolver>)
            }
            None => {
                warn!("未配置 CAPSOLVER_API_KEY，遇到验证码时将无法求解");
                None
            }
        };
        let fallback = match &config.browser_login_url {
            Some(url) => {
                let client = BrowserLoginClient::new(url.as_str())?;
                Some(Arc::new(client) as Arc<dyn LoginFallback>)
            }
            None => None,
        };

        Ok(Self::new(SessionCacheOptions::from_config(config), Arc::new(transports))
            .with_solver(solver)
            .with_fallback(fallback))
    }

    fn read_slots(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SessionKey, Arc<Slot>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SessionKey, Arc<Slot>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_session(&self, credentials: &Credentials) -> AppResult<Arc<PortalSession>> {
        let transport = self.transports.create()?;
        let login = LoginFlow::new(credentials.clone(), transport, self.options.base_url.as_str())
            .with_solver(self.solver.clone())
            .with_fallback(self.fallback.clone());
        Ok(Arc::new(PortalSession::new(
            login,
            self.options.feedback_concurrency,
        )))
    }

    /// 返回未过期的已缓存会话
    pub fn get(&self, credentials: &Credentials) -> Option<Arc<PortalSession>> {
        let slots = self.read_slots();
        let slot = slots.get(&credentials.session_key())?;
        if !slot.is_fresh(self.options.ttl) {
            return None;
        }
        slot.touch();
        Some(slot.session.clone())
    }

    /// 返回已缓存的会话，或创建新会话并完成首次登录
    ///
    /// 同一凭据的并发调用共享同一个条目，最多发起一次登录
    pub async fn get_or_create(&self, credentials: &Credentials) -> AppResult<Arc<PortalSession>> {
        if credentials.is_empty() {
            return Err(AuthError::InvalidCredentials.into());
        }
        if let Some(session) = self.get(credentials) {
            debug!("[{}] 使用缓存的会话", credentials.masked());
            return Ok(session);
        }

        let key = credentials.session_key();
        // 传输实例在锁外创建
        let candidate = self.build_session(credentials)?;
        let slot = {
            let mut slots = self.write_slots();
            match slots.get(&key) {
                Some(existing) if !existing.is_expired(self.options.ttl) => existing.clone(),
                _ => {
                    let slot = Arc::new(Slot::new(candidate));
                    slots.insert(key.clone(), slot.clone());
                    slot
                }
            }
        };

        let session = slot.session.clone();
        let init = slot
            .created_at
            .get_or_try_init(|| async {
                info!("[{}] 创建新会话", credentials.masked());
                session.ensure_authenticated(false).await?;
                Ok::<_, AppError>(Instant::now())
            })
            .await;

        match init {
            Ok(_) => {
                slot.touch();
                Ok(session)
            }
            Err(e) => {
                warn!("[{}] 会话创建失败: {}", credentials.masked(), e);
                let mut slots = self.write_slots();
                if slots
                    .get(&key)
                    .map(|current| Arc::ptr_eq(current, &slot))
                    .unwrap_or(false)
                {
                    slots.remove(&key);
                }
                Err(e)
            }
        }
    }

    /// 移除会话（例如凭据已失效）
    pub fn delete(&self, credentials: &Credentials) -> bool {
        let removed = self.write_slots().remove(&credentials.session_key()).is_some();
        if removed {
            debug!("[{}] 会话已移除", credentials.masked());
        }
        removed
    }

    /// 清除所有过期条目，返回清除数量
    ///
    /// 正在使用的会话由调用方持有引用，移除条目不影响进行中的请求
    pub fn sweep(&self) -> usize {
        let ttl = self.options.ttl;
        let mut slots = self.write_slots();
        let before = slots.len();
        slots.retain(|key, slot| {
            let expired = slot.is_expired(ttl);
            if expired {
                debug!("清理过期会话 {:?} (空闲 {}s)", key, slot.idle_for().as_secs());
            }
            !expired
        });
        let removed = before - slots.len();
        if removed > 0 {
            info!("🧹 清理了 {} 个过期会话", removed);
        }
        removed
    }

    /// (条目总数, 未过期的已登录条目数)
    pub fn stats(&self) -> (usize, usize) {
        let ttl = self.options.ttl;
        let slots = self.read_slots();
        let active = slots.values().filter(|slot| slot.is_fresh(ttl)).count();
        (slots.len(), active)
    }

    /// 启动后台清理任务；缓存被释放后任务自动结束
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let period = self.options.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.sweep();
                    }
                    None => break,
                }
            }
        })
    }
}
