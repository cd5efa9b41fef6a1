//! 人机验证求解客户端
//!
//! 创建任务 → 轮询结果；整个 "创建 + 轮询" 过程有硬超时，失败后固定间隔重试

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::capsolver_api::{CapSolverTask, HttpSolverBackend, SolverBackend, TaskProxy};
use crate::error::{AppResult, AuthError, SolverError};
use crate::models::ChallengeKind;

/// 登录流程看到的求解能力
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    /// 返回可直接填入登录表单的 token
    async fn solve(&self, kind: ChallengeKind, target_url: &str, site_key: &str)
        -> AppResult<String>;
}

/// 求解重试参数
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// 创建 + 轮询的总尝试次数
    pub attempts: u32,
    /// 两次尝试之间的等待
    pub backoff: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 单次尝试的硬超时
    pub attempt_timeout: Duration,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(2),
            poll_interval: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

/// CapSolver 客户端
pub struct CapSolverClient<B = HttpSolverBackend> {
    backend: B,
    proxy: Option<TaskProxy>,
    options: SolverOptions,
}

impl CapSolverClient<HttpSolverBackend> {
    /// 创建使用官方服务的客户端
    ///
    /// # 参数
    /// - `api_key`: CapSolver API key
    /// - `proxy`: 上游代理地址，设置后使用带代理的任务类型
    pub fn new(api_key: &str, proxy: Option<&str>) -> AppResult<Self> {
        let proxy = proxy.map(TaskProxy::from_url).transpose()?;
        Ok(Self::with_backend(
            HttpSolverBackend::new(api_key),
            proxy,
            SolverOptions::default(),
        ))
    }
}

impl<B: SolverBackend> CapSolverClient<B> {
    pub fn with_backend(backend: B, proxy: Option<TaskProxy>, options: SolverOptions) -> Self {
        Self {
            backend,
            proxy,
            options,
        }
    }

    /// 无代理时使用更便宜的 ProxyLess 任务
    fn build_task(&self, kind: ChallengeKind, target_url: &str, site_key: &str) -> CapSolverTask {
        let website_url = target_url.to_string();
        let website_key = site_key.to_string();
        match (kind, self.proxy.clone()) {
            (ChallengeKind::Turnstile, None) => CapSolverTask::AntiTurnstileTaskProxyLess {
                website_url,
                website_key,
            },
            (ChallengeKind::Turnstile, Some(proxy)) => CapSolverTask::AntiTurnstileTask {
                website_url,
                website_key,
                proxy,
            },
            (ChallengeKind::RecaptchaV2, None) => CapSolverTask::ReCaptchaV2TaskProxyLess {
                website_url,
                website_key,
            },
            (ChallengeKind::RecaptchaV2, Some(proxy)) => CapSolverTask::ReCaptchaV2Task {
                website_url,
                website_key,
                proxy,
            },
        }
    }

    /// 一次完整的 "创建 + 轮询"
    async fn attempt(&self, task: &CapSolverTask) -> Result<String, SolverError> {
        let ceiling = self.options.attempt_timeout;
        match tokio::time::timeout(ceiling, self.create_and_wait(task)).await {
            Ok(result) => result,
            Err(_) => Err(SolverError::Timeout { after: ceiling }),
        }
    }

    async fn create_and_wait(&self, task: &CapSolverTask) -> Result<String, SolverError> {
        let created = self.backend.create_task(task).await?;
        if created.error_id != 0 {
            return Err(SolverError::Remote {
                code: created.error_code,
                description: created.error_description,
            });
        }
        if created.task_id.is_empty() {
            return Err(SolverError::MissingTaskId);
        }
        info!("[CapSolver] 任务已创建: {}", created.task_id);
        self.wait_for_result(&created.task_id).await
    }

    async fn wait_for_result(&self, task_id: &str) -> Result<String, SolverError> {
        loop {
            tokio::time::sleep(self.options.poll_interval).await;

            let result = match self.backend.get_task_result(task_id).await {
                Ok(result) => result,
                Err(e) => {
                    // 单次轮询失败不终止，等待下一轮
                    debug!("[CapSolver] 轮询任务 {} 失败: {}", task_id, e);
                    continue;
                }
            };

            if result.error_id != 0 {
                return Err(SolverError::Remote {
                    code: result.error_code,
                    description: result.error_description,
                });
            }

            match result.status.as_str() {
                "ready" => {
                    let token = result.solution.map(|s| s.token).unwrap_or_default();
                    if token.is_empty() {
                        return Err(SolverError::EmptySolution {
                            task_id: task_id.to_string(),
                        });
                    }
                    return Ok(token);
                }
                "failed" => {
                    return Err(SolverError::Remote {
                        code: "failed".to_string(),
                        description: result.error_description,
                    })
                }
                status => debug!("[CapSolver] 任务 {} 状态: {}", task_id, status),
            }
        }
    }
}

#[async_trait]
impl<B: SolverBackend> ChallengeSolver for CapSolverClient<B> {
    async fn solve(
        &self,
        kind: ChallengeKind,
        target_url: &str,
        site_key: &str,
    ) -> AppResult<String> {
        let task = self.build_task(kind, target_url, site_key);
        let attempts = self.options.attempts.max(1);
        let mut last_error = SolverError::MissingTaskId;

        for attempt in 1..=attempts {
            if attempt > 1 {
                info!("[CapSolver] 重试 {} 求解 ({}/{})", kind.name(), attempt, attempts);
                tokio::time::sleep(self.options.backoff).await;
            }

            match self.attempt(&task).await {
                Ok(token) => {
                    info!("[CapSolver] 获得 {} token (长度 {})", kind.name(), token.len());
                    return Ok(token);
                }
                Err(e) => {
                    warn!("[CapSolver] 第 {} 次求解失败: {}", attempt, e);
                    last_error = e;
                }
            }
        }

        Err(AuthError::ChallengeSolveFailed {
            attempts,
            source: last_error,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::clients::capsolver_api::{CreateTaskResponse, TaskResultResponse, TaskSolution};
    use crate::error::AppError;

    struct FakeBackend {
        create_error: Option<(&'static str, &'static str)>,
        status: &'static str,
        token: &'static str,
        creates: AtomicU32,
    }

    impl FakeBackend {
        fn returning(status: &'static str, token: &'static str) -> Self {
            Self {
                create_error: None,
                status,
                token,
                creates: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SolverBackend for FakeBackend {
        async fn create_task(
            &self,
            _task: &CapSolverTask,
        ) -> Result<CreateTaskResponse, SolverError> {
            let n = self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(match self.create_error {
                Some((code, description)) => CreateTaskResponse {
                    error_id: 1,
                    error_code: code.to_string(),
                    error_description: description.to_string(),
                    ..Default::default()
                },
                None => CreateTaskResponse {
                    task_id: format!("task-{}", n),
                    ..Default::default()
                },
            })
        }

        async fn get_task_result(&self, _task_id: &str) -> Result<TaskResultResponse, SolverError> {
            Ok(TaskResultResponse {
                status: self.status.to_string(),
                solution: Some(TaskSolution {
                    token: self.token.to_string(),
                }),
                ..Default::default()
            })
        }
    }

    fn client(backend: FakeBackend) -> CapSolverClient<FakeBackend> {
        CapSolverClient::with_backend(backend, None, SolverOptions::default())
    }

    fn solve_failure(err: AppError) -> (u32, SolverError) {
        match err {
            AppError::Auth(AuthError::ChallengeSolveFailed { attempts, source }) => (attempts, source),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ready_token_is_returned() {
        let solver = client(FakeBackend::returning("ready", "tok-abc"));
        let token = solver
            .solve(ChallengeKind::Turnstile, "https://s.amizone.net", "0x4AAA")
            .await
            .unwrap();
        assert_eq!(token, "tok-abc");
        assert_eq!(solver.backend.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn task_processing_past_ceiling_times_out() {
        let solver = client(FakeBackend::returning("processing", ""));
        let started = tokio::time::Instant::now();
        let err = solver
            .solve(ChallengeKind::Turnstile, "https://s.amizone.net", "0x4AAA")
            .await
            .unwrap_err();

        let (attempts, source) = solve_failure(err);
        assert_eq!(attempts, 3);
        assert!(matches!(source, SolverError::Timeout { after } if after == Duration::from_secs(120)));
        assert_eq!(solver.backend.creates.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(3 * 120));
    }

    #[tokio::test(start_paused = true)]
    async fn ready_without_token_fails_the_solve() {
        let solver = client(FakeBackend::returning("ready", ""));
        let err = solver
            .solve(ChallengeKind::RecaptchaV2, "https://s.amizone.net", "6Lc")
            .await
            .unwrap_err();

        let (_, source) = solve_failure(err);
        assert!(matches!(source, SolverError::EmptySolution { .. }));
        assert_eq!(solver.backend.creates.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_counts_toward_budget() {
        let mut backend = FakeBackend::returning("ready", "unused");
        backend.create_error = Some(("ERROR_KEY_DENIED_ACCESS", "bad key"));
        let solver = client(backend);
        let err = solver
            .solve(ChallengeKind::Turnstile, "https://s.amizone.net", "0x4AAA")
            .await
            .unwrap_err();

        let (_, source) = solve_failure(err);
        assert!(matches!(source, SolverError::Remote { ref code, .. } if code == "ERROR_KEY_DENIED_ACCESS"));
        assert_eq!(solver.backend.creates.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn proxy_selects_proxied_task_types() {
        let proxy = TaskProxy::from_url("http://10.0.0.1:3128").unwrap();
        let solver = CapSolverClient::with_backend(
            FakeBackend::returning("ready", "t"),
            Some(proxy),
            SolverOptions::default(),
        );
        assert!(matches!(
            solver.build_task(ChallengeKind::Turnstile, "u", "k"),
            CapSolverTask::AntiTurnstileTask { .. }
        ));
        assert!(matches!(
            client(FakeBackend::returning("ready", "t")).build_task(ChallengeKind::RecaptchaV2, "u", "k"),
            CapSolverTask::ReCaptchaV2TaskProxyLess { .. }
        ));
    }
}
