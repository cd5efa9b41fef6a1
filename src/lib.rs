//! # Amizone Session
//!
//! 面向学校门户的会话编排与页面解析引擎
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 每个账号独占一个传输实例（及 cookie jar），只暴露发请求的能力
//! - `Transport` - 可替换的传输契约；`HttpTransport` 为 reqwest 实现
//!
//! ### ② 外部能力层（Clients / Extract）
//! - `clients/` - CapSolver 验证码求解、浏览器登录兜底服务
//! - `extract/` - 无状态页面解析：一个页面 → 一种记录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 单个账号的登录状态机：复用 / 节流 / 求解 / 提交 / 分类
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_cache` - 凭据 → 会话的并发缓存，单次创建，TTL 清理
//! - `orchestrator/portal_session` - 统一请求入口与门户操作

pub mod clients;
pub mod config;
pub mod error;
pub mod extract;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ErrorCategory};
pub use models::Credentials;
pub use orchestrator::{PortalSession, SessionCache, SessionCacheOptions};
