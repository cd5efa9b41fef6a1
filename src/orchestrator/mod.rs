//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 管理账号会话的生命周期，是调用方的唯一入口。
//!
//! ## 模块划分
//!
//! ### `session_cache` - 会话缓存
//! - 凭据 → 会话的并发注册表（读写锁 + 每条目 OnceCell）
//! - TTL 过期与后台清理
//!
//! ### `portal_session` - 单个账号的会话
//! - 统一请求入口（懒登录、请求头、失效重登）
//! - 出勤、课程、学生信息、考试、课表、wifi、评价等门户操作
//!
//! ### `feedback_pool` - 评价批量提交
//! - Semaphore 限制并发，显式等待全部完成并汇总失败项
//!
//! ## 层次关系
//!
//! ```text
//! session_cache (处理多个账号)
//!     ↓
//! portal_session (处理单个账号的请求)
//!     ↓
//! workflow::LoginFlow (登录状态机)
//!     ↓
//! clients (验证码求解 / 浏览器登录)  extract (页面解析)
//!     ↓
//! infrastructure (传输：cookie jar 独占)
//! ```

pub mod feedback_pool;
pub mod portal_session;
pub mod session_cache;

// 重新导出主要类型
pub use portal_session::PortalSession;
pub use session_cache::{SessionCache, SessionCacheOptions};
