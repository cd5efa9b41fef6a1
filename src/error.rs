use std::time::Duration;

/// 应用程序错误类型
///
/// 分层结构：登录 / 验证码 / 页面解析 / 网络 / 配置 / 参数 / 门户操作
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 登录流程错误
    #[error("登录错误: {0}")]
    Auth(#[from] AuthError),
    /// 验证码服务错误（单次求解尝试内部）
    #[error("验证码服务错误: {0}")]
    Solver(#[from] SolverError),
    /// 页面解析错误
    #[error("页面解析错误: {0}")]
    Extract(#[from] ExtractError),
    /// 网络 / 传输层错误
    #[error("网络错误: {0}")]
    Transport(#[from] TransportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 调用参数错误
    #[error("参数错误: {0}")]
    Validation(#[from] ValidationError),
    /// 门户操作未生效
    #[error("操作失败: {0}")]
    Operation(#[from] OperationError),
}

/// 登录流程错误
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// 用户名或密码错误（终态，不重试）
    #[error("用户名或密码错误")]
    InvalidCredentials,
    /// 距离上次失败的登录尝试太近
    #[error("登录过于频繁，请 {}s 后重试", .retry_after.as_secs())]
    Throttled { retry_after: Duration },
    /// 登录页缺少必要的表单字段
    #[error("登录页结构异常: 缺少 {missing}")]
    MalformedLoginPage { missing: &'static str },
    /// 跳转成功但登录信号不一致，门户登录协议可能已变更
    #[error("登录协议异常: {detail}")]
    ProtocolDrift { detail: &'static str },
    /// 验证码求解用尽重试次数
    #[error("验证码求解失败 (共尝试 {attempts} 次): {source}")]
    ChallengeSolveFailed {
        attempts: u32,
        #[source]
        source: SolverError,
    },
    /// 浏览器登录兜底服务未能建立会话
    #[error("浏览器登录兜底失败: {message}")]
    FallbackFailed { message: String },
}

/// 验证码服务错误
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// 请求验证码服务失败
    #[error("请求验证码服务失败 ({endpoint}): {message}")]
    Network { endpoint: String, message: String },
    /// 响应无法解析
    #[error("验证码服务响应无法解析: {0}")]
    Decode(String),
    /// 服务返回错误码
    #[error("验证码服务返回错误 {code}: {description}")]
    Remote { code: String, description: String },
    /// 创建任务后未返回任务ID
    #[error("验证码服务未返回任务ID")]
    MissingTaskId,
    /// 任务已就绪但没有可用 token
    #[error("任务 {task_id} 已就绪但 token 为空")]
    EmptySolution { task_id: String },
    /// 等待结果超时
    #[error("等待验证码结果超时 ({}s)", .after.as_secs())]
    Timeout { after: Duration },
}

/// 页面解析错误
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// 页面是登录页，会话已失效
    #[error("{page}: 页面显示未登录")]
    NotLoggedIn { page: &'static str },
    /// 主要与备用地标都不存在
    #[error("{page}: 无法识别的页面")]
    UnrecognizedPage { page: &'static str },
    /// 页面可识别，但一条记录都没有
    #[error("{page}: 页面中没有任何记录")]
    EmptyDocument { page: &'static str },
}

/// 网络 / 传输层错误
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 请求失败
    #[error("请求 {endpoint} 失败: {message}")]
    Request { endpoint: String, message: String },
    /// 非 200 状态码
    #[error("请求 {endpoint} 返回状态码 {status}，门户可能已宕机")]
    UnexpectedStatus { endpoint: String, status: u16 },
    /// 构建 HTTP 客户端失败
    #[error("构建 HTTP 客户端失败: {0}")]
    Build(String),
    /// 写入 cookie 失败
    #[error("写入 cookie 失败: {0}")]
    Cookie(String),
}

/// 配置错误
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 调用参数错误
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// MAC 地址不合法
    #[error("MAC 地址不合法: {value}")]
    InvalidMac { value: String },
    /// 评分超出范围
    #[error("{field} 必须在 {min}..={max} 之间，实际为 {value}")]
    RatingOutOfRange {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },
    /// 评语为空
    #[error("评语不能为空")]
    EmptyComment,
}

/// 门户操作未生效
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// 没有空余的 MAC 槽位
    #[error("没有空余的 wifi MAC 槽位")]
    NoFreeMacSlots,
    /// 提交后 MAC 未出现在已注册列表中
    #[error("MAC {mac} 注册未生效")]
    MacNotRegistered { mac: String },
    /// 删除后 MAC 仍在已注册列表中
    #[error("MAC {mac} 删除未生效")]
    MacNotRemoved { mac: String },
}

/// 调用方应对策略
///
/// 凭据错误要快速失败，门户异常要告警，其余稍后重试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 凭据错误，直接返回给用户
    InvalidCredentials,
    /// 暂时性失败，稍后重试
    RetryLater,
    /// 门户页面或协议变更，需要告警
    PortalChanged,
    /// 调用参数有误
    InvalidInput,
    /// 内部错误（配置等）
    Internal,
}

impl AppError {
    /// 错误分类
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Auth(AuthError::InvalidCredentials) => ErrorCategory::InvalidCredentials,
            AppError::Auth(AuthError::Throttled { .. })
            | AppError::Auth(AuthError::ChallengeSolveFailed { .. })
            | AppError::Auth(AuthError::FallbackFailed { .. }) => ErrorCategory::RetryLater,
            AppError::Auth(AuthError::MalformedLoginPage { .. })
            | AppError::Auth(AuthError::ProtocolDrift { .. }) => ErrorCategory::PortalChanged,
            AppError::Solver(_) | AppError::Transport(_) => ErrorCategory::RetryLater,
            AppError::Extract(ExtractError::NotLoggedIn { .. }) => ErrorCategory::RetryLater,
            AppError::Extract(_) => ErrorCategory::PortalChanged,
            AppError::Validation(_) | AppError::Operation(OperationError::NoFreeMacSlots) => {
                ErrorCategory::InvalidInput
            }
            AppError::Operation(_) => ErrorCategory::PortalChanged,
            AppError::Config(_) => ErrorCategory::Internal,
        }
    }

    /// 是否为网络层失败（调用方可重新登录并重放一次）
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }

    /// 是否为凭据错误
    pub fn is_invalid_credentials(&self) -> bool {
        matches!(self, AppError::Auth(AuthError::InvalidCredentials))
    }

    // ========== 便捷构造函数 ==========

    /// 创建请求失败错误
    pub fn request_failed(endpoint: impl Into<String>, message: impl ToString) -> Self {
        AppError::Transport(TransportError::Request {
            endpoint: endpoint.into(),
            message: message.to_string(),
        })
    }

    /// 创建页面未登录错误
    pub fn not_logged_in(page: &'static str) -> Self {
        AppError::Extract(ExtractError::NotLoggedIn { page })
    }

    /// 创建无法识别页面错误
    pub fn unrecognized_page(page: &'static str) -> Self {
        AppError::Extract(ExtractError::UnrecognizedPage { page })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
