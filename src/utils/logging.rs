/// 日志工具模块
///
/// 提供日志初始化和脱敏输出的辅助函数
use tracing_subscriber::EnvFilter;

/// 登录表单中不允许明文输出的字段
static REDACTED_FIELDS: phf::Set<&'static str> = phf::phf_set! {
    "_Password",
    "RecaptchaToken",
    "cf-turnstile-response",
    "g-recaptcha-response",
    "__RequestVerificationToken",
    "Signature",
    "Challenge",
    "Salt",
    "SecretNumber",
};

/// 初始化全局日志
///
/// 默认级别为 info，可通过 `RUST_LOG` 覆盖；重复调用不会报错
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 用户名脱敏，只保留首尾字符
///
/// # 参数
/// - `username`: 原始用户名
///
/// # 返回
/// 形如 `a***1` 的字符串
pub fn mask_username(username: &str) -> String {
    let chars: Vec<char> = username.chars().collect();
    match chars.len() {
        0 => "<empty>".to_string(),
        1 | 2 => "*".repeat(chars.len()),
        n => format!("{}***{}", chars[0], chars[n - 1]),
    }
}

/// 将表单字段渲染为可输出的字符串，敏感字段替换为 `<redacted>`
pub fn redact_form(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            if REDACTED_FIELDS.contains(key.as_str()) {
                format!("{}=<redacted>", key)
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
