//! 登录凭据
//!
//! 凭据本身就是会话身份：用户名 + 密码完全相同才视为同一账号

use std::fmt;

use crate::utils::logging::mask_username;

/// 门户账号凭据
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// 创建新的凭据
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// 空凭据：创建未登录的会话时使用
    pub fn empty() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
        }
    }

    /// 用户名和密码都为空
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }

    /// 会话缓存键
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// 日志中使用的脱敏用户名
    pub fn masked(&self) -> String {
        mask_username(&self.username)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.masked())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// 会话缓存键，由凭据确定性地派生；`Debug` 输出不含任何凭据内容
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    username: String,
    password: String,
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", mask_username(&self.username))
    }
}
