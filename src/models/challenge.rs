use serde::Serialize;

/// 登录页上的人机验证类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChallengeKind {
    /// Cloudflare Turnstile
    Turnstile,
    /// reCAPTCHA v2
    RecaptchaV2,
}

impl ChallengeKind {
    pub fn name(self) -> &'static str {
        match self {
            ChallengeKind::Turnstile => "turnstile",
            ChallengeKind::RecaptchaV2 => "recaptcha-v2",
        }
    }
}

/// 登录页检测到的验证及其 site key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeSiteKey {
    pub kind: ChallengeKind,
    pub site_key: String,
}
