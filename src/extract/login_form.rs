//! 登录表单解析
//!
//! 每次登录尝试解析一次：验证 token、防伪字段以及可能存在的人机验证 site key

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::common::{input_value, selector};
use crate::models::{ChallengeKind, ChallengeSiteKey};
use crate::utils::logging::truncate_text;

pub const VERIFICATION_TOKEN_FIELD: &str = "__RequestVerificationToken";

static TURNSTILE_SITEKEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"sitekey\s*:\s*["']([^"']+)["']"#).expect("静态正则"));

/// 登录表单快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginFormSnapshot {
    pub verification_token: String,
    pub salt: String,
    pub secret_number: String,
    pub signature: String,
    pub challenge: String,
    /// 页面上存在人机验证时的 site key
    pub site_key: Option<ChallengeSiteKey>,
}

impl LoginFormSnapshot {
    /// 所有防伪字段都非空
    pub fn is_valid(&self) -> bool {
        self.missing_field().is_none()
    }

    /// 第一个为空的必要字段
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            (VERIFICATION_TOKEN_FIELD, &self.verification_token),
            ("Salt", &self.salt),
            ("SecretNumber", &self.secret_number),
            ("Signature", &self.signature),
            ("Challenge", &self.challenge),
        ]
        .into_iter()
        .find(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
    }
}

/// 解析登录页
pub fn parse_login_form(body: &str) -> LoginFormSnapshot {
    let dom = Html::parse_document(body);

    let mut snapshot = match dom.select(&selector("form#loginform")).next() {
        Some(form) => LoginFormSnapshot {
            verification_token: input_value(form, VERIFICATION_TOKEN_FIELD),
            salt: input_value(form, "Salt"),
            secret_number: input_value(form, "SecretNumber"),
            signature: input_value(form, "Signature"),
            challenge: input_value(form, "Challenge"),
            site_key: None,
        },
        None => LoginFormSnapshot::default(),
    };

    snapshot.site_key = find_site_key(&dom);

    debug!(
        "登录表单: token={}, salt={}, sig={}, challenge={}, site_key={:?}",
        truncate_text(&snapshot.verification_token, 12),
        !snapshot.salt.is_empty(),
        truncate_text(&snapshot.signature, 6),
        truncate_text(&snapshot.challenge, 6),
        snapshot.site_key
    );

    snapshot
}

/// Turnstile 优先：`turnstile.render({ sitekey: "..." })` 脚本或 `.cf-turnstile[data-sitekey]`，
/// 其次是 `.g-recaptcha[data-sitekey]`
fn find_site_key(dom: &Html) -> Option<ChallengeSiteKey> {
    let turnstile = dom
        .select(&selector(".cf-turnstile[data-sitekey]"))
        .filter_map(|el| el.value().attr("data-sitekey"))
        .map(str::to_string)
        .next()
        .or_else(|| {
            dom.select(&selector("script")).find_map(|script| {
                let text = script.text().collect::<String>();
                TURNSTILE_SITEKEY
                    .captures(&text)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
        });

    if let Some(site_key) = turnstile.filter(|k| !k.is_empty()) {
        return Some(ChallengeSiteKey {
            kind: ChallengeKind::Turnstile,
            site_key,
        });
    }

    dom.select(&selector(".g-recaptcha[data-sitekey]"))
        .filter_map(|el| el.value().attr("data-sitekey"))
        .find(|k| !k.is_empty())
        .map(|site_key| ChallengeSiteKey {
            kind: ChallengeKind::RecaptchaV2,
            site_key: site_key.to_string(),
        })
}
