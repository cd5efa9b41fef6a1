//! wifi MAC 注册页解析

use tracing::warn;

use super::common::{input_value, parse_logged_in, selector};
use super::login_form::VERIFICATION_TOKEN_FIELD;
use crate::error::{AppError, AppResult};
use crate::models::{MacAddress, WifiMacInfo};

const PAGE: &str = "wifi mac";

/// 解析 MAC 注册页；`Mac1..MacN` 输入框即槽位，非空值为已注册地址
pub fn wifi_mac_info(body: &str) -> AppResult<WifiMacInfo> {
    let dom = parse_logged_in(body, PAGE)?;

    let mut slots = 0;
    let mut registered = Vec::new();
    for input in dom.select(&selector("input[name^='Mac']")) {
        let Some(name) = input.value().attr("name") else {
            continue;
        };
        if !is_slot_name(name) {
            continue;
        }
        slots += 1;

        let value = input.value().attr("value").unwrap_or_default().trim();
        if value.is_empty() {
            continue;
        }
        match value.parse::<MacAddress>() {
            Ok(mac) => registered.push(mac),
            Err(e) => warn!("槽位 {} 中的地址无法解析: {}", name, e),
        }
    }

    if slots == 0 {
        return Err(AppError::unrecognized_page(PAGE));
    }

    let verification_token = input_value(dom.root_element(), VERIFICATION_TOKEN_FIELD);
    if verification_token.is_empty() {
        warn!("MAC 注册页缺少 {}", VERIFICATION_TOKEN_FIELD);
    }

    Ok(WifiMacInfo {
        registered,
        slots,
        verification_token,
    })
}

/// `Mac` 后接数字
fn is_slot_name(name: &str) -> bool {
    name.strip_prefix("Mac")
        .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
