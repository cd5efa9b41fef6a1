//! 学生信息解析
//!
//! 学生证页面为主布局；部分部署只返回首页，此时从首页的用户信息块读取；
//! 学生证功能被关闭时页面显示 "Not Applicable"，返回空档案

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::Html;
use tracing::{info, warn};

use super::common::{active_breadcrumb, clean_string, parse_logged_in, selector, text_lines};
use crate::error::{AppError, AppResult};
use crate::models::Profile;

const PAGE: &str = "profile";
const ID_CARD_BREADCRUMB: &str = "ID Card View";
const NOT_APPLICABLE: &str = "Not Applicable";

const SELECTOR_CARD_FRONT: &str = "#lblNameIDCardFront1";
const SELECTOR_CARD_BACK: &str = "#lblInfoIDCardBack1";
const SELECTOR_HEADSHOT: &str = "img#ImgPhotoIDCardFront1";
const SELECTOR_DASHBOARD_PROFILE: &str = ".user-info";
const SELECTOR_DASHBOARD_PHOTO: &str = ".user-info img, img.user-photo";

const CARD_DATE_FORMAT: &str = "%d.%m.%Y";

static STUDENT_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\w{8}-\w{4}-\w{4}-\w{4}-\w{12}").expect("静态正则")
});

/// 解析学生证 / 首页中的学生信息
pub fn profile(body: &str) -> AppResult<Profile> {
    let dom = parse_logged_in(body, PAGE)?;

    if is_id_card_page(&dom) {
        return Ok(parse_id_card(&dom));
    }

    if is_not_applicable(&dom) {
        info!("学生证功能未开放 (Not Applicable)，返回空档案");
        return Ok(Profile::default());
    }

    if dom
        .select(&selector(SELECTOR_DASHBOARD_PROFILE))
        .next()
        .is_some()
    {
        return Ok(parse_dashboard(&dom));
    }

    warn!("学生证页面不可识别 (面包屑: {:?})", active_breadcrumb(&dom));
    Err(AppError::unrecognized_page(PAGE))
}

fn is_id_card_page(dom: &Html) -> bool {
    active_breadcrumb(dom) == ID_CARD_BREADCRUMB
}

fn is_not_applicable(dom: &Html) -> bool {
    clean_string(&dom.root_element().text().collect::<String>()).contains(NOT_APPLICABLE)
}

fn parse_id_card(dom: &Html) -> Profile {
    let mut profile = Profile::default();

    // 正面三行：姓名 / 专业 / 年级
    if let Some(front) = dom.select(&selector(SELECTOR_CARD_FRONT)).next() {
        match text_lines(front).as_slice() {
            [name, program, batch] => {
                profile.name = name.clone();
                profile.program = program.clone();
                profile.batch = batch.clone();
            }
            other => warn!("学生证正面行数异常: {}", other.len()),
        }
    }

    profile.uuid = dom
        .select(&selector(SELECTOR_HEADSHOT))
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| STUDENT_UUID.find(src))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    // 背面：每行 "标签 : 值"
    if let Some(back) = dom.select(&selector(SELECTOR_CARD_BACK)).next() {
        for line in text_lines(back) {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            match label.trim() {
                "Enrollment No" => profile.enrollment_number = value,
                "Date Of Birth" => profile.date_of_birth = parse_card_date(&value),
                "Blood Group" => profile.blood_group = value,
                "Validity" => profile.enrollment_validity = parse_card_date(&value),
                "ID Card No" => profile.id_card_number = value,
                _ => {}
            }
        }
    }

    profile
}

fn parse_card_date(value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, CARD_DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            warn!("学生证日期无法解析 {:?}: {}", value, e);
            None
        }
    }
}

/// 首页用户块形如 `Mr JOHN DOE <small>A2305222014</small>`
fn parse_dashboard(dom: &Html) -> Profile {
    let mut profile = Profile::default();

    if let Some(info) = dom.select(&selector(SELECTOR_DASHBOARD_PROFILE)).next() {
        let small = info
            .select(&selector("small"))
            .next()
            .map(|s| clean_string(&s.text().collect::<String>()))
            .unwrap_or_default();
        let full = clean_string(&info.text().collect::<String>());
        profile.name = clean_string(full.strip_suffix(small.as_str()).unwrap_or(&full));
        profile.enrollment_number = small;
    }

    profile.uuid = dom
        .select(&selector(SELECTOR_DASHBOARD_PHOTO))
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| STUDENT_UUID.find(src))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    profile
}
