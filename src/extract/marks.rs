//! 数值字段的多格式解析
//!
//! 按优先级依次尝试已知格式，先匹配者胜出；占位文本得到零值

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::common::{clean_string, is_na_value, is_non_numeric_value};
use crate::models::{Attendance, Marks};

static MARKS_WITH_BREAKDOWN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*\[[\d.+\s]+\]\s*/\s*(\d+(?:\.\d+)?)").expect("静态正则")
});
static MARKS_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*(?:/|\[)\s*(\d+(?:\.\d+)?)").expect("静态正则")
});
static SINGLE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("静态正则"));
static ATTENDANCE_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("静态正则"));

/// 解析平时成绩
///
/// 支持的格式（按优先级）：
/// - `20.40[20.40+0.00]/40.00`
/// - `15/20`、`15.5/20 (77.50)`、`15 [20]`
/// - `15`（只有得分）
///
/// `NA`、`Not Published` 等返回零值
pub fn parse_marks(raw: &str) -> Marks {
    let clean = clean_string(raw);
    if is_na_value(&clean) || is_non_numeric_value(&clean) {
        return Marks::default();
    }

    for pattern in [&*MARKS_WITH_BREAKDOWN, &*MARKS_PAIR] {
        if let Some(caps) = pattern.captures(&clean) {
            return match (caps[1].parse::<f32>(), caps[2].parse::<f32>()) {
                (Ok(have), Ok(max)) => Marks { have, max },
                _ => {
                    warn!("成绩格式异常: {:?}", raw);
                    Marks::default()
                }
            };
        }
    }

    match SINGLE_NUMBER.find(&clean).map(|m| m.as_str().parse::<f32>()) {
        Some(Ok(have)) => Marks { have, max: 0.0 },
        Some(Err(_)) => {
            warn!("成绩格式异常: {:?}", raw);
            Marks::default()
        }
        None => Marks::default(),
    }
}

/// 解析出勤，格式 `33/43 (76.74)`；占位或无法识别时返回零值
pub fn parse_attendance(raw: &str) -> Attendance {
    let clean = clean_string(raw);
    if is_na_value(&clean) {
        return Attendance::default();
    }

    let Some(caps) = ATTENDANCE_PAIR.captures(&clean) else {
        if !is_non_numeric_value(&clean) {
            warn!("出勤格式无法识别: {:?}", raw);
        }
        return Attendance::default();
    };

    match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
        (Ok(attended), Ok(held)) => Attendance { attended, held },
        _ => {
            warn!("出勤数值溢出: {:?}", raw);
            Attendance::default()
        }
    }
}
