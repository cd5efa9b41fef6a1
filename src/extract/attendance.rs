//! 出勤解析
//!
//! 首页的出勤组件（`#tasks`）为主布局；部分部署直接返回课程表格，作为备用布局

use scraper::{ElementRef, Html};

use super::common::{clean_string, data_cell_text, parse_logged_in, rows_with_cell, selector};
use super::courses::{course_ref_from_row, is_courses_page, DT_ATTENDANCE, DT_CODE};
use super::marks::parse_attendance;
use crate::error::{AppError, AppResult, ExtractError};
use crate::models::{AttendanceRecord, CourseRef};

const PAGE: &str = "attendance";

const SELECTOR_WIDGET: &str = "#tasks";
const SELECTOR_ENTRIES: &str = "#tasks > li";
const SELECTOR_CODE: &str = ".sub-code";
const SELECTOR_NAME: &str = ".lbl";
const SELECTOR_COUNT: &str = ".class-count span";

/// 解析出勤页面
pub fn attendance(body: &str) -> AppResult<Vec<AttendanceRecord>> {
    let dom = parse_logged_in(body, PAGE)?;

    let records = if dom.select(&selector(SELECTOR_WIDGET)).next().is_some() {
        from_widget(&dom)
    } else if is_courses_page(&dom) {
        from_course_table(&dom)
    } else {
        return Err(AppError::unrecognized_page(PAGE));
    };

    if records.is_empty() {
        return Err(ExtractError::EmptyDocument { page: PAGE }.into());
    }
    Ok(records)
}

fn from_widget(dom: &Html) -> Vec<AttendanceRecord> {
    dom.select(&selector(SELECTOR_ENTRIES))
        .map(|entry| AttendanceRecord {
            course: CourseRef {
                code: first_text(entry, SELECTOR_CODE),
                name: first_text(entry, SELECTOR_NAME),
            },
            attendance: parse_attendance(&first_text(entry, SELECTOR_COUNT)),
        })
        .collect()
}

fn from_course_table(dom: &Html) -> Vec<AttendanceRecord> {
    rows_with_cell(dom, DT_CODE)
        .into_iter()
        .map(|row| AttendanceRecord {
            course: course_ref_from_row(row),
            attendance: parse_attendance(&data_cell_text(row, DT_ATTENDANCE)),
        })
        .collect()
}

fn first_text(scope: ElementRef<'_>, css: &'static str) -> String {
    scope
        .select(&selector(css))
        .next()
        .map(|el| clean_string(&el.text().collect::<String>()))
        .unwrap_or_default()
}
