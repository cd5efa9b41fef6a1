//! 课表解析
//!
//! 日历接口返回 JSON 数组而不是 HTML；会话失效时返回的是登录页

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, warn};

use super::common::{clean_string, is_logged_in};
use crate::error::{AppError, AppResult};
use crate::models::{AttendanceState, CourseRef, ScheduledClass};

const PAGE: &str = "class schedule";

/// 门户尝试过的几种时间格式
const EVENT_TIME_FORMATS: &[&str] = &["%Y/%m/%d %I:%M:%S %p", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

const COLOR_PRESENT: &str = "#4FCC4F";
const COLOR_ABSENT: &str = "#f00";
const COLOR_PENDING: &str = "#3a87ad";

/// 日历接口中的单个事件
#[derive(Debug, Deserialize)]
struct DiaryEvent {
    #[serde(rename = "sType", default)]
    kind: String,
    #[serde(rename = "CourseCode", default)]
    course_code: String,
    #[serde(rename = "CourseName", default)]
    course_name: String,
    #[serde(rename = "FacultyName", default)]
    faculty: String,
    #[serde(rename = "RoomNo", default)]
    room: String,
    #[serde(default)]
    start: String,
    #[serde(default)]
    end: String,
    #[serde(rename = "AttndColor", default)]
    attendance_color: String,
}

/// 解析日历事件，只保留 `date` 当天开始的课程
pub fn class_schedule(body: &str, date: NaiveDate) -> AppResult<Vec<ScheduledClass>> {
    let events: Vec<DiaryEvent> = match serde_json::from_str(body) {
        Ok(events) => events,
        Err(e) => {
            if !is_logged_in(body) {
                return Err(AppError::not_logged_in(PAGE));
            }
            warn!("课表 JSON 解析失败: {}", e);
            return Err(AppError::unrecognized_page(PAGE));
        }
    };

    let classes: Vec<ScheduledClass> = events
        .into_iter()
        // 节假日等非课程事件
        .filter(|event| event.kind.is_empty() || event.kind.eq_ignore_ascii_case("C"))
        .filter_map(class_from_event)
        .filter(|class| class.starts_on(date))
        .collect();
    debug!("{} 当天共 {} 节课", date, classes.len());
    Ok(classes)
}

fn class_from_event(event: DiaryEvent) -> Option<ScheduledClass> {
    let (Some(start), Some(end)) = (parse_event_time(&event.start), parse_event_time(&event.end))
    else {
        warn!(
            "课程 {} 的时间无法解析: {:?} - {:?}",
            event.course_code, event.start, event.end
        );
        return None;
    };

    Some(ScheduledClass {
        course: CourseRef {
            code: clean_string(&event.course_code),
            name: clean_string(&event.course_name),
        },
        start,
        end,
        faculty: clean_faculty(&event.faculty),
        room: clean_string(&event.room),
        attendance: attendance_state(&event.attendance_color),
    })
}

fn parse_event_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    EVENT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// 教师名可能带有 `<br/>` 和工号后缀，形如 `Dr. A B[12345]`
fn clean_faculty(raw: &str) -> String {
    let first = raw.split("<br").next().unwrap_or_default();
    let name = first.split('[').next().unwrap_or_default();
    clean_string(name)
}

fn attendance_state(color: &str) -> AttendanceState {
    let color = color.trim();
    if color.eq_ignore_ascii_case(COLOR_PRESENT) {
        AttendanceState::Present
    } else if color.eq_ignore_ascii_case(COLOR_ABSENT) {
        AttendanceState::Absent
    } else if color.eq_ignore_ascii_case(COLOR_PENDING) {
        AttendanceState::Pending
    } else {
        AttendanceState::NotAvailable
    }
}
