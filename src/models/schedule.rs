use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::course::CourseRef;

/// 考试安排中的一场考试
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledExam {
    pub course: CourseRef,
    /// 考试时间，格式无法识别时为 None
    pub time: Option<NaiveDateTime>,
    pub mode: String,
    pub location: String,
}

/// 考试安排
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamSchedule {
    pub title: String,
    pub exams: Vec<ScheduledExam>,
}

/// 课堂出勤标记（门户用颜色表示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttendanceState {
    Present,
    Absent,
    Pending,
    NotAvailable,
}

/// 课表中的一节课
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledClass {
    pub course: CourseRef,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub faculty: String,
    pub room: String,
    pub attendance: AttendanceState,
}

impl ScheduledClass {
    pub fn starts_on(&self, date: NaiveDate) -> bool {
        self.start.date() == date
    }
}
