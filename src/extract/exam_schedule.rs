//! 考试安排解析

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::common::{
    active_breadcrumb, clean_string, data_cell_text, has_data_cell, parse_logged_in,
    rows_with_cell, selector,
};
use crate::error::{AppError, AppResult};
use crate::models::{CourseRef, ExamSchedule, ScheduledExam};

const PAGE: &str = "exam schedule";
const EXAM_SCHEDULE_BREADCRUMB: &str = "Examination Schedule";

const DT_CODE: &str = "Course Code";
const DT_TITLE: &str = "Course Title";
const DT_DATE: &str = "Exam Date";
const DT_TIME: &str = "Time";
const DT_PAPER_TYPE: &str = "Paper Type";
const DT_LOCATION: &str = "Location";

const EXAM_DATE_FORMAT: &str = "%d/%m/%Y";
/// 先试 12 小时制，再试 24 小时制
const EXAM_TIME_FORMATS: &[&str] = &["%I:%M %p", "%H:%M"];

/// 解析考试安排页
///
/// 日期表尚未发布时页面只有标题没有行，返回空的考试列表
pub fn exam_schedule(body: &str) -> AppResult<ExamSchedule> {
    let dom = parse_logged_in(body, PAGE)?;

    let breadcrumb = active_breadcrumb(&dom);
    if breadcrumb != EXAM_SCHEDULE_BREADCRUMB && !has_data_cell(&dom, DT_DATE) {
        warn!("考试安排页不可识别 (面包屑: {:?})", breadcrumb);
        return Err(AppError::unrecognized_page(PAGE));
    }

    let exams: Vec<ScheduledExam> = rows_with_cell(&dom, DT_CODE)
        .into_iter()
        .map(exam_from_row)
        .collect();
    debug!("解析到 {} 场考试", exams.len());

    Ok(ExamSchedule {
        title: schedule_title(&dom, breadcrumb),
        exams,
    })
}

fn schedule_title(dom: &Html, breadcrumb: String) -> String {
    let heading = dom
        .select(&selector("h3, h4"))
        .map(|h| clean_string(&h.text().collect::<String>()))
        .find(|text| !text.is_empty());
    heading.unwrap_or(breadcrumb)
}

fn exam_from_row(row: ElementRef<'_>) -> ScheduledExam {
    ScheduledExam {
        course: CourseRef {
            code: data_cell_text(row, DT_CODE),
            name: data_cell_text(row, DT_TITLE),
        },
        time: exam_time(&data_cell_text(row, DT_DATE), &data_cell_text(row, DT_TIME)),
        mode: data_cell_text(row, DT_PAPER_TYPE),
        location: data_cell_text(row, DT_LOCATION),
    }
}

/// 日期与时间分属两个单元格；时间缺失或无法识别时整体为 None
fn exam_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date, EXAM_DATE_FORMAT).ok()?;
    // "10:00 AM - 12:00 PM" 之类只取开始时间
    let start = time.split('-').next().unwrap_or_default().trim();
    let time = EXAM_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(start, format).ok())?;
    Some(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<ul class="breadcrumb"><li class="active">Examination Schedule</li></ul>
            <h3>END SEMESTER EXAMINATION</h3>
            <table>{}</table>"#,
            rows
        )
    }

    const ROW: &str = r#"<tr>
        <td data-title="Course Code">CSE101</td>
        <td data-title="Course Title">Programming in C</td>
        <td data-title="Exam Date">12/05/2024</td>
        <td data-title="Time">09:30</td>
        <td data-title="Paper Type">Offline</td>
        <td data-title="Location">Block E-201</td>
    </tr>"#;

    #[test]
    fn parses_rows() {
        let schedule = exam_schedule(&page(ROW)).unwrap();
        assert_eq!(schedule.title, "END SEMESTER EXAMINATION");
        assert_eq!(schedule.exams.len(), 1);
        let exam = &schedule.exams[0];
        assert_eq!(exam.course.code, "CSE101");
        assert_eq!(exam.mode, "Offline");
        assert_eq!(exam.location, "Block E-201");
        assert_eq!(
            exam.time,
            NaiveDate::from_ymd_opt(2024, 5, 12).and_then(|d| d.and_hms_opt(9, 30, 0))
        );
    }

    #[test]
    fn afternoon_range_uses_the_start_time() {
        let row = ROW.replace("09:30", "02:00 PM - 05:00 PM");
        let schedule = exam_schedule(&page(&row)).unwrap();
        assert_eq!(
            schedule.exams[0].time,
            NaiveDate::from_ymd_opt(2024, 5, 12).and_then(|d| d.and_hms_opt(14, 0, 0))
        );
        assert_eq!(
            exam_time("12/05/2024", "10:00 AM - 12:00 PM"),
            NaiveDate::from_ymd_opt(2024, 5, 12).and_then(|d| d.and_hms_opt(10, 0, 0))
        );
        assert_eq!(
            exam_time("12/05/2024", "14:30-17:30"),
            NaiveDate::from_ymd_opt(2024, 5, 12).and_then(|d| d.and_hms_opt(14, 30, 0))
        );
    }

    #[test]
    fn unparseable_time_keeps_the_row() {
        let row = ROW.replace("09:30", "TBA");
        let schedule = exam_schedule(&page(&row)).unwrap();
        assert_eq!(schedule.exams[0].time, None);
        assert_eq!(schedule.exams[0].course.name, "Programming in C");
    }

    #[test]
    fn unpublished_schedule_is_empty() {
        let schedule = exam_schedule(&page("")).unwrap();
        assert!(schedule.exams.is_empty());
    }

    #[test]
    fn table_without_breadcrumb_is_recognized() {
        let body = format!("<table>{}</table>", ROW);
        assert_eq!(exam_schedule(&body).unwrap().exams.len(), 1);
    }

    #[test]
    fn other_pages_are_rejected() {
        let body = r#"<ul class="breadcrumb"><li class="active">My Courses</li></ul>"#;
        assert!(exam_schedule(body).is_err());
    }
}
