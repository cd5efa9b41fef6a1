//! 课程列表解析
//!
//! 页面有两种形态：当前学期页带面包屑，按学期查询的页面没有面包屑，
//! 只能靠表格单元格识别

use scraper::{ElementRef, Html};
use tracing::warn;

use super::common::{
    active_breadcrumb, clean_string, data_cell, data_cell_text, has_data_cell, parse_logged_in,
    rows_with_cell, selector,
};
use super::marks::{parse_attendance, parse_marks};
use crate::error::{AppError, AppResult, ExtractError};
use crate::models::{Course, CourseRef, Semester};

const PAGE: &str = "courses";
const COURSES_BREADCRUMB: &str = "My Courses";

pub(crate) const DT_CODE: &str = "Course Code";
pub(crate) const DT_NAME: &str = "Course Name";
pub(crate) const DT_ATTENDANCE: &str = "Attendance";
const DT_TYPE: &str = "Type";
const DT_SYLLABUS: &str = "Course Syllabus";
const DT_INTERNALS: &str = "Internal Asses.";

/// 解析课程列表页
pub fn courses(body: &str) -> AppResult<Vec<Course>> {
    let dom = parse_logged_in(body, PAGE)?;

    if !is_courses_page(&dom) {
        return Err(AppError::unrecognized_page(PAGE));
    }

    let rows = rows_with_cell(&dom, DT_CODE);
    if rows.is_empty() {
        warn!("课程页中没有任何课程行");
        return Err(ExtractError::EmptyDocument { page: PAGE }.into());
    }

    Ok(rows.into_iter().map(course_from_row).collect())
}

/// 课程页的学期下拉框
pub fn semesters(body: &str) -> AppResult<Vec<Semester>> {
    const PAGE: &str = "semesters";
    let dom = parse_logged_in(body, PAGE)?;

    let options: Vec<Semester> = dom
        .select(&selector("select#CurrentSemester option"))
        .filter_map(|option| {
            let reference = option.value().attr("value")?.trim().to_string();
            if reference.is_empty() {
                return None;
            }
            Some(Semester {
                reference,
                name: clean_string(&option.text().collect::<String>()),
            })
        })
        .collect();

    if options.is_empty() {
        if !is_courses_page(&dom) {
            return Err(AppError::unrecognized_page(PAGE));
        }
        return Err(ExtractError::EmptyDocument { page: PAGE }.into());
    }
    Ok(options)
}

/// 主地标是面包屑，备用地标是课程代码 + 出勤单元格
pub(crate) fn is_courses_page(dom: &Html) -> bool {
    active_breadcrumb(dom) == COURSES_BREADCRUMB
        || (has_data_cell(dom, DT_CODE) && has_data_cell(dom, DT_ATTENDANCE))
}

pub(crate) fn course_ref_from_row(row: ElementRef<'_>) -> CourseRef {
    CourseRef {
        code: data_cell_text(row, DT_CODE),
        name: data_cell_text(row, DT_NAME),
    }
}

fn course_from_row(row: ElementRef<'_>) -> Course {
    Course {
        course: course_ref_from_row(row),
        kind: data_cell_text(row, DT_TYPE),
        attendance: parse_attendance(&data_cell_text(row, DT_ATTENDANCE)),
        internal_marks: parse_marks(&data_cell_text(row, DT_INTERNALS)),
        syllabus_doc: data_cell(row, DT_SYLLABUS)
            .and_then(|td| td.select(&selector("a[href]")).next())
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string(),
    }
}
