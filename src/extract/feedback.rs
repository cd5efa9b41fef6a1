//! 教师评价页解析
//!
//! 每位待评价教师对应一个提交到 `SaveFeedbackRating` 的表单；
//! 评价已提交或未开放时页面中没有这样的表单，但仍保留评价页的面包屑 / 容器

use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use super::common::{active_breadcrumb, clean_string, parse_logged_in, selector};
use crate::error::{AppError, AppResult};
use crate::models::FeedbackSpec;

const PAGE: &str = "faculty feedback";
const SUBMIT_ACTION: &str = "SaveFeedbackRating";
const FEEDBACK_BREADCRUMB: &str = "feedback";
const SELECTOR_PAGE_CONTAINER: &str = "[id*='FacultyFeedback'], .faculty-feedback";

/// 解析所有待提交的评价表单
pub fn faculty_feedback(body: &str) -> AppResult<Vec<FeedbackSpec>> {
    let dom = parse_logged_in(body, PAGE)?;

    let specs: Vec<FeedbackSpec> = dom
        .select(&selector("form[action]"))
        .filter(|form| {
            form.value()
                .attr("action")
                .map(|action| action.contains(SUBMIT_ACTION))
                .unwrap_or(false)
        })
        .map(spec_from_form)
        .collect();

    if specs.is_empty() && !is_feedback_page(&dom) {
        warn!("教师评价页不可识别 (面包屑: {:?})", active_breadcrumb(&dom));
        return Err(AppError::unrecognized_page(PAGE));
    }

    debug!("待评价教师 {} 位", specs.len());
    Ok(specs)
}

/// 没有表单时靠面包屑或页面容器确认仍是评价页
fn is_feedback_page(dom: &Html) -> bool {
    active_breadcrumb(dom)
        .to_ascii_lowercase()
        .contains(FEEDBACK_BREADCRUMB)
        || dom
            .select(&selector(SELECTOR_PAGE_CONTAINER))
            .next()
            .is_some()
}

fn spec_from_form(form: ElementRef<'_>) -> FeedbackSpec {
    let hidden_fields: Vec<(String, String)> = form
        .select(&selector("input[type='hidden'][name]"))
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    let mut rating_fields: Vec<String> = Vec::new();
    let mut query_rating_fields: Vec<String> = Vec::new();
    for radio in form.select(&selector("input[type='radio'][name]")) {
        let Some(name) = radio.value().attr("name") else {
            continue;
        };
        let group = if is_query_group(name) {
            &mut query_rating_fields
        } else {
            &mut rating_fields
        };
        if !group.iter().any(|existing| existing == name) {
            group.push(name.to_string());
        }
    }

    let comment_field = form
        .select(&selector("textarea[name]"))
        .next()
        .and_then(|area| area.value().attr("name"))
        .map(str::to_string);

    FeedbackSpec {
        faculty: faculty_name(form, &hidden_fields),
        hidden_fields,
        rating_fields,
        query_rating_fields,
        comment_field,
    }
}

fn is_query_group(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("query") || lower.starts_with("qrating")
}

fn faculty_name(form: ElementRef<'_>, hidden: &[(String, String)]) -> String {
    form.select(&selector(".faculty-name, h4"))
        .map(|el| clean_string(&el.text().collect::<String>()))
        .find(|name| !name.is_empty())
        .or_else(|| {
            hidden
                .iter()
                .find(|(name, _)| name == "FacultyName")
                .map(|(_, value)| clean_string(value))
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"
        <form action="/FacultyFeeback/FacultyFeedback/SaveFeedbackRating" method="post">
            <h4>Dr. Jane Roe</h4>
            <input type="hidden" name="__RequestVerificationToken" value="tok">
            <input type="hidden" name="FacultyStaffId" value="42">
            <input type="radio" name="FeedbackRating[0].Rating" value="5">
            <input type="radio" name="FeedbackRating[0].Rating" value="4">
            <input type="radio" name="FeedbackRating[1].Rating" value="5">
            <input type="radio" name="FeedbackQuery[0].Rating" value="1">
            <textarea name="FBRating.Comments"></textarea>
        </form>"#;

    #[test]
    fn one_spec_per_form() {
        let body = format!("{FORM}{}", FORM.replace("Jane Roe", "John Poe"));
        let specs = faculty_feedback(&body).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].faculty, "Dr. John Poe");

        let spec = &specs[0];
        assert_eq!(spec.faculty, "Dr. Jane Roe");
        assert_eq!(spec.hidden_fields.len(), 2);
        assert_eq!(
            spec.rating_fields,
            vec!["FeedbackRating[0].Rating", "FeedbackRating[1].Rating"]
        );
        assert_eq!(spec.query_rating_fields, vec!["FeedbackQuery[0].Rating"]);
        assert_eq!(spec.comment_field.as_deref(), Some("FBRating.Comments"));
    }

    #[test]
    fn closed_feedback_has_no_specs() {
        let body = r#"
            <ul class="breadcrumb"><li class="active">Faculty Feedback</li></ul>
            <form action="/Search"><input name="q"></form>
            <p>Feedback already submitted</p>"#;
        assert!(faculty_feedback(body).unwrap().is_empty());

        let container = r#"<div id="divFacultyFeedback"><p>Feedback is not open</p></div>"#;
        assert!(faculty_feedback(container).unwrap().is_empty());
    }

    #[test]
    fn unrelated_page_is_unrecognized() {
        let body = r#"
            <ul class="breadcrumb"><li class="active">Dashboard</li></ul>
            <form action="/Search"><input name="q"></form><p>Welcome</p>"#;
        let err = faculty_feedback(body).unwrap_err();
        assert!(matches!(
            err,
            AppError::Extract(crate::error::ExtractError::UnrecognizedPage { .. })
        ));
    }
}
