//! 解析公共工具
//!
//! 登录信号、面包屑地标、表格单元格定位与文本规范化

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{AppError, AppResult};

/// 编译静态选择器；选择器字面量写错属于编程错误
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("静态选择器 `{}` 不合法: {:?}", css, e))
}

/// 只有登录页才有的表单
const SELECTOR_LOGIN_FORM: &str = "#loginform";
/// 当前页面的面包屑
const SELECTOR_ACTIVE_BREADCRUMB: &str = ".breadcrumb .active";

/// 页面是否处于登录状态（不存在登录表单）
pub fn is_logged_in(body: &str) -> bool {
    is_logged_in_dom(&Html::parse_document(body))
}

pub(crate) fn is_logged_in_dom(dom: &Html) -> bool {
    dom.select(&selector(SELECTOR_LOGIN_FORM)).next().is_none()
}

/// 解析文档并确认已登录
pub(crate) fn parse_logged_in(body: &str, page: &'static str) -> AppResult<Html> {
    let dom = Html::parse_document(body);
    if !is_logged_in_dom(&dom) {
        return Err(AppError::not_logged_in(page));
    }
    Ok(dom)
}

/// 当前面包屑文本
pub(crate) fn active_breadcrumb(dom: &Html) -> String {
    dom.select(&selector(SELECTOR_ACTIVE_BREADCRUMB))
        .next()
        .map(|el| clean_string(&el.text().collect::<String>()))
        .unwrap_or_default()
}

/// 规范化文本：去掉不换行空格和零宽字符，合并空白
pub fn clean_string(raw: &str) -> String {
    raw.replace(['\u{a0}', '\u{200b}', '\u{feff}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 元素文本，`<br>` 视为换行，每行单独规范化，空行丢弃
pub(crate) fn text_lines(el: ElementRef<'_>) -> Vec<String> {
    let mut raw = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(&text.text),
            Node::Element(e) if e.name() == "br" => raw.push('\n'),
            _ => {}
        }
    }
    raw.lines()
        .map(clean_string)
        .filter(|line| !line.is_empty())
        .collect()
}

/// 行内 `data-title` 等于 `title` 的单元格
pub(crate) fn data_cell<'a>(row: ElementRef<'a>, title: &str) -> Option<ElementRef<'a>> {
    row.select(&selector("td")).find(|td| {
        td.value()
            .attr("data-title")
            .map(|t| t.trim() == title)
            .unwrap_or(false)
    })
}

/// 单元格规范化文本，单元格不存在时为空串
pub(crate) fn data_cell_text(row: ElementRef<'_>, title: &str) -> String {
    data_cell(row, title)
        .map(|td| clean_string(&td.text().collect::<String>()))
        .unwrap_or_default()
}

/// 文档中是否存在 `data-title` 为 `title` 的单元格
pub(crate) fn has_data_cell(dom: &Html, title: &str) -> bool {
    dom.select(&selector("td[data-title]")).any(|td| {
        td.value()
            .attr("data-title")
            .map(|t| t.trim() == title)
            .unwrap_or(false)
    })
}

/// 含有指定单元格的所有表格行
pub(crate) fn rows_with_cell<'a>(dom: &'a Html, title: &str) -> Vec<ElementRef<'a>> {
    dom.select(&selector("tr"))
        .filter(|row| data_cell(*row, title).is_some())
        .collect()
}

/// 表单中指定 name 的 input 值
pub(crate) fn input_value(scope: ElementRef<'_>, name: &str) -> String {
    scope
        .select(&selector("input[name]"))
        .find(|input| input.value().attr("name") == Some(name))
        .and_then(|input| input.value().attr("value"))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// "NA" / "N/A" / "-" / 空串 等占位值
pub(crate) fn is_na_value(s: &str) -> bool {
    let normal: String = s
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| *c != '.' && *c != ' ')
        .collect();
    matches!(normal.as_str(), "" | "NA" | "N/A" | "-" | "--")
}

/// "Not Published" / "View" 之类的非数值文本
pub(crate) fn is_non_numeric_value(s: &str) -> bool {
    let upper = s.to_uppercase();
    ["NOT PUBLISHED", "NOT AVAILABLE", "NOT APPLICABLE", "VIEW"]
        .iter()
        .any(|marker| upper.contains(marker))
}
