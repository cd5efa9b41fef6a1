use serde::Serialize;

/// 单个教师的评价表单
///
/// 隐藏字段原样回传；评分项按单选组名称分为普通评分和答疑评分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSpec {
    pub faculty: String,
    pub hidden_fields: Vec<(String, String)>,
    pub rating_fields: Vec<String>,
    pub query_rating_fields: Vec<String>,
    pub comment_field: Option<String>,
}

impl FeedbackSpec {
    /// 按统一评分生成提交表单
    pub fn payload(&self, rating: i32, query_rating: i32, comment: &str) -> Vec<(String, String)> {
        let mut form = self.hidden_fields.clone();
        form.extend(
            self.rating_fields
                .iter()
                .map(|name| (name.clone(), rating.to_string())),
        );
        form.extend(
            self.query_rating_fields
                .iter()
                .map(|name| (name.clone(), query_rating.to_string())),
        );
        if let Some(name) = &self.comment_field {
            form.push((name.clone(), comment.to_string()));
        }
        form
    }
}

/// 单条评价提交失败
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackFailure {
    pub faculty: String,
    pub reason: String,
}

/// 批量评价提交结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackReport {
    pub submitted: usize,
    pub failures: Vec<FeedbackFailure>,
}

impl FeedbackReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
