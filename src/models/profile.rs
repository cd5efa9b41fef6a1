use chrono::NaiveDate;
use serde::Serialize;

/// 学生信息（来自学生证页面或首页）
///
/// 学生证功能在部分部署中关闭，此时所有字段为空
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Profile {
    pub name: String,
    pub program: String,
    pub batch: String,
    pub enrollment_number: String,
    /// 照片地址中携带的学生 UUID
    pub uuid: String,
    pub date_of_birth: Option<NaiveDate>,
    pub blood_group: String,
    pub id_card_number: String,
    pub enrollment_validity: Option<NaiveDate>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        *self == Profile::default()
    }
}
