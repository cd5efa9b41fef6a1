//! 页面解析层
//!
//! 每个函数把一个页面转换为一种记录，不做 I/O，不重试：
//! 先确认已登录，再用面包屑 / 备用地标确认页面类型，
//! 字段缺失降级为零值，只有整页结构失败才返回错误

mod attendance;
mod class_schedule;
mod common;
mod courses;
mod exam_schedule;
mod feedback;
mod login_form;
mod marks;
mod profile;
mod wifi;

pub use attendance::attendance;
pub use class_schedule::class_schedule;
pub use common::{clean_string, is_logged_in};
pub use courses::{courses, semesters};
pub use exam_schedule::exam_schedule;
pub use feedback::faculty_feedback;
pub use login_form::{parse_login_form, LoginFormSnapshot, VERIFICATION_TOKEN_FIELD};
pub use marks::{parse_attendance, parse_marks};
pub use profile::profile;
pub use wifi::wifi_mac_info;
