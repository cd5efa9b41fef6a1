use serde::Serialize;

/// 课程引用
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CourseRef {
    pub code: String,
    pub name: String,
}

/// 出勤情况，解析失败或未公布时为零值
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Attendance {
    pub attended: u32,
    pub held: u32,
}

impl Attendance {
    /// 出勤率（百分比），未开课时为 None
    pub fn percentage(&self) -> Option<f32> {
        if self.held == 0 {
            None
        } else {
            Some(self.attended as f32 * 100.0 / self.held as f32)
        }
    }
}

/// 平时成绩，未公布时为零值
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Marks {
    pub have: f32,
    pub max: f32,
}

impl Marks {
    /// 是否为零值（未公布 / 不适用）
    pub fn is_zero(&self) -> bool {
        self.have == 0.0 && self.max == 0.0
    }
}

/// 单门课程的出勤记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceRecord {
    pub course: CourseRef,
    pub attendance: Attendance,
}

/// 课程列表中的一行
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub course: CourseRef,
    /// 课程类型（必修 / 选修 ...）
    pub kind: String,
    pub attendance: Attendance,
    pub internal_marks: Marks,
    /// 教学大纲链接
    pub syllabus_doc: String,
}

/// 学期
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Semester {
    /// 提交给门户的学期引用值
    pub reference: String,
    pub name: String,
}
