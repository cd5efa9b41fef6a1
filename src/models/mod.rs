pub mod challenge;
pub mod course;
pub mod credentials;
pub mod feedback;
pub mod profile;
pub mod schedule;
pub mod wifi;

pub use challenge::{ChallengeKind, ChallengeSiteKey};
pub use course::{Attendance, AttendanceRecord, Course, CourseRef, Marks, Semester};
pub use credentials::{Credentials, SessionKey};
pub use feedback::{FeedbackFailure, FeedbackReport, FeedbackSpec};
pub use profile::Profile;
pub use schedule::{AttendanceState, ExamSchedule, ScheduledClass, ScheduledExam};
pub use wifi::{MacAddress, WifiMacInfo};
