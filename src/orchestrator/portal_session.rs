//! 门户会话 - 编排层
//!
//! 一个账号的会话句柄：统一的请求入口（懒登录、请求头、会话失效后重登重放），
//! 以及每个门户功能对应的操作

use chrono::{Days, NaiveDate};
use tracing::{debug, info, warn};

use super::feedback_pool;
use crate::error::{AppResult, AuthError, OperationError, ValidationError};
use crate::extract;
use crate::infrastructure::{Method, PortalRequest, PortalResponse};
use crate::models::{
    AttendanceRecord, Course, Credentials, ExamSchedule, FeedbackReport, FeedbackSpec,
    MacAddress, Profile, ScheduledClass, Semester, WifiMacInfo,
};
use crate::workflow::LoginFlow;

const ATTENDANCE_ENDPOINT: &str = "/Home";
const CURRENT_COURSES_ENDPOINT: &str = "/Academics/MyCourses";
const COURSES_ENDPOINT: &str = "/Academics/MyCourses/CourseListSemWise";
const PROFILE_ENDPOINT: &str = "/IDCard";
const EXAM_SCHEDULE_ENDPOINT: &str = "/Examination/ExamSchedule";
const CLASS_SCHEDULE_ENDPOINT: &str = "/Calendar/home/GetDiaryEvents";
const WIFI_MACS_ENDPOINT: &str = "/RegisterForWifi/mac/MacRegistration";
const REGISTER_WIFI_MAC_ENDPOINT: &str = "/RegisterForWifi/mac/MacRegistrationSave";
const REMOVE_WIFI_MAC_ENDPOINT: &str = "/RegisterForWifi/mac/Mac1RegistrationDelete";
const FEEDBACK_ENDPOINT: &str = "/FacultyFeeback/FacultyFeedback";
const FEEDBACK_SUBMIT_ENDPOINT: &str = "/FacultyFeeback/FacultyFeedback/SaveFeedbackRating";

const SCHEDULE_DATE_FORMAT: &str = "%Y-%m-%d";

/// 门户会话
pub struct PortalSession {
    login: LoginFlow,
    feedback_concurrency: usize,
}

impl std::fmt::Debug for PortalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalSession")
            .field("feedback_concurrency", &self.feedback_concurrency)
            .finish_non_exhaustive()
    }
}

impl PortalSession {
    /// 创建新的会话（不会立即登录）
    ///
    /// # 参数
    /// - `login`: 该账号的登录流程
    /// - `feedback_concurrency`: 批量评价时的并发数
    pub fn new(login: LoginFlow, feedback_concurrency: usize) -> Self {
        Self {
            login,
            feedback_concurrency: feedback_concurrency.max(1),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        self.login.credentials()
    }

    /// 确保已登录，见 [`LoginFlow::ensure_authenticated`]
    pub async fn ensure_authenticated(&self, force: bool) -> AppResult<()> {
        self.login.ensure_authenticated(force).await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.login.is_authenticated().await
    }

    /// 统一请求入口
    ///
    /// # 参数
    /// - `try_login`: 尚未登录时先登录；页面显示会话失效时强制重登并重放一次
    /// - `method`: GET / POST
    /// - `endpoint`: 相对门户地址的路径
    /// - `form`: POST 表单
    pub async fn do_request(
        &self,
        try_login: bool,
        method: Method,
        endpoint: &str,
        form: Option<Vec<(String, String)>>,
    ) -> AppResult<PortalResponse> {
        let user = self.credentials().masked();
        if self.credentials().is_empty() {
            return Err(AuthError::InvalidCredentials.into());
        }

        let mut replay_allowed = try_login;
        if try_login && !self.login.is_authenticated().await {
            info!("[{}] 尚未登录，先登录", user);
            self.login.ensure_authenticated(false).await?;
            replay_allowed = false;
        }

        // 并发请求同时发现会话失效时只重新登录一次
        let generation = self.login.generation().await;

        let response = match self.send(method, endpoint, form.clone()).await {
            Ok(response) => response,
            Err(e) if replay_allowed && e.is_transport_failure() => {
                warn!("[{}] {} 请求失败 ({})，重新登录后重试", user, endpoint, e);
                self.login.renew_session(generation).await?;
                return self.send(method, endpoint, form).await;
            }
            Err(e) => return Err(e),
        };

        if replay_allowed && !extract::is_logged_in(&response.body) {
            info!("[{}] {} 显示未登录（会话可能已过期），重新登录", user, endpoint);
            self.login.renew_session(generation).await?;
            return self.send(method, endpoint, form).await;
        }

        Ok(response)
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        form: Option<Vec<(String, String)>>,
    ) -> AppResult<PortalResponse> {
        let request = PortalRequest::portal(self.login.base_url(), method, endpoint, form);
        let response = self.login.transport().execute(request).await?;
        debug!(
            "{} {} -> {} ({})",
            method.as_str(),
            endpoint,
            response.final_url,
            response.status
        );
        response.ensure_ok(endpoint)
    }

    async fn get_page(&self, endpoint: &str) -> AppResult<String> {
        Ok(self.do_request(true, Method::Get, endpoint, None).await?.body)
    }

    // ========== 门户操作 ==========

    /// 各课程出勤
    pub async fn attendance(&self) -> AppResult<Vec<AttendanceRecord>> {
        extract::attendance(&self.get_page(ATTENDANCE_ENDPOINT).await?)
    }

    /// 当前学期课程
    pub async fn current_courses(&self) -> AppResult<Vec<Course>> {
        extract::courses(&self.get_page(CURRENT_COURSES_ENDPOINT).await?)
    }

    /// 指定学期课程
    ///
    /// # 参数
    /// - `semester_ref`: [`Semester::reference`]
    pub async fn courses(&self, semester_ref: &str) -> AppResult<Vec<Course>> {
        let form = vec![("sem".to_string(), semester_ref.to_string())];
        let response = self
            .do_request(true, Method::Post, COURSES_ENDPOINT, Some(form))
            .await?;
        extract::courses(&response.body)
    }

    /// 可查询的学期
    pub async fn semesters(&self) -> AppResult<Vec<Semester>> {
        extract::semesters(&self.get_page(CURRENT_COURSES_ENDPOINT).await?)
    }

    /// 学生信息
    pub async fn profile(&self) -> AppResult<Profile> {
        extract::profile(&self.get_page(PROFILE_ENDPOINT).await?)
    }

    /// 本学期考试安排
    pub async fn exam_schedule(&self) -> AppResult<ExamSchedule> {
        extract::exam_schedule(&self.get_page(EXAM_SCHEDULE_ENDPOINT).await?)
    }

    /// 指定日期的课表
    ///
    /// 接口按日期区间返回，可能包含前后日期的课程，结果只保留当天的
    pub async fn class_schedule(&self, date: NaiveDate) -> AppResult<Vec<ScheduledClass>> {
        let next_day = date.checked_add_days(Days::new(1)).unwrap_or(date);
        let endpoint = format!(
            "{}?start={}&end={}",
            CLASS_SCHEDULE_ENDPOINT,
            date.format(SCHEDULE_DATE_FORMAT),
            next_day.format(SCHEDULE_DATE_FORMAT)
        );
        extract::class_schedule(&self.get_page(&endpoint).await?, date)
    }

    /// wifi MAC 注册信息
    pub async fn wifi_mac_info(&self) -> AppResult<WifiMacInfo> {
        extract::wifi_mac_info(&self.get_page(WIFI_MACS_ENDPOINT).await?)
    }

    /// 注册 wifi MAC 地址
    ///
    /// # 参数
    /// - `mac`: 要注册的地址，已注册时直接返回
    /// - `bypass_limit`: 槽位已满时挤掉最后一个地址；门户只展示最早的地址，此时无法校验结果
    pub async fn register_wifi_mac(&self, mac: MacAddress, bypass_limit: bool) -> AppResult<()> {
        let user = self.credentials().masked();
        let info = self.wifi_mac_info().await?;

        if info.is_registered(&mac) {
            info!("[{}] {} 已注册，跳过", user, mac);
            return Ok(());
        }

        let mut addresses = info.registered.clone();
        if !info.has_free_slot() {
            if !bypass_limit {
                return Err(OperationError::NoFreeMacSlots.into());
            }
            warn!("[{}] 槽位已满，替换最后一个地址", user);
            addresses.pop();
        }
        addresses.push(mac);

        let mut form = vec![
            (
                extract::VERIFICATION_TOKEN_FIELD.to_string(),
                info.verification_token.clone(),
            ),
            ("Amizone_Id".to_string(), self.credentials().username.clone()),
            // 门户要求存在，值无所谓
            ("Name".to_string(), "DoesntMatter".to_string()),
        ];
        form.extend(
            addresses
                .iter()
                .enumerate()
                .map(|(i, address)| (format!("Mac{}", i + 1), address.to_string())),
        );

        let response = self
            .do_request(true, Method::Post, REGISTER_WIFI_MAC_ENDPOINT, Some(form))
            .await?;
        if bypass_limit {
            return Ok(());
        }

        if !extract::wifi_mac_info(&response.body)?.is_registered(&mac) {
            return Err(OperationError::MacNotRegistered {
                mac: mac.to_string(),
            }
            .into());
        }
        info!("[{}] ✓ 已注册 {}", user, mac);
        Ok(())
    }

    /// 删除 wifi MAC 地址；未注册的地址不做任何处理
    pub async fn remove_wifi_mac(&self, mac: MacAddress) -> AppResult<()> {
        let endpoint = format!(
            "{}?Amizone_Id={}&username={}&X-Requested-With=XMLHttpRequest",
            REMOVE_WIFI_MAC_ENDPOINT,
            self.credentials().username,
            mac
        );
        let body = self.get_page(&endpoint).await?;
        if extract::wifi_mac_info(&body)?.is_registered(&mac) {
            return Err(OperationError::MacNotRemoved {
                mac: mac.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// 以相同评分与评语提交所有待评价教师
    ///
    /// # 参数
    /// - `rating`: 1..=5
    /// - `query_rating`: 1..=3，越大越好（门户表单中相反）
    /// - `comment`: 非空评语
    ///
    /// # 返回
    /// 评价已提交或未开放时 `submitted` 为 0
    pub async fn submit_faculty_feedback(
        &self,
        rating: i32,
        query_rating: i32,
        comment: &str,
    ) -> AppResult<FeedbackReport> {
        check_range("rating", rating, 1, 5)?;
        check_range("query_rating", query_rating, 1, 3)?;
        if comment.trim().is_empty() {
            return Err(ValidationError::EmptyComment.into());
        }
        let form_query_rating = 4 - query_rating;

        let specs = extract::faculty_feedback(&self.get_page(FEEDBACK_ENDPOINT).await?)?;
        info!(
            "[{}] 待评价教师 {} 位",
            self.credentials().masked(),
            specs.len()
        );

        let report = feedback_pool::submit_all(specs, self.feedback_concurrency, |spec: FeedbackSpec| {
            let form = spec.payload(rating, form_query_rating, comment);
            async move {
                self.do_request(true, Method::Post, FEEDBACK_SUBMIT_ENDPOINT, Some(form))
                    .await
                    .map(|_| ())
            }
        })
        .await;
        Ok(report)
    }
}

fn check_range(field: &'static str, value: i32, min: i32, max: i32) -> AppResult<()> {
    if !(min..=max).contains(&value) {
        return Err(ValidationError::RatingOutOfRange {
            field,
            value,
            min,
            max,
        }
        .into());
    }
    Ok(())
}
