//! 教师评价批量提交
//!
//! 用 Semaphore 限制同时在途的提交数，全部完成后统一汇总失败项

use std::future::Future;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::error::AppResult;
use crate::models::{FeedbackFailure, FeedbackReport, FeedbackSpec};

/// 并发提交所有评价表单
///
/// # 参数
/// - `specs`: 待提交的表单
/// - `concurrency`: 同时在途的最大提交数
/// - `submit`: 提交单个表单
pub async fn submit_all<F, Fut>(
    specs: Vec<FeedbackSpec>,
    concurrency: usize,
    submit: F,
) -> FeedbackReport
where
    F: Fn(FeedbackSpec) -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    let semaphore = Semaphore::new(concurrency.max(1));
    let total = specs.len();

    let tasks = specs.into_iter().map(|spec| {
        let semaphore = &semaphore;
        let submit = &submit;
        async move {
            // 信号量从不关闭
            let _permit = semaphore.acquire().await.ok();
            let faculty = spec.faculty.clone();
            (faculty, submit(spec).await)
        }
    });

    let mut report = FeedbackReport::default();
    for (faculty, result) in join_all(tasks).await {
        match result {
            Ok(()) => report.submitted += 1,
            Err(e) => {
                error!("[评价] ❌ {} 提交失败: {}", faculty, e);
                report.failures.push(FeedbackFailure {
                    faculty,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "[评价] 完成: 成功 {}/{}，失败 {}",
        report.submitted,
        total,
        report.failures.len()
    );
    report
}
