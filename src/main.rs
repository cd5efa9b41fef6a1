use std::path::Path;
use std::sync::Arc;

use amizone_session::utils::logging;
use amizone_session::{Config, Credentials, SessionCache};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

const USAGE: &str = "用法: amizone <attendance|courses [学期]|semesters|profile|exams|schedule [YYYY-MM-DD]|wifi>";

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置：指定了 AMIZONE_CONFIG 时读取 TOML，否则读取环境变量
    let config = match std::env::var("AMIZONE_CONFIG") {
        Ok(path) => Config::from_toml_file(Path::new(&path))?,
        Err(_) => Config::from_env()?,
    };

    let credentials = Credentials::new(
        std::env::var("AMIZONE_USERNAME").context("缺少 AMIZONE_USERNAME")?,
        std::env::var("AMIZONE_PASSWORD").context("缺少 AMIZONE_PASSWORD")?,
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("attendance");

    let cache = Arc::new(SessionCache::from_config(&config)?);
    let _sweeper = cache.spawn_sweeper();

    info!("[{}] 执行 {}", credentials.masked(), command);
    let session = cache.get_or_create(&credentials).await?;

    match command {
        "attendance" => print_json(&session.attendance().await?),
        "courses" => match args.get(1) {
            Some(semester) => print_json(&session.courses(semester).await?),
            None => print_json(&session.current_courses().await?),
        },
        "semesters" => print_json(&session.semesters().await?),
        "profile" => print_json(&session.profile().await?),
        "exams" => print_json(&session.exam_schedule().await?),
        "schedule" => {
            let date = match args.get(1) {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .with_context(|| format!("日期格式错误: {}", raw))?,
                None => chrono::Local::now().date_naive(),
            };
            print_json(&session.class_schedule(date).await?)
        }
        "wifi" => print_json(&session.wifi_mac_info().await?),
        _ => bail!(USAGE),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
