//! 登录流程集成测试：复用、节流、结果分类与验证码处理

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use amizone_session::clients::{ChallengeSolver, LoginFallback};
use amizone_session::error::{AppError, AuthError};
use amizone_session::infrastructure::Transport;
use amizone_session::workflow::{LoginFlow, LOGIN_THROTTLE};
use amizone_session::{Credentials, ErrorCategory};

use tokio_test::{assert_err, assert_ok};

use common::{
    credentials, form_value, login_page, FakeFallback, FakeSolver, FakeTransport, LoginOutcome,
    Portal, BASE_URL,
};

fn flow_for(portal: Portal, creds: Credentials) -> (LoginFlow, Arc<Portal>, Arc<FakeTransport>) {
    let portal = Arc::new(portal);
    let transport = Arc::new(FakeTransport::new(portal.clone()));
    let flow = LoginFlow::new(creds, transport.clone(), BASE_URL);
    (flow, portal, transport)
}

#[tokio::test]
async fn successful_login_is_reused_without_network() {
    let (flow, portal, transport) = flow_for(Portal::new(), credentials("A2305222014"));

    assert_ok!(flow.ensure_authenticated(false).await);
    assert!(flow.is_authenticated().await);
    assert_eq!(portal.posts(), 1);

    let sent = transport.requests.lock().unwrap().len();
    assert_ok!(flow.ensure_authenticated(false).await);
    assert_eq!(transport.requests.lock().unwrap().len(), sent);
    assert_eq!(portal.posts(), 1);
}

#[tokio::test(start_paused = true)]
async fn wrong_password_is_terminal_then_throttled() {
    let (flow, portal, _) = flow_for(
        Portal::new(),
        Credentials::new("A2305222014", "not-the-password"),
    );

    let err = flow.ensure_authenticated(false).await.unwrap_err();
    assert!(err.is_invalid_credentials());
    assert_eq!(err.category(), ErrorCategory::InvalidCredentials);

    let err = flow.ensure_authenticated(false).await.unwrap_err();
    match err {
        AppError::Auth(AuthError::Throttled { retry_after }) => {
            assert!(retry_after <= LOGIN_THROTTLE);
        }
        other => panic!("期望节流，实际为 {:?}", other),
    }
    assert_eq!(portal.posts(), 1);

    tokio::time::advance(LOGIN_THROTTLE + Duration::from_secs(1)).await;
    let err = flow.ensure_authenticated(false).await.unwrap_err();
    assert!(err.is_invalid_credentials());
    assert_eq!(portal.posts(), 2);
}

#[tokio::test]
async fn forced_login_bypasses_throttle() {
    let (flow, portal, _) = flow_for(Portal::new(), credentials("A2305222014"));

    flow.ensure_authenticated(false).await.expect("登录成功");
    flow.ensure_authenticated(true).await.expect("强制重新登录");
    assert_eq!(portal.posts(), 2);
}

#[tokio::test]
async fn lost_cookies_after_success_relogin_without_throttle() {
    let (flow, portal, transport) = flow_for(Portal::new(), credentials("A2305222014"));

    assert_ok!(flow.ensure_authenticated(false).await);
    transport.drop_cookies();

    assert_ok!(flow.ensure_authenticated(false).await);
    assert_eq!(portal.posts(), 2);
    assert!(transport.has_session_cookies());
}

#[tokio::test]
async fn renewal_is_skipped_once_a_newer_login_succeeded() {
    let (flow, portal, _) = flow_for(Portal::new(), credentials("A2305222014"));

    assert_ok!(flow.ensure_authenticated(false).await);
    let observed = flow.generation().await;

    assert_ok!(flow.renew_session(observed).await);
    assert_eq!(portal.posts(), 2);
    assert_eq!(flow.generation().await, observed + 1);

    // 另一个请求在同一代上发现失效，此时已被刷新
    assert_ok!(flow.renew_session(observed).await);
    assert_eq!(portal.posts(), 2);
}

#[tokio::test]
async fn login_page_body_after_redirect_is_protocol_drift() {
    let mut portal = Portal::new();
    portal.outcome = LoginOutcome::BodyShowsLogin;
    let (flow, _, _) = flow_for(portal, credentials("A2305222014"));

    let err = assert_err!(flow.ensure_authenticated(false).await);
    assert!(matches!(err, AppError::Auth(AuthError::ProtocolDrift { .. })));
    assert_eq!(err.category(), ErrorCategory::PortalChanged);
    assert!(!flow.is_authenticated().await);
}

#[tokio::test]
async fn missing_auth_cookie_is_protocol_drift() {
    let mut portal = Portal::new();
    portal.outcome = LoginOutcome::NoCookie;
    let (flow, _, _) = flow_for(portal, credentials("A2305222014"));

    let err = flow.ensure_authenticated(false).await.unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::ProtocolDrift { .. })));
    assert_eq!(err.category(), ErrorCategory::PortalChanged);
}

#[tokio::test]
async fn malformed_login_page_never_posts() {
    let mut portal = Portal::new();
    portal.login_page = login_page(None).replace(r#"value="salty""#, r#"value="""#);
    let (flow, portal, _) = flow_for(portal, credentials("A2305222014"));

    let err = flow.ensure_authenticated(false).await.unwrap_err();
    match err {
        AppError::Auth(AuthError::MalformedLoginPage { missing }) => assert_eq!(missing, "Salt"),
        other => panic!("期望登录页结构异常，实际为 {:?}", other),
    }
    assert_eq!(portal.posts(), 0);
}

#[tokio::test]
async fn turnstile_token_is_submitted_with_the_form() {
    let mut portal = Portal::new();
    portal.login_page = login_page(Some("0x4AAAAAAAwm6_gqjJdfOuzq"));
    let (flow, _, transport) = flow_for(portal, credentials("A2305222014"));
    let solver = Arc::new(FakeSolver::solving("ts-token"));
    let flow = flow.with_solver(Some(solver.clone() as Arc<dyn ChallengeSolver>));

    flow.ensure_authenticated(false).await.expect("登录成功");

    assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
    let form = transport.last_form();
    assert_eq!(form_value(&form, "cf-turnstile-response"), Some("ts-token"));
    assert_eq!(form_value(&form, "RecaptchaToken"), Some("ts-token"));
    assert_eq!(form_value(&form, "_QString"), Some("test"));
    assert_eq!(form_value(&form, "Salt"), Some("salty"));
}

#[tokio::test]
async fn challenge_without_solver_is_submitted_plain() {
    let mut portal = Portal::new();
    portal.login_page = login_page(Some("0x4AAAAAAAwm6_gqjJdfOuzq"));
    let (flow, portal, transport) = flow_for(portal, credentials("A2305222014"));

    flow.ensure_authenticated(false).await.expect("门户未强制校验时仍能登录");
    assert_eq!(portal.posts(), 1);
    assert_eq!(form_value(&transport.last_form(), "_QString"), Some(""));
}

#[tokio::test]
async fn solver_failure_without_fallback_is_reported() {
    let mut portal = Portal::new();
    portal.login_page = login_page(Some("0x4AAAAAAAwm6_gqjJdfOuzq"));
    let (flow, portal, _) = flow_for(portal, credentials("A2305222014"));
    let flow = flow.with_solver(Some(Arc::new(FakeSolver::failing()) as Arc<dyn ChallengeSolver>));

    let err = flow.ensure_authenticated(false).await.unwrap_err();
    match err {
        AppError::Auth(AuthError::ChallengeSolveFailed { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("期望验证码求解失败，实际为 {:?}", other),
    }
    assert_eq!(portal.posts(), 0);
}

#[tokio::test]
async fn solver_failure_falls_back_to_browser_login() {
    let mut portal = Portal::new();
    portal.login_page = login_page(Some("0x4AAAAAAAwm6_gqjJdfOuzq"));
    let (flow, portal, transport) = flow_for(portal, credentials("A2305222014"));
    let fallback = Arc::new(FakeFallback::with_auth_cookie());
    let flow = flow
        .with_solver(Some(Arc::new(FakeSolver::failing()) as Arc<dyn ChallengeSolver>))
        .with_fallback(Some(fallback.clone() as Arc<dyn LoginFallback>));

    flow.ensure_authenticated(false).await.expect("兜底登录成功");

    assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    assert_eq!(portal.posts(), 0);
    assert!(flow.is_authenticated().await);
    assert!(transport.has_session_cookies());
}

#[tokio::test(start_paused = true)]
async fn cancelled_login_releases_the_account_lock() {
    let portal = Portal::new().with_login_delay("A2305222014", Duration::from_secs(30));
    let (flow, portal, _) = flow_for(portal, credentials("A2305222014"));

    let cancelled =
        tokio::time::timeout(Duration::from_secs(1), flow.ensure_authenticated(false)).await;
    assert!(cancelled.is_err());
    assert!(!flow.is_authenticated().await);

    flow.ensure_authenticated(true).await.expect("锁已释放，可以重新登录");
    assert_eq!(portal.posts(), 2);
}
