pub mod login_flow;

pub use login_flow::{LoginFlow, LOGIN_PATH, LOGIN_THROTTLE, SESSION_REUSE_WINDOW};
