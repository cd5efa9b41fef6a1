pub mod browser_login;
pub mod capsolver_api;
pub mod challenge_solver;

pub use browser_login::{BrowserLoginClient, LoginFallback};
pub use capsolver_api::{CapSolverTask, HttpSolverBackend, SolverBackend, TaskProxy};
pub use challenge_solver::{CapSolverClient, ChallengeSolver, SolverOptions};
