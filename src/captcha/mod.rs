pub mod challenge;
pub mod solver;

pub use challenge::ChallengeSolver;
pub use solver::{CaptchaError, TwoCaptcha};
