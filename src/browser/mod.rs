pub mod driver;
pub mod interactor;
pub mod lifecycle;

pub use interactor::Interactor;
pub use lifecycle::{ManagedSession, SessionHandle, SessionLifecycle};
