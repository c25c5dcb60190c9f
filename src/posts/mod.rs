pub mod lifecycle;
pub mod service;

pub use lifecycle::{LifecycleError, PostDraft, PostLifecycle, PostPatch};
pub use service::PostService;
