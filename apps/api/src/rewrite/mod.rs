pub mod backend;
pub mod dispatcher;
pub mod prompts;

pub use backend::{build_backend, RewriteBackend};
pub use dispatcher::{
    DispatchOptions, Dispatcher, Eligibility, FailurePolicy, RewriteError, RewriteErrorKind,
};
