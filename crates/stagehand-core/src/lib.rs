pub mod action_plan;
pub mod app;
pub mod config;
pub mod deploy;
pub mod error;
pub mod install;
pub mod io;
pub mod paths;
pub mod retry;
pub mod status;
pub mod store;
pub mod template;

pub use deploy::{deploy_apps, track_deployment_status};
pub use error::{Result, StagehandError};
pub use template::resolve as resolve_template;
