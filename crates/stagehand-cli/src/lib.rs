//! Concrete collaborators for the stagehand engine: Helm for installs,
//! kubectl for namespace labels, and the agent's HTTP status endpoint.

pub mod agent;
pub mod helm;
pub mod kubectl;

pub use agent::HttpStatusSource;
pub use helm::HelmInstaller;
pub use kubectl::KubectlClient;
