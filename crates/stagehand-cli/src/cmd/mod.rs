pub mod apps;
pub mod config;
pub mod deploy;
pub mod render;
pub mod status;
