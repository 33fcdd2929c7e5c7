pub mod config;
pub mod email;
pub mod gitlab;

pub use config::{Config, EmailConfig};
pub use gitlab::{Event, GitlabClient, Member, Project};
