pub mod entity;
pub mod index;
pub mod init;
pub mod search;
pub mod stats;
pub mod workspace;

pub use workspace::{ConfigBackendFactory, Workspace};
