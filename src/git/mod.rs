pub mod executor;
pub mod version;

// Re-export commonly used types
pub use executor::{CommandOutput, GitExecutor, GitRunner};
pub use version::GitVersion;
