/// Configuration subsystem - Document settings and preferences
/// 
/// This module handles loading configuration from .textchainrc files and
/// turning it into the options documents are created with.

pub mod rc;

// Re-export public interface
pub use rc::{RcConfig, RcLoader};
