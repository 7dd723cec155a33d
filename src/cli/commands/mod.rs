//! CLI command implementations

pub mod utils;

pub mod completions;
pub mod ctrl;
pub mod init;
pub mod link;
pub mod risk;
pub mod status;
pub mod uc;
pub mod validate;
