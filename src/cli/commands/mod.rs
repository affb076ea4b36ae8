pub mod classify;
pub mod config;
pub mod curate;
pub mod eval;
pub mod init;
