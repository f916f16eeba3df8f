pub mod entity;
pub mod import;
pub mod init;
