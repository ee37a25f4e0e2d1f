pub mod build;
pub mod dev;
pub mod init;
pub mod run;
pub mod serve;
