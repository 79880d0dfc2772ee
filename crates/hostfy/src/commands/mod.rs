pub mod catalog;
pub mod cleanup;
pub mod db;
pub mod init;
pub mod install;
pub mod lifecycle;
pub mod list;
pub mod logs;
pub mod remove;
pub mod secrets;
pub mod status;
pub mod update;
pub mod upgrade;
