pub mod init;
pub mod links;
pub mod list;
pub mod new;
pub mod port;
pub mod rm;
