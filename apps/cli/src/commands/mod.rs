//! 命令定义和实现

pub mod config;
pub mod encode;
pub mod run;

pub use config::ConfigCommand;
pub use encode::EncodeCommand;
pub use run::RunCommand;
