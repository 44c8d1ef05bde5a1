//! 命名空间聚合对象与高级 API

mod filesystem;
mod types;

pub use filesystem::Namespace;
pub use types::{FsConfig, StatNs};
