//! 目录项存储（Entry Store）
//!
//! 名称到 inode 编号的记录存取：查找、插入、删除、原地重定向，
//! 以及 "."/".." 点目录项的懒恢复。
//!
//! 查找是无锁读（只经过页缓存的常规引用语义）；所有修改入口都
//! 要求调用方已处于写序列化段内。

pub mod block;
pub mod hash;
pub mod store;

pub use store::{EntryLocator, FoundEntry};
