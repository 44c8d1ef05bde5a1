//! f2fs_namei: 日志结构闪存文件系统的命名空间管理层
//!
//! 这是 f2fs `namei.c` 语义的纯 Rust 实现，覆盖：
//! - **目录项存取**（TEA 哈希定位、尾点折叠与 ASCII casefold 比较）
//! - **inode 生命周期**（三段式编号协议、失败整体回退）
//! - **orphan 注册表**（先占配额后删除，重放恰好回收一次）
//! - **全部命名空间操作**：create/mkdir/mknod/symlink/tmpfile、
//!   link/unlink/rmdir、rename（NOREPLACE/WHITEOUT）与交换 rename
//!
//! 底层能力（元数据 I/O、编号池、文件名加密、检查点）通过
//! [`hal`] 中的 trait 注入，库本身 `no_std`。
//!
//! # 示例
//!
//! ```rust,ignore
//! use f2fs_namei::{FsConfig, MemHal, Namespace};
//!
//! fn main() -> f2fs_namei::Result<()> {
//!     let mut ns = Namespace::new(MemHal::new(), FsConfig::default())?;
//!     let root = ns.root();
//!
//!     let dir = ns.mkdir(root, b"photos", 0o755)?;
//!     let file = ns.create(dir, b"cat.jpg", 0o644)?;
//!     assert_eq!(ns.lookup(dir, b"cat.jpg")?, Some(file));
//!
//!     ns.unlink(dir, b"cat.jpg")?;
//!     ns.recover_orphans()?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 常量定义
//! - [`types`] - 磁盘数据布局（目录项记录、加密符号链接负载）
//! - [`hal`] - 底层能力 trait 与内存实现
//! - [`lock`] - 写序列化段与 per-inode 锁
//! - [`cache`] - 目录元数据页缓存
//! - [`dentry`] - 哈希、目录块编解码与条目存取
//! - [`inode`] - inode 记录、表与分配/回退
//! - [`orphan`] - orphan 注册表
//! - [`fs`] - 命名空间聚合对象
//! - [`namei`] - 修改操作引擎

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 磁盘数据布局
pub mod types;

/// 底层能力抽象
pub mod hal;

/// 锁与序列化段
pub mod lock;

/// 页缓存
pub mod cache;

/// 目录项子系统
pub mod dentry;

/// inode 记录与分配
pub mod inode;

/// orphan 注册表
pub mod orphan;

/// 命名空间聚合对象
pub mod fs;

/// 命名空间修改操作
pub mod namei;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 能力接口与内存实现
pub use hal::{
    Checkpoint, FnameCrypto, Hal, MemHal, MemMetaIo, MemNidPool, MetaIo, NidPool,
    NoopCheckpoint, XorCrypto,
};

// inode
pub use inode::{InodeKind, InodeRec, InodeTable};

// orphan
pub use orphan::{OrphanRegistry, OrphanToken};

// 缓存
pub use cache::{PageCache, PageFlags, DEFAULT_CACHE_PAGES};

// 命名空间
pub use fs::{FsConfig, Namespace, StatNs};

// rename 标志
pub use namei::RenameFlags;
