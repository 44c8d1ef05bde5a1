//! 常量定义
//!
//! 对应 f2fs 的 f2fs_fs.h 中与命名空间相关的常量。

/// 元数据块大小（字节）
///
/// 对应 f2fs 的 `F2FS_BLKSIZE`
pub const BLOCK_SIZE: usize = 4096;

/// 文件名最大长度（字节）
///
/// 对应 f2fs 的 `F2FS_NAME_LEN`
pub const NAME_MAX: usize = 255;

/// 单个 inode 的最大硬链接数
///
/// 对应 f2fs 的 `F2FS_LINK_MAX`
pub const LINK_MAX: u32 = 0xffff_ffff - 1;

/// 保留的无效 inode 编号（目录项中表示空槽）
pub const NULL_INO: u32 = 0;

/// 根目录 inode 编号
pub const ROOT_INO: u32 = 3;

// ===== 目录项文件类型标签 =====
//
// 对应 f2fs 的 `F2FS_FT_*` 常量

/// 未知类型
pub const FT_UNKNOWN: u8 = 0;
/// 普通文件
pub const FT_REG_FILE: u8 = 1;
/// 目录
pub const FT_DIR: u8 = 2;
/// 字符设备
pub const FT_CHRDEV: u8 = 3;
/// 块设备
pub const FT_BLKDEV: u8 = 4;
/// FIFO
pub const FT_FIFO: u8 = 5;
/// Socket
pub const FT_SOCK: u8 = 6;
/// 符号链接
pub const FT_SYMLINK: u8 = 7;

/// Whiteout 标记使用的设备号
///
/// 对应内核的 `WHITEOUT_DEV`（0 号字符设备）
pub const WHITEOUT_DEV: u32 = 0;

/// 目录项固定头部长度（ino + hash + file_type + name_len）
pub const DENTRY_HEADER_LEN: usize = 10;

/// 目录块尾部 CRC32C 校验和长度
pub const DENTRY_BLOCK_CSUM_LEN: usize = 4;

/// 目录块中条目可用的净空间
pub const DENTRY_BLOCK_PAYLOAD: usize = BLOCK_SIZE - DENTRY_BLOCK_CSUM_LEN;

/// 加密符号链接负载头部长度（u16 编码长度）
pub const ENC_SYMLINK_HEADER_LEN: usize = 2;
