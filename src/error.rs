//! 错误类型定义
//!
//! 提供命名空间操作的错误类型。

use core::fmt;

/// 命名空间操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误（磁盘结构不一致，例如目录缺少 ".." 条目）
    Io,
    /// 无效参数
    InvalidInput,
    /// 文件系统损坏
    Corrupted,
    /// 权限错误（加密上下文不一致）
    PermissionDenied,
    /// 条目或 inode 不存在
    NotFound,
    /// 已存在
    AlreadyExists,
    /// 空间不足（nid 池或 orphan 注册表耗尽）
    NoSpace,
    /// 目录非空
    NotEmpty,
    /// 名称过长
    NameTooLong,
    /// 链接数达到上限
    TooManyLinks,
    /// 内存不足
    OutOfMemory,
    /// 不支持的操作
    Unsupported,
    /// 设备忙
    Busy,
    /// 无效状态
    InvalidState,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 创建带原因的错误（简化版，忽略 cause）
    ///
    /// 注意：在 no_std 环境下，cause 参数会被忽略
    pub fn with_cause(kind: ErrorKind, message: &'static str, _cause: impl core::fmt::Debug) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
