//! 文件系统配置与聚合类型

use crate::{cache::DEFAULT_CACHE_PAGES, consts::LINK_MAX};
use alloc::{string::String, vec::Vec};

/// 命名空间层配置
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// 冷数据扩展名列表（顺序即优先级，首个命中生效）
    ///
    /// 对应 f2fs superblock 的 `extension_list`
    pub cold_extensions: Vec<String>,
    /// 关闭扩展名识别
    ///
    /// 对应 f2fs 的挂载选项 `DISABLE_EXT_IDENTIFY`
    pub disable_ext_identify: bool,
    /// 目录同步写策略（IS_DIRSYNC）：修改操作结束后强制刷写
    pub dir_sync: bool,
    /// orphan 注册表容量
    pub orphan_capacity: usize,
    /// 页缓存容量（页数）
    pub cache_pages: usize,
    /// 硬链接计数上限
    pub link_max: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            // mkfs.f2fs 默认多媒体扩展名的常用子集
            cold_extensions: ["jpg", "jpeg", "gif", "png", "avi", "divx", "mp4", "mp3", "3gp",
                "wmv", "mpeg", "mkv", "mov", "ogg", "apk"]
                .iter()
                .map(|s| String::from(*s))
                .collect(),
            disable_ext_identify: false,
            dir_sync: false,
            orphan_capacity: 64,
            cache_pages: DEFAULT_CACHE_PAGES,
            link_max: LINK_MAX,
        }
    }
}

/// 命名空间统计信息
#[derive(Debug, Clone, Copy, Default)]
pub struct StatNs {
    /// inode 表中的记录数
    pub inode_count: usize,
    /// 注册在册的 orphan 数
    pub orphan_count: usize,
    /// 缓存中的脏页数
    pub dirty_pages: usize,
}
