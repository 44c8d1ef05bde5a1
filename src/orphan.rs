//! Orphan inode 注册表客户端
//!
//! 对应 f2fs 的 `acquire_orphan_inode()/release_orphan_inode()/`
//! `add_orphan_inode()`。
//!
//! 注册表记录"目录链接数为零、但可能仍被在途操作或打开句柄引用"
//! 的 inode：崩溃后下次挂载重放此名单即可回收它们的空间。容量
//! 有限；删除最后一条目录链接的操作必须在提交目录项删除**之前**
//! 成功取得名额，取不到则整个操作干净失败。

use crate::error::{Error, ErrorKind, Result};
use alloc::vec::Vec;

/// orphan 名额凭据
///
/// [`OrphanRegistry::acquire`] 返回，必须被 `register` 或 `release`
/// 消费；丢弃未消费的凭据会泄漏名额。
#[must_use = "orphan slot must be registered or released"]
#[derive(Debug)]
pub struct OrphanToken(());

/// orphan inode 注册表
pub struct OrphanRegistry {
    capacity: usize,
    reserved: usize,
    ids: Vec<u32>,
}

impl OrphanRegistry {
    /// 创建指定容量的注册表
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            reserved: 0,
            ids: Vec::new(),
        }
    }

    /// 预留一个名额
    ///
    /// 对应 f2fs 的 `acquire_orphan_inode()`；容量耗尽返回 NoSpace，
    /// 调用方此时不得再触碰任何目录状态。
    pub fn acquire(&mut self) -> Result<OrphanToken> {
        if self.ids.len() + self.reserved >= self.capacity {
            log::warn!(
                "[ORPHAN] registry full ({} registered, {} reserved)",
                self.ids.len(),
                self.reserved
            );
            return Err(Error::new(ErrorKind::NoSpace, "Orphan registry full"));
        }
        self.reserved += 1;
        Ok(OrphanToken(()))
    }

    /// 用预留名额登记一个零链接 inode
    ///
    /// 对应 f2fs 的 `add_orphan_inode()`；在目录项删除提交之后、
    /// 序列化段释放之前调用。
    pub fn register(&mut self, token: OrphanToken, ino: u32) {
        let OrphanToken(()) = token;
        self.reserved -= 1;
        if !self.ids.contains(&ino) {
            self.ids.push(ino);
        }
        log::debug!("[ORPHAN] registered ino={}", ino);
    }

    /// 归还未使用的预留名额
    ///
    /// 对应 f2fs 的 `release_orphan_inode()`：临时预留最终没有用上
    /// （例如 rename 覆写后目标链接数未归零）。
    pub fn release(&mut self, token: OrphanToken) {
        let OrphanToken(()) = token;
        self.reserved -= 1;
    }

    /// inode 正常回收或被重新链接后移除登记
    pub fn remove(&mut self, ino: u32) {
        self.ids.retain(|&id| id != ino);
    }

    /// 是否登记在册
    pub fn contains(&self, ino: u32) -> bool {
        self.ids.contains(&ino)
    }

    /// 当前登记的 inode 名单（挂载重放用）
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// 当前预留名额数（测试用）
    pub fn reserved_count(&self) -> usize {
        self.reserved
    }
}
