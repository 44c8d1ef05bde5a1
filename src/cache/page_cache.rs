//! 页缓存实现（基于 lru crate）
//!
//! 元数据块的 LRU 写回缓存：
//!
//! 1. **按需装载**: 未命中时从 [`MetaIo`] 读入
//! 2. **延迟写回**: 修改只置脏标志，驱逐或显式 flush 时写回
//! 3. **丢弃**: inode 回收时直接丢弃其页面，不写回

use crate::{
    consts::BLOCK_SIZE,
    error::{Error, ErrorKind, Result},
    hal::MetaIo,
};
use alloc::{vec, vec::Vec};
use bitflags::bitflags;
use core::num::NonZeroUsize;
use lru::LruCache;

/// 默认缓存页数
pub const DEFAULT_CACHE_PAGES: usize = 64;

bitflags! {
    /// 缓存页标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// 数据有效
        const UPTODATE = 0x01;
        /// 数据已修改，待写回
        const DIRTY    = 0x02;
    }
}

/// 一个缓存页
struct Page {
    data: Vec<u8>,
    flags: PageFlags,
}

/// 元数据页缓存
///
/// 键为 `(ino, 逻辑块号)`。容量满时按 LRU 驱逐，脏页驱逐前写回。
pub struct PageCache {
    cache: LruCache<(u32, u32), Page>,
}

impl PageCache {
    /// 创建指定容量的缓存
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
        }
    }

    /// 读访问一个页
    ///
    /// 未命中时从 `io` 装载。
    pub fn with_page<M, F, R>(&mut self, io: &mut M, ino: u32, blk: u32, f: F) -> Result<R>
    where
        M: MetaIo,
        F: FnOnce(&[u8]) -> Result<R>,
    {
        self.load(io, ino, blk)?;
        let page = self
            .cache
            .get(&(ino, blk))
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, "Page vanished after load"))?;
        f(&page.data)
    }

    /// 写访问一个页
    ///
    /// 回调返回 Ok 时页被标记为脏；返回 Err 视为未修改。
    pub fn with_page_mut<M, F, R>(&mut self, io: &mut M, ino: u32, blk: u32, f: F) -> Result<R>
    where
        M: MetaIo,
        F: FnOnce(&mut [u8]) -> Result<R>,
    {
        self.load(io, ino, blk)?;
        let page = self
            .cache
            .get_mut(&(ino, blk))
            .ok_or_else(|| Error::new(ErrorKind::InvalidState, "Page vanished after load"))?;
        let out = f(&mut page.data)?;
        page.flags.insert(PageFlags::DIRTY);
        log::trace!("[CACHE] mark dirty ino={} blk={}", ino, blk);
        Ok(out)
    }

    /// 把某个 inode 的全部脏页写回
    pub fn flush_inode<M: MetaIo>(&mut self, io: &mut M, ino: u32) -> Result<()> {
        for (&(owner, blk), page) in self.cache.iter_mut() {
            if owner == ino && page.flags.contains(PageFlags::DIRTY) {
                io.write_meta(owner, blk, &page.data)?;
                page.flags.remove(PageFlags::DIRTY);
            }
        }
        Ok(())
    }

    /// 把全部脏页写回
    pub fn flush_all<M: MetaIo>(&mut self, io: &mut M) -> Result<()> {
        for (&(owner, blk), page) in self.cache.iter_mut() {
            if page.flags.contains(PageFlags::DIRTY) {
                io.write_meta(owner, blk, &page.data)?;
                page.flags.remove(PageFlags::DIRTY);
            }
        }
        Ok(())
    }

    /// 丢弃某个 inode 的全部缓存页（不写回）
    ///
    /// inode 回收路径使用：数据即将被整体废弃，写回没有意义。
    pub fn discard_inode(&mut self, ino: u32) {
        let stale: Vec<(u32, u32)> = self
            .cache
            .iter()
            .filter(|(&(owner, _), _)| owner == ino)
            .map(|(&k, _)| k)
            .collect();
        for key in stale {
            self.cache.pop(&key);
            log::debug!("[CACHE] discard ino={} blk={}", key.0, key.1);
        }
    }

    /// 当前缓存的脏页数（测试用）
    pub fn dirty_count(&self) -> usize {
        self.cache
            .iter()
            .filter(|(_, p)| p.flags.contains(PageFlags::DIRTY))
            .count()
    }

    /// 未命中时从底层装载页
    fn load<M: MetaIo>(&mut self, io: &mut M, ino: u32, blk: u32) -> Result<()> {
        if self.cache.contains(&(ino, blk)) {
            log::trace!("[CACHE] ino={} blk={} HIT", ino, blk);
            return Ok(());
        }

        log::debug!(
            "[CACHE] ino={} blk={} MISS, cache={}/{}",
            ino,
            blk,
            self.cache.len(),
            self.cache.cap().get()
        );

        let mut data = vec![0u8; BLOCK_SIZE];
        io.read_meta(ino, blk, &mut data)?;

        // 容量满时 push 返回被驱逐的页，脏页驱逐前写回
        if let Some(((old_ino, old_blk), old_page)) = self.cache.push(
            (ino, blk),
            Page {
                data,
                flags: PageFlags::UPTODATE,
            },
        ) {
            if (old_ino, old_blk) != (ino, blk) && old_page.flags.contains(PageFlags::DIRTY) {
                log::debug!("[CACHE] writeback evicted ino={} blk={}", old_ino, old_blk);
                io.write_meta(old_ino, old_blk, &old_page.data)?;
            }
        }
        Ok(())
    }
}
