//! 命名空间聚合对象
//!
//! 把 inode 表、orphan 注册表、页缓存、写序列化锁与外部能力
//! 绑在一起，承载 lookup/readlink 等读路径与 orphan 重放；修改
//! 操作（create/link/unlink/rename 等）在 `namei` 模块的
//! impl 块中实现。

use super::types::{FsConfig, StatNs};
use crate::{
    cache::PageCache,
    consts::*,
    dentry::store,
    error::{Error, ErrorKind, Result},
    hal::Hal,
    inode::{InodeKind, InodeRec, InodeTable},
    lock::{InodeSem, OpLock},
    orphan::OrphanRegistry,
};
use alloc::vec::Vec;

/// 命名空间层文件系统对象
///
/// 对应 f2fs 的 `f2fs_sb_info` 中与 namei 相关的部分。
pub struct Namespace<H: Hal> {
    pub(crate) hal: H,
    pub(crate) cfg: FsConfig,
    pub(crate) itable: InodeTable,
    pub(crate) orphans: OrphanRegistry,
    pub(crate) cache: PageCache,
    pub(crate) op_lock: OpLock,
    pub(crate) next_generation: u32,
}

impl<H: Hal> Namespace<H> {
    /// 创建命名空间并植入根目录
    pub fn new(hal: H, cfg: FsConfig) -> Result<Self> {
        let mut ns = Self {
            cache: PageCache::new(cfg.cache_pages),
            orphans: OrphanRegistry::new(cfg.orphan_capacity),
            hal,
            cfg,
            itable: InodeTable::new(),
            op_lock: OpLock::new(),
            next_generation: 1,
        };

        let now = ns.hal.now();
        // 根目录的 ".." 指向自身
        ns.itable.insert(InodeRec {
            ino: ROOT_INO,
            kind: InodeKind::Directory,
            perm: 0o755,
            uid: 0,
            gid: 0,
            nlink: 2,
            pino: Some(ROOT_INO),
            generation: 0,
            size: 0,
            atime: now,
            ctime: now,
            mtime: now,
            crypto_ctx: None,
            inline_data: false,
            inline_dentry: true,
            inline_dots: true,
            inc_link: false,
            free_nid: false,
            linkable: false,
            cold: false,
            enc_name: false,
            dirty: true,
            bad: false,
            casefold: false,
            sem: InodeSem::new(),
        })?;
        Ok(ns)
    }

    /// 根目录 inode 编号
    pub fn root(&self) -> u32 {
        ROOT_INO
    }

    /// 解析 inode 记录（stat 类查询）
    pub fn inode(&self, ino: u32) -> Result<&InodeRec> {
        self.itable.get(ino)
    }

    /// HAL 访问（测试断言外部副作用用）
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// 统计信息
    pub fn stats(&self) -> StatNs {
        StatNs {
            inode_count: self.itable.len(),
            orphan_count: self.orphans.ids().len(),
            dirty_pages: self.cache.dirty_count(),
        }
    }

    /// 把全部脏页写回底层
    pub fn flush(&mut self) -> Result<()> {
        self.cache.flush_all(&mut self.hal)
    }

    /// 在目录中查找名称
    ///
    /// 对应 f2fs 的 `f2fs_lookup()`。未命中返回 `Ok(None)`，调用方
    /// 据此区分"不存在"与 I/O 失败。命中时惰性完成两件维护：
    /// 物化目标目录的点目录项（`inline_dots`），以及把父目录的
    /// casefold 策略传播到目标目录的缓存记录。
    pub fn lookup(&mut self, dir_ino: u32, name: &[u8]) -> Result<Option<u32>> {
        let dir = self.itable.get(dir_ino)?;
        if !dir.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Lookup in non-directory"));
        }
        let dir_casefold = dir.casefold;

        let found = match store::find_entry(&mut self.hal, &mut self.cache, dir, name)? {
            Some(found) => found,
            None => return Ok(None),
        };
        let ino = found.dentry.ino;

        // 点目录项懒恢复必须在写序列化段内
        let needs_dots = self.itable.get(ino).map(|rec| rec.inline_dots).unwrap_or(false);
        if needs_dots {
            let _guard = self.op_lock.lock_op()?;
            let now = self.hal.now();
            let child = self.itable.get_mut(ino)?;
            store::recover_dot_entries(&mut self.hal, &mut self.cache, child, dir_ino, now)?;
        }

        // casefold 属性传播到缓存别名
        if dir_casefold {
            let child = self.itable.get_mut(ino)?;
            if child.is_dir() && !child.casefold {
                child.casefold = true;
                child.dirty = true;
            }
        }

        Ok(Some(ino))
    }

    /// 解析目录的父目录
    ///
    /// 对应 f2fs 的 `f2fs_get_parent()`。
    pub fn parent_of(&mut self, dir_ino: u32) -> Result<u32> {
        let dir = self.itable.get(dir_ino)?;
        if !dir.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a directory"));
        }
        store::parent_ino(&mut self.hal, &mut self.cache, dir)
    }

    /// 读取符号链接目标
    ///
    /// 对应 f2fs 的 `f2fs_follow_link()` 与加密变体：长度为零的
    /// 目标是损坏的符号链接，报 `NotFound` 而非空读。
    pub fn readlink(&mut self, ino: u32) -> Result<Vec<u8>> {
        let rec = self.itable.get(ino)?;
        let (encrypted, ctx, size) = match rec.kind {
            InodeKind::Symlink => (false, 0, rec.size),
            InodeKind::EncryptedSymlink => {
                let ctx = rec.crypto_ctx.ok_or_else(|| {
                    Error::new(ErrorKind::Corrupted, "Encrypted symlink without context")
                })?;
                (true, ctx, rec.size)
            }
            _ => return Err(Error::new(ErrorKind::InvalidInput, "Not a symlink")),
        };
        if size == 0 || size as usize > BLOCK_SIZE {
            return Err(Error::new(ErrorKind::NotFound, "Broken symlink"));
        }

        let raw = self.cache.with_page(&mut self.hal, ino, 0, |data| {
            Ok(data[..size as usize].to_vec())
        })?;

        if encrypted {
            let cipher = crate::types::decode_enc_symlink(&raw)?;
            self.hal.decode(ctx, &cipher)
        } else {
            // 首字节为 0 说明目标从未写入
            if raw.first() == Some(&0) {
                return Err(Error::new(ErrorKind::NotFound, "Broken symlink"));
            }
            let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
            Ok(raw[..end].to_vec())
        }
    }

    /// 为空目录开启 casefold 策略
    ///
    /// 策略是目录属性，建立后写入目录 inode；为保持哈希与比较的
    /// 一致性，只允许对尚无条目的目录设置。
    pub fn set_casefold(&mut self, dir_ino: u32) -> Result<()> {
        let dir = self.itable.get(dir_ino)?;
        if !dir.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a directory"));
        }
        if !store::is_empty_dir(&mut self.hal, &mut self.cache, dir)? {
            return Err(Error::new(ErrorKind::NotEmpty, "Casefold requires empty directory"));
        }
        let dir = self.itable.get_mut(dir_ino)?;
        dir.casefold = true;
        dir.dirty = true;
        Ok(())
    }

    /// 回收注册在册的 orphan inode
    ///
    /// 正常淘汰路径与挂载重放共用：每个登记编号恰好回收一次，
    /// 返回回收数量。
    pub fn recover_orphans(&mut self) -> Result<usize> {
        // 逐条摘除而不是先清空名单：中途出错时未处理的编号仍然
        // 在册，下次重放继续
        let ids = self.orphans.ids().to_vec();
        let mut reclaimed = 0;
        for ino in ids {
            // 被重新链接（whiteout 路径）的只注销登记
            let nlink = match self.itable.get(ino) {
                Ok(rec) => rec.nlink,
                Err(_) => {
                    self.orphans.remove(ino);
                    continue;
                }
            };
            if nlink > 0 {
                self.orphans.remove(ino);
                continue;
            }
            self.evict_inode(ino)?;
            reclaimed += 1;
        }
        log::info!("[ORPHAN] reclaimed {} inode(s)", reclaimed);
        Ok(reclaimed)
    }

    /// 彻底回收一个 inode：缓存页、底层元数据、nid、表项
    pub(crate) fn evict_inode(&mut self, ino: u32) -> Result<()> {
        self.cache.discard_inode(ino);
        self.hal.discard_meta(ino)?;
        self.hal.free_nid(ino);
        self.itable.remove(ino);
        self.orphans.remove(ino);
        log::debug!("[NAMEI] evicted ino={}", ino);
        Ok(())
    }

    // ===== 引擎共用的内部助手 =====

    /// 在 per-inode 锁保护下修改记录字段
    ///
    /// 对应 f2fs 的 `down_write(&F2FS_I(inode)->i_sem)` 包裹段。
    pub(crate) fn with_inode_locked<F, R>(&mut self, ino: u32, f: F) -> Result<R>
    where
        F: FnOnce(&mut InodeRec) -> Result<R>,
    {
        let rec = self.itable.get_mut(ino)?;
        rec.sem.down_write()?;
        let out = f(rec);
        rec.sem.up_write();
        out
    }

    /// 向目录插入一条指向既有 inode 的目录项
    ///
    /// 对应 f2fs 的 `f2fs_add_link()` 全流程：插入条目、消费
    /// `inc_link` 预增、目录子目录联动父链接计数、whiteout 重链接
    /// 时撤销 orphan 登记。要求已处于写序列化段内。
    pub(crate) fn add_link_impl(&mut self, dir_ino: u32, name: &[u8], child_ino: u32) -> Result<()> {
        let now = self.hal.now();
        let (file_type, child_is_dir, child_nlink, child_linkable, child_inc) = {
            let child = self.itable.get(child_ino)?;
            (
                child.kind.file_type(),
                child.is_dir(),
                child.nlink,
                child.linkable,
                child.inc_link,
            )
        };
        // 零链接 inode 只有持 linkable 瞬态标志（whiteout）才可再链接
        if child_nlink == 0 && !child_linkable {
            return Err(Error::new(ErrorKind::InvalidState, "Linking an unlinkable orphan"));
        }

        {
            let dir = self.itable.get_mut(dir_ino)?;
            store::add_entry(&mut self.hal, &mut self.cache, dir, name, child_ino, file_type, now)?;
            // 新建子目录的 ".." 指向本目录：父链接计数 +1。
            // 既有目录经 rename 移入时由 rename 引擎自行调整。
            if child_is_dir && child_inc {
                dir.inc_nlink();
            }
        }

        self.with_inode_locked(child_ino, |child| {
            if child.inc_link {
                child.nlink += 1;
                child.inc_link = false;
            }
            child.ctime = now;
            child.dirty = true;
            Ok(())
        })?;

        // whiteout 重新获得链接后撤销 orphan 登记
        if child_nlink == 0 {
            self.orphans.remove(child_ino);
        }
        Ok(())
    }

    /// dir_sync 策略下的段后同步刷写
    ///
    /// 对应 f2fs 的 `if (IS_DIRSYNC(dir)) f2fs_sync_fs(sbi->sb, 1)`。
    pub(crate) fn dir_sync_after(&mut self, dir_ino: u32) -> Result<()> {
        if self.cfg.dir_sync {
            self.cache.flush_inode(&mut self.hal, dir_ino)?;
            self.hal.sync_fs()?;
        }
        Ok(())
    }

    /// 当前时间戳
    pub(crate) fn now(&self) -> u64 {
        self.hal.now()
    }
}
