//! inode 生命周期：分配、初始化与失败回收
//!
//! 对应 f2fs namei.c 的 `f2fs_new_inode()` 与 `handle_failed_inode()`。
//!
//! 分配是多步且每步可回退的：nid 预留 -> 属主初始化 -> 时间戳 ->
//! 代数 -> 接入 inode 表 -> 加密上下文继承 -> 内联资格标记。
//! nid 预留之后的任何失败都必须把编号标记归还、记录标坏并整体
//! 丢弃，绝不允许半初始化的 inode 停留在可见状态。

use super::{InodeKind, InodeRec, InodeTable};
use crate::{
    cache::PageCache,
    error::{Error, ErrorKind, Result},
    hal::NidPool,
    lock::InodeSem,
};

/// 分配并初始化一个新 inode
///
/// 成功后返回编号；此时 nid 仍处于**预留态**，调用方在目录项插入
/// 成功后负责 `alloc_nid_done()`，失败则走 [`handle_failed_inode`]。
///
/// # 参数
///
/// * `pool` - nid 分配池
/// * `itable` - inode 表
/// * `next_generation` - 文件系统级代数计数器
/// * `now` - 当前时间戳
/// * `parent` - 父目录记录（属主、加密上下文、casefold 继承来源）
/// * `kind` - 新 inode 种类
/// * `perm` - 权限位
pub fn new_inode<P: NidPool>(
    pool: &mut P,
    itable: &mut InodeTable,
    next_generation: &mut u32,
    now: u64,
    parent: &InodeRec,
    kind: InodeKind,
    perm: u16,
) -> Result<u32> {
    let ino = pool
        .alloc_nid()
        .ok_or_else(|| Error::new(ErrorKind::NoSpace, "Nid pool exhausted"))?;

    let generation = *next_generation;
    *next_generation = next_generation.wrapping_add(1);

    let mut rec = InodeRec {
        ino,
        kind,
        perm,
        // 属主按标准继承规则取自父目录
        uid: parent.uid,
        gid: parent.gid,
        nlink: 1,
        pino: Some(parent.ino),
        generation,
        size: 0,
        atime: now,
        ctime: now,
        mtime: now,
        crypto_ctx: None,
        inline_data: false,
        inline_dentry: false,
        inline_dots: false,
        inc_link: false,
        free_nid: false,
        linkable: false,
        cold: false,
        enc_name: false,
        dirty: true,
        bad: false,
        casefold: false,
        sem: InodeSem::new(),
    };

    // 父目录加密则子节点继承上下文
    if parent.is_encrypted() && kind.may_encrypt() {
        rec.crypto_ctx = parent.crypto_ctx;
    }

    // 内联资格
    match kind {
        InodeKind::Regular => rec.inline_data = true,
        InodeKind::Directory => {
            rec.inline_dentry = true;
            // 点目录项先走内联占位，首次 lookup 时物化
            rec.inline_dots = true;
            rec.casefold = parent.casefold;
        }
        _ => {}
    }

    if let Err(err) = itable.insert(rec) {
        // 编号冲突：致命，预留编号退回池
        log::error!("[NAMEI] new inode ino={} collides in itable", ino);
        pool.alloc_nid_failed(ino);
        return Err(err);
    }

    log::debug!("[NAMEI] new inode ino={} gen={} kind={:?}", ino, generation, kind);
    Ok(ino)
}

/// 回收一个尚未成功接入命名空间的 inode
///
/// 对应 f2fs 的 `handle_failed_inode()`：标坏、预留 nid 归还池、
/// 丢弃缓存页、从 inode 表摘除。
pub fn handle_failed_inode<P: NidPool>(
    pool: &mut P,
    itable: &mut InodeTable,
    cache: &mut PageCache,
    ino: u32,
) {
    if let Ok(rec) = itable.get_mut(ino) {
        rec.bad = true;
        rec.free_nid = true;
    }
    cache.discard_inode(ino);
    itable.remove(ino);
    pool.alloc_nid_failed(ino);
    log::warn!("[NAMEI] tore down failed inode ino={}", ino);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MemNidPool;

    fn parent_dir() -> InodeRec {
        InodeRec {
            ino: 3,
            kind: InodeKind::Directory,
            perm: 0o755,
            uid: 1000,
            gid: 100,
            nlink: 2,
            pino: None,
            generation: 0,
            size: 0,
            atime: 0,
            ctime: 0,
            mtime: 0,
            crypto_ctx: None,
            inline_data: false,
            inline_dentry: true,
            inline_dots: false,
            inc_link: false,
            free_nid: false,
            linkable: false,
            cold: false,
            enc_name: false,
            dirty: false,
            bad: false,
            casefold: false,
            sem: InodeSem::new(),
        }
    }

    #[test]
    fn test_new_inode_inherits_owner_and_generation() {
        let mut pool = MemNidPool::new(10, 8);
        let mut itable = InodeTable::new();
        let mut gen = 7;
        let parent = parent_dir();

        let a = new_inode(&mut pool, &mut itable, &mut gen, 100, &parent, InodeKind::Regular, 0o644)
            .unwrap();
        let b = new_inode(&mut pool, &mut itable, &mut gen, 100, &parent, InodeKind::Regular, 0o644)
            .unwrap();

        let ra = itable.get(a).unwrap();
        let rb = itable.get(b).unwrap();
        assert_eq!(ra.uid, 1000);
        assert_eq!(ra.gid, 100);
        assert_eq!(ra.pino, Some(3));
        // 代数单调递增
        assert_eq!(rb.generation, ra.generation + 1);
        assert!(ra.inline_data);
        assert!(ra.dirty);
    }

    #[test]
    fn test_new_dir_gets_inline_dots_and_casefold() {
        let mut pool = MemNidPool::new(10, 8);
        let mut itable = InodeTable::new();
        let mut gen = 0;
        let mut parent = parent_dir();
        parent.casefold = true;

        let d = new_inode(&mut pool, &mut itable, &mut gen, 0, &parent, InodeKind::Directory, 0o755)
            .unwrap();
        let rec = itable.get(d).unwrap();
        assert!(rec.inline_dots);
        assert!(rec.inline_dentry);
        assert!(rec.casefold);
    }

    #[test]
    fn test_encryption_inheritance() {
        let mut pool = MemNidPool::new(10, 8);
        let mut itable = InodeTable::new();
        let mut gen = 0;
        let mut parent = parent_dir();
        parent.crypto_ctx = Some(0xfeed);

        let f = new_inode(&mut pool, &mut itable, &mut gen, 0, &parent, InodeKind::Regular, 0o600)
            .unwrap();
        assert_eq!(itable.get(f).unwrap().crypto_ctx, Some(0xfeed));

        let dev = new_inode(
            &mut pool,
            &mut itable,
            &mut gen,
            0,
            &parent,
            InodeKind::Special { ftype: crate::consts::FT_CHRDEV, rdev: 1 },
            0o600,
        )
        .unwrap();
        // 特殊文件不可加密
        assert_eq!(itable.get(dev).unwrap().crypto_ctx, None);
    }

    #[test]
    fn test_pool_exhaustion_and_failed_teardown() {
        let mut pool = MemNidPool::new(10, 1);
        let mut itable = InodeTable::new();
        let mut cache = PageCache::new(4);
        let mut gen = 0;
        let parent = parent_dir();

        let ino = new_inode(&mut pool, &mut itable, &mut gen, 0, &parent, InodeKind::Regular, 0o644)
            .unwrap();
        assert!(new_inode(&mut pool, &mut itable, &mut gen, 0, &parent, InodeKind::Regular, 0o644)
            .is_err());

        handle_failed_inode(&mut pool, &mut itable, &mut cache, ino);
        assert!(!itable.contains(ino));
        assert_eq!(pool.reserved_count(), 0);
        // 归还后编号可再次预留
        assert_eq!(pool.alloc_nid(), Some(ino));
    }
}
