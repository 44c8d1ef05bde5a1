//! 目录级条目操作
//!
//! 对应 f2fs dir.c 的 `f2fs_find_entry()/f2fs_add_link()/`
//! `f2fs_delete_entry()/f2fs_set_link()/f2fs_empty_dir()`，以及
//! namei.c 的 `__recover_dot_dentries()`。
//!
//! 目录数据是多块线性布局，逐块委托给 [`block`](super::block) 层；
//! 本层负责跨块扫描、目录元数据（size/mtime）维护与父目录链接
//! 计数的联动。

use super::{
    block,
    hash::{dentry_hash, is_dot_dotdot},
};
use crate::{
    cache::PageCache,
    consts::*,
    error::{Error, ErrorKind, Result},
    hal::MetaIo,
    inode::InodeRec,
    types::RawDentry,
};

/// 条目在目录数据中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocator {
    /// 逻辑块号
    pub blk: u32,
    /// 块内偏移
    pub offset: usize,
}

/// 查找结果
#[derive(Debug, Clone)]
pub struct FoundEntry {
    /// 磁盘记录
    pub dentry: RawDentry,
    /// 位置，用于后续删除/重定向
    pub locator: EntryLocator,
}

/// 在目录中查找名称
///
/// 对应 f2fs 的 `f2fs_find_entry()`。名称超长在任何查找之前
/// 即报 `NameTooLong`。
pub fn find_entry<M: MetaIo>(
    io: &mut M,
    cache: &mut PageCache,
    dir: &InodeRec,
    name: &[u8],
) -> Result<Option<FoundEntry>> {
    if name.len() > NAME_MAX {
        return Err(Error::new(ErrorKind::NameTooLong, "Name exceeds NAME_MAX"));
    }
    if name.is_empty() {
        return Err(Error::new(ErrorKind::InvalidInput, "Empty name"));
    }

    let hash = dentry_hash(name, dir.casefold);
    for blk in 0..dir.dir_blocks() {
        let hit = cache.with_page(io, dir.ino, blk, |data| {
            block::verify_block(data)?;
            block::find_in_block(data, name, hash, dir.casefold)
        })?;
        if let Some((dentry, offset)) = hit {
            return Ok(Some(FoundEntry {
                dentry,
                locator: EntryLocator { blk, offset },
            }));
        }
    }
    Ok(None)
}

/// 向目录追加一条新记录
///
/// 对应 f2fs 的 `f2fs_add_link()` 中的目录项写入部分。重名返回
/// `AlreadyExists`；块内放不下时推进到下一块，必要时延长目录。
pub fn add_entry<M: MetaIo>(
    io: &mut M,
    cache: &mut PageCache,
    dir: &mut InodeRec,
    name: &[u8],
    ino: u32,
    file_type: u8,
    now: u64,
) -> Result<()> {
    if name.len() > NAME_MAX {
        return Err(Error::new(ErrorKind::NameTooLong, "Name exceeds NAME_MAX"));
    }
    if name.is_empty() {
        return Err(Error::new(ErrorKind::InvalidInput, "Empty name"));
    }
    if find_entry(io, cache, dir, name)?.is_some() {
        return Err(Error::new(ErrorKind::AlreadyExists, "Name already present"));
    }

    let de = RawDentry {
        ino,
        hash: dentry_hash(name, dir.casefold),
        file_type,
        name: name.to_vec(),
    };

    let blocks = dir.dir_blocks();
    for blk in 0..=blocks {
        let inserted = cache.with_page_mut(io, dir.ino, blk, |data| {
            block::verify_block(data)?;
            block::insert_in_block(data, &de)
        })?;
        if inserted {
            if blk >= blocks {
                // 目录延长了一个块
                dir.size = (blk as u64 + 1) * DENTRY_BLOCK_PAYLOAD as u64;
            }
            dir.mtime = now;
            dir.ctime = now;
            dir.dirty = true;
            log::debug!("[DENT] add '{}' -> ino={} in dir={}", debug_name(name), ino, dir.ino);
            return Ok(());
        }
    }

    // 单条记录必定能放进一个空块，到这里说明上面的循环逻辑被破坏
    Err(Error::new(ErrorKind::NoSpace, "No room for directory entry"))
}

/// 删除目录中的一条记录
///
/// 对应 f2fs 的 `f2fs_delete_entry()`：更新目录自身元数据；被删
/// 目标是目录时同步递减本目录（其父）的链接计数。目标 inode 自身
/// 的计数由调用方调整。
pub fn delete_entry<M: MetaIo>(
    io: &mut M,
    cache: &mut PageCache,
    dir: &mut InodeRec,
    loc: &EntryLocator,
    victim_is_dir: bool,
    now: u64,
) -> Result<()> {
    cache.with_page_mut(io, dir.ino, loc.blk, |data| {
        block::verify_block(data)?;
        block::delete_in_block(data, loc.offset)
    })?;

    dir.mtime = now;
    dir.ctime = now;
    dir.dirty = true;
    if victim_is_dir {
        dir.drop_nlink()?;
    }
    Ok(())
}

/// 原地改写条目的目标 inode
///
/// 对应 f2fs 的 `f2fs_set_link()`。
pub fn set_link<M: MetaIo>(
    io: &mut M,
    cache: &mut PageCache,
    dir: &mut InodeRec,
    loc: &EntryLocator,
    ino: u32,
    file_type: u8,
    now: u64,
) -> Result<()> {
    cache.with_page_mut(io, dir.ino, loc.blk, |data| {
        block::verify_block(data)?;
        block::set_link_in_block(data, loc.offset, ino, file_type)
    })?;
    dir.mtime = now;
    dir.ctime = now;
    dir.dirty = true;
    Ok(())
}

/// 目录是否为空（不计 "." 与 ".."）
///
/// 对应 f2fs 的 `f2fs_empty_dir()`。
pub fn is_empty_dir<M: MetaIo>(io: &mut M, cache: &mut PageCache, dir: &InodeRec) -> Result<bool> {
    for blk in 0..dir.dir_blocks() {
        let live = cache.with_page(io, dir.ino, blk, |data| {
            block::verify_block(data)?;
            let mut live = 0usize;
            block::for_each_live(data, |de, _| {
                if !is_dot_dotdot(&de.name) {
                    live += 1;
                }
                Ok(())
            })?;
            Ok(live)
        })?;
        if live > 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

/// 解析目录的 ".." 条目
///
/// 对应 f2fs 的 `f2fs_parent_dir()`。点目录项尚未物化时由内联
/// 占位（pino 提示）合成；两者都缺失说明磁盘结构已不一致。
pub fn parent_ino<M: MetaIo>(
    io: &mut M,
    cache: &mut PageCache,
    dir: &InodeRec,
) -> Result<u32> {
    if let Some(found) = find_entry(io, cache, dir, b"..")? {
        return Ok(found.dentry.ino);
    }
    if dir.inline_dots {
        if let Some(pino) = dir.pino {
            return Ok(pino);
        }
    }
    log::error!("[DENT] dir={} has no '..' entry", dir.ino);
    Err(Error::new(ErrorKind::Io, "Directory missing '..' entry"))
}

/// 物化 "."/".." 点目录项
///
/// 对应 f2fs namei.c 的 `__recover_dot_dentries()`。幂等：已存在
/// 的条目不重复插入；完成后清除内联占位标记并把目录标脏。必须在
/// 写序列化段内调用。
pub fn recover_dot_entries<M: MetaIo>(
    io: &mut M,
    cache: &mut PageCache,
    dir: &mut InodeRec,
    parent: u32,
    now: u64,
) -> Result<()> {
    if find_entry(io, cache, dir, b".")?.is_none() {
        add_entry(io, cache, dir, b".", dir.ino, FT_DIR, now)?;
    }
    if find_entry(io, cache, dir, b"..")?.is_none() {
        add_entry(io, cache, dir, b"..", parent, FT_DIR, now)?;
    }
    dir.inline_dots = false;
    dir.dirty = true;
    log::debug!("[DENT] recovered dot entries for dir={} parent={}", dir.ino, parent);
    Ok(())
}

fn debug_name(name: &[u8]) -> &str {
    core::str::from_utf8(name).unwrap_or("<non-utf8>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hal::MemMetaIo,
        inode::{InodeKind, InodeRec},
        lock::InodeSem,
    };
    use alloc::vec;

    fn dir_rec(ino: u32) -> InodeRec {
        InodeRec {
            ino,
            kind: InodeKind::Directory,
            perm: 0o755,
            uid: 0,
            gid: 0,
            nlink: 2,
            pino: Some(ROOT_INO),
            generation: 1,
            size: 0,
            atime: 0,
            ctime: 0,
            mtime: 0,
            crypto_ctx: None,
            inline_data: false,
            inline_dentry: true,
            inline_dots: true,
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
    fn test_insert_then_find_until_delete() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let mut dir = dir_rec(10);

        add_entry(&mut io, &mut cache, &mut dir, b"name", 42, FT_REG_FILE, 5).unwrap();
        assert_eq!(dir.mtime, 5);
        assert!(dir.size > 0);

        let found = find_entry(&mut io, &mut cache, &dir, b"name").unwrap().unwrap();
        assert_eq!(found.dentry.ino, 42);

        delete_entry(&mut io, &mut cache, &mut dir, &found.locator, false, 6).unwrap();
        assert!(find_entry(&mut io, &mut cache, &dir, b"name").unwrap().is_none());
        assert_eq!(dir.mtime, 6);
    }

    #[test]
    fn test_duplicate_rejected_under_policy() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let mut dir = dir_rec(10);
        dir.casefold = true;

        add_entry(&mut io, &mut cache, &mut dir, b"File", 1, FT_REG_FILE, 0).unwrap();
        // 折叠策略下 "file." 与 "File" 同名
        assert_eq!(
            add_entry(&mut io, &mut cache, &mut dir, b"file.", 2, FT_REG_FILE, 0)
                .unwrap_err()
                .kind(),
            ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_name_too_long_before_lookup() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let dir = dir_rec(10);
        let long = vec![b'x'; NAME_MAX + 1];
        assert_eq!(
            find_entry(&mut io, &mut cache, &dir, &long).unwrap_err().kind(),
            ErrorKind::NameTooLong
        );
    }

    #[test]
    fn test_multi_block_growth() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let mut dir = dir_rec(10);

        // 大名称把目录推过一个块
        let mut count = 0u32;
        for i in 0..40u32 {
            let mut name = vec![b'n'; 200];
            name[0] = b'a' + (i % 26) as u8;
            name[1] = b'a' + (i / 26) as u8;
            add_entry(&mut io, &mut cache, &mut dir, &name, 100 + i, FT_REG_FILE, 0).unwrap();
            count += 1;
        }
        assert!(dir.dir_blocks() > 1);

        // 第一块与最后一块的条目都能找回
        let mut first = vec![b'n'; 200];
        first[0] = b'a';
        first[1] = b'a';
        assert!(find_entry(&mut io, &mut cache, &dir, &first).unwrap().is_some());
        let mut last = vec![b'n'; 200];
        last[0] = b'a' + ((count - 1) % 26) as u8;
        last[1] = b'a' + ((count - 1) / 26) as u8;
        assert!(find_entry(&mut io, &mut cache, &dir, &last).unwrap().is_some());
    }

    #[test]
    fn test_delete_dir_entry_drops_parent_nlink() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let mut dir = dir_rec(10);
        dir.nlink = 3;

        add_entry(&mut io, &mut cache, &mut dir, b"sub", 11, FT_DIR, 0).unwrap();
        let found = find_entry(&mut io, &mut cache, &dir, b"sub").unwrap().unwrap();
        delete_entry(&mut io, &mut cache, &mut dir, &found.locator, true, 0).unwrap();
        assert_eq!(dir.nlink, 2);
    }

    #[test]
    fn test_recover_dot_entries_idempotent() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let mut dir = dir_rec(10);
        assert!(dir.inline_dots);

        recover_dot_entries(&mut io, &mut cache, &mut dir, ROOT_INO, 1).unwrap();
        assert!(!dir.inline_dots);
        let dot = find_entry(&mut io, &mut cache, &dir, b".").unwrap().unwrap();
        assert_eq!(dot.dentry.ino, 10);
        assert_eq!(parent_ino(&mut io, &mut cache, &dir).unwrap(), ROOT_INO);

        // 第二次恢复不产生重复条目
        recover_dot_entries(&mut io, &mut cache, &mut dir, ROOT_INO, 2).unwrap();
        let mut dots = 0;
        for blk in 0..dir.dir_blocks() {
            cache
                .with_page(&mut io, dir.ino, blk, |data| {
                    block::for_each_live(data, |de, _| {
                        if de.name == b"." {
                            dots += 1;
                        }
                        Ok(())
                    })
                })
                .unwrap();
        }
        assert_eq!(dots, 1);
    }

    #[test]
    fn test_parent_from_inline_placeholder_and_corruption() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let mut dir = dir_rec(10);

        // 未物化时由内联占位合成
        assert_eq!(parent_ino(&mut io, &mut cache, &dir).unwrap(), ROOT_INO);

        // 占位失效且没有 ".." 条目：结构性 I/O 错误
        dir.pino = None;
        assert_eq!(
            parent_ino(&mut io, &mut cache, &dir).unwrap_err().kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_empty_dir_ignores_dots() {
        let mut io = MemMetaIo::new();
        let mut cache = PageCache::new(8);
        let mut dir = dir_rec(10);

        recover_dot_entries(&mut io, &mut cache, &mut dir, ROOT_INO, 0).unwrap();
        assert!(is_empty_dir(&mut io, &mut cache, &dir).unwrap());

        add_entry(&mut io, &mut cache, &mut dir, b"child", 9, FT_REG_FILE, 0).unwrap();
        assert!(!is_empty_dir(&mut io, &mut cache, &dir).unwrap());
    }
}
