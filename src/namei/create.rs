//! 新建类操作：create/mkdir/mknod/symlink/tmpfile
//!
//! 共同骨架对应 f2fs：`f2fs_new_inode()` 拿到记录，进入写序列化段
//! 插入目录项，失败则 `handle_failed_inode()` 整体回退，成功则
//! `alloc_nid_done()` 落定编号。名称合法性在分配 inode 之前检查，
//! 失败路径不消耗编号。

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    fs::Namespace,
    hal::Hal,
    inode::{new, InodeKind},
    types::encode_enc_symlink,
};
use alloc::string::String;
use alloc::vec::Vec;

/// 按扩展名判定冷数据文件
///
/// 对应 f2fs 的 `is_multimedia_file()`：名称须形如 `x.ext`，点号
/// 前至少一个字符，扩展名比较不分大小写，首个命中即停。
fn is_cold_name(exts: &[String], name: &[u8]) -> bool {
    exts.iter().any(|ext| {
        let ext = ext.as_bytes();
        name.len() >= ext.len() + 2
            && name[name.len() - ext.len() - 1] == b'.'
            && name[name.len() - ext.len()..].eq_ignore_ascii_case(ext)
    })
}

impl<H: Hal> Namespace<H> {
    /// 创建普通文件
    ///
    /// 对应 f2fs 的 `f2fs_create()`，含按扩展名标冷。返回新编号。
    pub fn create(&mut self, dir_ino: u32, name: &[u8], perm: u16) -> Result<u32> {
        self.hal.balance_fs();
        self.check_new_name(dir_ino, name)?;

        let ino = self.new_inode_at(dir_ino, InodeKind::Regular, perm)?;
        if !self.cfg.disable_ext_identify && is_cold_name(&self.cfg.cold_extensions, name) {
            let rec = self.itable.get_mut(ino)?;
            rec.cold = true;
        }

        self.attach_new(dir_ino, name, ino)?;
        log::debug!("[NAMEI] create ino={} in dir={}", ino, dir_ino);
        Ok(ino)
    }

    /// 创建子目录
    ///
    /// 对应 f2fs 的 `f2fs_mkdir()`：子目录以 `inc_link` 预增标志
    /// 进入插入流程，落盘后链接计数为 2（父目录条目 + 自身 "."），
    /// 父目录计数 +1（子目录的 ".."）。
    pub fn mkdir(&mut self, dir_ino: u32, name: &[u8], perm: u16) -> Result<u32> {
        self.hal.balance_fs();
        self.check_new_name(dir_ino, name)?;

        let ino = self.new_inode_at(dir_ino, InodeKind::Directory, perm)?;
        {
            let rec = self.itable.get_mut(ino)?;
            rec.inc_link = true;
        }

        self.attach_new(dir_ino, name, ino)?;
        log::debug!("[NAMEI] mkdir ino={} in dir={}", ino, dir_ino);
        Ok(ino)
    }

    /// 创建特殊文件（设备、FIFO、socket）
    ///
    /// 对应 f2fs 的 `f2fs_mknod()`。FIFO 与 socket 不携带设备号。
    pub fn mknod(
        &mut self,
        dir_ino: u32,
        name: &[u8],
        ftype: u8,
        rdev: u32,
        perm: u16,
    ) -> Result<u32> {
        match ftype {
            FT_CHRDEV | FT_BLKDEV => {}
            FT_FIFO | FT_SOCK => {
                if rdev != 0 {
                    return Err(Error::new(
                        ErrorKind::InvalidInput,
                        "rdev meaningless for fifo/socket",
                    ));
                }
            }
            _ => {
                return Err(Error::new(ErrorKind::InvalidInput, "Invalid special file type"));
            }
        }

        self.hal.balance_fs();
        self.check_new_name(dir_ino, name)?;

        let ino = self.new_inode_at(dir_ino, InodeKind::Special { ftype, rdev }, perm)?;
        self.attach_new(dir_ino, name, ino)?;
        Ok(ino)
    }

    /// 创建符号链接
    ///
    /// 对应 f2fs 的 `f2fs_symlink()`。加密目录下目标经外部编解码
    /// 能力加密后以 `{长度, 密文}` 布局落盘。目录项插入成功之后的
    /// 载荷写入失败不回退链接：留下的是零长度目标，读取时报
    /// `NotFound`（损坏符号链接语义）。
    pub fn symlink(&mut self, dir_ino: u32, name: &[u8], target: &[u8]) -> Result<u32> {
        self.hal.balance_fs();
        self.check_new_name(dir_ino, name)?;
        if target.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "Empty symlink target"));
        }
        // 明文含 NUL 结尾、密文含长度头，都必须放进一个块
        if target.len() >= BLOCK_SIZE {
            return Err(Error::new(ErrorKind::NameTooLong, "Symlink target too long"));
        }

        let ino = self.new_inode_at(dir_ino, InodeKind::Symlink, 0o777)?;
        let ctx = {
            let rec = self.itable.get_mut(ino)?;
            if let Some(ctx) = rec.crypto_ctx {
                rec.kind = InodeKind::EncryptedSymlink;
                Some(ctx)
            } else {
                None
            }
        };

        self.attach_new(dir_ino, name, ino)?;

        let payload: Vec<u8> = match ctx {
            Some(ctx) => {
                let cipher = self.hal.encode(ctx, target)?;
                encode_enc_symlink(&cipher)?
            }
            None => {
                let mut plain = target.to_vec();
                plain.push(0);
                plain
            }
        };
        if payload.len() > BLOCK_SIZE {
            return Err(Error::new(ErrorKind::NameTooLong, "Encrypted target too long"));
        }

        self.cache.with_page_mut(&mut self.hal, ino, 0, |data| {
            data[..payload.len()].copy_from_slice(&payload);
            Ok(())
        })?;
        {
            let rec = self.itable.get_mut(ino)?;
            rec.size = payload.len() as u64;
            rec.dirty = true;
        }
        self.cache.flush_inode(&mut self.hal, ino)?;
        Ok(ino)
    }

    /// 创建无目录项的临时文件
    ///
    /// 对应 f2fs 的 `f2fs_tmpfile()`：inode 一诞生即登记为 orphan，
    /// 链接计数为零。不带可链接标记，之后无法经 link 获得正式条目，
    /// 最终由 orphan 回收路径清理。
    pub fn tmpfile(&mut self, dir_ino: u32, perm: u16) -> Result<u32> {
        self.hal.balance_fs();
        self.tmpfile_impl(dir_ino, InodeKind::Regular, perm)
    }

    /// 为 rename whiteout 造一个字符设备标记 inode
    ///
    /// 对应 f2fs 的 `f2fs_create_whiteout()`：设备号恒为
    /// `WHITEOUT_DEV`，自己的写序列化段在 rename 进段之前完成。
    pub(crate) fn create_whiteout(&mut self, dir_ino: u32) -> Result<u32> {
        self.tmpfile_impl(
            dir_ino,
            InodeKind::Special { ftype: FT_CHRDEV, rdev: WHITEOUT_DEV },
            0,
        )
    }

    /// 对应 f2fs 的 `__f2fs_tmpfile()`
    fn tmpfile_impl(&mut self, dir_ino: u32, kind: InodeKind, perm: u16) -> Result<u32> {
        self.require_dir(dir_ino)?;
        let ino = self.new_inode_at(dir_ino, kind, perm)?;

        let guard = self.op_lock.lock_op()?;
        let token = match self.orphans.acquire() {
            Ok(token) => token,
            Err(err) => {
                drop(guard);
                self.discard_failed_inode(ino);
                return Err(err);
            }
        };
        self.orphans.register(token, ino);
        drop(guard);
        self.hal.alloc_nid_done(ino);

        // 无目录项指向，链接计数归零
        self.with_inode_locked(ino, |rec| {
            rec.nlink = 0;
            rec.dirty = true;
            Ok(())
        })?;
        log::debug!("[NAMEI] tmpfile ino={} (orphan)", ino);
        Ok(ino)
    }

    /// 对应 f2fs 的 `f2fs_new_inode()` 调用点：父记录快照后分配
    fn new_inode_at(&mut self, dir_ino: u32, kind: InodeKind, perm: u16) -> Result<u32> {
        let now = self.hal.now();
        let parent = self.itable.get(dir_ino)?.clone();
        new::new_inode(
            &mut self.hal,
            &mut self.itable,
            &mut self.next_generation,
            now,
            &parent,
            kind,
            perm,
        )
    }

    /// 进段插入目录项并落定编号；失败整体回退新 inode
    fn attach_new(&mut self, dir_ino: u32, name: &[u8], ino: u32) -> Result<()> {
        let guard = self.op_lock.lock_op()?;
        if let Err(err) = self.add_link_impl(dir_ino, name, ino) {
            drop(guard);
            self.discard_failed_inode(ino);
            return Err(err);
        }
        self.hal.alloc_nid_done(ino);
        drop(guard);
        self.dir_sync_after(dir_ino)
    }

    /// 新建中途失败的整体回退
    ///
    /// 对应 f2fs 的 `handle_failed_inode()`。
    pub(crate) fn discard_failed_inode(&mut self, ino: u32) {
        new::handle_failed_inode(&mut self.hal, &mut self.itable, &mut self.cache, ino);
    }

    /// 新名称前置校验：父是目录、非空、不超长
    pub(crate) fn check_new_name(&self, dir_ino: u32, name: &[u8]) -> Result<()> {
        self.require_dir(dir_ino)?;
        if name.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "Empty name"));
        }
        if name.len() > NAME_MAX {
            return Err(Error::new(ErrorKind::NameTooLong, "Name exceeds NAME_MAX"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_cold_name_match() {
        let exts = ["mp4".to_string(), "jpg".to_string()];
        assert!(is_cold_name(&exts, b"movie.mp4"));
        assert!(is_cold_name(&exts, b"PHOTO.JPG"));
        assert!(is_cold_name(&exts, b"a.b.mp4"));
        // 点号前必须有字符
        assert!(!is_cold_name(&exts, b".mp4"));
        assert!(!is_cold_name(&exts, b"mp4"));
        assert!(!is_cold_name(&exts, b"movie.mp3"));
    }
}
