//! 硬链接与删除：link/unlink/rmdir
//!
//! 对应 f2fs 的 `f2fs_link()/f2fs_unlink()/f2fs_rmdir()`。unlink
//! 的要点是先取 orphan 配额再动目录项：配额不足时直接失败，目录
//! 保持原样；删除成功后按链接计数归零与否决定登记还是退还。

use crate::{
    dentry::store,
    error::{Error, ErrorKind, Result},
    fs::Namespace,
    hal::Hal,
    inode::context_consistent,
};

impl<H: Hal> Namespace<H> {
    /// 为既有 inode 建立硬链接
    ///
    /// 对应 f2fs 的 `f2fs_link()`：与新建目录共用 `inc_link` 预增
    /// 机制，插入失败时清标志回退，计数不变。
    pub fn link(&mut self, old_ino: u32, dir_ino: u32, name: &[u8]) -> Result<()> {
        self.check_new_name(dir_ino, name)?;
        {
            let old = self.itable.get(old_ino)?;
            if old.is_dir() {
                return Err(Error::new(ErrorKind::InvalidInput, "Hard link to directory"));
            }
            let dir = self.itable.get(dir_ino)?;
            if dir.is_encrypted() && !context_consistent(dir, old) {
                return Err(Error::new(
                    ErrorKind::PermissionDenied,
                    "Crossing encryption contexts",
                ));
            }
            if old.nlink >= self.cfg.link_max {
                return Err(Error::new(ErrorKind::TooManyLinks, "Link count at ceiling"));
            }
        }
        self.hal.balance_fs();

        let now = self.now();
        self.with_inode_locked(old_ino, |rec| {
            rec.inc_link = true;
            rec.ctime = now;
            Ok(())
        })?;

        let guard = self.op_lock.lock_op()?;
        if let Err(err) = self.add_link_impl(dir_ino, name, old_ino) {
            drop(guard);
            let _ = self.with_inode_locked(old_ino, |rec| {
                rec.inc_link = false;
                Ok(())
            });
            return Err(err);
        }
        drop(guard);
        self.dir_sync_after(dir_ino)
    }

    /// 删除目录项
    ///
    /// 对应 f2fs 的 `f2fs_unlink()`。目标是仍被别处引用的硬链接时
    /// 仅摘条目；计数归零则进入 orphan 注册表等待回收。
    pub fn unlink(&mut self, dir_ino: u32, name: &[u8]) -> Result<()> {
        self.require_dir(dir_ino)?;
        self.hal.balance_fs();

        let found = {
            let dir = self.itable.get(dir_ino)?;
            store::find_entry(&mut self.hal, &mut self.cache, dir, name)?
                .ok_or_else(|| Error::new(ErrorKind::NotFound, "No such entry"))?
        };
        let victim = found.dentry.ino;
        let victim_is_dir = self.itable.get(victim)?.is_dir();
        let now = self.now();

        let guard = self.op_lock.lock_op()?;
        // 配额先行：取不到 orphan 槽位就不动目录
        let token = match self.orphans.acquire() {
            Ok(token) => token,
            Err(err) => {
                drop(guard);
                return Err(err);
            }
        };

        {
            let dir = self.itable.get_mut(dir_ino)?;
            if let Err(err) = store::delete_entry(
                &mut self.hal,
                &mut self.cache,
                dir,
                &found.locator,
                victim_is_dir,
                now,
            ) {
                self.orphans.release(token);
                drop(guard);
                return Err(err);
            }
        }

        // 目录自身的 "." 随条目一起失效，计数多降一次
        let nlink = match self.with_inode_locked(victim, |rec| {
            rec.drop_nlink()?;
            if victim_is_dir {
                rec.drop_nlink()?;
                rec.size = 0;
            }
            rec.ctime = now;
            rec.dirty = true;
            Ok(rec.nlink)
        }) {
            Ok(nlink) => nlink,
            Err(err) => {
                self.orphans.release(token);
                drop(guard);
                return Err(err);
            }
        };

        if nlink == 0 {
            self.orphans.register(token, victim);
            log::debug!("[ORPHAN] ino={} unlinked to zero", victim);
        } else {
            self.orphans.release(token);
        }
        drop(guard);
        self.dir_sync_after(dir_ino)
    }

    /// 删除空目录
    ///
    /// 对应 f2fs 的 `f2fs_rmdir()`：仅比 unlink 多一道空目录校验，
    /// 点目录项不算内容。
    pub fn rmdir(&mut self, dir_ino: u32, name: &[u8]) -> Result<()> {
        self.require_dir(dir_ino)?;
        let victim = {
            let dir = self.itable.get(dir_ino)?;
            store::find_entry(&mut self.hal, &mut self.cache, dir, name)?
                .ok_or_else(|| Error::new(ErrorKind::NotFound, "No such entry"))?
                .dentry
                .ino
        };
        let rec = self.itable.get(victim)?;
        if !rec.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a directory"));
        }
        if !store::is_empty_dir(&mut self.hal, &mut self.cache, rec)? {
            return Err(Error::new(ErrorKind::NotEmpty, "Directory not empty"));
        }
        self.unlink(dir_ino, name)
    }
}
