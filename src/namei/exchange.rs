//! 交换 rename（RENAME_EXCHANGE）
//!
//! 对应 f2fs 的 `f2fs_cross_rename()`。两个条目原子互换指向：
//! 链接计数只在"跨目录且恰好一侧是目录"时在两个父目录间挪一个
//! 名额，互换前先按得方父目录的计数上限预检。进段后的条目写入
//! 失败走尽力反向回滚，回滚再失败即宣告 `Corrupted`。

use crate::{
    consts::FT_DIR,
    dentry::store,
    error::{Error, ErrorKind, Result},
    fs::Namespace,
    hal::Hal,
    inode::context_consistent,
};

impl<H: Hal> Namespace<H> {
    pub(crate) fn cross_rename(
        &mut self,
        old_dir: u32,
        old_name: &[u8],
        new_dir: u32,
        new_name: &[u8],
    ) -> Result<()> {
        self.require_dir(old_dir)?;
        self.require_dir(new_dir)?;

        let old_found = {
            let dir = self.itable.get(old_dir)?;
            store::find_entry(&mut self.hal, &mut self.cache, dir, old_name)?
                .ok_or_else(|| Error::new(ErrorKind::NotFound, "Source entry missing"))?
        };
        let new_found = {
            let dir = self.itable.get(new_dir)?;
            store::find_entry(&mut self.hal, &mut self.cache, dir, new_name)?
                .ok_or_else(|| Error::new(ErrorKind::NotFound, "Destination entry missing"))?
        };
        let old_ino = old_found.dentry.ino;
        let new_ino = new_found.dentry.ino;
        if old_ino == new_ino {
            return Ok(());
        }

        // 双向加密上下文检查
        if old_dir != new_dir {
            let odir = self.itable.get(old_dir)?;
            let ndir = self.itable.get(new_dir)?;
            let old_rec = self.itable.get(old_ino)?;
            let new_rec = self.itable.get(new_ino)?;
            if (odir.is_encrypted() || ndir.is_encrypted())
                && (!context_consistent(ndir, old_rec) || !context_consistent(odir, new_rec))
            {
                return Err(Error::new(
                    ErrorKind::PermissionDenied,
                    "Crossing encryption contexts",
                ));
            }
        }

        self.hal.balance_fs();

        let old_is_dir = self.itable.get(old_ino)?.is_dir();
        let new_is_dir = self.itable.get(new_ino)?.is_dir();

        // 跨目录且恰好一侧是目录时，一个目录名额在父目录间转移；
        // 得方父目录先过计数上限
        let (old_delta, new_delta) = if old_dir != new_dir && old_is_dir != new_is_dir {
            if old_is_dir {
                (-1i32, 1i32)
            } else {
                (1, -1)
            }
        } else {
            (0, 0)
        };
        {
            let odir = self.itable.get(old_dir)?;
            let ndir = self.itable.get(new_dir)?;
            if (old_delta > 0 && odir.nlink >= self.cfg.link_max)
                || (new_delta > 0 && ndir.nlink >= self.cfg.link_max)
            {
                return Err(Error::new(ErrorKind::TooManyLinks, "Link count at ceiling"));
            }
        }

        let now = self.now();
        let guard = self.op_lock.lock_op()?;

        // 跨目录的目录侧先物化点目录项并定位 ".."，互换前不留变数
        let old_dotdot = if old_is_dir && old_dir != new_dir {
            Some(self.locate_dotdot(old_ino, old_dir, now)?)
        } else {
            None
        };
        let new_dotdot = if new_is_dir && old_dir != new_dir {
            Some(self.locate_dotdot(new_ino, new_dir, now)?)
        } else {
            None
        };

        // 条目互换；第二笔失败时反向回滚第一笔
        self.redirect_entry(old_dir, &old_found.locator, new_ino, new_found.dentry.file_type, now)?;
        if let Err(err) = self.redirect_entry(
            new_dir,
            &new_found.locator,
            old_ino,
            old_found.dentry.file_type,
            now,
        ) {
            return self.revert_exchange(
                err,
                &[(old_dir, &old_found.locator, old_ino, old_found.dentry.file_type)],
                now,
            );
        }

        // ".." 重定向到新的父目录
        if let Some(loc) = &old_dotdot {
            if let Err(err) = self.redirect_dotdot(old_ino, loc, new_dir, now) {
                return self.revert_exchange(
                    err,
                    &[
                        (new_dir, &new_found.locator, new_ino, new_found.dentry.file_type),
                        (old_dir, &old_found.locator, old_ino, old_found.dentry.file_type),
                    ],
                    now,
                );
            }
        }
        if let Some(loc) = &new_dotdot {
            if let Err(err) = self.redirect_dotdot(new_ino, loc, old_dir, now) {
                return self.revert_exchange(
                    err,
                    &[
                        (new_dir, &new_found.locator, new_ino, new_found.dentry.file_type),
                        (old_dir, &old_found.locator, old_ino, old_found.dentry.file_type),
                    ],
                    now,
                );
            }
        }

        // inode 元数据：双向 pino 与加密名标志互换
        let old_enc = self.itable.get(old_ino)?.enc_name;
        let new_enc = self.itable.get(new_ino)?.enc_name;
        self.with_inode_locked(old_ino, |rec| {
            if rec.is_dir() {
                rec.pino = Some(new_dir);
            } else {
                rec.lost_pino();
            }
            if new_enc {
                rec.enc_name = true;
            }
            rec.ctime = now;
            rec.dirty = true;
            Ok(())
        })?;
        self.with_inode_locked(new_ino, |rec| {
            if rec.is_dir() {
                rec.pino = Some(old_dir);
            } else {
                rec.lost_pino();
            }
            if old_enc {
                rec.enc_name = true;
            }
            rec.ctime = now;
            rec.dirty = true;
            Ok(())
        })?;

        // 父目录计数转移
        if old_delta != 0 {
            let odir = self.itable.get_mut(old_dir)?;
            if old_delta > 0 {
                odir.inc_nlink();
            } else {
                odir.drop_nlink()?;
            }
            odir.ctime = now;
            odir.dirty = true;

            let ndir = self.itable.get_mut(new_dir)?;
            if new_delta > 0 {
                ndir.inc_nlink();
            } else {
                ndir.drop_nlink()?;
            }
            ndir.ctime = now;
            ndir.dirty = true;
        }

        drop(guard);
        self.dir_sync_after(old_dir)?;
        if new_dir != old_dir {
            self.dir_sync_after(new_dir)?;
        }
        log::debug!("[NAMEI] exchange ino {}<->{} dirs {}<->{}", old_ino, new_ino, old_dir, new_dir);
        Ok(())
    }

    /// 物化目录的点目录项并返回 ".." 位置
    fn locate_dotdot(&mut self, dir_ino: u32, parent: u32, now: u64) -> Result<store::EntryLocator> {
        {
            let rec = self.itable.get_mut(dir_ino)?;
            if rec.inline_dots {
                store::recover_dot_entries(&mut self.hal, &mut self.cache, rec, parent, now)?;
            }
        }
        let rec = self.itable.get(dir_ino)?;
        let found = store::find_entry(&mut self.hal, &mut self.cache, rec, b"..")?
            .ok_or_else(|| Error::new(ErrorKind::Io, "Directory missing '..' entry"))?;
        Ok(found.locator)
    }

    /// 重定向一条目录项到新目标
    fn redirect_entry(
        &mut self,
        dir_ino: u32,
        loc: &store::EntryLocator,
        target: u32,
        ftype: u8,
        now: u64,
    ) -> Result<()> {
        let dir = self.itable.get_mut(dir_ino)?;
        store::set_link(&mut self.hal, &mut self.cache, dir, loc, target, ftype, now)
    }

    /// 把目录的 ".." 指向新的父目录
    fn redirect_dotdot(
        &mut self,
        dir_ino: u32,
        loc: &store::EntryLocator,
        parent: u32,
        now: u64,
    ) -> Result<()> {
        let rec = self.itable.get_mut(dir_ino)?;
        store::set_link(&mut self.hal, &mut self.cache, rec, loc, parent, FT_DIR, now)
    }

    /// 尽力撤销已写入的条目重定向；撤销失败升级为 `Corrupted`
    fn revert_exchange(
        &mut self,
        cause: Error,
        undo: &[(u32, &store::EntryLocator, u32, u8)],
        now: u64,
    ) -> Result<()> {
        for (dir_ino, loc, ino, ftype) in undo {
            if self.redirect_entry(*dir_ino, loc, *ino, *ftype, now).is_err() {
                log::error!("[NAMEI] exchange rollback failed, dir={} entry lost", dir_ino);
                return Err(Error::new(
                    ErrorKind::Corrupted,
                    "Exchange rollback failed, namespace inconsistent",
                ));
            }
        }
        Err(cause)
    }
}
