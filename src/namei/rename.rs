//! 普通 rename（含 NOREPLACE 与 WHITEOUT 变体）
//!
//! 对应 f2fs 的 `f2fs_rename()`。序列要点：whiteout inode 在进入
//! 写序列化段之前用自己的段造好；覆盖路径先取 orphan 配额再重定
//! 向条目；新条目确立之后才摘旧条目，任何一步失败时已经创建的
//! whiteout 保持 orphan 登记，由回收路径清理。

use super::RenameFlags;
use crate::{
    consts::FT_DIR,
    dentry::store,
    error::{Error, ErrorKind, Result},
    fs::Namespace,
    hal::Hal,
    inode::context_consistent,
};

impl<H: Hal> Namespace<H> {
    pub(crate) fn do_rename(
        &mut self,
        old_dir: u32,
        old_name: &[u8],
        new_dir: u32,
        new_name: &[u8],
        flags: RenameFlags,
    ) -> Result<()> {
        self.require_dir(old_dir)?;
        self.check_new_name(new_dir, new_name)?;

        let old_found = {
            let dir = self.itable.get(old_dir)?;
            store::find_entry(&mut self.hal, &mut self.cache, dir, old_name)?
                .ok_or_else(|| Error::new(ErrorKind::NotFound, "Source entry missing"))?
        };
        let old_ino = old_found.dentry.ino;
        let old_ftype = old_found.dentry.file_type;
        let old_is_dir = self.itable.get(old_ino)?.is_dir();

        // 跨目录移入加密目录要求上下文一致
        if old_dir != new_dir {
            let ndir = self.itable.get(new_dir)?;
            let old_rec = self.itable.get(old_ino)?;
            if ndir.is_encrypted() && !context_consistent(ndir, old_rec) {
                return Err(Error::new(
                    ErrorKind::PermissionDenied,
                    "Crossing encryption contexts",
                ));
            }
        }

        self.hal.balance_fs();

        // 目录作为源时先确认其 ".." 可解析，解析不出即结构损坏
        if old_is_dir {
            let rec = self.itable.get(old_ino)?;
            store::parent_ino(&mut self.hal, &mut self.cache, rec)?;
        }

        let new_found = {
            let dir = self.itable.get(new_dir)?;
            store::find_entry(&mut self.hal, &mut self.cache, dir, new_name)?
        };

        if let Some(nf) = &new_found {
            if nf.dentry.ino == old_ino {
                // 新旧解析到同一文件：POSIX 规定成功且不做任何事
                return Ok(());
            }
            if flags.contains(RenameFlags::NOREPLACE) {
                return Err(Error::new(ErrorKind::AlreadyExists, "Destination exists"));
            }
            let new_rec = self.itable.get(nf.dentry.ino)?;
            let new_is_dir = new_rec.is_dir();
            if old_is_dir != new_is_dir {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Directory/non-directory type mismatch",
                ));
            }
            if new_is_dir && !store::is_empty_dir(&mut self.hal, &mut self.cache, new_rec)? {
                return Err(Error::new(ErrorKind::NotEmpty, "Destination not empty"));
            }
        }

        // whiteout inode 先造好（带自己的序列化段）
        let whiteout = if flags.contains(RenameFlags::WHITEOUT) {
            Some(self.create_whiteout(old_dir)?)
        } else {
            None
        };

        let now = self.now();
        let guard = self.op_lock.lock_op()?;

        // 跨目录移动的目录：物化点目录项并定位 ".."
        let old_dotdot = if old_is_dir && old_dir != new_dir {
            {
                let rec = self.itable.get_mut(old_ino)?;
                if rec.inline_dots {
                    store::recover_dot_entries(&mut self.hal, &mut self.cache, rec, old_dir, now)?;
                }
            }
            let rec = self.itable.get(old_ino)?;
            let found = store::find_entry(&mut self.hal, &mut self.cache, rec, b"..")?
                .ok_or_else(|| Error::new(ErrorKind::Io, "Directory missing '..' entry"))?;
            Some(found.locator)
        } else {
            None
        };

        match &new_found {
            // 覆盖：重定向既有条目，被覆盖者走 orphan 流程
            Some(nf) => {
                let new_ino = nf.dentry.ino;
                let token = self.orphans.acquire()?;
                {
                    let dir = self.itable.get_mut(new_dir)?;
                    if let Err(err) = store::set_link(
                        &mut self.hal,
                        &mut self.cache,
                        dir,
                        &nf.locator,
                        old_ino,
                        old_ftype,
                        now,
                    ) {
                        self.orphans.release(token);
                        return Err(err);
                    }
                }
                let nlink = match self.with_inode_locked(new_ino, |rec| {
                    rec.drop_nlink()?;
                    if rec.is_dir() {
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
                        return Err(err);
                    }
                };
                if nlink == 0 {
                    self.orphans.register(token, new_ino);
                } else {
                    self.orphans.release(token);
                }
            }
            // 新位置空缺：插入指向源的条目
            None => {
                self.add_link_impl(new_dir, new_name, old_ino)?;
                if old_is_dir {
                    let dir = self.itable.get_mut(new_dir)?;
                    dir.inc_nlink();
                    dir.dirty = true;
                }
            }
        }

        // 源 inode 元数据：pino 与加密名标志
        let new_enc = match &new_found {
            Some(nf) => self.itable.get(nf.dentry.ino).map(|r| r.enc_name).unwrap_or(false),
            None => false,
        };
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

        // 摘除旧条目；父目录计数由下方统一调整
        {
            let dir = self.itable.get_mut(old_dir)?;
            store::delete_entry(&mut self.hal, &mut self.cache, dir, &old_found.locator, false, now)?;
        }

        // whiteout 顶替源位置，恰好持有一条链接
        if let Some(wo) = whiteout {
            self.with_inode_locked(wo, |rec| {
                rec.linkable = true;
                rec.inc_link = true;
                Ok(())
            })?;
            self.add_link_impl(old_dir, old_name, wo)?;
            self.with_inode_locked(wo, |rec| {
                rec.linkable = false;
                Ok(())
            })?;
        }

        if old_is_dir {
            // ".." 指向新父目录
            if let Some(loc) = &old_dotdot {
                let rec = self.itable.get_mut(old_ino)?;
                store::set_link(&mut self.hal, &mut self.cache, rec, loc, new_dir, FT_DIR, now)?;
            }
            // 与插入路径的 inc 配对：源目录的 ".." 不再指向旧父
            let dir = self.itable.get_mut(old_dir)?;
            dir.drop_nlink()?;
            dir.dirty = true;
        }

        drop(guard);
        self.dir_sync_after(old_dir)?;
        if new_dir != old_dir {
            self.dir_sync_after(new_dir)?;
        }
        log::debug!(
            "[NAMEI] rename ino={} dir {}->{} overwrite={}",
            old_ino,
            old_dir,
            new_dir,
            new_found.is_some()
        );
        Ok(())
    }
}
