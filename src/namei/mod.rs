//! 命名空间修改操作引擎
//!
//! create/mkdir/mknod/symlink/tmpfile、link/unlink/rmdir 与两种
//! rename 变体，全部实现为 [`Namespace`] 的 impl 块。每个操作遵循
//! 同一骨架：先做不可变前置检查，再进入写序列化段完成多步修改，
//! 最后按 dir_sync 策略刷写。
//!
//! 对应 f2fs 的 `namei.c`。

mod create;
mod link;
mod rename;
mod exchange;

use crate::{
    error::{Error, ErrorKind, Result},
    fs::Namespace,
    hal::Hal,
};
use bitflags::bitflags;

bitflags! {
    /// rename 行为标志
    ///
    /// 对应 Linux 的 `RENAME_NOREPLACE/RENAME_EXCHANGE/RENAME_WHITEOUT`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenameFlags: u32 {
        /// 目标已存在时失败而不是覆盖
        const NOREPLACE = 1 << 0;
        /// 原子交换两个条目
        const EXCHANGE = 1 << 1;
        /// 源位置留下 whiteout 标记
        const WHITEOUT = 1 << 2;
    }
}

impl<H: Hal> Namespace<H> {
    /// 重命名目录项
    ///
    /// 对应 f2fs 的 `f2fs_rename2()`：校验标志组合后分派到普通
    /// rename 或交换 rename。未识别的标志位报 `InvalidInput`。
    pub fn rename(
        &mut self,
        old_dir: u32,
        old_name: &[u8],
        new_dir: u32,
        new_name: &[u8],
        flags: u32,
    ) -> Result<()> {
        let flags = RenameFlags::from_bits(flags)
            .ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Unknown rename flags"))?;
        if flags.contains(RenameFlags::EXCHANGE) {
            if flags.intersects(RenameFlags::NOREPLACE | RenameFlags::WHITEOUT) {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "EXCHANGE excludes other rename flags",
                ));
            }
            return self.cross_rename(old_dir, old_name, new_dir, new_name);
        }
        self.do_rename(old_dir, old_name, new_dir, new_name, flags)
    }

    /// 校验编号指向目录
    pub(crate) fn require_dir(&self, ino: u32) -> Result<()> {
        let rec = self.itable.get(ino)?;
        if !rec.is_dir() {
            return Err(Error::new(ErrorKind::InvalidInput, "Not a directory"));
        }
        Ok(())
    }
}
