//! inode 记录与内存 inode 表
//!
//! 命名空间层持有的 inode 规范记录。其他组件一律持 inode 编号，
//! 通过 [`InodeTable`] 重新解析，不保留跨操作的引用。
//!
//! f2fs 中 inode 的状态位是 `FI_*` 位掩码；这里按命名字段展开，
//! 每个字段在单次操作内都只有一个写者。

/// inode 生命周期管理（分配、初始化、失败回收）
pub mod new;

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
    lock::InodeSem,
};
use alloc::collections::BTreeMap;

/// inode 种类
///
/// 对应 f2fs 按 inode 类型挂接不同 operation table 的做法
/// （file/dir/symlink/encrypted symlink/special），这里以封闭的
/// 标签变体表达，操作层按标签分派。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    /// 普通文件
    Regular,
    /// 目录
    Directory,
    /// 符号链接
    Symlink,
    /// 加密符号链接
    EncryptedSymlink,
    /// 特殊文件（设备、FIFO、socket、whiteout 标记）
    Special {
        /// 目录项文件类型标签（FT_CHRDEV 等）
        ftype: u8,
        /// 设备号
        rdev: u32,
    },
}

impl InodeKind {
    /// 目录项中的文件类型标签
    pub fn file_type(&self) -> u8 {
        match self {
            InodeKind::Regular => FT_REG_FILE,
            InodeKind::Directory => FT_DIR,
            InodeKind::Symlink | InodeKind::EncryptedSymlink => FT_SYMLINK,
            InodeKind::Special { ftype, .. } => *ftype,
        }
    }

    /// 是否可以继承加密上下文
    ///
    /// 对应 f2fs 的 `f2fs_may_encrypt()`：普通文件、目录与符号
    /// 链接可加密，特殊文件不可。
    pub fn may_encrypt(&self) -> bool {
        matches!(
            self,
            InodeKind::Regular | InodeKind::Directory | InodeKind::Symlink | InodeKind::EncryptedSymlink
        )
    }
}

/// inode 记录（命名空间相关字段）
#[derive(Debug, Clone)]
pub struct InodeRec {
    /// inode 编号
    pub ino: u32,
    /// 种类
    pub kind: InodeKind,
    /// 权限位
    pub perm: u16,
    /// 属主
    pub uid: u32,
    /// 属组
    pub gid: u32,
    /// 硬链接计数
    pub nlink: u32,
    /// 父目录提示；rename 后失效置 None
    ///
    /// 对应 f2fs 的 `i_pino` 与 `file_lost_pino()`
    pub pino: Option<u32>,
    /// 代数，单调递增
    pub generation: u32,
    /// 数据长度（目录数据 / 符号链接负载）
    pub size: u64,
    /// 访问时间
    pub atime: u64,
    /// 变更时间
    pub ctime: u64,
    /// 修改时间
    pub mtime: u64,
    /// 加密上下文密钥标识
    pub crypto_ctx: Option<u64>,

    // ===== 状态字段（f2fs 的 FI_* / i_state 位按命名字段展开）=====
    /// 小文件数据可内联。写者：inode 创建
    pub inline_data: bool,
    /// 目录项可内联。写者：inode 创建
    pub inline_dentry: bool,
    /// "."/".." 仅有内联占位，尚未物化。写者：创建置位，点目录项恢复清除
    pub inline_dots: bool,
    /// 链接计数预增挂起（add_link 失败时据此回滚）。写者：link/mkdir
    pub inc_link: bool,
    /// inode 回收时需把 nid 归还分配池。写者：创建失败路径
    pub free_nid: bool,
    /// 允许给零链接 inode 建立一条链接（whiteout 专用瞬态标志）。写者：rename
    pub linkable: bool,
    /// 冷数据分类。写者：create 扩展名匹配
    pub cold: bool,
    /// 目录项名称已加密。写者：rename 传播
    pub enc_name: bool,
    /// 待持久化。写者：任何修改方
    pub dirty: bool,
    /// 已损坏，禁止继续使用。写者：创建失败路径
    pub bad: bool,
    /// 目录名称比较大小写折叠。写者：创建继承 / lookup 传播
    pub casefold: bool,

    /// 字段级互斥锁（nlink/pino 修改时持有）
    pub sem: InodeSem,
}

impl InodeRec {
    /// 是否为目录
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    /// 是否为符号链接（含加密）
    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, InodeKind::Symlink | InodeKind::EncryptedSymlink)
    }

    /// 是否带加密上下文
    ///
    /// 对应 f2fs 的 `f2fs_encrypted_inode()`
    pub fn is_encrypted(&self) -> bool {
        self.crypto_ctx.is_some()
    }

    /// 增加链接计数
    pub fn inc_nlink(&mut self) {
        self.nlink = self.nlink.saturating_add(1);
        self.dirty = true;
    }

    /// 减少链接计数
    ///
    /// 对应内核的 `drop_nlink()`；减到 0 以下视为结构损坏。
    pub fn drop_nlink(&mut self) -> Result<()> {
        if self.nlink == 0 {
            return Err(Error::new(ErrorKind::Corrupted, "Inode nlink underflow"));
        }
        self.nlink -= 1;
        self.dirty = true;
        Ok(())
    }

    /// rename 之后父目录提示失效
    ///
    /// 对应 f2fs 的 `file_lost_pino()`
    pub fn lost_pino(&mut self) {
        self.pino = None;
        self.dirty = true;
    }

    /// 目录数据占用的块数
    pub fn dir_blocks(&self) -> u32 {
        self.size.div_ceil(crate::consts::DENTRY_BLOCK_PAYLOAD as u64) as u32
    }
}

/// 子 inode 的加密上下文是否与父目录一致
///
/// 对应 f2fs 的 `f2fs_is_child_context_consistent_with_parent()`：
/// 父目录未加密时任意子节点一致；父目录加密时要求子节点持有
/// 相同上下文（不可加密的特殊文件视为一致）。
pub fn context_consistent(parent: &InodeRec, child: &InodeRec) -> bool {
    match parent.crypto_ctx {
        None => true,
        Some(ctx) => {
            if !child.kind.may_encrypt() {
                return true;
            }
            child.crypto_ctx == Some(ctx)
        }
    }
}

/// 内存 inode 表
///
/// inode 记录的唯一属主；id 冲突在插入时即报错。
#[derive(Default)]
pub struct InodeTable {
    map: BTreeMap<u32, InodeRec>,
}

impl InodeTable {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入新记录
    ///
    /// 对应内核的 `insert_inode_locked()`：编号冲突是致命错误。
    pub fn insert(&mut self, rec: InodeRec) -> Result<()> {
        if self.map.contains_key(&rec.ino) {
            return Err(Error::new(ErrorKind::AlreadyExists, "Inode number collision"));
        }
        self.map.insert(rec.ino, rec);
        Ok(())
    }

    /// 解析 inode 编号
    pub fn get(&self, ino: u32) -> Result<&InodeRec> {
        self.map
            .get(&ino)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "No such inode"))
    }

    /// 解析 inode 编号（可变）
    pub fn get_mut(&mut self, ino: u32) -> Result<&mut InodeRec> {
        self.map
            .get_mut(&ino)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, "No such inode"))
    }

    /// 摘除记录（inode 回收）
    pub fn remove(&mut self, ino: u32) -> Option<InodeRec> {
        self.map.remove(&ino)
    }

    /// 编号是否在表中
    pub fn contains(&self, ino: u32) -> bool {
        self.map.contains_key(&ino)
    }

    /// 表中的记录数
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// 表是否为空
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(ino: u32, kind: InodeKind) -> InodeRec {
        InodeRec {
            ino,
            kind,
            perm: 0o644,
            uid: 0,
            gid: 0,
            nlink: 1,
            pino: None,
            generation: 1,
            size: 0,
            atime: 0,
            ctime: 0,
            mtime: 0,
            crypto_ctx: None,
            inline_data: false,
            inline_dentry: false,
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
    fn test_table_collision() {
        let mut table = InodeTable::new();
        table.insert(dummy(5, InodeKind::Regular)).unwrap();
        assert_eq!(
            table.insert(dummy(5, InodeKind::Regular)).unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_nlink_underflow_is_corruption() {
        let mut rec = dummy(5, InodeKind::Regular);
        rec.nlink = 0;
        assert_eq!(rec.drop_nlink().unwrap_err().kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_context_consistency() {
        let mut parent = dummy(2, InodeKind::Directory);
        let mut child = dummy(3, InodeKind::Regular);

        // 未加密父目录：总是一致
        assert!(context_consistent(&parent, &child));

        parent.crypto_ctx = Some(0x5eed);
        assert!(!context_consistent(&parent, &child));

        child.crypto_ctx = parent.crypto_ctx;
        assert!(context_consistent(&parent, &child));

        // 不可加密的特殊文件视为一致
        let dev = dummy(4, InodeKind::Special { ftype: FT_CHRDEV, rdev: 0 });
        assert!(context_consistent(&parent, &dev));
    }

    #[test]
    fn test_file_type_tags() {
        assert_eq!(InodeKind::Directory.file_type(), FT_DIR);
        assert_eq!(InodeKind::EncryptedSymlink.file_type(), FT_SYMLINK);
        assert_eq!(
            InodeKind::Special { ftype: FT_FIFO, rdev: 0 }.file_type(),
            FT_FIFO
        );
    }
}
