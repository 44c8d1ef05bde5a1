//! 外部协作者能力接口
//!
//! 命名空间层只负责目录项/inode 的状态迁移逻辑，以下能力由外部子系统
//! 提供（对应 f2fs 中的 node/checkpoint/crypto 子系统）：
//!
//! - [`MetaIo`] - 按 (inode, 逻辑块号) 读写固定大小的元数据块
//! - [`NidPool`] - inode 编号分配位图
//! - [`FnameCrypto`] - 文件名/符号链接加密服务
//! - [`Checkpoint`] - 检查点刷写与后台均衡信号
//!
//! crate 内附带一组内存实现（`Mem*`），用于测试与宿主环境。

use crate::{
    consts::BLOCK_SIZE,
    error::{Error, ErrorKind, Result},
};
use alloc::{collections::BTreeMap, vec, vec::Vec};

/// 元数据块 I/O 能力
///
/// 块按 `(ino, 逻辑块号)` 寻址，大小固定为 [`BLOCK_SIZE`]。
/// 读取尚未写入过的块返回全零数据。
pub trait MetaIo {
    /// 读取一个元数据块到 `buf`（长度必须为 BLOCK_SIZE）
    fn read_meta(&mut self, ino: u32, blk: u32, buf: &mut [u8]) -> Result<()>;

    /// 写入一个元数据块（长度必须为 BLOCK_SIZE）
    fn write_meta(&mut self, ino: u32, blk: u32, data: &[u8]) -> Result<()>;

    /// 丢弃某个 inode 的全部元数据块（inode 回收时调用）
    fn discard_meta(&mut self, ino: u32) -> Result<()>;
}

/// inode 编号分配池能力
///
/// 对应 f2fs 的 `alloc_nid()/alloc_nid_done()/alloc_nid_failed()`。
/// 三段式协议：先预留，成功接入命名空间后提交，失败则归还。
pub trait NidPool {
    /// 预留一个空闲编号；池耗尽返回 None
    fn alloc_nid(&mut self) -> Option<u32>;

    /// 提交预留（编号正式被占用）
    fn alloc_nid_done(&mut self, nid: u32);

    /// 放弃预留，编号回到空闲池
    fn alloc_nid_failed(&mut self, nid: u32);

    /// 释放一个已提交的编号（inode 回收时调用）
    fn free_nid(&mut self, nid: u32);
}

/// 文件名加密服务能力
///
/// 上下文以 `u64` 密钥标识传递；内部算法不属于本层。
pub trait FnameCrypto {
    /// 明文 -> 密文（符号链接目标、文件名）
    fn encode(&self, ctx: u64, plain: &[u8]) -> Result<Vec<u8>>;

    /// 密文 -> 明文
    fn decode(&self, ctx: u64, cipher: &[u8]) -> Result<Vec<u8>>;
}

/// 检查点 / 持久化策略能力
///
/// 对应 f2fs 的 `f2fs_sync_fs()` 与 `f2fs_balance_fs()`。
pub trait Checkpoint {
    /// 同步刷写（目录 dir_sync 策略触发）
    fn sync_fs(&mut self) -> Result<()>;

    /// 后台均衡信号，仅为建议，不影响正确性
    fn balance_fs(&mut self) {}

    /// 当前时间戳（UNIX 秒）；无时钟的环境返回 0
    fn now(&self) -> u64 {
        0
    }
}

/// 全部外部能力的汇总 trait
///
/// 命名空间对象以单个泛型参数携带全部协作者，避免四个泛型
/// 参数在签名里层层透传。
pub trait Hal: MetaIo + NidPool + FnameCrypto + Checkpoint {}

impl<T: MetaIo + NidPool + FnameCrypto + Checkpoint> Hal for T {}

// ===== 内存实现 =====

/// 内存元数据存储
///
/// 用 BTreeMap 模拟块存储，读未写过的块返回全零。
#[derive(Default)]
pub struct MemMetaIo {
    blocks: BTreeMap<(u32, u32), Vec<u8>>,
    /// 置位后 `discard_meta` 报 I/O 错误（测试故障注入用）
    pub fail_discard: bool,
}

impl MemMetaIo {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前持有的块数（测试用）
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl MetaIo for MemMetaIo {
    fn read_meta(&mut self, ino: u32, blk: u32, buf: &mut [u8]) -> Result<()> {
        if buf.len() != BLOCK_SIZE {
            return Err(Error::new(ErrorKind::InvalidInput, "Meta buffer size mismatch"));
        }
        match self.blocks.get(&(ino, blk)) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_meta(&mut self, ino: u32, blk: u32, data: &[u8]) -> Result<()> {
        if data.len() != BLOCK_SIZE {
            return Err(Error::new(ErrorKind::InvalidInput, "Meta buffer size mismatch"));
        }
        self.blocks.insert((ino, blk), data.to_vec());
        Ok(())
    }

    fn discard_meta(&mut self, ino: u32) -> Result<()> {
        if self.fail_discard {
            return Err(Error::new(ErrorKind::Io, "Discard failed"));
        }
        self.blocks.retain(|&(owner, _), _| owner != ino);
        Ok(())
    }
}

/// 内存 nid 分配池
///
/// 顺序分配加空闲链表，跟踪预留态用于泄漏检查。
pub struct MemNidPool {
    next: u32,
    limit: u32,
    free: Vec<u32>,
    reserved: Vec<u32>,
}

impl MemNidPool {
    /// 创建分配池，编号区间为 `[first, first + capacity)`
    pub fn new(first: u32, capacity: u32) -> Self {
        Self {
            next: first,
            limit: first.saturating_add(capacity),
            free: Vec::new(),
            reserved: Vec::new(),
        }
    }

    /// 当前处于预留态的编号数（测试用，可验证无泄漏）
    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }
}

impl NidPool for MemNidPool {
    fn alloc_nid(&mut self) -> Option<u32> {
        let nid = if let Some(nid) = self.free.pop() {
            nid
        } else if self.next < self.limit {
            let nid = self.next;
            self.next += 1;
            nid
        } else {
            return None;
        };
        self.reserved.push(nid);
        Some(nid)
    }

    fn alloc_nid_done(&mut self, nid: u32) {
        self.reserved.retain(|&n| n != nid);
    }

    fn alloc_nid_failed(&mut self, nid: u32) {
        self.reserved.retain(|&n| n != nid);
        self.free.push(nid);
    }

    fn free_nid(&mut self, nid: u32) {
        self.free.push(nid);
    }
}

/// 测试用可逆"加密"：按密钥字节异或
///
/// 仅用于验证调用路径；真实实现由外部加密服务提供。
pub struct XorCrypto;

impl FnameCrypto for XorCrypto {
    fn encode(&self, ctx: u64, plain: &[u8]) -> Result<Vec<u8>> {
        let key = ctx.to_le_bytes();
        Ok(plain
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % 8])
            .collect())
    }

    fn decode(&self, ctx: u64, cipher: &[u8]) -> Result<Vec<u8>> {
        self.encode(ctx, cipher)
    }
}

/// 空检查点实现
///
/// `sync_fs` 计数但不做任何事，测试可据此断言 dir_sync 策略生效。
#[derive(Default)]
pub struct NoopCheckpoint {
    sync_count: u32,
    balance_count: u32,
}

impl NoopCheckpoint {
    /// 创建空实现
    pub fn new() -> Self {
        Self::default()
    }

    /// 已触发的同步刷写次数
    pub fn sync_count(&self) -> u32 {
        self.sync_count
    }

    /// 已触发的均衡信号次数
    pub fn balance_count(&self) -> u32 {
        self.balance_count
    }
}

impl Checkpoint for NoopCheckpoint {
    fn sync_fs(&mut self) -> Result<()> {
        self.sync_count += 1;
        Ok(())
    }

    fn balance_fs(&mut self) {
        self.balance_count += 1;
    }
}

/// 内存 HAL 组合
///
/// 把全部内存实现打包为一个 [`Hal`]，测试与宿主环境直接可用。
pub struct MemHal {
    /// 元数据存储
    pub meta: MemMetaIo,
    /// nid 分配池
    pub pool: MemNidPool,
    /// 加密服务
    pub crypto: XorCrypto,
    /// 检查点
    pub checkpoint: NoopCheckpoint,
    /// 固定时钟（测试可设）
    pub clock: u64,
}

impl MemHal {
    /// 创建默认组合（nid 从根 inode 之后开始分配）
    pub fn new() -> Self {
        Self {
            meta: MemMetaIo::new(),
            pool: MemNidPool::new(crate::consts::ROOT_INO + 1, 1 << 16),
            crypto: XorCrypto,
            checkpoint: NoopCheckpoint::new(),
            clock: 0,
        }
    }
}

impl Default for MemHal {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaIo for MemHal {
    fn read_meta(&mut self, ino: u32, blk: u32, buf: &mut [u8]) -> Result<()> {
        self.meta.read_meta(ino, blk, buf)
    }

    fn write_meta(&mut self, ino: u32, blk: u32, data: &[u8]) -> Result<()> {
        self.meta.write_meta(ino, blk, data)
    }

    fn discard_meta(&mut self, ino: u32) -> Result<()> {
        self.meta.discard_meta(ino)
    }
}

impl NidPool for MemHal {
    fn alloc_nid(&mut self) -> Option<u32> {
        self.pool.alloc_nid()
    }

    fn alloc_nid_done(&mut self, nid: u32) {
        self.pool.alloc_nid_done(nid)
    }

    fn alloc_nid_failed(&mut self, nid: u32) {
        self.pool.alloc_nid_failed(nid)
    }

    fn free_nid(&mut self, nid: u32) {
        self.pool.free_nid(nid)
    }
}

impl FnameCrypto for MemHal {
    fn encode(&self, ctx: u64, plain: &[u8]) -> Result<Vec<u8>> {
        self.crypto.encode(ctx, plain)
    }

    fn decode(&self, ctx: u64, cipher: &[u8]) -> Result<Vec<u8>> {
        self.crypto.decode(ctx, cipher)
    }
}

impl Checkpoint for MemHal {
    fn sync_fs(&mut self) -> Result<()> {
        self.checkpoint.sync_fs()
    }

    fn balance_fs(&mut self) {
        self.checkpoint.balance_fs()
    }

    fn now(&self) -> u64 {
        self.clock
    }
}
