//! 磁盘数据结构定义
//!
//! 目录项与加密符号链接负载的磁盘编码。
//!
//! 目录项磁盘布局（小端）：
//!
//! ```text
//! +--------+--------+-----------+----------+----------+-------+
//! | ino u32| hash u32| file_type | name_len | name ... | pad   |
//! +--------+--------+-----------+----------+----------+-------+
//! ```
//!
//! 整条记录按 4 字节对齐；`ino == 0` 表示已删除的槽位（name_len
//! 保留用于跳过），`name_len == 0` 表示块内有效区域结束。

use crate::{
    consts::*,
    error::{Error, ErrorKind, Result},
};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 单条目录项的磁盘记录
///
/// 对应 f2fs 的 `struct f2fs_dir_entry`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDentry {
    /// 目标 inode 编号
    pub ino: u32,
    /// 预计算的名称哈希
    pub hash: u32,
    /// 文件类型标签（FT_* 常量）
    pub file_type: u8,
    /// 名称字节
    pub name: Vec<u8>,
}

impl RawDentry {
    /// 计算记录编码后占用的字节数（4 字节对齐）
    pub fn encoded_len(name_len: usize) -> usize {
        (DENTRY_HEADER_LEN + name_len + 3) & !3
    }

    /// 本记录占用的字节数
    pub fn rec_len(&self) -> usize {
        Self::encoded_len(self.name.len())
    }

    /// 把记录编码到 `buf[offset..]`
    ///
    /// 调用方保证空间足够；填充字节写 0。
    pub fn encode(&self, buf: &mut [u8], offset: usize) -> Result<()> {
        let rec_len = self.rec_len();
        if self.name.is_empty() || self.name.len() > NAME_MAX {
            return Err(Error::new(ErrorKind::InvalidInput, "Invalid dentry name length"));
        }
        if offset + rec_len > buf.len() {
            return Err(Error::new(ErrorKind::NoSpace, "Dentry does not fit in block"));
        }

        let rec = &mut buf[offset..offset + rec_len];
        LittleEndian::write_u32(&mut rec[0..4], self.ino);
        LittleEndian::write_u32(&mut rec[4..8], self.hash);
        rec[8] = self.file_type;
        rec[9] = self.name.len() as u8;
        rec[DENTRY_HEADER_LEN..DENTRY_HEADER_LEN + self.name.len()].copy_from_slice(&self.name);
        for b in rec[DENTRY_HEADER_LEN + self.name.len()..].iter_mut() {
            *b = 0;
        }
        Ok(())
    }

    /// 从 `buf[offset..]` 解码一条记录
    ///
    /// 返回 `(记录, 记录长度)`；`name_len == 0` 视为块结束，返回 None。
    pub fn decode(buf: &[u8], offset: usize) -> Result<Option<(RawDentry, usize)>> {
        if offset + DENTRY_HEADER_LEN > buf.len() {
            return Ok(None);
        }

        let rec = &buf[offset..];
        let name_len = rec[9] as usize;
        if name_len == 0 {
            return Ok(None);
        }

        let rec_len = Self::encoded_len(name_len);
        if offset + rec_len > buf.len() {
            return Err(Error::new(
                ErrorKind::Corrupted,
                "Dentry name extends beyond block",
            ));
        }

        Ok(Some((
            RawDentry {
                ino: LittleEndian::read_u32(&rec[0..4]),
                hash: LittleEndian::read_u32(&rec[4..8]),
                file_type: rec[8],
                name: rec[DENTRY_HEADER_LEN..DENTRY_HEADER_LEN + name_len].to_vec(),
            },
            rec_len,
        )))
    }
}

/// 编码加密符号链接负载
///
/// 对应 f2fs 的 `struct f2fs_encrypted_symlink_data`：
/// `{len: u16 小端, 加密路径字节}`。长度 0 保留表示损坏的符号链接。
pub fn encode_enc_symlink(cipher: &[u8]) -> Result<Vec<u8>> {
    if cipher.is_empty() || cipher.len() > u16::MAX as usize {
        return Err(Error::new(ErrorKind::InvalidInput, "Invalid encrypted symlink length"));
    }
    let mut out = Vec::with_capacity(ENC_SYMLINK_HEADER_LEN + cipher.len());
    out.extend_from_slice(&(cipher.len() as u16).to_le_bytes());
    out.extend_from_slice(cipher);
    Ok(out)
}

/// 解码加密符号链接负载
///
/// 长度为 0 表示损坏的符号链接，按 `NotFound` 上报。
pub fn decode_enc_symlink(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() < ENC_SYMLINK_HEADER_LEN {
        return Err(Error::new(ErrorKind::Corrupted, "Encrypted symlink payload truncated"));
    }
    let len = LittleEndian::read_u16(&raw[0..2]) as usize;
    if len == 0 {
        return Err(Error::new(ErrorKind::NotFound, "Broken symlink"));
    }
    if ENC_SYMLINK_HEADER_LEN + len > raw.len() {
        return Err(Error::new(ErrorKind::Corrupted, "Encrypted symlink length mismatch"));
    }
    Ok(raw[ENC_SYMLINK_HEADER_LEN..ENC_SYMLINK_HEADER_LEN + len].to_vec())
}
