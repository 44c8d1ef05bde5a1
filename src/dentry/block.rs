//! 目录块内的条目扫描、插入与删除
//!
//! 线性布局：记录依次排列，`ino == 0` 为死槽（保留 name_len 以便
//! 跳过），`name_len == 0` 为有效区结束。块尾 4 字节存放净荷的
//! CRC32C，装载时校验、每次修改后重新密封。

use crate::{
    consts::*,
    dentry::hash::names_equal,
    error::{Error, ErrorKind, Result},
    types::RawDentry,
};
use byteorder::{ByteOrder, LittleEndian};

/// 计算并写入块尾校验和
pub fn seal_block(data: &mut [u8]) {
    let crc = crc32fast::hash(&data[..DENTRY_BLOCK_PAYLOAD]);
    LittleEndian::write_u32(&mut data[DENTRY_BLOCK_PAYLOAD..BLOCK_SIZE], crc);
}

/// 校验块尾校验和
///
/// 尚未密封过的全零块视为有效（新分配的目录块）。
pub fn verify_block(data: &[u8]) -> Result<()> {
    let stored = LittleEndian::read_u32(&data[DENTRY_BLOCK_PAYLOAD..BLOCK_SIZE]);
    let computed = crc32fast::hash(&data[..DENTRY_BLOCK_PAYLOAD]);
    if stored == computed {
        return Ok(());
    }
    if stored == 0 && data[..DENTRY_BLOCK_PAYLOAD].iter().all(|&b| b == 0) {
        return Ok(());
    }
    log::error!(
        "[DENT] block checksum mismatch: stored={:#x} computed={:#x}",
        stored,
        computed
    );
    Err(Error::new(ErrorKind::Corrupted, "Dentry block checksum mismatch"))
}

/// 在块内查找名称
///
/// 先按预存哈希快速排除，再按目录比较策略确认。返回
/// `(记录, 块内偏移)`。
pub fn find_in_block(
    data: &[u8],
    name: &[u8],
    hash: u32,
    casefold: bool,
) -> Result<Option<(RawDentry, usize)>> {
    let payload = &data[..DENTRY_BLOCK_PAYLOAD];
    let mut offset = 0;
    while let Some((de, rec_len)) = RawDentry::decode(payload, offset)? {
        if de.ino != NULL_INO && de.hash == hash && names_equal(&de.name, name, casefold) {
            return Ok(Some((de, offset)));
        }
        offset += rec_len;
    }
    Ok(None)
}

/// 向块内插入记录
///
/// 优先复用长度吻合的死槽，否则追加到有效区末尾。放不下返回
/// `Ok(false)`，由调用方转向下一块。
pub fn insert_in_block(data: &mut [u8], de: &RawDentry) -> Result<bool> {
    let needed = de.rec_len();
    let mut offset = 0;

    {
        let payload = &data[..DENTRY_BLOCK_PAYLOAD];
        while let Some((slot, rec_len)) = RawDentry::decode(payload, offset)? {
            // 死槽只在编码长度一致时复用，避免切分槽位
            if slot.ino == NULL_INO && rec_len == needed {
                break;
            }
            offset += rec_len;
        }
    }

    if offset + needed > DENTRY_BLOCK_PAYLOAD {
        return Ok(false);
    }

    de.encode(&mut data[..DENTRY_BLOCK_PAYLOAD], offset)?;
    seal_block(data);
    Ok(true)
}

/// 删除块内指定偏移处的记录
///
/// 只清除 ino 字段，name_len 保留用于后续扫描跳过。
pub fn delete_in_block(data: &mut [u8], offset: usize) -> Result<()> {
    let (de, _) = RawDentry::decode(&data[..DENTRY_BLOCK_PAYLOAD], offset)?
        .ok_or_else(|| Error::new(ErrorKind::Corrupted, "Delete target slot is empty"))?;
    if de.ino == NULL_INO {
        return Err(Error::new(ErrorKind::Corrupted, "Delete target slot already dead"));
    }
    LittleEndian::write_u32(&mut data[offset..offset + 4], NULL_INO);
    seal_block(data);
    Ok(())
}

/// 原地改写记录的目标 inode 与类型
///
/// 对应 f2fs 的 `f2fs_set_link()`：rename 覆写/交换时重定向条目。
pub fn set_link_in_block(data: &mut [u8], offset: usize, ino: u32, file_type: u8) -> Result<()> {
    let (de, _) = RawDentry::decode(&data[..DENTRY_BLOCK_PAYLOAD], offset)?
        .ok_or_else(|| Error::new(ErrorKind::Corrupted, "Set-link target slot is empty"))?;
    if de.ino == NULL_INO {
        return Err(Error::new(ErrorKind::Corrupted, "Set-link target slot is dead"));
    }
    LittleEndian::write_u32(&mut data[offset..offset + 4], ino);
    data[offset + 8] = file_type;
    seal_block(data);
    Ok(())
}

/// 统计块内存活条目数
pub fn count_live(data: &[u8]) -> Result<usize> {
    let payload = &data[..DENTRY_BLOCK_PAYLOAD];
    let mut offset = 0;
    let mut live = 0;
    while let Some((de, rec_len)) = RawDentry::decode(payload, offset)? {
        if de.ino != NULL_INO {
            live += 1;
        }
        offset += rec_len;
    }
    Ok(live)
}

/// 遍历块内存活条目
pub fn for_each_live<F>(data: &[u8], mut f: F) -> Result<()>
where
    F: FnMut(&RawDentry, usize) -> Result<()>,
{
    let payload = &data[..DENTRY_BLOCK_PAYLOAD];
    let mut offset = 0;
    while let Some((de, rec_len)) = RawDentry::decode(payload, offset)? {
        if de.ino != NULL_INO {
            f(&de, offset)?;
        }
        offset += rec_len;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dentry::hash::dentry_hash;
    use alloc::{vec, vec::Vec};

    fn de(name: &[u8], ino: u32) -> RawDentry {
        RawDentry {
            ino,
            hash: dentry_hash(name, false),
            file_type: FT_REG_FILE,
            name: name.to_vec(),
        }
    }

    #[test]
    fn test_insert_find_delete() {
        let mut block = vec![0u8; BLOCK_SIZE];
        assert!(insert_in_block(&mut block, &de(b"alpha", 11)).unwrap());
        assert!(insert_in_block(&mut block, &de(b"beta", 12)).unwrap());
        verify_block(&block).unwrap();

        let hash = dentry_hash(b"beta", false);
        let (found, offset) = find_in_block(&block, b"beta", hash, false).unwrap().unwrap();
        assert_eq!(found.ino, 12);

        delete_in_block(&mut block, offset).unwrap();
        verify_block(&block).unwrap();
        assert!(find_in_block(&block, b"beta", hash, false).unwrap().is_none());
        assert_eq!(count_live(&block).unwrap(), 1);
    }

    #[test]
    fn test_dead_slot_reuse_same_length() {
        let mut block = vec![0u8; BLOCK_SIZE];
        assert!(insert_in_block(&mut block, &de(b"aaaa", 1)).unwrap());
        assert!(insert_in_block(&mut block, &de(b"tail", 2)).unwrap());

        let hash = dentry_hash(b"aaaa", false);
        let (_, offset) = find_in_block(&block, b"aaaa", hash, false).unwrap().unwrap();
        delete_in_block(&mut block, offset).unwrap();

        // 同长度名称应落回原槽位
        assert!(insert_in_block(&mut block, &de(b"bbbb", 3)).unwrap());
        let hash_b = dentry_hash(b"bbbb", false);
        let (_, new_offset) = find_in_block(&block, b"bbbb", hash_b, false).unwrap().unwrap();
        assert_eq!(new_offset, offset);
    }

    #[test]
    fn test_block_overflow_reports_full() {
        let mut block = vec![0u8; BLOCK_SIZE];
        let name = [b'n'; 200];
        let mut inserted = 0u32;
        loop {
            let mut d = de(&name, 100 + inserted);
            // 每条名称都不同，避免同名
            d.name[0] = b'a' + (inserted % 26) as u8;
            d.name[1] = b'a' + ((inserted / 26) % 26) as u8;
            d.hash = dentry_hash(&d.name, false);
            if !insert_in_block(&mut block, &d).unwrap() {
                break;
            }
            inserted += 1;
        }
        assert!(inserted > 0);
        assert_eq!(count_live(&block).unwrap() as u32, inserted);
        verify_block(&block).unwrap();
    }

    #[test]
    fn test_corruption_detected() {
        let mut block = vec![0u8; BLOCK_SIZE];
        assert!(insert_in_block(&mut block, &de(b"file", 9)).unwrap());
        // 翻转净荷中的一个字节
        block[4] ^= 0xff;
        assert_eq!(verify_block(&block).unwrap_err().kind(), ErrorKind::Corrupted);
    }

    #[test]
    fn test_set_link_repoints() {
        let mut block = vec![0u8; BLOCK_SIZE];
        assert!(insert_in_block(&mut block, &de(b"victim", 5)).unwrap());
        let hash = dentry_hash(b"victim", false);
        let (_, offset) = find_in_block(&block, b"victim", hash, false).unwrap().unwrap();

        set_link_in_block(&mut block, offset, 77, FT_DIR).unwrap();
        let (found, _) = find_in_block(&block, b"victim", hash, false).unwrap().unwrap();
        assert_eq!(found.ino, 77);
        assert_eq!(found.file_type, FT_DIR);
        verify_block(&block).unwrap();
    }

    #[test]
    fn test_casefold_find() {
        let mut block = vec![0u8; BLOCK_SIZE];
        let mut d = de(b"Movie.MP4", 21);
        d.hash = dentry_hash(b"Movie.MP4", true);
        assert!(insert_in_block(&mut block, &d).unwrap());

        let hash = dentry_hash(b"movie.mp4.", true);
        let hit = find_in_block(&block, b"movie.mp4.", hash, true).unwrap();
        assert_eq!(hit.unwrap().0.ino, 21);
    }

    #[test]
    fn test_for_each_live_order() {
        let mut block = vec![0u8; BLOCK_SIZE];
        for (i, name) in [b"one" as &[u8], b"two", b"six"].iter().enumerate() {
            assert!(insert_in_block(&mut block, &de(name, 1 + i as u32)).unwrap());
        }
        let mut seen: Vec<u32> = Vec::new();
        for_each_live(&block, |d, _| {
            seen.push(d.ino);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![1, 2, 3]);
    }
}
