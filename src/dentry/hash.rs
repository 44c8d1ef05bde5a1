//! 目录项哈希与名称比较策略
//!
//! 对应 f2fs 的 `f2fs_dentry_hash()`（hash.c）以及 namei.c 中的
//! `f2fs_d_hash()/f2fs_d_compare()`。
//!
//! 比较规则：
//!
//! - 名称结尾的 `.` 串只从**比较长度**中剥除，不影响存储，
//!   因此 "foo." 与 "foo" 哈希相同且比较相等；
//! - 目录开启 casefold 时额外做 ASCII 大小写折叠，哈希必须以
//!   完全相同的方式折叠，否则哈希表定位与比较会彼此矛盾。

use crate::consts::NAME_MAX;

/// TEA 轮混合常量
const TEA_DELTA: u32 = 0x9E37_79B9;

/// 哈希冲突标志位，磁盘哈希始终清零此位
const HASH_COL_BIT: u32 = 0x8000_0000;

/// 剥除名称尾部 `.` 串后的比较长度
///
/// 对应 f2fs 的 `__f2fs_striptail_len()`
pub fn striptail_len(name: &[u8]) -> usize {
    let mut len = name.len();
    while len > 0 && name[len - 1] == b'.' {
        len -= 1;
    }
    len
}

/// 按目录比较策略判断两个名称是否相等
///
/// 对应 f2fs 的 `f2fs_d_compare()`；`casefold == false` 时退化为
/// 仅剥尾点的逐字节比较。
pub fn names_equal(a: &[u8], b: &[u8], casefold: bool) -> bool {
    // "." 与 ".." 是结构性条目，永远精确匹配，不参与剥尾规则
    if is_dot_dotdot(a) || is_dot_dotdot(b) {
        return a == b;
    }
    let a = &a[..striptail_len(a)];
    let b = &b[..striptail_len(b)];
    if a.len() != b.len() {
        return false;
    }
    if casefold {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// 名称是否为 "." 或 ".."
pub fn is_dot_dotdot(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

/// 计算目录项哈希
///
/// 对应 f2fs 的 `f2fs_dentry_hash()`：TEA 变换，"." 与 ".." 固定
/// 哈希 0。尾点剥除与大小写折叠在喂入哈希前完成，保持与
/// [`names_equal`] 一致。
pub fn dentry_hash(name: &[u8], casefold: bool) -> u32 {
    if is_dot_dotdot(name) {
        return 0;
    }

    let len = striptail_len(name).min(NAME_MAX);
    let mut buf: [u32; 4] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476];

    let mut offset = 0;
    loop {
        let chunk = &name[offset..len.min(offset + 16)];
        // pad 由剩余长度而非分组长度导出
        let input = str2hashbuf(chunk, (len - offset) as u32, casefold);
        tea_transform(&mut buf, &input);
        offset += 16;
        if offset >= len {
            break;
        }
    }

    buf[0] & !HASH_COL_BIT
}

/// 把至多 16 字节名称打包为 4 个 u32
///
/// 对应 f2fs 的 `str2hashbuf()`；折叠策略在此处统一应用。
fn str2hashbuf(msg: &[u8], remaining: u32, casefold: bool) -> [u32; 4] {
    let mut pad = remaining | (remaining << 8);
    pad |= pad << 16;

    let mut out = [pad; 4];
    let mut val = pad;
    for (i, &b) in msg.iter().enumerate() {
        let b = if casefold { b.to_ascii_lowercase() } else { b };
        val = (b as u32).wrapping_add(val << 8);
        if i % 4 == 3 {
            out[i / 4] = val;
            val = pad;
        }
    }
    if msg.len() % 4 != 0 {
        out[msg.len() / 4] = val;
    }
    out
}

/// TEA 变换
///
/// 与 ext4 HTree 使用的是同一 TEA 变换。
fn tea_transform(buf: &mut [u32; 4], input: &[u32; 4]) {
    let mut sum: u32 = 0;
    let mut b0 = buf[0];
    let mut b1 = buf[1];
    let (a, b, c, d) = (input[0], input[1], input[2], input[3]);

    for _ in 0..16 {
        sum = sum.wrapping_add(TEA_DELTA);
        b0 = b0.wrapping_add(
            ((b1 << 4).wrapping_add(a)) ^ (b1.wrapping_add(sum)) ^ ((b1 >> 5).wrapping_add(b)),
        );
        b1 = b1.wrapping_add(
            ((b0 << 4).wrapping_add(c)) ^ (b0.wrapping_add(sum)) ^ ((b0 >> 5).wrapping_add(d)),
        );
    }

    buf[0] = buf[0].wrapping_add(b0);
    buf[1] = buf[1].wrapping_add(b1);
}
