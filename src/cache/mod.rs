//! 元数据页缓存
//!
//! 目录块与符号链接页的 LRU 写回缓存，键为 `(ino, 逻辑块号)`。
//! 查找路径只读命中缓存即可完成，不经过写序列化段。

mod page_cache;

pub use page_cache::{PageCache, PageFlags, DEFAULT_CACHE_PAGES};
