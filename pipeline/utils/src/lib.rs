//! 流水线各工具依赖的通用组件.

pub mod loader;

use std::io::{self, Write};

const SEP: &str = "--------------------------------------------------------";

/// 向 `w` 写出一条分隔线.
#[inline]
pub fn sep_to<W: Write>(mut w: W) -> io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 解析工作线程数. `0` 表示使用全部可并行核心.
pub fn workers_or_cpus(n: usize) -> usize {
    match n {
        0 => std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from),
        n => n,
    }
}
