//! 病理切片 ROI 特征流水线.
//!
//! 每个子命令对应流水线的一个步骤, 针对单个队列 (或全部队列) 批量处理 ROI:
//!
//! ```text
//! convert-segs -> extract -> (lesion) -> embed -> texture -> combine
//!              -> cell-mask
//! ```
//!
//! 单个 ROI 出错只会被记录, 不会中断运行; 模型缺失等配置错误会使程序以非零状态退出.

use clap::Parser;
use simple_logger::SimpleLogger;

mod cli;
mod result;
mod runner;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    SimpleLogger::new().with_level(cli.log_level()).init()?;

    runner::run(cli)?.analyze()?;
    Ok(())
}
