//! 命令行参数.

use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use patho_berry::consts::embed::REDUCTION_SIZE;
use patho_berry::consts::{DEFAULT_MIN_CELL_COUNT, DEFAULT_UNIT_AREA_SCALE};
use patho_berry::dataset::{Dataset, DatasetLayout};
use std::path::PathBuf;

/// 病理切片 ROI 特征流水线.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 输出更详细的日志, 可重复 (`-v` 为 debug, `-vv` 为 trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// 日志级别.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// 数据根目录.
#[derive(Args, Debug, Clone)]
pub struct RootArgs {
    /// 数据根目录, 缺省时依次尝试 `$PATHO_DATA_ROOT` 和 `$HOME/dataset`
    #[arg(long)]
    pub data_root: Option<PathBuf>,
}

impl RootArgs {
    /// 解析后的数据根目录.
    pub fn resolve(&self) -> anyhow::Result<PathBuf> {
        utils::loader::data_root_or_env_or_home(self.data_root.clone()).ok_or_else(|| {
            anyhow::anyhow!("cannot determine data root, pass --data-root or set $PATHO_DATA_ROOT")
        })
    }
}

/// 单个队列的批处理参数.
#[derive(Args, Debug, Clone)]
pub struct CohortArgs {
    #[command(flatten)]
    pub root: RootArgs,

    /// 队列名称: Japan, USA 或 China
    #[arg(long, default_value = "Japan")]
    pub dataset: Dataset,

    /// 工作线程数, 0 表示使用全部核心, 1 表示顺序执行
    #[arg(long, default_value_t = 0)]
    pub workers: usize,
}

impl CohortArgs {
    /// 队列目录结构.
    pub fn layout(&self) -> anyhow::Result<DatasetLayout> {
        Ok(DatasetLayout::new(self.root.resolve()?, self.dataset))
    }
}

/// 子命令.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// 提取细胞特征并分类, 写出细胞特征表和病灶特征表
    Extract {
        #[command(flatten)]
        cohort: CohortArgs,

        /// 少于该细胞数的 ROI 被跳过
        #[arg(long, default_value_t = DEFAULT_MIN_CELL_COUNT)]
        min_cell_num: usize,

        /// 细胞密度换算系数
        #[arg(long, default_value_t = DEFAULT_UNIT_AREA_SCALE)]
        unit_area_scale: f64,

        /// 模型文件, 缺省为 `<root>/CellType/CellModels/fusing_cell_classifier.bin`
        #[arg(long)]
        model: Option<PathBuf>,
    },

    /// 由已有的细胞特征表重新计算病灶特征表
    Lesion {
        #[command(flatten)]
        cohort: CohortArgs,

        /// 细胞密度换算系数
        #[arg(long, default_value_t = DEFAULT_UNIT_AREA_SCALE)]
        unit_area_scale: f64,
    },

    /// 生成细胞分布图
    Embed {
        #[command(flatten)]
        cohort: CohortArgs,

        /// 降采样倍率
        #[arg(long, default_value_t = REDUCTION_SIZE)]
        reduction_size: u32,
    },

    /// 计算细胞分布图的纹理特征
    Texture {
        #[command(flatten)]
        cohort: CohortArgs,
    },

    /// 生成细胞实例掩码
    CellMask {
        #[command(flatten)]
        cohort: CohortArgs,
    },

    /// 转换原始细胞分割结果
    ConvertSegs {
        #[command(flatten)]
        cohort: CohortArgs,
    },

    /// 合并三个队列的病灶特征与纹理特征
    Combine {
        #[command(flatten)]
        root: RootArgs,
    },

    /// 将 XGBoost JSON 模型转换为二进制模型文件
    ImportModel {
        #[command(flatten)]
        root: RootArgs,

        /// XGBoost `save_model` 得到的 JSON 文件
        input: PathBuf,

        /// 输出路径, 缺省为数据根目录下的默认模型位置
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
