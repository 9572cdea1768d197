#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 从染色归一化后的病理切片 ROI 及其细胞分割结果出发,
//! 提取细胞形态特征, 对细胞分类, 并汇总为病灶级特征.
//!
//! 处理流程:
//!
//! ```text
//! ROI 图像 + 分割记录 -> 单细胞特征 (面积, 强度, 圆度)
//!                     -> 细胞类别 {AEC, LYM, OC}
//!                     -> ROI 细胞特征表 + 病灶特征 (比例, 密度, 空间熵)
//! ```
//!
//! 支持 Japan, USA, China 三个队列, 目录结构见 [`dataset`].
//!
//! # 注意
//!
//! 1. 圆度公式中的 "圆周率" 固定为 `3.14`, 见 [`consts::ROUNDNESS_PI`].
//!   历史特征表和已训练的分类器都基于这个值.
//! 2. 单个 ROI 的数据错误不会中断批处理, 只有配置错误 (例如模型未载入) 才会.
//!   见 [`error`] 和 [`batch`].
//! 3. 所有输出都是确定性的: 相同输入总是得到逐字节相同的表格.
//!
//! # 模块
//!
//! ### 基础数据 ✅
//!
//! 细胞轮廓、细胞实例、分割记录 (轮廓库) 和 ROI 图像.
//!
//! 实现位于 `patho-berry/src/data`.
//!
//! ### 单细胞特征提取 ✅
//!
//! 实现位于 `patho-berry/src/features`.
//!
//! ### 细胞分类器 (仅推断) ✅
//!
//! 梯度提升树集成, 可以从 XGBoost JSON 模型导入.
//!
//! 实现位于 `patho-berry/src/classify`.
//!
//! ### ROI 特征汇总 ✅
//!
//! 实现位于 `patho-berry/src/aggregate`.
//!
//! ### 空间统计与纹理 ✅
//!
//! Altieri 空间熵, 细胞分布图 (embed map), GLCM 纹理特征.
//!
//! 实现位于 `patho-berry/src/spatial`.
//!
//! ### 数据集与批处理 ✅
//!
//! 队列目录结构, ROI 加载器, 表格读写, 分割格式转换, 细胞实例掩码,
//! 队列合并, 以及逐 ROI 的批处理驱动.
//!
//! 实现位于 `patho-berry/src/dataset` 和 `patho-berry/src/batch`.

/// 二维索引 `(h, w)`.
pub type Idx2d = (usize, usize);

/// 图像坐标 `(x, y)`, 与分割记录中的坐标约定一致.
pub type Point = (i32, i32);

pub mod consts;
pub mod error;

pub mod data;

pub use data::{
    BoundingBox, CellInstance, CellLabel, CoarseType, Contour, ContourStore, RoiImage, RoiName,
};

pub mod features;

pub mod classify;

pub mod aggregate;

pub mod spatial;

pub mod dataset;

pub mod batch;

pub mod prelude;
