//! 通用常量.

/// 圆度公式中使用的 "圆周率".
///
/// 历史特征表及其训练出的分类器都基于截断值 `3.14` 计算圆度,
/// 因此这里**不能**替换为 [`std::f64::consts::PI`], 否则特征值会整体偏移.
pub const ROUNDNESS_PI: f64 = 3.14;

/// 单个 ROI 至少需要检测到的细胞个数, 少于该值的 ROI 会被跳过.
pub const DEFAULT_MIN_CELL_COUNT: usize = 10;

/// 细胞密度换算系数: `density = count * DEFAULT_UNIT_AREA_SCALE / 像素总数`.
pub const DEFAULT_UNIT_AREA_SCALE: f64 = 4.0;

/// Altieri 空间熵的默认距离分段 (单位: 像素).
pub const DEFAULT_ENTROPY_CUTS: [f64; 3] = [30.0, 60.0, 100.0];

/// 分类器特征维数: (面积, 强度, 圆度).
pub const FEATURE_DIM: usize = 3;

/// 细胞类别数: AEC, LYM, OC.
pub const CLASS_NUM: usize = 3;

/// 细胞分布图 (embed map) 相关常量.
pub mod embed {
    /// 降采样倍率: 每 `REDUCTION_SIZE * REDUCTION_SIZE` 个像素合并为一个格子.
    pub const REDUCTION_SIZE: u32 = 50;

    /// 可视化增益. 格子密度乘以该值后截断到 `[0, 1]`.
    pub const IMG_COEF: f32 = 320.0;
}

/// 灰度共生矩阵 (GLCM) 相关常量.
pub mod glcm {
    /// 像素对的水平距离.
    pub const DISTANCE: usize = 3;

    /// 灰度级数.
    pub const LEVELS: usize = 256;
}

/// 分割记录中各粗分类的显示颜色.
pub mod color {
    /// AEC-like 细胞颜色 (红).
    pub const AEC_LIKE: [u8; 3] = [255, 0, 0];

    /// LYM-like 细胞颜色 (绿).
    pub const LYM_LIKE: [u8; 3] = [0, 255, 0];

    /// 其它细胞颜色 (蓝).
    pub const OTHER: [u8; 3] = [0, 0, 255];
}
