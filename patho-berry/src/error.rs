//! 运行时错误.
//!
//! 错误按影响范围分级:
//!
//! - 单个 ROI 的数据错误 ([`RoiError`] 中除 `ModelNotLoaded` 以外的变体):
//!   批处理记录后继续处理下一个 ROI;
//! - 配置错误 ([`RoiError::ModelNotLoaded`], [`ModelError`]): 终止整个运行.

use std::path::PathBuf;
use thiserror::Error;

/// 分割记录解析错误.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
    /// 键不是正整数.
    #[error("cell key `{0}` is not a positive integer")]
    InvalidKey(String),

    /// 轮廓点数不足 3 个.
    ///
    /// 第一个参数为细胞 ID, 第二个参数为实际点数.
    #[error("cell {0}: contour has {1} point(s), at least 3 required")]
    TooFewPoints(u32, usize),

    /// 坐标不是整数.
    #[error("cell {0}: non-numeric coordinate `{1}`")]
    NonNumericCoordinate(u32, String),

    /// 文档结构不符合预期.
    #[error("unexpected document structure: {0}")]
    Structure(String),
}

/// 单个轮廓的特征提取错误.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ExtractError {
    /// 周长为 0, 圆度无定义.
    #[error("degenerate contour with zero perimeter")]
    DegenerateContour,

    /// 轮廓外接矩形超出图像范围.
    #[error("contour bounding box exceeds the {0}x{1} image")]
    ContourOutOfBounds(u32, u32),
}

/// 分类器推断错误.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PredictError {
    /// 在载入模型参数之前调用推断.
    #[error("cell classifier model is not loaded")]
    ModelNotLoaded,
}

/// 模型加载错误. 属于配置错误.
#[derive(Debug, Error)]
pub enum ModelError {
    /// 底层 I/O 错误.
    #[error("cannot read model `{}`: {source}", path.display())]
    Io {
        /// 模型文件路径.
        path: PathBuf,
        /// 原始错误.
        source: std::io::Error,
    },

    /// 二进制模型解码错误.
    #[error("cannot decode model blob: {0}")]
    Decode(#[from] bincode::Error),

    /// XGBoost JSON 模型解析错误.
    #[error("cannot parse xgboost json: {0}")]
    Json(#[from] serde_json::Error),

    /// 模型结构不合法.
    #[error("invalid model: {0}")]
    Invalid(String),
}

/// 单个 ROI 处理错误.
#[derive(Debug, Error)]
pub enum RoiError {
    /// 分割记录损坏或结构不符.
    #[error("malformed segmentation: {0}")]
    MalformedSegmentation(#[from] SegmentationError),

    /// 细胞轮廓周长为 0.
    #[error("cell {id}: degenerate contour with zero perimeter")]
    DegenerateContour {
        /// 细胞 ID.
        id: u32,
    },

    /// 细胞轮廓超出图像范围.
    #[error("cell {id}: contour exceeds the {width}x{height} image")]
    ContourOutOfBounds {
        /// 细胞 ID.
        id: u32,
        /// 图像宽度.
        width: u32,
        /// 图像高度.
        height: u32,
    },

    /// 细胞个数不足. 属于警告级别的跳过.
    #[error("only {found} cell(s) detected, at least {required} required")]
    InsufficientCells {
        /// 实际细胞个数.
        found: usize,
        /// 要求的最少个数.
        required: usize,
    },

    /// 分类器未载入. 致命错误.
    #[error("cell classifier model is not loaded")]
    ModelNotLoaded,

    /// 输入/输出文件缺失或无法读写.
    #[error("I/O failure on `{}`: {source}", path.display())]
    IoFailure {
        /// 出错的文件路径.
        path: PathBuf,
        /// 原始错误.
        source: std::io::Error,
    },

    /// 图像解码/编码错误.
    #[error("image error on `{}`: {source}", path.display())]
    Image {
        /// 出错的文件路径.
        path: PathBuf,
        /// 原始错误.
        source: image::ImageError,
    },

    /// 表格读写错误.
    #[error("table error: {0}")]
    Table(#[from] csv::Error),

    /// 细胞实例掩码存在重叠或 ID 不连续.
    #[error("instance mask has {found} distinct values, expected {expected}")]
    MaskOverlap {
        /// 实际取值个数.
        found: usize,
        /// 期望取值个数 (细胞数 + 背景).
        expected: usize,
    },

    /// 特征表与分割记录的细胞数不一致.
    #[error("feature table has {table} cell(s) but segmentation has {segmentation}")]
    CellCountMismatch {
        /// 特征表行数.
        table: usize,
        /// 分割记录细胞数.
        segmentation: usize,
    },

    /// 实例掩码写出错误.
    #[error("cannot write mask `{}`: {source}", path.display())]
    Npy {
        /// 出错的文件路径.
        path: PathBuf,
        /// 原始错误.
        source: ndarray_npy::WriteNpyError,
    },

    /// 表格缺少必需的列.
    #[error("table `{}` has no column `{column}`", path.display())]
    MissingColumn {
        /// 表格路径.
        path: PathBuf,
        /// 缺少的列名.
        column: String,
    },

    /// ROI 名称中没有可解析的尺寸信息.
    #[error("cannot parse ROI dimensions from `{0}`")]
    RoiName(String),
}

impl RoiError {
    /// 是否为致命错误 (需要终止整个运行).
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelNotLoaded)
    }

    /// 是否为警告级别的跳过.
    #[inline]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::InsufficientCells { .. })
    }

    /// 将单细胞特征提取错误附加上细胞 ID.
    pub(crate) fn from_extract(id: u32, e: ExtractError) -> Self {
        match e {
            ExtractError::DegenerateContour => Self::DegenerateContour { id },
            ExtractError::ContourOutOfBounds(width, height) => Self::ContourOutOfBounds {
                id,
                width,
                height,
            },
        }
    }

    /// 构造 I/O 错误.
    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::IoFailure {
            path: path.into(),
            source,
        }
    }

    /// 构造图像错误. 底层为 I/O 错误时归为 [`RoiError::IoFailure`].
    pub(crate) fn image<P: Into<PathBuf>>(path: P, source: image::ImageError) -> Self {
        match source {
            image::ImageError::IoError(e) => Self::io(path, e),
            source => Self::Image {
                path: path.into(),
                source,
            },
        }
    }
}

impl From<PredictError> for RoiError {
    #[inline]
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::ModelNotLoaded => Self::ModelNotLoaded,
        }
    }
}

/// 单个 ROI 处理结果.
pub type RoiResult<T> = Result<T, RoiError>;
