//! ROI 基础数据结构: 细胞轮廓、细胞实例、分割记录和 ROI 图像.

pub mod contour;
pub mod roi;
pub mod store;

pub use contour::{BoundingBox, Contour};
pub use roi::{RoiImage, RoiName};
pub use store::ContourStore;

use serde::{Deserialize, Serialize};

/// 细胞最终类别, 由分类器给出.
///
/// 在特征表中以整数编码保存 (AEC = 0, LYM = 1, OC = 2).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CellLabel {
    /// 非典型上皮细胞 (atypical epithelial cell).
    Aec,

    /// 淋巴细胞 (lymphocyte).
    Lym,

    /// 其它细胞 (other cell).
    Oc,
}

impl CellLabel {
    /// 全部类别, 按编码升序.
    pub const ALL: [CellLabel; 3] = [Self::Aec, Self::Lym, Self::Oc];

    /// 类别编码.
    #[inline]
    pub const fn code(self) -> u8 {
        match self {
            Self::Aec => 0,
            Self::Lym => 1,
            Self::Oc => 2,
        }
    }

    /// 从编码构造. 编码非法时返回 `None`.
    #[inline]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Aec),
            1 => Some(Self::Lym),
            2 => Some(Self::Oc),
            _ => None,
        }
    }

    /// 作为数组下标使用.
    #[inline]
    pub const fn index(self) -> usize {
        self.code() as usize
    }

    /// 表头等处使用的名称.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aec => "AEC",
            Self::Lym => "LYM",
            Self::Oc => "OC",
        }
    }
}

impl From<CellLabel> for u8 {
    #[inline]
    fn from(label: CellLabel) -> Self {
        label.code()
    }
}

impl TryFrom<u8> for CellLabel {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown cell label code `{code}`"))
    }
}

/// 分割阶段给出的粗分类. 不是分类器的最终结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CoarseType {
    /// 类上皮细胞, 编码 0.
    AecLike,

    /// 类淋巴细胞, 编码 1.
    LymLike,

    /// 其它, 编码为其它任意整数.
    Other,
}

impl CoarseType {
    /// 从分割记录中的 `type` 字段构造. 未知编码一律视为 [`CoarseType::Other`].
    #[inline]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::AecLike,
            1 => Self::LymLike,
            _ => Self::Other,
        }
    }

    /// 写回分割记录时使用的编码.
    #[inline]
    pub const fn code(self) -> u8 {
        match self {
            Self::AecLike => 0,
            Self::LymLike => 1,
            Self::Other => 2,
        }
    }
}

/// ROI 中的一个细胞实例. 载入后不可变.
#[derive(Clone, Debug, PartialEq)]
pub struct CellInstance {
    id: u32,
    contour: Contour,
    coarse_type: CoarseType,
}

impl CellInstance {
    /// 直接初始化. 调用方负责保证 `id` 为正.
    pub(crate) fn new(id: u32, contour: Contour, coarse_type: CoarseType) -> Self {
        debug_assert!(id > 0);
        Self {
            id,
            contour,
            coarse_type,
        }
    }

    /// 细胞 ID, ROI 内唯一.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 细胞轮廓.
    #[inline]
    pub fn contour(&self) -> &Contour {
        &self.contour
    }

    /// 分割阶段的粗分类.
    #[inline]
    pub fn coarse_type(&self) -> CoarseType {
        self.coarse_type
    }
}
