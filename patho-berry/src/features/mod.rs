//! 单细胞几何/强度特征提取.
//!
//! 对每个细胞轮廓计算分类器所需的三个特征:
//!
//! 1. 面积: 鞋带公式;
//! 2. 强度: 轮廓掩码覆盖像素的 RGB 三通道均值的平均值;
//! 3. 圆度: `4 * 3.14 * 面积 / 周长^2`.

mod mask;

pub use mask::ContourMask;

use crate::consts::{FEATURE_DIM, ROUNDNESS_PI};
use crate::data::{Contour, RoiImage};
use crate::error::ExtractError;
use serde::{Deserialize, Serialize};

/// 单个细胞的特征向量.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellFeatures {
    /// 面积, 单位为像素.
    pub area: f64,

    /// 平均强度, 取值范围与图像位深一致 (`[0, 255]`).
    pub intensity: f64,

    /// 圆度. 标称范围 `(0, 1]`, 受像素离散化影响可能略大于 1.
    pub roundness: f64,
}

impl CellFeatures {
    /// 按分类器输入顺序 (面积, 强度, 圆度) 排列.
    #[inline]
    pub fn to_array(&self) -> [f64; FEATURE_DIM] {
        [self.area, self.intensity, self.roundness]
    }
}

/// 圆度 `4 * 3.14 * area / perimeter^2`.
///
/// 常数 `3.14` 是历史兼容值, 见 [`ROUNDNESS_PI`].
#[inline]
pub fn roundness(area: f64, perimeter: f64) -> f64 {
    4.0 * ROUNDNESS_PI * area / (perimeter * perimeter)
}

/// 提取 `contour` 在 `image` 上的特征. 不修改图像.
///
/// # 错误
///
/// - 周长为 0 (所有顶点重合) 时返回 [`ExtractError::DegenerateContour`];
/// - 外接矩形超出图像时返回 [`ExtractError::ContourOutOfBounds`].
pub fn extract(contour: &Contour, image: &RoiImage) -> Result<CellFeatures, ExtractError> {
    let perimeter = contour.perimeter();
    if perimeter == 0.0 {
        return Err(ExtractError::DegenerateContour);
    }

    let (width, height) = (image.width(), image.height());
    if !contour.bounding_box().within(width, height) {
        return Err(ExtractError::ContourOutOfBounds(width, height));
    }

    let area = contour.area();
    let intensity = mean_intensity(&ContourMask::rasterize(contour), image);

    Ok(CellFeatures {
        area,
        intensity,
        roundness: roundness(area, perimeter),
    })
}

/// 掩码覆盖像素的逐通道均值, 再对三个通道取平均.
///
/// 掩码必须位于图像内部, 否则程序 panic.
fn mean_intensity(mask: &ContourMask, image: &RoiImage) -> f64 {
    let mut sums = [0u64; 3];
    let mut count = 0u64;
    for (x, y) in mask.pixels() {
        let px = image.rgb(x as u32, y as u32);
        for (s, v) in sums.iter_mut().zip(px) {
            *s += v as u64;
        }
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    let channel_means = sums.map(|s| s as f64 / count as f64);
    channel_means.iter().sum::<f64>() / channel_means.len() as f64
}
