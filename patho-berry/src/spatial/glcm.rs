//! 灰度共生矩阵 (GLCM) 纹理特征.

use crate::consts::glcm::{DISTANCE, LEVELS};
use crate::data::CellLabel;
use image::RgbImage;
use ndarray::{Array2, ArrayView2};

/// 单通道纹理特征.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TextureFeatures {
    /// 对比度 `Σ P(i, j) (i - j)^2`.
    pub contrast: f64,

    /// 能量 `sqrt(Σ P(i, j)^2)`.
    pub energy: f64,
}

/// 水平方向 (角度 0)、距离为 `distance` 的对称归一化灰度共生矩阵.
///
/// 不存在任何像素对时 (图像宽度不超过 `distance`) 返回全零矩阵.
pub fn glcm(channel: ArrayView2<u8>, distance: usize) -> Array2<f64> {
    let mut counts = Array2::<u64>::zeros((LEVELS, LEVELS));
    let (_, w) = channel.dim();
    if w > distance {
        for row in channel.rows() {
            for c in 0..w - distance {
                let (i, j) = (row[c] as usize, row[c + distance] as usize);
                counts[(i, j)] += 1;
                counts[(j, i)] += 1;
            }
        }
    }
    let total = counts.sum();
    if total == 0 {
        return Array2::zeros((LEVELS, LEVELS));
    }
    counts.mapv(|c| c as f64 / total as f64)
}

impl TextureFeatures {
    /// 从归一化灰度共生矩阵计算.
    pub fn from_glcm(p: &Array2<f64>) -> Self {
        let mut contrast = 0.0;
        let mut asm = 0.0;
        for ((i, j), &v) in p.indexed_iter() {
            let d = i as f64 - j as f64;
            contrast += v * d * d;
            asm += v * v;
        }
        Self {
            contrast,
            energy: asm.sqrt(),
        }
    }

    /// 对单通道图像使用默认距离计算纹理特征.
    #[inline]
    pub fn of_channel(channel: ArrayView2<u8>) -> Self {
        Self::from_glcm(&glcm(channel, DISTANCE))
    }
}

/// 细胞分布图中 AEC 与 LYM 两个通道的纹理特征.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EmbedTexture {
    /// AEC 通道 (R).
    pub aec: TextureFeatures,

    /// LYM 通道 (G).
    pub lym: TextureFeatures,
}

impl EmbedTexture {
    /// 从细胞分布图图像计算.
    pub fn from_image(img: &RgbImage) -> Self {
        let plane = |label: CellLabel| {
            let k = label.index();
            Array2::from_shape_fn((img.height() as usize, img.width() as usize), |(r, c)| {
                img.get_pixel(c as u32, r as u32).0[k]
            })
        };
        Self {
            aec: TextureFeatures::of_channel(plane(CellLabel::Aec).view()),
            lym: TextureFeatures::of_channel(plane(CellLabel::Lym).view()),
        }
    }
}
