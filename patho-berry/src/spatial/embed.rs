//! 细胞分布图 (embed map).
//!
//! 将 ROI 按 `r * r` 像素分块, 统计每块内各类细胞的中心数目, 得到一张降采样的
//! 三通道密度图. 通道顺序为 R = AEC, G = LYM, B = OC.

use crate::consts::embed::{IMG_COEF, REDUCTION_SIZE};
use crate::consts::CLASS_NUM;
use crate::data::CellLabel;
use image::{Rgb, RgbImage};
use ndarray::Array3;

/// 降采样的细胞密度图, 形状为 `(h, w, 3)`.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbedMap {
    reduction: u32,
    data: Array3<f32>,
}

impl EmbedMap {
    /// 为 `width * height` 的 ROI 创建空白分布图, 使用默认降采样倍率.
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_reduction(width, height, REDUCTION_SIZE)
    }

    /// 为 `width * height` 的 ROI 创建空白分布图.
    ///
    /// 分布图尺寸为 `floor(0.5 + W / r) + 1` 乘 `floor(0.5 + H / r) + 1`.
    /// `reduction` 为 0 时程序 panic.
    pub fn with_reduction(width: u32, height: u32, reduction: u32) -> Self {
        assert!(reduction > 0);
        let cells = |len: u32| (0.5 + len as f64 / reduction as f64).floor() as usize + 1;
        Self {
            reduction,
            data: Array3::zeros((cells(height), cells(width), CLASS_NUM)),
        }
    }

    /// 降采样倍率.
    #[inline]
    pub fn reduction(&self) -> u32 {
        self.reduction
    }

    /// 分布图尺寸 `(h, w)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        let s = self.data.shape();
        (s[0], s[1])
    }

    /// 原始密度数据.
    #[inline]
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// 在 `label` 通道加入一个中心为 `(x, y)` 的细胞.
    ///
    /// 中心落在分布图之外时不做任何修改, 并返回 `false`.
    pub fn add(&mut self, (x, y): (f64, f64), label: CellLabel) -> bool {
        let size = self.reduction as f64;
        let (col, row) = ((x / size).floor(), (y / size).floor());
        let (h, w) = self.shape();
        if col < 0.0 || row < 0.0 || col as usize >= w || row as usize >= h {
            return false;
        }
        let unit = 1.0 / (self.reduction as f32 * self.reduction as f32);
        self.data[(row as usize, col as usize, label.index())] += unit;
        true
    }

    /// 转换为 8-bit 可视化图像: 乘以 `IMG_COEF` 后截断到 1, 再乘以 255 取整.
    pub fn to_image(&self) -> RgbImage {
        let (h, w) = self.shape();
        let mut img = RgbImage::new(w as u32, h as u32);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let (r, c) = (y as usize, x as usize);
            *px = Rgb(std::array::from_fn(|k| {
                let v = (self.data[(r, c, k)] * IMG_COEF).min(1.0);
                (v * 255.0) as u8
            }));
        }
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_shape() {
        // floor(0.5 + 1024 / 50) + 1 = 21, floor(0.5 + 768 / 50) + 1 = 16
        let m = EmbedMap::new(1024, 768);
        assert_eq!(m.shape(), (16, 21));
        assert_eq!(EmbedMap::new(0, 0).shape(), (1, 1));
        // 0.5 + 75 / 50 = 2.0
        assert_eq!(EmbedMap::new(75, 74).shape(), (2, 3));
    }

    #[test]
    fn test_embed_accumulate() {
        let mut m = EmbedMap::new(200, 100);
        assert!(m.add((10.0, 10.0), CellLabel::Aec));
        assert!(m.add((49.9, 0.0), CellLabel::Aec));
        assert!(m.add((50.0, 99.0), CellLabel::Lym));
        assert!(!m.add((-1.0, 3.0), CellLabel::Oc));
        assert!(!m.add((10_000.0, 3.0), CellLabel::Oc));

        let unit = 1.0 / 2500.0;
        assert_eq!(m.data()[(0, 0, 0)], 2.0 * unit);
        assert_eq!(m.data()[(1, 1, 1)], unit);
        assert!((m.data().sum() - 3.0 * unit).abs() < 1e-7);

        let img = m.to_image();
        assert_eq!(img.dimensions(), (5, 3));
        // 2 / 2500 * 320 = 0.256 -> 65
        assert_eq!(img.get_pixel(0, 0).0, [65, 0, 0]);
        // 1 / 2500 * 320 = 0.128 -> 32
        assert_eq!(img.get_pixel(1, 1).0, [0, 32, 0]);
    }

    #[test]
    fn test_embed_saturates() {
        let mut m = EmbedMap::new(50, 50);
        for _ in 0..20 {
            m.add((1.0, 1.0), CellLabel::Oc);
        }
        assert_eq!(m.to_image().get_pixel(0, 0).0, [0, 0, 255]);
    }
}
