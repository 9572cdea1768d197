//! 轮廓光栅化.

use crate::data::{BoundingBox, Contour};
use ndarray::Array2;

/// 轮廓在其外接矩形内的二值掩码.
///
/// 掩码形状为 `(h, w)`, 掩码中的 `(r, c)` 对应图像中的 `(x + c, y + r)`.
#[derive(Clone, Debug)]
pub struct ContourMask {
    bbox: BoundingBox,
    data: Array2<bool>,
}

impl ContourMask {
    /// 光栅化 `contour`. 像素覆盖规则见 [`Contour::contains`].
    pub fn rasterize(contour: &Contour) -> Self {
        let bbox = contour.bounding_box();
        let data = Array2::from_shape_fn(bbox.shape(), |(r, c)| {
            contour.contains((bbox.x + c as i32, bbox.y + r as i32))
        });
        Self { bbox, data }
    }

    /// 掩码所在外接矩形.
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// 掩码数据.
    #[inline]
    pub fn data(&self) -> &Array2<bool> {
        &self.data
    }

    /// 被覆盖的像素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&b| b).count()
    }

    /// 迭代被覆盖像素的图像坐标 `(x, y)`.
    pub fn pixels(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (x0, y0) = (self.bbox.x, self.bbox.y);
        self.data
            .indexed_iter()
            .filter(|(_, &inside)| inside)
            .map(move |((r, c), _)| (x0 + c as i32, y0 + r as i32))
    }
}
