//! 细胞实例掩码.
//!
//! 掩码与 ROI 图像同尺寸, 形状为 `(h, w)`, 像素值为覆盖该像素的细胞 ID, 背景为 0.

use crate::data::ContourStore;
use crate::error::{RoiError, RoiResult, SegmentationError};
use crate::features::ContourMask;
use itertools::Itertools;
use ndarray::{s, Array2};
use std::path::Path;

/// 生成 `width * height` 的细胞实例掩码.
///
/// # 错误
///
/// 1. 细胞 ID 不是 `1..=n` 时返回 [`RoiError::MalformedSegmentation`];
/// 2. 轮廓越界时返回 [`RoiError::ContourOutOfBounds`];
/// 3. 细胞之间存在重叠, 导致掩码取值个数不是 `n + 1` 时, 返回 [`RoiError::MaskOverlap`].
pub fn instance_mask(store: &ContourStore, width: u32, height: u32) -> RoiResult<Array2<u32>> {
    if !store.is_sequential() {
        return Err(SegmentationError::Structure("cell ids are not 1..=n".to_string()).into());
    }

    let mut mask = Array2::<u32>::zeros((height as usize, width as usize));
    for cell in store {
        let bbox = cell.contour().bounding_box();
        if !bbox.within(width, height) {
            return Err(RoiError::ContourOutOfBounds {
                id: cell.id(),
                width,
                height,
            });
        }
        let cm = ContourMask::rasterize(cell.contour());
        let (x, y) = (bbox.x as usize, bbox.y as usize);
        let (h, w) = bbox.shape();
        let mut view = mask.slice_mut(s![y..y + h, x..x + w]);
        view.zip_mut_with(cm.data(), |m, &inside| {
            if inside {
                *m = m.wrapping_add(cell.id());
            }
        });
    }

    let found = mask.iter().unique().count();
    let expected = store.len() + 1;
    if found != expected {
        return Err(RoiError::MaskOverlap { found, expected });
    }
    Ok(mask)
}

/// 将掩码保存为 `.npy` 文件.
pub fn save_mask<P: AsRef<Path>>(path: P, mask: &Array2<u32>) -> RoiResult<()> {
    let path = path.as_ref();
    ndarray_npy::write_npy(path, mask).map_err(|source| RoiError::Npy {
        path: path.to_owned(),
        source,
    })
}
