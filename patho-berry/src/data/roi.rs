//! ROI 标识与 ROI 图像.

use crate::error::{RoiError, RoiResult};
use image::RgbImage;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// ROI 名称.
///
/// 名称由裁剪阶段生成, 其中 `Wlen` 和 `Hlen` 之后各跟 6 位十进制数字,
/// 分别表示 ROI 的像素宽度和高度, 例如 `1234-L2-Wlen001024Hlen000768`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RoiName(String);

impl RoiName {
    /// 直接初始化.
    #[inline]
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    /// 原始字符串.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 从名称中解析 `(宽, 高)`. 宽或高为 0 的名称视为非法.
    pub fn dimensions(&self) -> RoiResult<(u32, u32)> {
        match (self.field("Wlen"), self.field("Hlen")) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
            _ => Err(RoiError::RoiName(self.0.clone())),
        }
    }

    /// 解析紧跟在 `tag` 之后的 6 位数字.
    fn field(&self, tag: &str) -> Option<u32> {
        let start = self.0.find(tag)? + tag.len();
        let digits = self.0.get(start..start + 6)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl Display for RoiName {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoiName {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 染色归一化后的 ROI RGB 图像. 只读.
#[derive(Clone, Debug)]
pub struct RoiImage {
    data: RgbImage,
}

impl RoiImage {
    /// 直接初始化.
    #[inline]
    pub fn new(data: RgbImage) -> Self {
        Self { data }
    }

    /// 打开图像文件. 灰度或带 alpha 通道的图像会被转换为 RGB.
    pub fn open<P: AsRef<Path>>(path: P) -> RoiResult<Self> {
        let path = path.as_ref();
        let data = image::open(path)
            .map_err(|e| RoiError::image(path, e))?
            .to_rgb8();
        Ok(Self { data })
    }

    /// 底层图像.
    #[inline]
    pub fn data(&self) -> &RgbImage {
        &self.data
    }

    /// 图像宽度.
    #[inline]
    pub fn width(&self) -> u32 {
        self.data.width()
    }

    /// 图像高度.
    #[inline]
    pub fn height(&self) -> u32 {
        self.data.height()
    }

    /// 像素总数.
    #[inline]
    pub fn pixel_area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// 获取 `(x, y)` 处的 RGB 值. 越界时 panic.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        self.data.get_pixel(x, y).0
    }
}
