//! ROI 加载器.
//!
//! 提供迭代器风格的数据集获取模式: 先列出某个目录下的全部 ROI 名称,
//! 迭代时再逐个打开对应文件, 同一时刻只保留一个 ROI 的数据.

use super::{convert, table, DatasetLayout};
use crate::aggregate::CellFeatureRecord;
use crate::data::{CellLabel, ContourStore, RoiImage, RoiName};
use crate::error::{RoiError, RoiResult};
use image::RgbImage;
use std::fs;
use std::path::Path;

/// ROI 数据打开函数. 接受目录结构和 ROI 名称, 获得数据.
pub type Opener<T> = fn(&DatasetLayout, &RoiName) -> RoiResult<T>;

/// 列出 `dir` 下全部扩展名为 `ext` 的文件, 返回去掉扩展名后的 ROI 名称, 按字典序排列.
///
/// 非 UTF-8 文件名会被忽略.
pub fn roi_names<P: AsRef<Path>>(dir: P, ext: &str) -> RoiResult<Vec<RoiName>> {
    let dir = dir.as_ref();
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| RoiError::io(dir, e))? {
        let path = entry.map_err(|e| RoiError::io(dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(ext) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            names.push(RoiName::new(stem));
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// 通用 ROI 加载器, 按 ROI 名称升序产出 `(名称, 数据)`.
///
/// 单个 ROI 打开失败时产出 `Err`, 不影响后续 ROI.
pub struct RoiLoader<T> {
    layout: DatasetLayout,
    names_rev: Vec<RoiName>,
    open: Opener<T>,
}

impl<T> RoiLoader<T> {
    /// 从指定 ROI 名称和打开函数创建加载器.
    pub fn new<I: IntoIterator<Item = RoiName>>(
        layout: DatasetLayout,
        names: I,
        open: Opener<T>,
    ) -> Self {
        let mut names_rev: Vec<RoiName> = names.into_iter().collect();
        names_rev.reverse();
        Self {
            layout,
            names_rev,
            open,
        }
    }

    /// 以 `layout` 下子目录 `dir` 中扩展名为 `ext` 的文件作为 ROI 列表.
    pub fn scan(layout: DatasetLayout, dir: &str, ext: &str, open: Opener<T>) -> RoiResult<Self> {
        let names = roi_names(layout.dir(dir), ext)?;
        Ok(Self::new(layout, names, open))
    }

    /// 目录结构.
    #[inline]
    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }
}

impl<T> Iterator for RoiLoader<T> {
    type Item = (RoiName, RoiResult<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names_rev.pop()?;
        let data = (self.open)(&self.layout, &name);
        Some((name, data))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.names_rev.len();
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for RoiLoader<T> {
    #[inline]
    fn len(&self) -> usize {
        self.names_rev.len()
    }
}

/// 细胞特征表及对应的分割记录. 两者的细胞一一对应.
#[derive(Clone, Debug, PartialEq)]
pub struct CellTable {
    /// 细胞特征表.
    pub records: Vec<CellFeatureRecord>,

    /// 分割记录.
    pub store: ContourStore,
}

impl CellTable {
    /// 组合特征表与分割记录.
    ///
    /// # 错误
    ///
    /// 细胞数不一致, 或特征表中的 ID 在分割记录中不存在时, 返回
    /// [`RoiError::CellCountMismatch`].
    pub fn new(records: Vec<CellFeatureRecord>, store: ContourStore) -> RoiResult<Self> {
        if records.len() != store.len() || records.iter().any(|r| store.get(r.id).is_none()) {
            return Err(RoiError::CellCountMismatch {
                table: records.len(),
                segmentation: store.len(),
            });
        }
        Ok(Self { records, store })
    }

    /// 细胞中心 `(x, y)` 及类别, 顺序与特征表一致.
    pub fn centers(&self) -> impl Iterator<Item = (u32, (f64, f64), CellLabel)> + '_ {
        self.records.iter().filter_map(|r| {
            let cell = self.store.get(r.id)?;
            Some((r.id, cell.contour().centroid(), r.label))
        })
    }
}

fn open_roi(layout: &DatasetLayout, name: &RoiName) -> RoiResult<(RoiImage, ContourStore)> {
    let image = RoiImage::open(layout.roi_image(name))?;
    let store = ContourStore::open(layout.region_seg(name))?;
    Ok((image, store))
}

fn open_cell_table(layout: &DatasetLayout, name: &RoiName) -> RoiResult<CellTable> {
    let records = table::open_cells(layout.cell_fea(name))?;
    let store = ContourStore::open(layout.region_seg(name))?;
    CellTable::new(records, store)
}

fn open_embed(layout: &DatasetLayout, name: &RoiName) -> RoiResult<RgbImage> {
    let path = layout.embed_map(name);
    image::open(&path)
        .map(|img| img.to_rgb8())
        .map_err(|e| RoiError::image(path, e))
}

fn open_raw_seg(layout: &DatasetLayout, name: &RoiName) -> RoiResult<ContourStore> {
    convert::open_raw(layout.raw_seg(name))
}

/// ROI 图像与分割记录加载器. 以 `MacenkoROIs/*.png` 为 ROI 列表.
pub fn roi_loader(layout: DatasetLayout) -> RoiResult<RoiLoader<(RoiImage, ContourStore)>> {
    RoiLoader::scan(layout, DatasetLayout::ROI_IMG_DIR, "png", open_roi)
}

/// 细胞特征表加载器. 以 `CellFeas/*.csv` 为 ROI 列表.
pub fn cell_table_loader(layout: DatasetLayout) -> RoiResult<RoiLoader<CellTable>> {
    RoiLoader::scan(layout, DatasetLayout::CELL_FEA_DIR, "csv", open_cell_table)
}

/// 细胞分布图加载器. 以 `EmbedMaps/*.png` 为 ROI 列表.
pub fn embed_loader(layout: DatasetLayout) -> RoiResult<RoiLoader<RgbImage>> {
    RoiLoader::scan(layout, DatasetLayout::EMBED_DIR, "png", open_embed)
}

/// 原始分割加载器, 产出已转换的分割记录. 以 `RawCellSegs/*.json` 为 ROI 列表.
pub fn raw_seg_loader(layout: DatasetLayout) -> RoiResult<RoiLoader<ContourStore>> {
    RoiLoader::scan(layout, DatasetLayout::RAW_SEG_DIR, "json", open_raw_seg)
}
