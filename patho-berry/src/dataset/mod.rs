//! 数据集操作.
//!
//! 数据根目录 `<root>` 下的组织方式:
//!
//! ```text
//! <root>/
//! ├── CellType/CellModels/fusing_cell_classifier.bin
//! ├── CombineAnalysis/CombineROIFeatures.csv
//! └── SlidesROIs/<Dataset>/
//!     ├── MacenkoROIs/<roi>.png
//!     ├── RawCellSegs/<roi>.json
//!     ├── RegionSegs/<roi>.json
//!     ├── CellFeas/<roi>.csv
//!     ├── CellMasks/<roi>.npy
//!     ├── EmbedMaps/<roi>.png
//!     ├── <Dataset>LesionStages.json
//!     ├── <Dataset>LesionFeatures.csv
//!     └── <Dataset>TextureFeatures.csv
//! ```

use crate::data::RoiName;
use crate::error::{RoiError, RoiResult};
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod combine;
pub mod convert;
mod loader;
pub mod mask;
pub mod table;

pub use loader::{
    cell_table_loader, embed_loader, raw_seg_loader, roi_loader, roi_names, CellTable, Opener,
    RoiLoader,
};
pub use table::LesionStages;

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 数据集 (队列).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Dataset {
    /// 日本队列.
    Japan,

    /// 美国队列.
    Usa,

    /// 中国队列.
    China,
}

impl Dataset {
    /// 合并分析时的队列顺序.
    pub const COMBINE_ORDER: [Dataset; 3] = [Self::Usa, Self::Japan, Self::China];

    /// 目录和表格中使用的名称.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Japan => "Japan",
            Self::Usa => "USA",
            Self::China => "China",
        }
    }

    /// 队列对应的人种.
    #[inline]
    pub const fn race(self) -> &'static str {
        match self {
            Self::Usa => "White",
            Self::Japan | Self::China => "Asian",
        }
    }
}

impl Display for Dataset {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Japan" => Ok(Self::Japan),
            "USA" => Ok(Self::Usa),
            "China" => Ok(Self::China),
            _ => Err(format!("unknown dataset `{s}`, expected one of Japan, USA, China")),
        }
    }
}

/// 模型文件相对于数据根目录的路径.
pub fn model_path<P: AsRef<Path>>(data_root: P) -> PathBuf {
    data_root
        .as_ref()
        .join("CellType")
        .join("CellModels")
        .join("fusing_cell_classifier.bin")
}

/// 合并分析结果相对于数据根目录的路径.
pub fn combine_path<P: AsRef<Path>>(data_root: P) -> PathBuf {
    data_root
        .as_ref()
        .join("CombineAnalysis")
        .join("CombineROIFeatures.csv")
}

/// 单个队列的目录结构.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatasetLayout {
    dataset: Dataset,
    root: PathBuf,
}

impl DatasetLayout {
    /// ROI 图像目录名.
    pub const ROI_IMG_DIR: &'static str = "MacenkoROIs";
    /// 原始分割目录名.
    pub const RAW_SEG_DIR: &'static str = "RawCellSegs";
    /// 分割记录目录名.
    pub const ROI_SEG_DIR: &'static str = "RegionSegs";
    /// 细胞特征表目录名.
    pub const CELL_FEA_DIR: &'static str = "CellFeas";
    /// 细胞实例掩码目录名.
    pub const CELL_MASK_DIR: &'static str = "CellMasks";
    /// 细胞分布图目录名.
    pub const EMBED_DIR: &'static str = "EmbedMaps";

    /// 数据根目录 `data_root` 下 `dataset` 队列的目录结构.
    pub fn new<P: AsRef<Path>>(data_root: P, dataset: Dataset) -> Self {
        let root = data_root
            .as_ref()
            .join("SlidesROIs")
            .join(dataset.name());
        Self { dataset, root }
    }

    /// 所属队列.
    #[inline]
    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// 队列根目录 `<root>/SlidesROIs/<Dataset>`.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 队列根目录下的子目录.
    #[inline]
    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn file(&self, dir: &str, roi: &RoiName, ext: &str) -> PathBuf {
        let mut p = self.dir(dir);
        p.push(format!("{roi}.{ext}"));
        p
    }

    /// ROI 图像.
    #[inline]
    pub fn roi_image(&self, roi: &RoiName) -> PathBuf {
        self.file(Self::ROI_IMG_DIR, roi, "png")
    }

    /// 原始分割.
    #[inline]
    pub fn raw_seg(&self, roi: &RoiName) -> PathBuf {
        self.file(Self::RAW_SEG_DIR, roi, "json")
    }

    /// 分割记录.
    #[inline]
    pub fn region_seg(&self, roi: &RoiName) -> PathBuf {
        self.file(Self::ROI_SEG_DIR, roi, "json")
    }

    /// 细胞特征表.
    #[inline]
    pub fn cell_fea(&self, roi: &RoiName) -> PathBuf {
        self.file(Self::CELL_FEA_DIR, roi, "csv")
    }

    /// 细胞实例掩码.
    #[inline]
    pub fn cell_mask(&self, roi: &RoiName) -> PathBuf {
        self.file(Self::CELL_MASK_DIR, roi, "npy")
    }

    /// 细胞分布图.
    #[inline]
    pub fn embed_map(&self, roi: &RoiName) -> PathBuf {
        self.file(Self::EMBED_DIR, roi, "png")
    }

    /// 分期表.
    pub fn lesion_stages(&self) -> PathBuf {
        self.root.join(format!("{}LesionStages.json", self.dataset))
    }

    /// 病灶特征表.
    pub fn lesion_features(&self) -> PathBuf {
        self.root.join(format!("{}LesionFeatures.csv", self.dataset))
    }

    /// 纹理特征表.
    pub fn texture_features(&self) -> PathBuf {
        self.root.join(format!("{}TextureFeatures.csv", self.dataset))
    }

    /// 确保子目录存在.
    pub fn ensure_dir(&self, name: &str) -> RoiResult<PathBuf> {
        let dir = self.dir(name);
        fs::create_dir_all(&dir).map_err(|e| RoiError::io(&dir, e))?;
        Ok(dir)
    }

    /// 清空并重建子目录, 使输出目录中只包含本次运行的结果.
    pub fn reset_dir(&self, name: &str) -> RoiResult<PathBuf> {
        let dir = self.dir(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| RoiError::io(&dir, e))?;
        }
        fs::create_dir_all(&dir).map_err(|e| RoiError::io(&dir, e))?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_names() {
        for d in Dataset::COMBINE_ORDER {
            assert_eq!(d.name().parse::<Dataset>().unwrap(), d);
        }
        assert!("usa".parse::<Dataset>().is_err());
        assert_eq!(Dataset::Usa.race(), "White");
        assert_eq!(Dataset::China.race(), "Asian");
    }

    #[test]
    fn test_layout_paths() {
        let l = DatasetLayout::new("/data", Dataset::Usa);
        let roi = RoiName::new("a-Wlen000100Hlen000100");
        assert_eq!(l.root(), Path::new("/data/SlidesROIs/USA"));
        assert_eq!(
            l.roi_image(&roi),
            Path::new("/data/SlidesROIs/USA/MacenkoROIs/a-Wlen000100Hlen000100.png")
        );
        assert_eq!(
            l.cell_mask(&roi),
            Path::new("/data/SlidesROIs/USA/CellMasks/a-Wlen000100Hlen000100.npy")
        );
        assert_eq!(
            l.lesion_features(),
            Path::new("/data/SlidesROIs/USA/USALesionFeatures.csv")
        );
        assert_eq!(
            model_path("/data"),
            Path::new("/data/CellType/CellModels/fusing_cell_classifier.bin")
        );
    }

    #[test]
    fn test_reset_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let l = DatasetLayout::new(tmp.path(), Dataset::Japan);
        let dir = l.ensure_dir(DatasetLayout::CELL_FEA_DIR).unwrap();
        fs::write(dir.join("stale.csv"), "x").unwrap();
        let dir = l.reset_dir(DatasetLayout::CELL_FEA_DIR).unwrap();
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
    }
}
