//! ROI 特征汇总.
//!
//! 对一个 ROI 依次完成:
//!
//! 1. 按 ID 升序提取每个细胞的特征;
//! 2. 细胞数不足时跳过该 ROI;
//! 3. 一次性批量推断全部细胞类别;
//! 4. 生成逐细胞特征表和病灶级汇总.
//!
//! 整个过程是确定性的, 不依赖任何全局状态.

mod summary;

pub use summary::{label_counts, LesionFeatureSummary};

use crate::classify::CellClassifier;
use crate::consts::{DEFAULT_ENTROPY_CUTS, DEFAULT_MIN_CELL_COUNT, DEFAULT_UNIT_AREA_SCALE};
use crate::data::{CellLabel, ContourStore, RoiImage, RoiName};
use crate::error::{RoiError, RoiResult};
use crate::features::{self, CellFeatures};
use serde::{Deserialize, Serialize};

/// 细胞特征表中的一行. 创建后不再修改.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellFeatureRecord {
    /// 细胞 ID, 与分割记录一致.
    #[serde(rename = "ID")]
    pub id: u32,

    /// 面积.
    #[serde(rename = "Area")]
    pub area: f64,

    /// 平均强度.
    #[serde(rename = "Intensity")]
    pub intensity: f64,

    /// 圆度.
    #[serde(rename = "Roundness")]
    pub roundness: f64,

    /// 分类器给出的类别, 以整数编码保存.
    #[serde(rename = "Label")]
    pub label: CellLabel,
}

impl CellFeatureRecord {
    /// 由特征和类别构造.
    #[inline]
    pub fn new(id: u32, f: CellFeatures, label: CellLabel) -> Self {
        Self {
            id,
            area: f.area,
            intensity: f.intensity,
            roundness: f.roundness,
            label,
        }
    }

    /// 特征部分.
    #[inline]
    pub fn features(&self) -> CellFeatures {
        CellFeatures {
            area: self.area,
            intensity: self.intensity,
            roundness: self.roundness,
        }
    }
}

/// 提取 `store` 中全部细胞的特征并分类.
///
/// 返回的特征表与 `store` 一一对应, 按 ID 升序排列.
///
/// # 错误
///
/// 1. 任一细胞轮廓退化或越界时返回对应错误, 整个 ROI 作废;
/// 2. 细胞数少于 `min_cell_count` 时返回 [`RoiError::InsufficientCells`];
/// 3. 分类器未载入时返回 [`RoiError::ModelNotLoaded`].
pub fn aggregate<C: CellClassifier + ?Sized>(
    image: &RoiImage,
    store: &ContourStore,
    classifier: &C,
    min_cell_count: usize,
) -> RoiResult<Vec<CellFeatureRecord>> {
    let feats = store
        .iter()
        .map(|cell| {
            features::extract(cell.contour(), image)
                .map_err(|e| RoiError::from_extract(cell.id(), e))
        })
        .collect::<RoiResult<Vec<_>>>()?;

    if feats.len() < min_cell_count {
        return Err(RoiError::InsufficientCells {
            found: feats.len(),
            required: min_cell_count,
        });
    }

    let labels = classifier.predict(&feats)?;
    debug_assert_eq!(labels.len(), feats.len());

    Ok(store
        .ids()
        .zip(feats)
        .zip(labels)
        .map(|((id, f), label)| CellFeatureRecord::new(id, f, label))
        .collect())
}

/// 单个 ROI 的完整汇总结果.
#[derive(Clone, Debug, PartialEq)]
pub struct RoiFeatures {
    /// 逐细胞特征表.
    pub records: Vec<CellFeatureRecord>,

    /// 病灶级汇总.
    pub summary: LesionFeatureSummary,
}

/// ROI 特征汇总器, 保存汇总参数.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregator {
    min_cell_count: usize,
    unit_area_scale: f64,
    entropy_cuts: Vec<f64>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            min_cell_count: DEFAULT_MIN_CELL_COUNT,
            unit_area_scale: DEFAULT_UNIT_AREA_SCALE,
            entropy_cuts: DEFAULT_ENTROPY_CUTS.to_vec(),
        }
    }
}

impl Aggregator {
    /// 使用默认参数.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置最少细胞数.
    #[inline]
    pub fn with_min_cell_count(mut self, n: usize) -> Self {
        self.min_cell_count = n;
        self
    }

    /// 设置密度换算系数.
    #[inline]
    pub fn with_unit_area_scale(mut self, scale: f64) -> Self {
        self.unit_area_scale = scale;
        self
    }

    /// 设置空间熵距离分段点.
    #[inline]
    pub fn with_entropy_cuts<I: IntoIterator<Item = f64>>(mut self, cuts: I) -> Self {
        self.entropy_cuts = cuts.into_iter().collect();
        self
    }

    /// 最少细胞数.
    #[inline]
    pub fn min_cell_count(&self) -> usize {
        self.min_cell_count
    }

    /// 密度换算系数.
    #[inline]
    pub fn unit_area_scale(&self) -> f64 {
        self.unit_area_scale
    }

    /// 空间熵距离分段点.
    #[inline]
    pub fn entropy_cuts(&self) -> &[f64] {
        &self.entropy_cuts
    }

    /// 处理一个 ROI. 错误同 [`aggregate`].
    pub fn run<C: CellClassifier + ?Sized>(
        &self,
        name: &RoiName,
        stage: Option<String>,
        image: &RoiImage,
        store: &ContourStore,
        classifier: &C,
    ) -> RoiResult<RoiFeatures> {
        let records = aggregate(image, store, classifier, self.min_cell_count)?;
        let summary = self.summarize(name, stage, &records, store, image.pixel_area())?;
        Ok(RoiFeatures { records, summary })
    }

    /// 由已有的特征表计算病灶级汇总.
    #[inline]
    pub fn summarize(
        &self,
        name: &RoiName,
        stage: Option<String>,
        records: &[CellFeatureRecord],
        store: &ContourStore,
        pixel_area: u64,
    ) -> RoiResult<LesionFeatureSummary> {
        LesionFeatureSummary::compute(
            name.as_str(),
            stage,
            records,
            store,
            pixel_area,
            self.unit_area_scale,
            &self.entropy_cuts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{GbtModel, ModelHandle};
    use crate::data::{CellInstance, CoarseType, Contour};
    use crate::dataset::table;
    use crate::error::PredictError;
    use image::{Rgb, RgbImage};

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn image() -> RoiImage {
        RoiImage::new(RgbImage::from_pixel(200, 100, Rgb([120, 90, 60])))
    }

    fn square(id: u32, x: i32, y: i32, side: i32) -> CellInstance {
        let c = Contour::new(vec![(x, y), (x + side, y), (x + side, y + side), (x, y + side)]);
        CellInstance::new(id, c.unwrap(), CoarseType::AecLike)
    }

    /// `n` 个细胞, 偶数 ID 为大细胞 (面积 100), 奇数 ID 为小细胞 (面积 16).
    fn store(n: u32) -> ContourStore {
        ContourStore::from_cells((1..=n).map(|id| {
            let x = (id as i32 - 1) % 10 * 18 + 1;
            let y = (id as i32 - 1) / 10 * 18 + 1;
            square(id, x, y, if id % 2 == 0 { 10 } else { 4 })
        }))
    }

    fn model() -> ModelHandle {
        ModelHandle::from_model(GbtModel::area_stump(50.0))
    }

    #[test]
    fn test_twelve_cells() {
        let records = aggregate(&image(), &store(12), &model(), 10).unwrap();
        assert_eq!(records.len(), 12);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());
        for r in records.iter() {
            let expected = if r.id % 2 == 0 { CellLabel::Aec } else { CellLabel::Lym };
            assert_eq!(r.label, expected);
            assert!(f64_eq(r.intensity, 90.0));
        }

        let s = Aggregator::new()
            .summarize(&RoiName::new("r"), None, &records, &store(12), 200 * 100)
            .unwrap();
        assert!(f64_eq(s.proportions.iter().sum::<f64>(), 1.0));
        assert!(f64_eq(s.proportions[CellLabel::Aec.index()], 0.5));
        assert!(f64_eq(s.proportions[CellLabel::Oc.index()], 0.0));
        // 6 * 4 / 20000
        assert!(f64_eq(s.densities[CellLabel::Lym.index()], 0.0012));
    }

    #[test]
    fn test_min_cell_boundary() {
        let a = Aggregator::new().with_min_cell_count(12);
        let name = RoiName::new("r");
        assert!(a.run(&name, None, &image(), &store(12), &model()).is_ok());
        assert!(matches!(
            a.run(&name, None, &image(), &store(11), &model()).unwrap_err(),
            RoiError::InsufficientCells {
                found: 11,
                required: 12
            }
        ));
    }

    #[test]
    fn test_default_min_cell_boundary() {
        let a = Aggregator::new();
        assert_eq!(a.min_cell_count(), 10);
        let name = RoiName::new("r");
        let roi = a.run(&name, None, &image(), &store(10), &model()).unwrap();
        assert_eq!(roi.records.len(), 10);
        assert!(matches!(
            a.run(&name, None, &image(), &store(9), &model()).unwrap_err(),
            RoiError::InsufficientCells {
                found: 9,
                required: 10
            }
        ));
    }

    /// 把小细胞的面积替换为 NaN 后再交给内部模型.
    struct NanSmallArea(ModelHandle);

    impl CellClassifier for NanSmallArea {
        fn predict(&self, features: &[CellFeatures]) -> Result<Vec<CellLabel>, PredictError> {
            let patched: Vec<_> = features
                .iter()
                .map(|f| CellFeatures {
                    area: if f.area < 50.0 { f64::NAN } else { f.area },
                    ..*f
                })
                .collect();
            self.0.predict(&patched)
        }
    }

    #[test]
    fn test_nan_feature_is_deterministic() {
        let clf = NanSmallArea(model());
        let first = aggregate(&image(), &store(12), &clf, 10).unwrap();
        let second = aggregate(&image(), &store(12), &clf, 10).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), (1..=12).collect::<Vec<_>>());
        for r in first.iter() {
            // NaN 面积沿 missing 分支, 与面积小于阈值同侧.
            let expected = if r.id % 2 == 0 { CellLabel::Aec } else { CellLabel::Lym };
            assert_eq!(r.label, expected);
        }
    }

    #[test]
    fn test_five_cells_skipped() {
        let err = aggregate(&image(), &store(5), &model(), DEFAULT_MIN_CELL_COUNT).unwrap_err();
        assert!(err.is_skip());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_idempotent_table() {
        let write = || {
            let records = aggregate(&image(), &store(15), &model(), 10).unwrap();
            let mut buf = Vec::new();
            table::write_cells(&mut buf, &records).unwrap();
            buf
        };
        let first = write();
        assert_eq!(first, write());
        assert!(first.starts_with(b"ID,Area,Intensity,Roundness,Label\n1,16.0,90.0,"));
    }

    #[test]
    fn test_degenerate_aborts_roi() {
        let mut cells: Vec<_> = store(12).iter().cloned().collect();
        let dot = Contour::new(vec![(7, 7); 4]).unwrap();
        cells.push(CellInstance::new(13, dot, CoarseType::Other));
        let err = aggregate(&image(), &ContourStore::from_cells(cells), &model(), 10).unwrap_err();
        assert!(matches!(err, RoiError::DegenerateContour { id: 13 }));
    }

    #[test]
    fn test_out_of_bounds_aborts_roi() {
        let mut cells: Vec<_> = store(12).iter().cloned().collect();
        cells.push(square(13, 195, 50, 10));
        let err = aggregate(&image(), &ContourStore::from_cells(cells), &model(), 10).unwrap_err();
        assert!(matches!(err, RoiError::ContourOutOfBounds { id: 13, .. }));
    }

    #[test]
    fn test_unloaded_model_is_fatal() {
        let err = aggregate(&image(), &store(12), &ModelHandle::unloaded(), 10).unwrap_err();
        assert!(err.is_fatal());
    }
}
