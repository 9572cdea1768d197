//! 流水线各步骤的 [`RoiTask`] 实现.
//!
//! 每个步骤只负责单个 ROI; 输出目录的准备 (清空重建) 和队列级表格的写出
//! 由调用方在批处理前后完成.

use super::RoiTask;
use crate::aggregate::{Aggregator, LesionFeatureSummary};
use crate::classify::CellClassifier;
use crate::consts::embed::REDUCTION_SIZE;
use crate::data::{ContourStore, RoiImage, RoiName};
use crate::dataset::table::{self, TextureRow};
use crate::dataset::{mask, CellTable, DatasetLayout, LesionStages};
use crate::error::{RoiError, RoiResult};
use crate::spatial::{EmbedMap, EmbedTexture};
use image::RgbImage;

/// 提取细胞特征并分类, 写出细胞特征表, 产出病灶级汇总.
///
/// 病灶面积取 ROI 图像的实际像素数.
pub struct ExtractStep<C> {
    layout: DatasetLayout,
    aggregator: Aggregator,
    classifier: C,
    stages: LesionStages,
}

impl<C: CellClassifier + Sync> ExtractStep<C> {
    /// 初始化.
    pub fn new(
        layout: DatasetLayout,
        aggregator: Aggregator,
        classifier: C,
        stages: LesionStages,
    ) -> Self {
        Self {
            layout,
            aggregator,
            classifier,
            stages,
        }
    }
}

impl<C: CellClassifier + Sync> RoiTask for ExtractStep<C> {
    type Input = (RoiImage, ContourStore);
    type Output = LesionFeatureSummary;

    fn process(&self, name: &RoiName, (image, store): Self::Input) -> RoiResult<Self::Output> {
        let stage = self.stages.get(name).map(str::to_string);
        let feas = self
            .aggregator
            .run(name, stage, &image, &store, &self.classifier)?;
        table::save_cells(self.layout.cell_fea(name), &feas.records)?;
        Ok(feas.summary)
    }
}

/// 由已有的细胞特征表重新计算病灶级汇总.
///
/// 病灶面积取 ROI 名称中记录的宽高.
pub struct LesionStep {
    aggregator: Aggregator,
    stages: LesionStages,
}

impl LesionStep {
    /// 初始化.
    #[inline]
    pub fn new(aggregator: Aggregator, stages: LesionStages) -> Self {
        Self { aggregator, stages }
    }
}

impl RoiTask for LesionStep {
    type Input = CellTable;
    type Output = LesionFeatureSummary;

    fn process(&self, name: &RoiName, t: CellTable) -> RoiResult<Self::Output> {
        let (w, h) = name.dimensions()?;
        let stage = self.stages.get(name).map(str::to_string);
        self.aggregator
            .summarize(name, stage, &t.records, &t.store, w as u64 * h as u64)
    }
}

/// 生成细胞分布图并保存为 PNG. 产出分布图尺寸 `(h, w)`.
pub struct EmbedStep {
    layout: DatasetLayout,
    reduction: u32,
}

impl EmbedStep {
    /// 使用默认降采样倍率.
    #[inline]
    pub fn new(layout: DatasetLayout) -> Self {
        Self::with_reduction(layout, REDUCTION_SIZE)
    }

    /// 指定降采样倍率. `reduction` 为 0 时程序 panic.
    pub fn with_reduction(layout: DatasetLayout, reduction: u32) -> Self {
        assert!(reduction > 0);
        Self { layout, reduction }
    }

    /// 由细胞特征表绘制分布图.
    ///
    /// # 错误
    ///
    /// 细胞中心落在 ROI 尺寸之外时返回 [`RoiError::ContourOutOfBounds`].
    pub fn render(&self, name: &RoiName, t: &CellTable) -> RoiResult<EmbedMap> {
        let (width, height) = name.dimensions()?;
        let mut map = EmbedMap::with_reduction(width, height, self.reduction);
        for (id, center, label) in t.centers() {
            if !map.add(center, label) {
                return Err(RoiError::ContourOutOfBounds { id, width, height });
            }
        }
        Ok(map)
    }
}

impl RoiTask for EmbedStep {
    type Input = CellTable;
    type Output = (usize, usize);

    fn process(&self, name: &RoiName, t: CellTable) -> RoiResult<Self::Output> {
        let map = self.render(name, &t)?;
        let path = self.layout.embed_map(name);
        map.to_image()
            .save(&path)
            .map_err(|e| RoiError::image(path, e))?;
        Ok(map.shape())
    }
}

/// 计算细胞分布图的纹理特征.
pub struct TextureStep {
    stages: LesionStages,
}

impl TextureStep {
    /// 初始化.
    #[inline]
    pub fn new(stages: LesionStages) -> Self {
        Self { stages }
    }
}

impl RoiTask for TextureStep {
    type Input = RgbImage;
    type Output = TextureRow;

    fn process(&self, name: &RoiName, img: RgbImage) -> RoiResult<Self::Output> {
        let stage = self.stages.get(name).map(str::to_string);
        Ok(TextureRow::new(name, stage, &EmbedTexture::from_image(&img)))
    }
}

/// 生成细胞实例掩码并保存为 `.npy`. 产出细胞数.
pub struct CellMaskStep {
    layout: DatasetLayout,
}

impl CellMaskStep {
    /// 初始化.
    #[inline]
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }
}

impl RoiTask for CellMaskStep {
    type Input = (RoiImage, ContourStore);
    type Output = usize;

    fn process(&self, name: &RoiName, (image, store): Self::Input) -> RoiResult<usize> {
        let m = mask::instance_mask(&store, image.width(), image.height())?;
        mask::save_mask(self.layout.cell_mask(name), &m)?;
        Ok(store.len())
    }
}

/// 将已转换的分割记录写入 `RegionSegs`. 产出细胞数.
pub struct ConvertStep {
    layout: DatasetLayout,
}

impl ConvertStep {
    /// 初始化.
    #[inline]
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }
}

impl RoiTask for ConvertStep {
    type Input = ContourStore;
    type Output = usize;

    fn process(&self, name: &RoiName, store: ContourStore) -> RoiResult<usize> {
        store.save(self.layout.region_seg(name))?;
        Ok(store.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;
    use crate::classify::{GbtModel, ModelHandle};
    use crate::data::CellLabel;
    use crate::dataset::{self, Dataset};
    use image::Rgb;
    use std::fs;
    use std::path::Path;

    const NAME: &str = "L1-Wlen000200Hlen000100";

    /// 12 个方形细胞, 偶数 ID 为大细胞.
    fn segs() -> String {
        let cells: Vec<String> = (1..=12)
            .map(|id| {
                let x = (id - 1) % 6 * 30 + 2;
                let y = (id - 1) / 6 * 40 + 2;
                let s = if id % 2 == 0 { 10 } else { 4 };
                format!(
                    r#""{id}": {{"type": 0, "contour": [[{x}, {y}], [{}, {y}], [{}, {}], [{x}, {}]]}}"#,
                    x + s,
                    x + s,
                    y + s,
                    y + s
                )
            })
            .collect();
        format!("{{{}}}", cells.join(","))
    }

    fn setup(dir: &Path) -> DatasetLayout {
        let layout = DatasetLayout::new(dir, Dataset::Usa);
        layout.ensure_dir(DatasetLayout::ROI_IMG_DIR).unwrap();
        layout.ensure_dir(DatasetLayout::ROI_SEG_DIR).unwrap();
        let name = RoiName::new(NAME);
        RgbImage::from_pixel(200, 100, Rgb([50, 60, 70]))
            .save(layout.roi_image(&name))
            .unwrap();
        fs::write(layout.region_seg(&name), segs()).unwrap();
        fs::write(layout.lesion_stages(), format!(r#"{{"{NAME}": 2}}"#)).unwrap();
        layout
    }

    #[test]
    fn test_pipeline_steps() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = setup(tmp.path());
        let stages = LesionStages::open_or_empty(layout.lesion_stages()).unwrap();
        let model = ModelHandle::from_model(GbtModel::area_stump(50.0));

        // 特征提取
        layout.reset_dir(DatasetLayout::CELL_FEA_DIR).unwrap();
        let step = ExtractStep::new(layout.clone(), Aggregator::new(), &model, stages.clone());
        let loader = dataset::roi_loader(layout.clone()).unwrap();
        let report = batch::run(loader, &step).unwrap();
        assert!(report.is_clean());
        let extracted = report.into_outputs();
        assert_eq!(extracted[0].stage.as_deref(), Some("2"));
        assert!(layout.cell_fea(&RoiName::new(NAME)).is_file());

        // 病灶汇总: 名称中的尺寸与图像一致, 结果相同.
        let loader = dataset::cell_table_loader(layout.clone()).unwrap();
        let report = batch::run(loader, &LesionStep::new(Aggregator::new(), stages.clone())).unwrap();
        assert_eq!(report.into_outputs(), extracted);

        // 分布图与纹理
        layout.reset_dir(DatasetLayout::EMBED_DIR).unwrap();
        let loader = dataset::cell_table_loader(layout.clone()).unwrap();
        let report = batch::run(loader, &EmbedStep::new(layout.clone())).unwrap();
        assert_eq!(report.outputs[0].1, (3, 5));
        let loader = dataset::embed_loader(layout.clone()).unwrap();
        let report = batch::run(loader, &TextureStep::new(stages)).unwrap();
        assert_eq!(report.outputs[0].1.lesion, NAME);

        // 实例掩码
        layout.reset_dir(DatasetLayout::CELL_MASK_DIR).unwrap();
        let loader = dataset::roi_loader(layout.clone()).unwrap();
        let report = batch::run(loader, &CellMaskStep::new(layout.clone())).unwrap();
        assert_eq!(report.into_outputs(), vec![12]);
        assert!(layout.cell_mask(&RoiName::new(NAME)).is_file());
    }

    #[test]
    fn test_extract_unloaded_model_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = setup(tmp.path());
        layout.reset_dir(DatasetLayout::CELL_FEA_DIR).unwrap();
        let step = ExtractStep::new(
            layout.clone(),
            Aggregator::new(),
            ModelHandle::unloaded(),
            LesionStages::default(),
        );
        let loader = dataset::roi_loader(layout.clone()).unwrap();
        assert!(batch::run(loader, &step).unwrap_err().is_fatal());
        assert!(!layout.cell_fea(&RoiName::new(NAME)).exists());
    }

    #[test]
    fn test_extract_skips_small_roi() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = setup(tmp.path());
        layout.reset_dir(DatasetLayout::CELL_FEA_DIR).unwrap();
        let model = ModelHandle::from_model(GbtModel::area_stump(50.0));
        let step = ExtractStep::new(
            layout.clone(),
            Aggregator::new().with_min_cell_count(13),
            &model,
            LesionStages::default(),
        );
        let report = batch::run(dataset::roi_loader(layout.clone()).unwrap(), &step).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert!(!layout.cell_fea(&RoiName::new(NAME)).exists());
    }

    #[test]
    fn test_embed_out_of_range() {
        let store = ContourStore::from_json_str(
            r#"{"1": {"type": 0, "contour": [[500, 10], [504, 10], [504, 14]]}}"#,
        )
        .unwrap();
        let record = crate::aggregate::CellFeatureRecord {
            id: 1,
            area: 8.0,
            intensity: 1.0,
            roundness: 0.5,
            label: CellLabel::Lym,
        };
        let t = CellTable::new(vec![record], store).unwrap();
        let step = EmbedStep::new(DatasetLayout::new("/unused", Dataset::Japan));
        assert!(matches!(
            step.render(&RoiName::new(NAME), &t).unwrap_err(),
            RoiError::ContourOutOfBounds { id: 1, .. }
        ));
    }

    #[test]
    fn test_convert_step() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = DatasetLayout::new(tmp.path(), Dataset::China);
        layout.ensure_dir(DatasetLayout::RAW_SEG_DIR).unwrap();
        layout.ensure_dir(DatasetLayout::ROI_SEG_DIR).unwrap();
        let name = RoiName::new(NAME);
        fs::write(
            layout.raw_seg(&name),
            r#"{"nuc": {"7": {"contour": [[0, 0], [4, 0], [4, 4]], "type": 2}}}"#,
        )
        .unwrap();
        let loader = dataset::raw_seg_loader(layout.clone()).unwrap();
        let report = batch::run(loader, &ConvertStep::new(layout.clone())).unwrap();
        assert_eq!(report.into_outputs(), vec![1]);
        let store = ContourStore::open(layout.region_seg(&name)).unwrap();
        assert_eq!(store.get(1).map(|c| c.coarse_type()), Some(crate::CoarseType::LymLike));
    }
}
