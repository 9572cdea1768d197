//! 病灶级特征汇总.

use super::CellFeatureRecord;
use crate::consts::CLASS_NUM;
use crate::data::ContourStore;
use crate::error::{RoiError, RoiResult};
use crate::spatial::LesionEntropy;

/// 单个病灶 (ROI) 的特征汇总.
#[derive(Clone, Debug, PartialEq)]
pub struct LesionFeatureSummary {
    /// 病灶名称, 即 ROI 名称.
    pub lesion: String,

    /// 病理分期. 分期表中没有该 ROI 时为 `None`.
    pub stage: Option<String>,

    /// 各类细胞比例, 以 [`crate::CellLabel::index`] 为下标.
    pub proportions: [f64; CLASS_NUM],

    /// 各类细胞密度, 以 [`crate::CellLabel::index`] 为下标.
    pub densities: [f64; CLASS_NUM],

    /// 仅 AEC 与 LYM 细胞的 Altieri 空间熵.
    pub altieri2: f64,

    /// 全部细胞的 Altieri 空间熵.
    pub altieri3: f64,
}

/// 各类细胞个数.
pub fn label_counts(records: &[CellFeatureRecord]) -> [usize; CLASS_NUM] {
    let mut counts = [0; CLASS_NUM];
    for r in records {
        counts[r.label.index()] += 1;
    }
    counts
}

impl LesionFeatureSummary {
    /// 计算病灶汇总.
    ///
    /// - 比例 `count(c) / total`, 没有细胞时全部为 0;
    /// - 密度 `count(c) * unit_area_scale / pixel_area`;
    /// - 空间熵以 `store` 中对应细胞轮廓的顶点均值为细胞中心.
    ///
    /// # 错误
    ///
    /// `records` 与 `store` 的细胞不一一对应时返回 [`RoiError::CellCountMismatch`].
    pub fn compute(
        lesion: &str,
        stage: Option<String>,
        records: &[CellFeatureRecord],
        store: &ContourStore,
        pixel_area: u64,
        unit_area_scale: f64,
        entropy_cuts: &[f64],
    ) -> RoiResult<Self> {
        let mismatch = || RoiError::CellCountMismatch {
            table: records.len(),
            segmentation: store.len(),
        };
        if records.len() != store.len() {
            return Err(mismatch());
        }
        let centers = records
            .iter()
            .map(|r| {
                let cell = store.get(r.id).ok_or_else(mismatch)?;
                Ok((cell.contour().centroid(), r.label))
            })
            .collect::<RoiResult<Vec<_>>>()?;

        let counts = label_counts(records);
        let total = records.len();
        let proportions = counts.map(|c| {
            if total == 0 {
                0.0
            } else {
                c as f64 / total as f64
            }
        });
        let densities = counts.map(|c| c as f64 * unit_area_scale / pixel_area as f64);
        let entropy = LesionEntropy::compute(centers, entropy_cuts);

        Ok(Self {
            lesion: lesion.to_string(),
            stage,
            proportions,
            densities,
            altieri2: entropy.altieri2.entropy,
            altieri3: entropy.altieri3.entropy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{DEFAULT_ENTROPY_CUTS, DEFAULT_UNIT_AREA_SCALE};
    use crate::data::CellLabel;

    const SEGS: &str = r#"{
        "1": {"type": 0, "contour": [[0, 0], [2, 0], [2, 2], [0, 2]]},
        "2": {"type": 1, "contour": [[10, 0], [12, 0], [12, 2], [10, 2]]},
        "3": {"type": 2, "contour": [[0, 50], [2, 50], [2, 52], [0, 52]]},
        "4": {"type": 0, "contour": [[90, 90], [92, 90], [92, 92], [90, 92]]}
    }"#;

    fn record(id: u32, label: CellLabel) -> CellFeatureRecord {
        CellFeatureRecord {
            id,
            area: 4.0,
            intensity: 0.0,
            roundness: 0.785,
            label,
        }
    }

    #[test]
    fn test_summary() {
        let store = ContourStore::from_json_str(SEGS).unwrap();
        let records = [
            record(1, CellLabel::Aec),
            record(2, CellLabel::Lym),
            record(3, CellLabel::Oc),
            record(4, CellLabel::Aec),
        ];
        let s = LesionFeatureSummary::compute(
            "lesion",
            Some("2".to_string()),
            &records,
            &store,
            100 * 100,
            DEFAULT_UNIT_AREA_SCALE,
            &DEFAULT_ENTROPY_CUTS,
        )
        .unwrap();
        assert_eq!(s.proportions, [0.5, 0.25, 0.25]);
        assert_eq!(s.densities, [0.0008, 0.0004, 0.0004]);
        assert!(s.altieri2 > 0.0);
        assert!(s.altieri3 > s.altieri2);
        assert_eq!(s.stage.as_deref(), Some("2"));
    }

    #[test]
    fn test_summary_mismatch() {
        let store = ContourStore::from_json_str(SEGS).unwrap();
        let records = [record(1, CellLabel::Aec), record(2, CellLabel::Lym)];
        let err = LesionFeatureSummary::compute(
            "lesion",
            None,
            &records,
            &store,
            10_000,
            DEFAULT_UNIT_AREA_SCALE,
            &DEFAULT_ENTROPY_CUTS,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RoiError::CellCountMismatch {
                table: 2,
                segmentation: 4
            }
        ));

        let records = [1, 2, 3, 9].map(|id| record(id, CellLabel::Oc));
        assert!(LesionFeatureSummary::compute(
            "lesion",
            None,
            &records,
            &store,
            10_000,
            DEFAULT_UNIT_AREA_SCALE,
            &DEFAULT_ENTROPY_CUTS,
        )
        .is_err());
    }
}
