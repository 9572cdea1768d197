//! 空间统计与纹理特征.
//!
//! 所有计算都以细胞中心 (轮廓顶点均值) 为细胞位置.

mod embed;
mod entropy;
mod glcm;

pub use embed::EmbedMap;
pub use entropy::{altieri_entropy, AltieriEntropy};
pub use glcm::{glcm, EmbedTexture, TextureFeatures};

use crate::data::CellLabel;

/// 病灶的两种 Altieri 空间熵.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct LesionEntropy {
    /// 仅统计 AEC 与 LYM 细胞.
    pub altieri2: AltieriEntropy,

    /// 统计全部细胞.
    pub altieri3: AltieriEntropy,
}

impl LesionEntropy {
    /// 由细胞中心 `(x, y)` 及类别计算.
    pub fn compute<I>(cells: I, cuts: &[f64]) -> Self
    where
        I: IntoIterator<Item = ((f64, f64), CellLabel)>,
    {
        let mut all_pts = Vec::new();
        let mut all_labels = Vec::new();
        let mut pts2 = Vec::new();
        let mut labels2 = Vec::new();
        for ((x, y), label) in cells {
            all_pts.push((y, x));
            all_labels.push(label);
            if label != CellLabel::Oc {
                pts2.push((y, x));
                labels2.push(label);
            }
        }
        Self {
            altieri2: altieri_entropy(&pts2, &labels2, cuts),
            altieri3: altieri_entropy(&all_pts, &all_labels, cuts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DEFAULT_ENTROPY_CUTS;

    #[test]
    fn test_oc_excluded_from_altieri2() {
        let cells = [
            ((0.0, 0.0), CellLabel::Aec),
            ((5.0, 0.0), CellLabel::Aec),
            ((10.0, 0.0), CellLabel::Oc),
        ];
        let e = LesionEntropy::compute(cells, &DEFAULT_ENTROPY_CUTS);
        // 只剩一个 (AEC, AEC) 点对
        assert_eq!(e.altieri2.entropy, 0.0);
        assert!(e.altieri3.entropy > 0.0);
    }
}
