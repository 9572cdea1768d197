//! 细胞分类器 (仅推断).
//!
//! 训练在线下一次性完成, 这里只消费冻结的模型参数. 模型通过显式传递的
//! [`ModelHandle`] 共享给所有 ROI, 运行期间只读.

mod gbt;
mod xgboost;

pub use gbt::{GbtModel, RegTree, TreeNode};

use crate::data::CellLabel;
use crate::error::{ModelError, PredictError};
use crate::features::CellFeatures;
use std::path::Path;

/// 细胞分类器: 把特征向量批量映射为细胞类别.
///
/// 实现必须是确定性的: 相同输入 (包括含 NaN 的输入) 总是得到相同输出.
pub trait CellClassifier {
    /// 批量推断. 返回值与 `features` 一一对应.
    fn predict(&self, features: &[CellFeatures]) -> Result<Vec<CellLabel>, PredictError>;
}

/// 只读模型句柄.
///
/// 句柄可能处于 "未载入" 状态, 此时任何推断都会返回
/// [`PredictError::ModelNotLoaded`].
#[derive(Clone, Debug, Default)]
pub struct ModelHandle {
    model: Option<GbtModel>,
}

impl ModelHandle {
    /// 未载入模型的句柄.
    #[inline]
    pub fn unloaded() -> Self {
        Self { model: None }
    }

    /// 由已构造的模型创建句柄.
    #[inline]
    pub fn from_model(model: GbtModel) -> Self {
        Self { model: Some(model) }
    }

    /// 从 bincode 模型文件载入.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        GbtModel::open(path).map(Self::from_model)
    }

    /// 是否已载入模型.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// 底层模型.
    #[inline]
    pub fn model(&self) -> Option<&GbtModel> {
        self.model.as_ref()
    }
}

impl CellClassifier for ModelHandle {
    fn predict(&self, features: &[CellFeatures]) -> Result<Vec<CellLabel>, PredictError> {
        let model = self.model.as_ref().ok_or(PredictError::ModelNotLoaded)?;
        Ok(features.iter().map(|f| model.predict_one(&f.to_array())).collect())
    }
}

impl CellClassifier for GbtModel {
    #[inline]
    fn predict(&self, features: &[CellFeatures]) -> Result<Vec<CellLabel>, PredictError> {
        Ok(features.iter().map(|f| self.predict_one(&f.to_array())).collect())
    }
}

impl<C: CellClassifier + ?Sized> CellClassifier for &C {
    #[inline]
    fn predict(&self, features: &[CellFeatures]) -> Result<Vec<CellLabel>, PredictError> {
        (**self).predict(features)
    }
}
