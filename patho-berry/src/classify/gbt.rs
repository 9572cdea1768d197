//! 梯度提升树集成模型 (多分类).
//!
//! 推断规则与 XGBoost `multi:softprob` 一致:
//!
//! - 每棵树属于一个类别, 类别 `k` 的 margin 为 `base_score[k]` 加上该类别
//!   所有树的叶子值, 以 `f32` 累加;
//! - 特征先转换为 `f32`, 分裂节点上 `x[feature] < threshold` 走 `yes`,
//!   否则走 `no`, NaN 走 `missing`;
//! - 最终类别取 margin 最大者, 并列时取编码较小者.
//!
//! softmax 是单调的, 因此不需要真的计算概率.

use crate::consts::{CLASS_NUM, FEATURE_DIM};
use crate::data::CellLabel;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 回归树节点.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// 分裂节点. 子节点下标必须严格大于当前节点下标.
    Split {
        /// 特征下标: 0 面积, 1 强度, 2 圆度.
        feature: u32,
        /// 分裂阈值.
        threshold: f32,
        /// `x < threshold` 时前往的节点.
        yes: u32,
        /// `x >= threshold` 时前往的节点.
        no: u32,
        /// `x` 为 NaN 时前往的节点.
        missing: u32,
    },

    /// 叶子节点.
    Leaf {
        /// 叶子值 (margin 增量).
        value: f32,
    },
}

/// 回归树. 节点 0 为根.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegTree {
    nodes: Vec<TreeNode>,
}

impl RegTree {
    /// 构造并校验回归树.
    pub fn new(nodes: Vec<TreeNode>) -> Result<Self, ModelError> {
        let tree = Self { nodes };
        tree.validate()?;
        Ok(tree)
    }

    /// 节点列表.
    #[inline]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("empty tree".to_string()));
        }
        let len = self.nodes.len() as u32;
        for (idx, node) in self.nodes.iter().enumerate() {
            let idx = idx as u32;
            if let TreeNode::Split {
                feature,
                yes,
                no,
                missing,
                ..
            } = *node
            {
                if feature as usize >= FEATURE_DIM {
                    return Err(ModelError::Invalid(format!(
                        "node {idx} splits on feature {feature}"
                    )));
                }
                for child in [yes, no, missing] {
                    if child <= idx || child >= len {
                        return Err(ModelError::Invalid(format!(
                            "node {idx} points to invalid child {child}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// 对单个样本求叶子值.
    ///
    /// 特征值在比较前转换为 `f32`, 因此与阈值相差在 `f32` 精度以内的特征
    /// 会被视为等于阈值.
    pub fn eval(&self, x: &[f64; FEATURE_DIM]) -> f32 {
        let mut idx = 0usize;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing,
                } => {
                    let v = x[feature as usize] as f32;
                    let next = if v.is_nan() {
                        missing
                    } else if v < threshold {
                        yes
                    } else {
                        no
                    };
                    idx = next as usize;
                }
            }
        }
    }
}

/// 冻结的多分类梯度提升树模型.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GbtModel {
    base_score: Vec<f32>,
    trees: Vec<RegTree>,
    tree_class: Vec<u32>,
}

impl GbtModel {
    /// 构造并校验模型.
    ///
    /// `base_score` 长度必须为类别数 (3); `trees` 中每一项为 `(类别, 树)`.
    pub fn new(base_score: Vec<f32>, trees: Vec<(u32, RegTree)>) -> Result<Self, ModelError> {
        let (tree_class, trees) = trees.into_iter().unzip();
        let model = Self {
            base_score,
            trees,
            tree_class,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.base_score.len() != CLASS_NUM {
            return Err(ModelError::Invalid(format!(
                "expected {CLASS_NUM} classes, found {}",
                self.base_score.len()
            )));
        }
        if self.tree_class.len() != self.trees.len() {
            return Err(ModelError::Invalid("tree/class length mismatch".to_string()));
        }
        if let Some(c) = self.tree_class.iter().find(|&&c| c as usize >= CLASS_NUM) {
            return Err(ModelError::Invalid(format!("tree assigned to class {c}")));
        }
        self.trees.iter().try_for_each(RegTree::validate)
    }

    /// 树的个数.
    #[inline]
    pub fn tree_len(&self) -> usize {
        self.trees.len()
    }

    /// 各类别 margin.
    pub fn margins(&self, x: &[f64; FEATURE_DIM]) -> [f32; CLASS_NUM] {
        let mut margins = [0.0f32; CLASS_NUM];
        margins.copy_from_slice(&self.base_score);
        for (tree, &class) in self.trees.iter().zip(self.tree_class.iter()) {
            margins[class as usize] += tree.eval(x);
        }
        margins
    }

    /// 单样本推断.
    ///
    /// NaN 特征沿 `missing` 分支前进; 若 margin 本身为 NaN, 它永远不会胜出,
    /// 全部为 NaN 时结果为 [`CellLabel::Aec`]. 两种情况都是确定性的.
    pub fn predict_one(&self, x: &[f64; FEATURE_DIM]) -> CellLabel {
        let margins = self.margins(x);
        let mut best = 0usize;
        for k in 1..CLASS_NUM {
            if margins[k] > margins[best] || (margins[best].is_nan() && !margins[k].is_nan()) {
                best = k;
            }
        }
        CellLabel::ALL[best]
    }

    /// 从 bincode 数据流读取并校验.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, ModelError> {
        let model: Self = bincode::deserialize_from(rdr)?;
        model.validate()?;
        Ok(model)
    }

    /// 打开 bincode 模型文件.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// 以 bincode 格式写出.
    pub fn to_writer<W: Write>(&self, w: W) -> Result<(), ModelError> {
        Ok(bincode::serialize_into(w, self)?)
    }

    /// 保存为 bincode 模型文件.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let path = path.as_ref();
        let io_err = |source: std::io::Error| ModelError::Io {
            path: path.to_owned(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut w = BufWriter::new(file);
        self.to_writer(&mut w)?;
        w.flush().map_err(io_err)
    }
}

#[cfg(test)]
impl GbtModel {
    /// 测试用模型: 面积小于 `threshold` 判为 LYM, 否则判为 AEC, 从不输出 OC.
    /// 面积为 NaN 时判为 LYM.
    pub(crate) fn area_stump(threshold: f32) -> Self {
        let stump = |small: f32, large: f32| {
            RegTree::new(vec![
                TreeNode::Split {
                    feature: 0,
                    threshold,
                    yes: 1,
                    no: 2,
                    missing: 1,
                },
                TreeNode::Leaf { value: small },
                TreeNode::Leaf { value: large },
            ])
            .unwrap()
        };
        let oc = RegTree::new(vec![TreeNode::Leaf { value: -0.5 }]).unwrap();
        Self::new(
            vec![0.5; CLASS_NUM],
            vec![(0, stump(-1.0, 1.0)), (1, stump(1.0, -1.0)), (2, oc)],
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stump_predict() {
        let m = GbtModel::area_stump(50.0);
        assert_eq!(m.tree_len(), 3);
        assert_eq!(m.predict_one(&[10.0, 0.0, 0.0]), CellLabel::Lym);
        assert_eq!(m.predict_one(&[50.0, 0.0, 0.0]), CellLabel::Aec);
        assert_eq!(m.predict_one(&[f64::NAN, 0.0, 0.0]), CellLabel::Lym);
    }

    #[test]
    fn test_tie_breaks_to_lowest() {
        let leaf = |v| RegTree::new(vec![TreeNode::Leaf { value: v }]).unwrap();
        let m = GbtModel::new(vec![0.0; 3], vec![(1, leaf(1.0)), (2, leaf(1.0))]).unwrap();
        assert_eq!(m.predict_one(&[0.0; 3]), CellLabel::Lym);

        let m = GbtModel::new(vec![0.0; 3], vec![(0, leaf(f32::NAN))]).unwrap();
        assert_eq!(m.predict_one(&[0.0; 3]), CellLabel::Lym);
    }

    /// 0.09999999999 转换为 `f32` 后等于阈值 0.1, 应走右分支.
    #[test]
    fn test_split_compares_in_f32() {
        let tree = RegTree::new(vec![
            TreeNode::Split {
                feature: 0,
                threshold: 0.1,
                yes: 1,
                no: 2,
                missing: 1,
            },
            TreeNode::Leaf { value: -1.0 },
            TreeNode::Leaf { value: 1.0 },
        ])
        .unwrap();
        let x = [0.09999999999, 0.0, 0.0];
        assert_eq!(tree.eval(&x), 1.0);
        assert_eq!(tree.eval(&[0.0999, 0.0, 0.0]), -1.0);

        let m = GbtModel::new(vec![0.5; CLASS_NUM], vec![(0, tree)]).unwrap();
        assert_eq!(m.predict_one(&x), CellLabel::Aec);
        assert_eq!(m.predict_one(&[0.0999, 0.0, 0.0]), CellLabel::Lym);
    }

    #[test]
    fn test_invalid_trees() {
        assert!(RegTree::new(vec![]).is_err());
        let backwards = vec![
            TreeNode::Leaf { value: 0.0 },
            TreeNode::Split {
                feature: 0,
                threshold: 1.0,
                yes: 0,
                no: 0,
                missing: 0,
            },
        ];
        assert!(RegTree::new(backwards).is_err());
        let bad_feature = vec![
            TreeNode::Split {
                feature: 3,
                threshold: 1.0,
                yes: 1,
                no: 1,
                missing: 1,
            },
            TreeNode::Leaf { value: 0.0 },
        ];
        assert!(RegTree::new(bad_feature).is_err());
    }

    #[test]
    fn test_invalid_model() {
        let leaf = RegTree::new(vec![TreeNode::Leaf { value: 0.0 }]).unwrap();
        assert!(GbtModel::new(vec![0.0; 2], vec![]).is_err());
        assert!(GbtModel::new(vec![0.0; 3], vec![(3, leaf)]).is_err());
    }

    #[test]
    fn test_blob_save_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let m = GbtModel::area_stump(42.0);
        m.save(&path).unwrap();
        assert_eq!(GbtModel::open(&path).unwrap(), m);

        std::fs::write(&path, b"garbage").unwrap();
        assert!(matches!(
            GbtModel::open(&path).unwrap_err(),
            ModelError::Decode(_)
        ));
        assert!(matches!(
            GbtModel::open(dir.path().join("missing.bin")).unwrap_err(),
            ModelError::Io { .. }
        ));
    }
}
