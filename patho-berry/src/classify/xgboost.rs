//! 导入 XGBoost 原生 JSON 模型 (`Booster.save_model("*.json")`).
//!
//! 只读取推断所需的字段:
//!
//! ```text
//! learner.learner_model_param.{num_class, base_score}
//! learner.gradient_booster.model.{trees, tree_info}
//! ```
//!
//! 其余字段 (目标函数、特征名、统计量等) 全部忽略.

use super::gbt::{GbtModel, RegTree, TreeNode};
use crate::consts::CLASS_NUM;
use crate::error::ModelError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Read;

#[derive(Deserialize)]
struct Document {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    learner_model_param: LearnerModelParam,
    gradient_booster: GradientBooster,
}

/// XGBoost 把这里的所有数值都写成字符串.
#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_class: String,
}

#[derive(Deserialize)]
struct GradientBooster {
    name: String,
    model: Option<BoosterModel>,
}

#[derive(Deserialize)]
struct BoosterModel {
    trees: Vec<RawTree>,
    tree_info: Vec<u32>,
}

#[derive(Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    /// 旧版本为 `0/1` 整数, 新版本为布尔值.
    default_left: Vec<Value>,
}

fn invalid<S: Into<String>>(msg: S) -> ModelError {
    ModelError::Invalid(msg.into())
}

impl GbtModel {
    /// 从 XGBoost JSON 模型构造.
    ///
    /// # 注意
    ///
    /// 1. 只支持 `gbtree` 提升器, 且 `num_class` 必须为 3;
    /// 2. `base_score` 可以是单个值 (`"5E-1"`), 也可以是 `"[...]"` 形式的列表.
    ///   单个值会被用于所有类别;
    /// 3. 节点会被重新编号为广度优先顺序, 以满足子节点下标大于父节点下标的要求.
    pub fn from_xgboost_json<R: Read>(rdr: R) -> Result<Self, ModelError> {
        let doc: Document = serde_json::from_reader(rdr)?;
        let learner = doc.learner;

        let num_class: usize = learner
            .learner_model_param
            .num_class
            .trim()
            .parse()
            .map_err(|_| invalid("num_class is not an integer"))?;
        if num_class != CLASS_NUM {
            return Err(invalid(format!(
                "expected {CLASS_NUM} classes, found {num_class}"
            )));
        }
        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;

        let booster = learner.gradient_booster;
        if booster.name != "gbtree" {
            return Err(invalid(format!("unsupported booster `{}`", booster.name)));
        }
        let model = booster.model.ok_or_else(|| invalid("missing booster model"))?;
        if model.trees.len() != model.tree_info.len() {
            return Err(invalid("trees/tree_info length mismatch"));
        }

        let trees = model
            .tree_info
            .into_iter()
            .zip(model.trees)
            .enumerate()
            .map(|(i, (class, raw))| {
                convert_tree(&raw)
                    .map(|t| (class, t))
                    .map_err(|e| invalid(format!("tree {i}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(base_score, trees)
    }
}

fn parse_base_score(s: &str) -> Result<Vec<f32>, ModelError> {
    let body = s.trim().trim_start_matches('[').trim_end_matches(']');
    let values = body
        .split(',')
        .map(|v| v.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid(format!("cannot parse base_score `{s}`")))?;
    match values.len() {
        1 => Ok(vec![values[0]; CLASS_NUM]),
        CLASS_NUM => Ok(values),
        n => Err(invalid(format!("base_score has {n} value(s)"))),
    }
}

fn flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

/// 将 XGBoost 的数组形式树结构转换为 [`RegTree`].
fn convert_tree(raw: &RawTree) -> Result<RegTree, String> {
    let n = raw.left_children.len();
    if n == 0 {
        return Err("empty tree".to_string());
    }
    if [
        raw.right_children.len(),
        raw.split_indices.len(),
        raw.split_conditions.len(),
        raw.default_left.len(),
    ]
    .iter()
    .any(|&len| len != n)
    {
        return Err("node array length mismatch".to_string());
    }

    let child = |c: i64| -> Result<usize, String> {
        usize::try_from(c)
            .ok()
            .filter(|&c| c < n)
            .ok_or_else(|| format!("child index {c} out of range"))
    };

    // 广度优先重新编号. order[new] = old, remap[old] = new.
    let mut order = Vec::with_capacity(n);
    let mut remap = vec![None; n];
    let mut queue = VecDeque::from([0usize]);
    remap[0] = Some(0u32);
    while let Some(old) = queue.pop_front() {
        order.push(old);
        if raw.left_children[old] == -1 {
            continue;
        }
        for c in [raw.left_children[old], raw.right_children[old]] {
            let c = child(c)?;
            if remap[c].is_some() {
                return Err(format!("node {c} is reachable twice"));
            }
            remap[c] = Some((order.len() + queue.len()) as u32);
            queue.push_back(c);
        }
    }

    order
        .iter()
        .map(|&old| {
            if raw.left_children[old] == -1 {
                return Ok(TreeNode::Leaf {
                    value: raw.split_conditions[old],
                });
            }
            // 上面的遍历已经保证这两个下标合法且已编号.
            let yes = remap[raw.left_children[old] as usize].unwrap_or_default();
            let no = remap[raw.right_children[old] as usize].unwrap_or_default();
            let default_left = flag(&raw.default_left[old])
                .ok_or_else(|| format!("node {old}: bad default_left"))?;
            let feature = u32::try_from(raw.split_indices[old])
                .map_err(|_| format!("node {old}: bad split index"))?;
            Ok(TreeNode::Split {
                feature,
                threshold: raw.split_conditions[old],
                yes,
                no,
                missing: if default_left { yes } else { no },
            })
        })
        .collect::<Result<Vec<_>, String>>()
        .and_then(|nodes| RegTree::new(nodes).map_err(|e| e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellLabel;

    /// 三棵树: 类别 0 在面积 >= 50 时得分, 类别 1 在面积 < 50 时得分,
    /// 类别 2 恒为负. 类别 1 的树中右子节点的编号小于左子节点.
    const MODEL: &str = r#"{
        "learner": {
            "attributes": {},
            "feature_names": [],
            "learner_model_param": {
                "base_score": "5E-1",
                "num_class": "3",
                "num_feature": "3",
                "num_target": "1"
            },
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "gbtree_model_param": {"num_trees": "3"},
                    "tree_info": [0, 1, 2],
                    "trees": [
                        {
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [0, 0, 0],
                            "split_conditions": [50.0, -1.0, 1.0],
                            "default_left": [0, 0, 0]
                        },
                        {
                            "left_children": [2, -1, -1],
                            "right_children": [1, -1, -1],
                            "split_indices": [0, 0, 0],
                            "split_conditions": [50.0, -1.0, 1.0],
                            "default_left": [true, false, false]
                        },
                        {
                            "left_children": [-1],
                            "right_children": [-1],
                            "split_indices": [0],
                            "split_conditions": [-0.5],
                            "default_left": [0]
                        }
                    ]
                }
            }
        }
    }"#;

    #[test]
    fn test_import_and_predict() {
        let m = GbtModel::from_xgboost_json(MODEL.as_bytes()).unwrap();
        assert_eq!(m.tree_len(), 3);
        assert_eq!(m.predict_one(&[10.0, 0.0, 0.0]), CellLabel::Lym);
        assert_eq!(m.predict_one(&[80.0, 0.0, 0.0]), CellLabel::Aec);
        // 第一棵树 NaN 走右 (+1), 第二棵树 NaN 走左 (+1): 并列取较小编码.
        assert_eq!(m.predict_one(&[f64::NAN, 0.0, 0.0]), CellLabel::Aec);
    }

    #[test]
    fn test_children_renumbered() {
        let raw = RawTree {
            left_children: vec![-1, 3, -1, -1, 1],
            right_children: vec![-1, 2, -1, -1, 0],
            split_indices: vec![0, 1, 0, 0, 2],
            split_conditions: vec![7.0, 0.5, 8.0, 9.0, 0.25],
            default_left: vec![Value::from(0); 5],
        };
        // 以 0 号为根的树只有一个叶子, 其余节点不可达.
        let t = convert_tree(&raw).unwrap();
        assert_eq!(t.nodes(), &[TreeNode::Leaf { value: 7.0 }]);

        let raw = RawTree {
            left_children: vec![2, -1, -1],
            right_children: vec![1, -1, -1],
            split_indices: vec![1, 0, 0],
            split_conditions: vec![0.5, 8.0, 9.0],
            default_left: vec![Value::from(false); 3],
        };
        let t = convert_tree(&raw).unwrap();
        assert_eq!(
            t.nodes(),
            &[
                TreeNode::Split {
                    feature: 1,
                    threshold: 0.5,
                    yes: 1,
                    no: 2,
                    missing: 2,
                },
                TreeNode::Leaf { value: 9.0 },
                TreeNode::Leaf { value: 8.0 },
            ]
        );

        let raw = RawTree {
            left_children: vec![2, -1, 1, -1],
            right_children: vec![3, -1, 1, -1],
            split_indices: vec![0, 0, 1, 0],
            split_conditions: vec![1.0, 2.0, 3.0, 4.0],
            default_left: vec![Value::from(1); 4],
        };
        // 2 号节点的两个子节点相同.
        assert!(convert_tree(&raw).is_err());
    }

    /// 阈值按 `f32` 读取, 与其相差在 `f32` 精度以内的特征走 `no` 分支.
    #[test]
    fn test_threshold_is_f32() {
        let doc = r#"{
            "learner": {
                "learner_model_param": {"base_score": "5E-1", "num_class": "3"},
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "trees": [
                            {"left_children": [1, -1, -1], "right_children": [2, -1, -1],
                             "split_indices": [0, 0, 0], "split_conditions": [1E-1, -1.0, 1.0],
                             "default_left": [true, false, false]}
                        ],
                        "tree_info": [0]
                    }
                }
            }
        }"#;
        let m = GbtModel::from_xgboost_json(doc.as_bytes()).unwrap();
        assert_eq!(m.predict_one(&[0.09999999999, 0.0, 0.0]), CellLabel::Aec);
        assert_eq!(m.predict_one(&[0.05, 0.0, 0.0]), CellLabel::Lym);
    }

    #[test]
    fn test_base_score_forms() {
        assert_eq!(parse_base_score("5E-1").unwrap(), vec![0.5; 3]);
        assert_eq!(parse_base_score("[5E-1]").unwrap(), vec![0.5; 3]);
        assert_eq!(
            parse_base_score("[0.1,0.2,0.3]").unwrap(),
            vec![0.1, 0.2, 0.3]
        );
        assert!(parse_base_score("[0.1,0.2]").is_err());
        assert!(parse_base_score("abc").is_err());
    }

    #[test]
    fn test_wrong_class_count() {
        let doc = MODEL.replace(r#""num_class": "3""#, r#""num_class": "2""#);
        assert!(GbtModel::from_xgboost_json(doc.as_bytes()).is_err());
        assert!(matches!(
            GbtModel::from_xgboost_json("{}".as_bytes()).unwrap_err(),
            ModelError::Json(_)
        ));
    }
}
