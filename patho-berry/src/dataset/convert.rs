//! 原始细胞分割结果转换.
//!
//! 分割网络输出形如 `{"nuc": {"<id>": {"contour": [...], "type": t, ...}}}`,
//! 其中的 ID 来自整张切片, 类型编码也与本 crate 不同. 转换时:
//!
//! 1. ID 按数值升序 (非数值键排在最后, 按字典序) 重新编号为 `1..=n`;
//! 2. 类型 1 映射为 AEC-like, 2 和 4 映射为 LYM-like, 其余 (包括缺失) 映射为 Other;
//! 3. 轮廓点数不足 3 个的细胞会被丢弃.

use crate::data::store::parse_points;
use crate::data::{CellInstance, CoarseType, Contour, ContourStore};
use crate::error::{RoiError, RoiResult, SegmentationError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Deserialize)]
struct RawDocument {
    nuc: BTreeMap<String, RawNucleus>,
}

#[derive(Deserialize)]
struct RawNucleus {
    contour: Vec<Vec<Value>>,
    #[serde(rename = "type", default)]
    kind: Option<i64>,
}

/// 原始类型编码到粗分类的映射.
#[inline]
pub fn coarse_type_of(raw: Option<i64>) -> CoarseType {
    match raw {
        Some(1) => CoarseType::AecLike,
        Some(2) | Some(4) => CoarseType::LymLike,
        _ => CoarseType::Other,
    }
}

/// 排序键: 数值键在前并按数值升序, 其余按字典序.
fn key_order(key: &str) -> (bool, u64, &str) {
    match key.trim().parse::<u64>() {
        Ok(v) => (false, v, key),
        Err(_) => (true, 0, key),
    }
}

/// 转换原始分割结果.
pub fn convert_raw<R: Read>(rdr: R) -> Result<ContourStore, SegmentationError> {
    let doc: RawDocument =
        serde_json::from_reader(rdr).map_err(|e| SegmentationError::Structure(e.to_string()))?;

    let mut entries: Vec<(&String, &RawNucleus)> = doc.nuc.iter().collect();
    entries.sort_by(|(a, _), (b, _)| key_order(a).cmp(&key_order(b)));

    let mut cells = Vec::with_capacity(entries.len());
    for (key, nuc) in entries {
        let id = cells.len() as u32 + 1;
        let points = parse_points(id, &nuc.contour)?;
        match Contour::new(points) {
            Some(contour) => cells.push(CellInstance::new(id, contour, coarse_type_of(nuc.kind))),
            None => log::warn!("raw nucleus `{key}` has fewer than 3 contour points, dropped"),
        }
    }
    Ok(ContourStore::from_cells(cells))
}

/// 打开并转换原始分割文件.
pub fn open_raw<P: AsRef<Path>>(path: P) -> RoiResult<ContourStore> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| RoiError::io(path, e))?;
    Ok(convert_raw(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "mag": null,
        "nuc": {
            "105": {"bbox": [[0, 0], [4, 4]], "centroid": [2, 2],
                    "contour": [[20, 20], [24, 20], [24, 24]], "type_prob": 0.9, "type": 2},
            "9": {"contour": [[0, 0], [4, 0], [4, 4]], "type": 1},
            "12": {"contour": [[1, 1], [2, 2]], "type": 1},
            "40": {"contour": [[10, 10], [14, 10], [14, 14]], "type": 4},
            "77": {"contour": [[30, 30], [34, 30], [34, 34]], "type": 3},
            "x": {"contour": [[40, 40], [44, 40], [44, 44]], "type": null}
        }
    }"#;

    #[test]
    fn test_convert_renumbers() {
        let store = convert_raw(RAW.as_bytes()).unwrap();
        assert_eq!(store.len(), 5);
        assert!(store.is_sequential());

        let firsts: Vec<_> = store.iter().map(|c| c.contour().points()[0]).collect();
        assert_eq!(firsts, [(0, 0), (10, 10), (30, 30), (20, 20), (40, 40)]);

        let types: Vec<_> = store.iter().map(|c| c.coarse_type()).collect();
        assert_eq!(
            types,
            [
                CoarseType::AecLike,
                CoarseType::LymLike,
                CoarseType::Other,
                CoarseType::LymLike,
                CoarseType::Other
            ]
        );
    }

    #[test]
    fn test_convert_output_format() {
        let store = convert_raw(RAW.as_bytes()).unwrap();
        let mut buf = Vec::new();
        store.to_writer(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with(
            r#"{"1":{"type":0,"color":[255,0,0],"contour":[[0,0],[4,0],[4,4]]},"2":{"type":1,"color":[0,255,0]"#
        ));
        assert_eq!(ContourStore::from_json_str(&text).unwrap(), store);
    }

    #[test]
    fn test_convert_bad_document() {
        assert!(convert_raw(r#"{"cells": {}}"#.as_bytes()).is_err());
        assert!(convert_raw(r#"{"nuc": {"1": {"contour": [[0, "a"], [1, 1], [2, 2]]}}}"#.as_bytes()).is_err());
        assert!(matches!(
            open_raw("/definitely/not/here.json").unwrap_err(),
            RoiError::IoFailure { .. }
        ));
    }
}
