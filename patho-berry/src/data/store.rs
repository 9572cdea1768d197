//! 轮廓库: 单个 ROI 分割记录的类型化内存表示.
//!
//! 分割记录是形如
//!
//! ```json
//! {"1": {"type": 0, "color": [255, 0, 0], "contour": [[10, 12], [11, 12], ...]}, ...}
//! ```
//!
//! 的 JSON 对象. 载入时立即完成全部校验, 之后的访问不会再失败.

use super::{CellInstance, CoarseType, Contour};
use crate::consts::color;
use crate::error::{RoiError, RoiResult, SegmentationError};
use crate::Point;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::btree_map::{self, BTreeMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 分割记录中单个细胞的原始结构.
#[derive(Deserialize)]
struct RawCell {
    #[serde(rename = "type")]
    kind: i64,
    contour: Vec<Vec<Value>>,
}

/// 单个 ROI 的全部细胞实例, 按 ID 升序保存.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContourStore {
    cells: BTreeMap<u32, CellInstance>,
}

impl ContourStore {
    /// 从 JSON 分割记录解析.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, SegmentationError> {
        let raw: BTreeMap<String, RawCell> = serde_json::from_reader(rdr)
            .map_err(|e| SegmentationError::Structure(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// 从 JSON 字符串解析.
    pub fn from_json_str(s: &str) -> Result<Self, SegmentationError> {
        Self::from_reader(s.as_bytes())
    }

    /// 打开磁盘上的分割记录. 文件缺失时返回 [`RoiError::IoFailure`].
    pub fn open<P: AsRef<Path>>(path: P) -> RoiResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RoiError::io(path, e))?;
        Ok(Self::from_reader(BufReader::new(file))?)
    }

    /// 从已构造的细胞实例创建. ID 重复时后者覆盖前者.
    pub fn from_cells<I: IntoIterator<Item = CellInstance>>(cells: I) -> Self {
        Self {
            cells: cells.into_iter().map(|c| (c.id(), c)).collect(),
        }
    }

    fn from_raw(raw: BTreeMap<String, RawCell>) -> Result<Self, SegmentationError> {
        let mut cells = BTreeMap::new();
        for (key, cell) in raw {
            let digits = !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit());
            let id = match key.parse::<u32>() {
                Ok(id) if digits && id > 0 => id,
                _ => return Err(SegmentationError::InvalidKey(key)),
            };
            let points = parse_points(id, &cell.contour)?;
            let n = points.len();
            let contour = Contour::new(points).ok_or(SegmentationError::TooFewPoints(id, n))?;
            let instance = CellInstance::new(id, contour, CoarseType::from_code(cell.kind));
            if cells.insert(id, instance).is_some() {
                return Err(SegmentationError::Structure(format!(
                    "duplicate cell id {id}"
                )));
            }
        }
        Ok(Self { cells })
    }

    /// 细胞个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否没有任何细胞.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 按 ID 获取细胞实例.
    #[inline]
    pub fn get(&self, id: u32) -> Option<&CellInstance> {
        self.cells.get(&id)
    }

    /// 按 ID 升序迭代细胞实例.
    #[inline]
    pub fn iter(&self) -> btree_map::Values<'_, u32, CellInstance> {
        self.cells.values()
    }

    /// 按升序迭代细胞 ID.
    #[inline]
    pub fn ids(&self) -> impl ExactSizeIterator<Item = u32> + '_ {
        self.cells.keys().copied()
    }

    /// ID 是否恰好为 `1..=len`.
    pub fn is_sequential(&self) -> bool {
        self.ids().zip(1u32..).all(|(id, expected)| id == expected)
    }

    /// 以 JSON 分割记录格式写出. 键按数值升序排列.
    pub fn to_writer<W: Write>(&self, w: W) -> serde_json::Result<()> {
        serde_json::to_writer(w, self)
    }

    /// 将分割记录保存到 `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> RoiResult<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| RoiError::io(path, e))?;
        let mut w = BufWriter::new(file);
        self.to_writer(&mut w)
            .map_err(|e| RoiError::io(path, e.into()))?;
        w.flush().map_err(|e| RoiError::io(path, e))
    }
}

impl<'a> IntoIterator for &'a ContourStore {
    type Item = &'a CellInstance;
    type IntoIter = btree_map::Values<'a, u32, CellInstance>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// 逐点解析轮廓坐标. 每个点必须恰好是两个整数.
pub(crate) fn parse_points(id: u32, raw: &[Vec<Value>]) -> Result<Vec<Point>, SegmentationError> {
    raw.iter()
        .map(|pt| match pt.as_slice() {
            [x, y] => Ok((coordinate(id, x)?, coordinate(id, y)?)),
            _ => Err(SegmentationError::Structure(format!(
                "cell {id}: point with {} coordinate(s)",
                pt.len()
            ))),
        })
        .collect()
}

fn coordinate(id: u32, v: &Value) -> Result<i32, SegmentationError> {
    let bad = || SegmentationError::NonNumericCoordinate(id, v.to_string());
    if let Some(i) = v.as_i64() {
        return i32::try_from(i).map_err(|_| bad());
    }
    match v.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i32::MIN as f64 && f <= i32::MAX as f64 => {
            Ok(f as i32)
        }
        _ => Err(bad()),
    }
}

/// 序列化单个细胞: `{"type": .., "color": .., "contour": ..}`.
struct CellRecord<'a>(&'a CellInstance);

impl Serialize for CellRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let cell = self.0;
        let coarse = cell.coarse_type();
        let rgb = match coarse {
            CoarseType::AecLike => color::AEC_LIKE,
            CoarseType::LymLike => color::LYM_LIKE,
            CoarseType::Other => color::OTHER,
        };
        let contour: Vec<[i32; 2]> = cell.contour().points().iter().map(|&(x, y)| [x, y]).collect();

        let mut s = serializer.serialize_struct("CellRecord", 3)?;
        s.serialize_field("type", &coarse.code())?;
        s.serialize_field("color", &rgb)?;
        s.serialize_field("contour", &contour)?;
        s.end()
    }
}

impl Serialize for ContourStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, cell) in self.cells.iter() {
            map.serialize_entry(&id.to_string(), &CellRecord(cell))?;
        }
        map.end()
    }
}
