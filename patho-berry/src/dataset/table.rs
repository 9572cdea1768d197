//! 表格读写: 细胞特征表、病灶特征表、纹理特征表和分期表.

use crate::aggregate::{CellFeatureRecord, LesionFeatureSummary};
use crate::data::{CellLabel, RoiName};
use crate::error::{RoiError, RoiResult};
use crate::spatial::EmbedTexture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 病灶特征表中的一行. 字段与表头一一对应.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LesionRow {
    #[serde(rename = "Lesions")]
    pub lesion: String,
    #[serde(rename = "Stages")]
    pub stage: Option<String>,
    #[serde(rename = "AEC-Proportion")]
    pub aec_proportion: f64,
    #[serde(rename = "LYM-Proportion")]
    pub lym_proportion: f64,
    #[serde(rename = "OC-Proportion")]
    pub oc_proportion: f64,
    #[serde(rename = "AEC-Density")]
    pub aec_density: f64,
    #[serde(rename = "LYM-Density")]
    pub lym_density: f64,
    #[serde(rename = "OC-Density")]
    pub oc_density: f64,
    #[serde(rename = "Altieri2-Entropy")]
    pub altieri2_entropy: f64,
    #[serde(rename = "Altieri3-Entropy")]
    pub altieri3_entropy: f64,
}

impl From<&LesionFeatureSummary> for LesionRow {
    fn from(s: &LesionFeatureSummary) -> Self {
        let p = |l: CellLabel| s.proportions[l.index()];
        let d = |l: CellLabel| s.densities[l.index()];
        Self {
            lesion: s.lesion.clone(),
            stage: s.stage.clone(),
            aec_proportion: p(CellLabel::Aec),
            lym_proportion: p(CellLabel::Lym),
            oc_proportion: p(CellLabel::Oc),
            aec_density: d(CellLabel::Aec),
            lym_density: d(CellLabel::Lym),
            oc_density: d(CellLabel::Oc),
            altieri2_entropy: s.altieri2,
            altieri3_entropy: s.altieri3,
        }
    }
}

/// 纹理特征表中的一行. 字段与表头一一对应.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextureRow {
    #[serde(rename = "Lesions")]
    pub lesion: String,
    #[serde(rename = "Stages")]
    pub stage: Option<String>,
    #[serde(rename = "AEC-Contrast")]
    pub aec_contrast: f64,
    #[serde(rename = "AEC-Energy")]
    pub aec_energy: f64,
    #[serde(rename = "LYM-Contrast")]
    pub lym_contrast: f64,
    #[serde(rename = "LYM-Energy")]
    pub lym_energy: f64,
}

impl TextureRow {
    /// 由纹理特征构造.
    pub fn new(lesion: &RoiName, stage: Option<String>, t: &EmbedTexture) -> Self {
        Self {
            lesion: lesion.to_string(),
            stage,
            aec_contrast: t.aec.contrast,
            aec_energy: t.aec.energy,
            lym_contrast: t.lym.contrast,
            lym_energy: t.lym.energy,
        }
    }
}

/// 以 CSV 格式写出若干行, 第一行为表头.
pub fn write_rows<W: Write, T: Serialize>(w: W, rows: &[T]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// 读取带表头的 CSV.
pub fn read_rows<R: Read, T: DeserializeOwned>(r: R) -> csv::Result<Vec<T>> {
    csv::Reader::from_reader(r).deserialize().collect()
}

/// 将若干行保存为 CSV 文件.
pub fn save_rows<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> RoiResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| RoiError::io(path, e))?;
    write_rows(BufWriter::new(file), rows)?;
    Ok(())
}

/// 读取 CSV 文件. 文件缺失时返回 [`RoiError::IoFailure`].
pub fn open_rows<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> RoiResult<Vec<T>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| RoiError::io(path, e))?;
    Ok(read_rows(BufReader::new(file))?)
}

/// 写出细胞特征表 `ID,Area,Intensity,Roundness,Label`.
#[inline]
pub fn write_cells<W: Write>(w: W, records: &[CellFeatureRecord]) -> csv::Result<()> {
    write_rows(w, records)
}

/// 保存细胞特征表.
#[inline]
pub fn save_cells<P: AsRef<Path>>(path: P, records: &[CellFeatureRecord]) -> RoiResult<()> {
    save_rows(path, records)
}

/// 读取细胞特征表.
#[inline]
pub fn open_cells<P: AsRef<Path>>(path: P) -> RoiResult<Vec<CellFeatureRecord>> {
    open_rows(path)
}

/// 保存病灶特征表, 行顺序与 `summaries` 一致.
pub fn save_lesions<P: AsRef<Path>>(path: P, summaries: &[LesionFeatureSummary]) -> RoiResult<()> {
    let rows: Vec<LesionRow> = summaries.iter().map(LesionRow::from).collect();
    save_rows(path, &rows)
}

/// 保存纹理特征表.
#[inline]
pub fn save_textures<P: AsRef<Path>>(path: P, rows: &[TextureRow]) -> RoiResult<()> {
    save_rows(path, rows)
}

/// 病灶分期表: ROI 名称到分期的映射.
///
/// 文件中的分期可以是字符串或数字, 统一保存为字符串.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LesionStages {
    stages: BTreeMap<String, String>,
}

impl LesionStages {
    /// 从 JSON 对象解析.
    pub fn from_reader<R: Read>(rdr: R) -> serde_json::Result<Self> {
        let raw: BTreeMap<String, Value> = serde_json::from_reader(rdr)?;
        let stages = raw
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, v)
            })
            .collect();
        Ok(Self { stages })
    }

    /// 打开分期表.
    pub fn open<P: AsRef<Path>>(path: P) -> RoiResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RoiError::io(path, e))?;
        Self::from_reader(BufReader::new(file)).map_err(|e| RoiError::io(path, e.into()))
    }

    /// 打开分期表. 文件不存在时返回空表.
    pub fn open_or_empty<P: AsRef<Path>>(path: P) -> RoiResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::open(path)
        } else {
            log::warn!("stage table `{}` not found, stages left empty", path.display());
            Ok(Self::default())
        }
    }

    /// 查询 ROI 的分期.
    #[inline]
    pub fn get(&self, roi: &RoiName) -> Option<&str> {
        self.stages.get(roi.as_str()).map(String::as_str)
    }

    /// 已知分期的 ROI 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// 分期表是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
