//! 多队列特征合并.
//!
//! 对每个队列, 以 `Lesions` 列内连接病灶特征表和纹理特征表 (纹理表的 `Stages`
//! 列丢弃), 追加 `Dataset` 和 `Race` 两列; 再按 USA, Japan, China 的顺序纵向拼接.
//! 各队列列集合不同时取并集, 缺失值留空.

use super::{combine_path, Dataset, DatasetLayout};
use crate::error::{RoiError, RoiResult};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const KEY: &str = "Lesions";
const STAGE: &str = "Stages";

/// 带表头的字符串表格.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CsvTable {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// 从数据流读取. `path` 仅用于错误信息.
    pub fn from_reader<R: Read, P: Into<PathBuf>>(rdr: R, path: P) -> RoiResult<Self> {
        let mut r = csv::Reader::from_reader(rdr);
        let headers = r.headers()?.iter().map(str::to_string).collect();
        let rows = r
            .records()
            .map(|rec| rec.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            path: path.into(),
            headers,
            rows,
        })
    }

    /// 打开 CSV 文件.
    pub fn open<P: AsRef<Path>>(path: P) -> RoiResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RoiError::io(path, e))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// 表头.
    #[inline]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// 数据行.
    #[inline]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn column(&self, name: &str) -> RoiResult<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| RoiError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    /// 写出为 CSV.
    pub fn to_writer<W: Write>(&self, w: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(w);
        wtr.write_record(&self.headers)?;
        for row in self.rows.iter() {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// 合并单个队列的病灶特征表与纹理特征表.
///
/// 行顺序与病灶特征表一致; 同一病灶在纹理表中出现多次时逐一输出.
pub fn merge_cohort(dataset: Dataset, lesion: &CsvTable, texture: &CsvTable) -> RoiResult<CsvTable> {
    let lesion_key = lesion.column(KEY)?;
    let texture_key = texture.column(KEY)?;
    let texture_stage = texture.column(STAGE).ok();
    let texture_cols: Vec<usize> = (0..texture.headers.len())
        .filter(|&i| i != texture_key && Some(i) != texture_stage)
        .collect();

    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, row) in texture.rows.iter().enumerate() {
        if let Some(k) = row.get(texture_key) {
            index.entry(k.as_str()).or_default().push(i);
        }
    }

    let mut headers = lesion.headers.clone();
    headers.extend(texture_cols.iter().map(|&i| texture.headers[i].clone()));
    headers.push("Dataset".to_string());
    headers.push("Race".to_string());

    let cell = |row: &Vec<String>, i: usize| row.get(i).cloned().unwrap_or_default();
    let mut rows = Vec::new();
    for l in lesion.rows.iter() {
        let Some(matches) = l.get(lesion_key).and_then(|k| index.get(k.as_str())) else {
            continue;
        };
        for &t in matches {
            let t = &texture.rows[t];
            let mut row: Vec<String> = (0..lesion.headers.len()).map(|i| cell(l, i)).collect();
            row.extend(texture_cols.iter().map(|&i| cell(t, i)));
            row.push(dataset.name().to_string());
            row.push(dataset.race().to_string());
            rows.push(row);
        }
    }

    Ok(CsvTable {
        path: lesion.path.clone(),
        headers,
        rows,
    })
}

/// 纵向拼接多个表格. 列取并集 (按首次出现的顺序), 缺失值留空.
pub fn concat(tables: &[CsvTable]) -> CsvTable {
    let mut headers: Vec<String> = Vec::new();
    for t in tables {
        for h in t.headers.iter() {
            if !headers.contains(h) {
                headers.push(h.clone());
            }
        }
    }
    let mut rows = Vec::new();
    for t in tables {
        let pos: Vec<Option<usize>> = headers
            .iter()
            .map(|h| t.headers.iter().position(|x| x == h))
            .collect();
        for r in t.rows.iter() {
            rows.push(
                pos.iter()
                    .map(|p| p.and_then(|i| r.get(i).cloned()).unwrap_or_default())
                    .collect(),
            );
        }
    }
    CsvTable {
        path: PathBuf::new(),
        headers,
        rows,
    }
}

/// 读取数据根目录下三个队列的特征表, 合并后写入
/// `<root>/CombineAnalysis/CombineROIFeatures.csv`. 返回输出路径和总行数.
pub fn combine_cohorts<P: AsRef<Path>>(data_root: P) -> RoiResult<(PathBuf, usize)> {
    let data_root = data_root.as_ref();
    let mut merged = Vec::with_capacity(Dataset::COMBINE_ORDER.len());
    for dataset in Dataset::COMBINE_ORDER {
        let layout = DatasetLayout::new(data_root, dataset);
        let lesion = CsvTable::open(layout.lesion_features())?;
        let texture = CsvTable::open(layout.texture_features())?;
        let table = merge_cohort(dataset, &lesion, &texture)?;
        log::info!("{dataset}: {} lesion(s) combined", table.rows.len());
        merged.push(table);
    }
    let combined = concat(&merged);

    let out = combine_path(data_root);
    if let Some(dir) = out.parent() {
        fs::create_dir_all(dir).map_err(|e| RoiError::io(dir, e))?;
    }
    let file = File::create(&out).map_err(|e| RoiError::io(&out, e))?;
    combined.to_writer(BufWriter::new(file))?;
    Ok((out, combined.rows.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> CsvTable {
        CsvTable::from_reader(text.as_bytes(), "mem.csv").unwrap()
    }

    #[test]
    fn test_merge_cohort() {
        let lesion = table("Lesions,Stages,AEC-Proportion\nb,1,0.5\na,2,0.25\nz,3,1.0\n");
        let texture = table("Lesions,Stages,AEC-Contrast\na,2,10.0\nb,1,20.0\n");
        let m = merge_cohort(Dataset::Japan, &lesion, &texture).unwrap();
        assert_eq!(
            m.headers(),
            ["Lesions", "Stages", "AEC-Proportion", "AEC-Contrast", "Dataset", "Race"]
        );
        assert_eq!(m.rows().len(), 2);
        assert_eq!(m.rows()[0], ["b", "1", "0.5", "20.0", "Japan", "Asian"]);
        assert_eq!(m.rows()[1], ["a", "2", "0.25", "10.0", "Japan", "Asian"]);
    }

    #[test]
    fn test_missing_key_column() {
        let lesion = table("Lesion,Stages\na,1\n");
        let texture = table("Lesions,Stages\na,1\n");
        assert!(matches!(
            merge_cohort(Dataset::Usa, &lesion, &texture).unwrap_err(),
            RoiError::MissingColumn { .. }
        ));
    }

    #[test]
    fn test_concat_union() {
        let a = table("x,y\n1,2\n");
        let b = table("y,z\n3,4\n");
        let c = concat(&[a, b]);
        assert_eq!(c.headers(), ["x", "y", "z"]);
        assert_eq!(c.rows()[0], ["1", "2", ""]);
        assert_eq!(c.rows()[1], ["", "3", "4"]);
    }

    #[test]
    fn test_combine_cohorts() {
        let tmp = tempfile::tempdir().unwrap();
        for (d, lesion) in [(Dataset::Japan, "j"), (Dataset::Usa, "u"), (Dataset::China, "c")] {
            let layout = DatasetLayout::new(tmp.path(), d);
            fs::create_dir_all(layout.root()).unwrap();
            fs::write(
                layout.lesion_features(),
                format!("Lesions,Stages,AEC-Density\n{lesion},1,0.1\n"),
            )
            .unwrap();
            fs::write(
                layout.texture_features(),
                format!("Lesions,Stages,LYM-Energy\n{lesion},1,0.9\n"),
            )
            .unwrap();
        }
        let (path, n) = combine_cohorts(tmp.path()).unwrap();
        assert_eq!(n, 3);
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(
            text,
            "Lesions,Stages,AEC-Density,LYM-Energy,Dataset,Race\n\
             u,1,0.1,0.9,USA,White\n\
             j,1,0.1,0.9,Japan,Asian\n\
             c,1,0.1,0.9,China,Asian\n"
        );
    }
}
