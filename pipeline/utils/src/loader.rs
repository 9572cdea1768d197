//! 对 `patho-berry::dataset` 的更一层封装. 提供更直接的路径解析与加载器.

use patho_berry::dataset;
use std::env;
use std::path::PathBuf;

/// 数据根目录环境变量.
pub const DATA_ROOT_ENV: &str = "PATHO_DATA_ROOT";

/// 获取数据根目录.
///
/// 1. 若 `explicit` 非空, 则返回其值;
/// 2. 否则若环境变量 `$PATHO_DATA_ROOT` 非空, 则返回其值;
/// 3. 否则, 返回 `$HOME/dataset`.
///
/// 三者都不可用 (无法确定用户主目录) 时返回 `None`.
pub fn data_root_or_env_or_home(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    match env::var(DATA_ROOT_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir(),
    }
}

/// 获取模型路径. `explicit` 为空时使用数据根目录下的默认位置.
#[inline]
pub fn model_path_or_default(explicit: Option<PathBuf>, data_root: &std::path::Path) -> PathBuf {
    explicit.unwrap_or_else(|| dataset::model_path(data_root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_explicit_wins() {
        let p = data_root_or_env_or_home(Some(PathBuf::from("/data"))).unwrap();
        assert_eq!(p, Path::new("/data"));
        assert_eq!(
            model_path_or_default(None, &p),
            Path::new("/data/CellType/CellModels/fusing_cell_classifier.bin")
        );
        assert_eq!(
            model_path_or_default(Some(PathBuf::from("m.bin")), &p),
            Path::new("m.bin")
        );
    }
}
