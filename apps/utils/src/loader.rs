//! 对 `angio-berry::dataset` 的更一层封装. 提供更直接的数据集加载器.

use angio_berry::dataset::generic::{self, VolumeLoader};
use angio_berry::AngioResult;
use std::env;
use std::path::{Path, PathBuf};

/// 输入目录环境变量.
pub const INPUT_DIR_ENV: &str = "ANGIO_INPUT_DIR";

/// 输出目录环境变量.
pub const OUTPUT_DIR_ENV: &str = "ANGIO_OUTPUT_DIR";

/// 读取非空环境变量.
fn non_empty_var(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// 获取血管增强体数据的输入目录.
///
/// 1. 若环境变量 `$ANGIO_INPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/angio`;
/// 3. 无法确定用户主目录时返回 `None`.
pub fn input_dir_from_env_or_home() -> Option<PathBuf> {
    non_empty_var(INPUT_DIR_ENV)
        .or_else(|| angio_berry::dataset::home_dataset_dir_with(["angio"]))
}

/// 获取导出目录.
///
/// 1. 若环境变量 `$ANGIO_OUTPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/angio/out`;
/// 3. 无法确定用户主目录时返回 `None`.
pub fn output_dir_from_env_or_home() -> Option<PathBuf> {
    non_empty_var(OUTPUT_DIR_ENV)
        .or_else(|| angio_berry::dataset::home_dataset_dir_with(["angio", "out"]))
}

/// 获取 `path` 目录下的体数据加载器.
#[inline]
pub fn volume_loader<P: AsRef<Path>>(path: P) -> AngioResult<VolumeLoader> {
    generic::volume_loader(path)
}
