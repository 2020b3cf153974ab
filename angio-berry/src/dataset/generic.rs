//! 通用 nifti 体数据加载器.
//!
//! 提供迭代器风格的数据集获取模式.

use crate::{AngioError, AngioResult, Volume};
use std::path::{Path, PathBuf};

/// nifti 文件扩展名.
const NIFTI_SUFFIXES: [&str; 2] = [".nii", ".nii.gz"];

/// `path` 是否是 nifti 文件名.
pub fn is_nifti<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| NIFTI_SUFFIXES.iter().any(|s| n.ends_with(s)))
}

/// 去掉 `.nii` 或 `.nii.gz` 后缀的文件名, 用于命名输出.
pub fn nifti_stem<P: AsRef<Path>>(path: P) -> Option<String> {
    let name = path.as_ref().file_name()?.to_str()?;
    let stem = NIFTI_SUFFIXES
        .iter()
        .rev()
        .find_map(|s| name.strip_suffix(s))
        .unwrap_or(name);
    Some(stem.to_string())
}

/// 列出 `dir` 下所有 nifti 文件 (不递归), 按文件名升序排列.
pub fn list_volumes<P: AsRef<Path>>(dir: P) -> AngioResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| AngioError::io(dir, e))?;
    let mut ans = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AngioError::io(dir, e))?.path();
        if path.is_file() && is_nifti(&path) {
            ans.push(path);
        }
    }
    ans.sort();
    Ok(ans)
}

/// 创建加载 `dir` 下所有 nifti 体数据的加载器.
///
/// 目录本身无法读取时返回错误; 单个文件的读取错误在迭代时返回.
pub fn volume_loader<P: AsRef<Path>>(dir: P) -> AngioResult<VolumeLoader> {
    Ok(VolumeLoader::from_paths(list_volumes(dir)?))
}

/// 3D 体数据加载器. 按顺序惰性读取每个文件.
pub struct VolumeLoader {
    paths_rev: Vec<PathBuf>,
}

impl VolumeLoader {
    /// 从给定的文件列表创建.
    pub fn from_paths<I: IntoIterator<Item = PathBuf>>(paths: I) -> Self {
        let mut paths_rev: Vec<PathBuf> = paths.into_iter().collect();
        paths_rev.reverse();
        Self { paths_rev }
    }
}

impl Iterator for VolumeLoader {
    type Item = (PathBuf, AngioResult<Volume>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths_rev.pop()?;
        let data = Volume::open(&path);
        Some((path, data))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len(), Some(self.len()))
    }
}

impl ExactSizeIterator for VolumeLoader {
    #[inline]
    fn len(&self) -> usize {
        self.paths_rev.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{is_nifti, list_volumes, nifti_stem, volume_loader};
    use std::fs::File;

    #[test]
    fn test_names() {
        assert!(is_nifti("a/b/vessels.nii"));
        assert!(is_nifti("vessels.nii.gz"));
        assert!(!is_nifti("vessels.npy"));
        assert!(!is_nifti("nii"));
        assert_eq!(nifti_stem("x/case-01.nii.gz").as_deref(), Some("case-01"));
        assert_eq!(nifti_stem("case-02.nii").as_deref(), Some("case-02"));
        assert_eq!(nifti_stem("notes.txt").as_deref(), Some("notes.txt"));
    }

    #[test]
    fn test_loader_lists_and_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.nii.gz", "a.nii", "c.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("d.nii")).unwrap();

        let paths = list_volumes(dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.nii"), dir.path().join("b.nii.gz")]);

        let loader = volume_loader(dir.path()).unwrap();
        assert_eq!(loader.len(), 2);
        // 空文件不是合法的 nifti.
        for (path, volume) in loader {
            assert!(volume.is_err(), "{path:?}");
        }

        assert!(volume_loader(dir.path().join("missing")).is_err());
    }
}
