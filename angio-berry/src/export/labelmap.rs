//! 标签体与掩码的持久化存储 (`.npy`).
//!
//! 数组按内存中的 `(z, y, x)` 顺序保存, 仿射变换不随文件保存.

use crate::{AngioResult, BinaryMask, LabeledVolume};
use ndarray_npy::write_npy;
use std::path::Path;

/// 将岛屿标签体以 `u32` 数组保存到 `path`.
pub fn save_labelmap<P: AsRef<Path>>(labeled: &LabeledVolume, path: P) -> AngioResult<()> {
    write_npy(path, &labeled.data())?;
    Ok(())
}

/// 将二值掩码以 `u8` 数组 (0 / 1) 保存到 `path`.
pub fn save_mask<P: AsRef<Path>>(mask: &BinaryMask, path: P) -> AngioResult<()> {
    write_npy(path, &mask.data())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{save_labelmap, save_mask};
    use crate::label::label;
    use crate::{Affine, BinaryMask};
    use ndarray::Array3;
    use ndarray_npy::read_npy;

    #[test]
    fn test_save_labelmap_and_mask() {
        let mut data = Array3::<u8>::zeros((2, 3, 4));
        data[(0, 0, 0)] = 1;
        data[(1, 2, 3)] = 1;
        let mask = BinaryMask::new(data.clone(), Affine::identity()).unwrap();
        let labeled = label(&mask);

        let dir = tempfile::tempdir().unwrap();
        let lp = dir.path().join("labels.npy");
        let mp = dir.path().join("mask.npy");
        save_labelmap(&labeled, &lp).unwrap();
        save_mask(&mask, &mp).unwrap();

        let labels: Array3<u32> = read_npy(&lp).unwrap();
        assert_eq!(labels[(0, 0, 0)], 1);
        assert_eq!(labels[(1, 2, 3)], 2);
        let back: Array3<u8> = read_npy(&mp).unwrap();
        assert_eq!(back, data);
    }
}
