//! 26-邻域连通岛屿标记.
//!
//! 按光栅序 (z 优先, 然后 y, 最后 x) 扫描前景体素. 每个体素只需要与
//! 13 个已经访问过的邻居合并; 第二遍扫描把每个临时标号解析为其根,
//! 并按根首次出现的顺序压缩为连续标号, 同时统计各岛屿的体素个数.

mod union_find;

pub use union_find::DisjointSet;

use crate::consts::gray::is_foreground;
use crate::{BinaryMask, Geometry, Idx3d, Label, LabeledVolume, VoxelSpace};
use ndarray::Array3;

/// 整数偏移 `(dz, dy, dx)`.
pub type Offset3d = (isize, isize, isize);

/// 26 个邻居的偏移, 按字典序排列.
pub fn offsets26() -> impl Iterator<Item = Offset3d> {
    itertools::iproduct!(-1isize..=1, -1isize..=1, -1isize..=1).filter(|o| *o != (0, 0, 0))
}

/// 在光栅序下位于当前体素之前的 13 个邻居的偏移.
#[inline]
fn backward_offsets() -> Vec<Offset3d> {
    offsets26().filter(|o| *o < (0, 0, 0)).collect()
}

/// `pos + off`, 越界时返回 `None`.
#[inline]
pub fn shift((z, y, x): Idx3d, (dz, dy, dx): Offset3d, shape: Idx3d) -> Option<Idx3d> {
    let z = z.checked_add_signed(dz)?;
    let y = y.checked_add_signed(dy)?;
    let x = x.checked_add_signed(dx)?;
    let (nz, ny, nx) = shape;
    (z < nz && y < ny && x < nx).then_some((z, y, x))
}

/// 迭代 `pos` 在 `shape` 范围内的 26-邻居.
pub fn neighbours26(pos: Idx3d, shape: Idx3d) -> impl Iterator<Item = Idx3d> {
    offsets26().filter_map(move |off| shift(pos, off, shape))
}

/// 标记 `mask` 的 26-连通岛屿.
///
/// 同一掩码总是得到相同的标号: 标号按各岛屿首个光栅扫描体素的顺序从 1 开始分配.
pub fn label(mask: &BinaryMask) -> LabeledVolume {
    let shape = mask.shape();
    let data = mask.data();
    let backward = backward_offsets();

    // 临时标号, 0 为背景, 否则为并查集元素 + 1.
    let mut provisional = Array3::<usize>::zeros(shape);
    let mut ds = DisjointSet::default();

    for (pos, &p) in data.indexed_iter() {
        if !is_foreground(p) {
            continue;
        }
        let mut current: Option<usize> = None;
        for off in backward.iter() {
            let Some(n) = shift(pos, *off, shape) else {
                continue;
            };
            let id = provisional[n];
            if id == 0 {
                continue;
            }
            current = Some(match current {
                None => id - 1,
                Some(c) => ds.union(c, id - 1),
            });
        }
        let id = match current {
            Some(c) => c,
            None => ds.make_set(),
        };
        provisional[pos] = id + 1;
    }

    resolve(mask.geometry().clone(), provisional, &mut ds)
}

/// 第二遍扫描: 临时标号 -> 压缩标号, 并统计各岛屿大小.
fn resolve(geometry: Geometry, provisional: Array3<usize>, ds: &mut DisjointSet) -> LabeledVolume {
    // 根 -> 压缩标号, 0 表示尚未分配.
    let mut compact: Vec<Label> = vec![0; ds.len()];
    let mut sizes: Vec<usize> = Vec::new();

    let data = provisional.mapv(|id| {
        if id == 0 {
            return 0;
        }
        let root = ds.find(id - 1);
        if compact[root] == 0 {
            sizes.push(0);
            compact[root] = sizes.len() as Label;
        }
        let l = compact[root];
        sizes[l as usize - 1] += 1;
        l
    });

    LabeledVolume::new(geometry, data, sizes)
}

#[cfg(test)]
mod tests {
    use super::{label, neighbours26};
    use crate::{Affine, BinaryMask, Idx3d, LabeledVolume, VoxelSpace};
    use ndarray::Array3;
    use std::collections::{HashSet, VecDeque};

    fn mask_of(shape: Idx3d, fg: &[Idx3d]) -> BinaryMask {
        let mut data = Array3::<u8>::zeros(shape);
        for &p in fg {
            data[p] = 1;
        }
        BinaryMask::new(data, Affine::identity()).unwrap()
    }

    /// 线性同余伪随机掩码.
    fn noisy_mask(shape: Idx3d, seed: u64, density: u64) -> BinaryMask {
        let mut state = seed;
        let data = Array3::from_shape_fn(shape, |_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            u8::from((state >> 33) % 100 < density)
        });
        BinaryMask::new(data, Affine::identity()).unwrap()
    }

    /// 广度优先搜索得到的连通分量.
    fn bfs(mask: &BinaryMask, start: Idx3d) -> HashSet<Idx3d> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(p) = queue.pop_front() {
            for n in neighbours26(p, mask.shape()) {
                if mask.is_foreground_at(n) && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    fn check_against_bfs(mask: &BinaryMask, labeled: &LabeledVolume) {
        for (pos, &p) in mask.data().indexed_iter() {
            assert_eq!(p == 0, labeled[pos] == 0, "at {pos:?}");
        }
        let mut total = 0;
        for l in 1..=labeled.label_count() as u32 {
            let voxels = labeled.voxels_of(l);
            assert_eq!(voxels.len(), labeled.voxel_count(l).unwrap());
            let expected = bfs(mask, voxels[0]);
            let got: HashSet<Idx3d> = voxels.into_iter().collect();
            assert_eq!(got, expected, "label {l}");
            total += got.len();
        }
        assert_eq!(total, mask.count_foreground());
    }

    #[test]
    fn test_two_blocks() {
        let mut fg = vec![];
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..2 {
                    fg.push((z, y, x));
                    fg.push((z + 8, y + 8, x + 8));
                }
            }
        }
        let l = label(&mask_of((10, 10, 10), &fg));
        assert_eq!(l.label_count(), 2);
        assert_eq!(l.sizes(), &[8, 8]);
        assert_eq!(l[(0, 0, 0)], 1);
        assert_eq!(l[(9, 9, 9)], 2);
    }

    #[test]
    fn test_corner_connectivity() {
        // 只有顶点相接.
        let l = label(&mask_of((3, 3, 3), &[(0, 0, 0), (1, 1, 1), (2, 2, 2)]));
        assert_eq!(l.label_count(), 1);

        // 反对角方向, 依赖 (-1, -1, +1) 一类的偏移.
        let l = label(&mask_of((2, 2, 2), &[(0, 0, 1), (1, 1, 0)]));
        assert_eq!(l.label_count(), 1);

        // 相距 2 的体素不连通.
        let l = label(&mask_of((1, 1, 3), &[(0, 0, 0), (0, 0, 2)]));
        assert_eq!(l.label_count(), 2);
    }

    #[test]
    fn test_late_merge_keeps_first_order() {
        // `U` 形: 两条竖臂在扫描中先各自获得临时标号, 最后被底边合并.
        // 右侧另有一个孤立体素, 它应该得到标号 2.
        let mut fg = vec![(0, 0, 0), (0, 1, 0), (0, 2, 0), (0, 0, 2), (0, 1, 2), (0, 2, 2)];
        fg.extend([(0, 3, 0), (0, 3, 1), (0, 3, 2)]);
        fg.push((0, 0, 5));
        let l = label(&mask_of((1, 4, 6), &fg));
        assert_eq!(l.label_count(), 2);
        assert_eq!(l.sizes(), &[9, 1]);
        assert_eq!(l[(0, 0, 2)], 1);
        assert_eq!(l[(0, 0, 5)], 2);
    }

    #[test]
    fn test_empty_mask() {
        let l = label(&mask_of((2, 2, 2), &[]));
        assert_eq!(l.label_count(), 0);
        assert_eq!(l.largest(), None);
        assert!(l.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_deterministic() {
        let m = noisy_mask((12, 13, 14), 7, 30);
        assert_eq!(label(&m), label(&m));
    }

    #[test]
    fn test_against_bfs() {
        for (seed, density) in [(1, 10), (2, 25), (3, 40), (4, 60)] {
            let m = noisy_mask((9, 10, 11), seed, density);
            check_against_bfs(&m, &label(&m));
        }
    }

    #[test]
    fn test_labels_in_first_scan_order() {
        let m = noisy_mask((8, 8, 8), 11, 15);
        let l = label(&m);
        let mut next = 1;
        for &v in l.data().iter() {
            if v == 0 {
                continue;
            }
            assert!(v <= next, "label {v} appeared before {next}");
            if v == next {
                next += 1;
            }
        }
        assert_eq!(next as usize - 1, l.label_count());
    }
}
