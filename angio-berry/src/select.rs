//! 岛屿筛选.
//!
//! 最大岛屿模式与种子点模式都归结为同一个操作: 先求出需要保留的标号集合,
//! 再用 [`filter`] 生成新的掩码. 物理坐标种子与体素坐标种子只在
//! [`locate`] 中有所区别.

use crate::consts::BACKGROUND_LABEL;
use crate::{AngioError, AngioResult, BinaryMask, Geometry, Idx3d, Label, LabeledVolume, VoxelSpace};
use nalgebra::Point3;
use std::collections::BTreeSet;
use std::fmt;

/// 种子点坐标所在的空间.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CoordSpace {
    /// 物理 (世界) 坐标, 单位毫米.
    Physical,

    /// 连续体素索引 `(i, j, k)`, 即 `(x, y, z)` 顺序.
    Voxel,
}

/// 带坐标空间标记的种子点.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SeedPoint {
    /// 坐标空间.
    pub space: CoordSpace,

    /// 坐标. 物理空间为 `(x, y, z)`, 体素空间为 `(i, j, k)`.
    pub coord: [f64; 3],
}

impl SeedPoint {
    /// 物理坐标种子.
    #[inline]
    pub const fn physical(x: f64, y: f64, z: f64) -> Self {
        Self {
            space: CoordSpace::Physical,
            coord: [x, y, z],
        }
    }

    /// 体素坐标种子.
    #[inline]
    pub const fn voxel(i: f64, j: f64, k: f64) -> Self {
        Self {
            space: CoordSpace::Voxel,
            coord: [i, j, k],
        }
    }
}

impl fmt::Display for SeedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.coord;
        match self.space {
            CoordSpace::Physical => write!(f, "physical({a}, {b}, {c})"),
            CoordSpace::Voxel => write!(f, "voxel({a}, {b}, {c})"),
        }
    }
}

/// 将种子点映射到体素索引 `(z, y, x)`.
///
/// 越界时返回 [`AngioError::OutOfBounds`], 由调用者决定跳过还是终止.
pub fn locate(geometry: &Geometry, seed: &SeedPoint) -> AngioResult<Idx3d> {
    match seed.space {
        CoordSpace::Physical => geometry.to_voxel(&Point3::from(seed.coord)),
        CoordSpace::Voxel => geometry.round_ijk(seed.coord),
    }
}

/// 筛选过程中产生的结构化警告. 核心库不打印它们, 由编排器或命令行决定如何呈现.
#[derive(Clone, Debug, PartialEq)]
pub enum SeedWarning {
    /// 种子点映射到体数据范围之外, 已被跳过.
    OutOfBounds {
        /// 种子点在输入序列中的位置.
        seed: usize,
        /// 四舍五入后的 `(i, j, k)`.
        ijk: [f64; 3],
        /// 体数据大小 `(nx, ny, nz)`.
        dims: [usize; 3],
    },

    /// 种子点落在背景体素上, 没有选中任何岛屿.
    OnBackground {
        /// 种子点在输入序列中的位置.
        seed: usize,
        /// 体素索引 `(z, y, x)`.
        index: Idx3d,
    },
}

impl fmt::Display for SeedWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { seed, ijk, dims } => write!(
                f,
                "种子点 #{seed} 映射到 {ijk:?}, 超出体数据范围 {dims:?}, 已跳过"
            ),
            Self::OnBackground { seed, index } => {
                write!(f, "种子点 #{seed} 落在背景体素 {index:?} 上")
            }
        }
    }
}

/// 岛屿选择方式.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Selection {
    /// 保留所有岛屿.
    All,

    /// 只保留体素个数最多的岛屿.
    #[default]
    Largest,

    /// 保留至少包含一个种子点的岛屿.
    Seeds(Vec<SeedPoint>),
}

/// 筛选结果: 需要保留的标号, 以及过程中产生的警告.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IslandSelection {
    /// 需要保留的岛屿标号, 不含背景.
    pub keep: BTreeSet<Label>,

    /// 结构化警告, 按种子点顺序排列.
    pub warnings: Vec<SeedWarning>,
}

impl IslandSelection {
    /// 被跳过 (越界) 的种子点个数.
    pub fn skipped(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| matches!(w, SeedWarning::OutOfBounds { .. }))
            .count()
    }
}

/// 选择最大岛屿. 体素个数相同时取标号最小者.
///
/// 没有任何岛屿时返回 [`AngioError::NoIslandSelected`].
pub fn largest(labeled: &LabeledVolume) -> AngioResult<IslandSelection> {
    let label = labeled
        .largest()
        .ok_or(AngioError::NoIslandSelected { seeds: 0, skipped: 0 })?;
    Ok(IslandSelection {
        keep: BTreeSet::from([label]),
        warnings: Vec::new(),
    })
}

/// 选择所有岛屿.
///
/// 没有任何岛屿时返回 [`AngioError::NoIslandSelected`].
pub fn all(labeled: &LabeledVolume) -> AngioResult<IslandSelection> {
    if labeled.label_count() == 0 {
        return Err(AngioError::NoIslandSelected { seeds: 0, skipped: 0 });
    }
    Ok(IslandSelection {
        keep: (1..=labeled.label_count() as Label).collect(),
        warnings: Vec::new(),
    })
}

/// 选择至少包含一个种子点的岛屿.
///
/// 越界的种子点被跳过并记为 [`SeedWarning::OutOfBounds`];
/// 落在背景上的种子点记为 [`SeedWarning::OnBackground`].
/// 最终没有选中任何岛屿时返回 [`AngioError::NoIslandSelected`].
pub fn by_seeds(labeled: &LabeledVolume, seeds: &[SeedPoint]) -> AngioResult<IslandSelection> {
    let mut selection = IslandSelection::default();
    for (i, seed) in seeds.iter().enumerate() {
        let index = match locate(labeled.geometry(), seed) {
            Ok(index) => index,
            Err(AngioError::OutOfBounds { ijk, dims }) => {
                selection
                    .warnings
                    .push(SeedWarning::OutOfBounds { seed: i, ijk, dims });
                continue;
            }
            Err(e) => return Err(e),
        };
        match labeled[index] {
            BACKGROUND_LABEL => selection
                .warnings
                .push(SeedWarning::OnBackground { seed: i, index }),
            l => {
                selection.keep.insert(l);
            }
        }
    }

    if selection.keep.is_empty() {
        return Err(AngioError::NoIslandSelected {
            seeds: seeds.len(),
            skipped: selection.skipped(),
        });
    }
    Ok(selection)
}

/// 按 `selection` 求需要保留的标号.
pub fn select(labeled: &LabeledVolume, selection: &Selection) -> AngioResult<IslandSelection> {
    match selection {
        Selection::All => all(labeled),
        Selection::Largest => largest(labeled),
        Selection::Seeds(seeds) => by_seeds(labeled, seeds),
    }
}

/// 生成新的掩码: 体素为前景当且仅当其标号在 `keep` 中.
///
/// `keep` 中不存在的标号与背景标号被忽略.
pub fn filter(labeled: &LabeledVolume, keep: &BTreeSet<Label>) -> BinaryMask {
    let mut lut = vec![false; labeled.label_count() + 1];
    for &l in keep.iter().filter(|&&l| l != BACKGROUND_LABEL) {
        if let Some(slot) = lut.get_mut(l as usize) {
            *slot = true;
        }
    }
    let data = labeled.data().mapv(|l| u8::from(lut[l as usize]));
    BinaryMask::from_parts(labeled.geometry().clone(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::label;
    use crate::{Affine, BinaryMask};
    use ndarray::Array3;

    /// 10x10x10, 两个 2x2x2 方块分别位于两个对角 + 一个 3 体素的小岛.
    fn fixture(affine: Affine) -> LabeledVolume {
        let mut data = Array3::<u8>::zeros((10, 10, 10));
        data.slice_mut(ndarray::s![0..2, 0..2, 0..2]).fill(1);
        data.slice_mut(ndarray::s![8..10, 8..10, 8..10]).fill(1);
        data.slice_mut(ndarray::s![5, 5, 0..3]).fill(1);
        label(&BinaryMask::new(data, affine).unwrap())
    }

    #[test]
    fn test_fixture_labels() {
        let l = fixture(Affine::identity());
        assert_eq!(l.sizes(), &[8, 3, 8]);
    }

    #[test]
    fn test_largest_and_all() {
        let l = fixture(Affine::identity());
        let s = largest(&l).unwrap();
        assert_eq!(s.keep, BTreeSet::from([1]));
        let m = filter(&l, &s.keep);
        assert_eq!(m.count_foreground(), 8);
        assert!(m.is_foreground_at((1, 1, 1)));

        let s = all(&l).unwrap();
        assert_eq!(filter(&l, &s.keep).count_foreground(), 19);
    }

    #[test]
    fn test_physical_and_voxel_seeds_agree() {
        let affine = Affine::from_spacing_origin([0.5, 0.5, 2.0], [-10.0, 4.0, 0.0]).unwrap();
        let l = fixture(affine);
        // 体素 (i, j, k) = (9, 8, 9) 位于远端方块内.
        let p = SeedPoint::physical(-10.0 + 9.0 * 0.5, 4.0 + 8.0 * 0.5, 9.0 * 2.0);
        let v = SeedPoint::voxel(9.0, 8.0, 9.0);
        assert_eq!(locate(l.geometry(), &p).unwrap(), (9, 8, 9));
        assert_eq!(
            by_seeds(&l, &[p]).unwrap(),
            by_seeds(&l, &[v]).unwrap()
        );
        assert_eq!(by_seeds(&l, &[v]).unwrap().keep, BTreeSet::from([3]));
    }

    #[test]
    fn test_seeds_with_warnings() {
        let l = fixture(Affine::identity());
        let seeds = [
            SeedPoint::voxel(0.4, 0.4, 0.4),
            SeedPoint::voxel(-3.0, 0.0, 0.0),
            SeedPoint::voxel(5.0, 5.0, 5.0),
            SeedPoint::voxel(1.0, 5.0, 5.0),
            SeedPoint::voxel(1.2, 0.6, 0.0),
        ];
        let s = by_seeds(&l, &seeds).unwrap();
        assert_eq!(s.keep, BTreeSet::from([1, 2]));
        assert_eq!(s.skipped(), 1);
        assert_eq!(
            s.warnings,
            vec![
                SeedWarning::OutOfBounds {
                    seed: 1,
                    ijk: [-3.0, 0.0, 0.0],
                    dims: [10, 10, 10]
                },
                SeedWarning::OnBackground {
                    seed: 2,
                    index: (5, 5, 5)
                },
            ]
        );

        let m = filter(&l, &s.keep);
        assert_eq!(m.count_foreground(), 11);
        assert!(!m.is_foreground_at((9, 9, 9)));
    }

    #[test]
    fn test_no_island_selected() {
        let l = fixture(Affine::identity());
        let seeds = [SeedPoint::voxel(100.0, 0.0, 0.0), SeedPoint::physical(0.0, -7.0, 0.0)];
        match by_seeds(&l, &seeds).unwrap_err() {
            AngioError::NoIslandSelected { seeds, skipped } => {
                assert_eq!(seeds, 2);
                assert_eq!(skipped, 2);
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = by_seeds(&l, &[SeedPoint::voxel(5.0, 5.0, 5.0)]).unwrap_err();
        assert!(matches!(
            err,
            AngioError::NoIslandSelected { seeds: 1, skipped: 0 }
        ));

        assert!(by_seeds(&l, &[]).is_err());
    }

    #[test]
    fn test_filter_ignores_unknown_labels() {
        let l = fixture(Affine::identity());
        let m = filter(&l, &BTreeSet::from([0, 3, 42]));
        assert_eq!(m.count_foreground(), 8);
        assert!(m.is_foreground_at((9, 9, 9)));
    }
}
