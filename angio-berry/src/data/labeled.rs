use super::{Geometry, LabelSlice, VoxelSpace};
use crate::consts::BACKGROUND_LABEL;
use crate::{Idx3d, Label};
use ndarray::{Array3, ArrayView, Axis, Ix3};
use std::ops::Index;

/// 岛屿标签体. 每个体素保存 `0` (背景) 或正整数岛屿标号.
///
/// 对任意 `L > 0`, 标号为 `L` 的体素恰好构成一个 26-连通分量.
/// 标号从 1 开始连续分配, 顺序由各岛屿首个光栅扫描体素决定.
///
/// 只能由 [`crate::label::label`] 创建.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledVolume {
    geometry: Geometry,
    data: Array3<Label>,
    /// `sizes[L - 1]` 为岛屿 `L` 的体素个数.
    sizes: Vec<usize>,
}

impl VoxelSpace for LabeledVolume {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

impl Index<Idx3d> for LabeledVolume {
    type Output = Label;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl LabeledVolume {
    /// 内部方法. 调用者保证标号连续且与 `sizes` 一致.
    #[inline]
    pub(crate) fn new(geometry: Geometry, data: Array3<Label>, sizes: Vec<usize>) -> Self {
        debug_assert_eq!(geometry.shape(), data.dim());
        Self {
            geometry,
            data,
            sizes,
        }
    }

    /// 岛屿个数. 背景不计入.
    #[inline]
    pub fn label_count(&self) -> usize {
        self.sizes.len()
    }

    /// 每个岛屿的体素个数, 下标 `i` 对应标号 `i + 1`.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// 岛屿 `label` 的体素个数. 背景或不存在的标号返回 `None`.
    #[inline]
    pub fn voxel_count(&self, label: Label) -> Option<usize> {
        if label == BACKGROUND_LABEL {
            return None;
        }
        self.sizes.get(label as usize - 1).copied()
    }

    /// 获取 `pos` 处的标号. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<Label> {
        self.data.get(pos).copied()
    }

    /// 收集岛屿 `label` 的所有体素下标, 按光栅序存储.
    pub fn voxels_of(&self, label: Label) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, &l)| (l == label).then_some(pos))
            .collect()
    }

    /// 最大岛屿的标号. 体素个数相同时取标号最小者, 即最先被扫描到的岛屿.
    ///
    /// 没有任何岛屿时返回 `None`.
    pub fn largest(&self) -> Option<Label> {
        // `max_by_key` 在相等时取最后一个, 所以这里反向迭代.
        self.sizes
            .iter()
            .enumerate()
            .rev()
            .max_by_key(|(_, &n)| n)
            .map(|(i, _)| i as Label + 1)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, Label, Ix3> {
        self.data.view()
    }

    /// 获取 z 空间的第 `z_index` 层不可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> LabelSlice<'_> {
        LabelSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 消费自我, 获得几何信息, 底层数据与各岛屿大小.
    #[inline]
    pub fn into_raw(self) -> (Geometry, Array3<Label>, Vec<usize>) {
        (self.geometry, self.data, self.sizes)
    }
}
