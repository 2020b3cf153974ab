use std::ops::Index;
use std::path::Path;

use nalgebra::Point3;
use ndarray::{Array3, ArrayD, ArrayView, Axis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use crate::consts::gray::*;
use crate::{AngioResult, Idx3d};

mod geometry;
mod labeled;
mod slice;
mod threshold;

pub use geometry::{Affine, Geometry};
pub use labeled::LabeledVolume;
pub use slice::{ImgWriteVis, LabelSlice, MaskSlice};
pub use threshold::{segment, IntensityRange};

/// 体数据的共用几何属性和部分通用操作.
///
/// 流水线上的每一种体数据都携带一份 [`Geometry`],
/// 坐标映射因此可以在任意阶段直接使用.
pub trait VoxelSpace {
    /// 获取几何信息.
    fn geometry(&self) -> &Geometry;

    /// 获取 `(z, y, x)` 形状.
    #[inline]
    fn shape(&self) -> Idx3d {
        self.geometry().shape()
    }

    /// 获取 `(nx, ny, nz)` 大小.
    #[inline]
    fn dims(&self) -> [usize; 3] {
        self.geometry().dims()
    }

    /// 获取水平切片 (z 方向) 个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取体素个数.
    #[inline]
    fn size(&self) -> usize {
        self.geometry().size()
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, pos: &Idx3d) -> bool {
        self.geometry().check(pos)
    }

    /// 物理坐标 -> 体素索引. 见 [`Geometry::to_voxel`].
    #[inline]
    fn to_voxel(&self, physical: &Point3<f64>) -> AngioResult<Idx3d> {
        self.geometry().to_voxel(physical)
    }

    /// 体素索引 -> 物理坐标. 见 [`Geometry::to_physical`].
    #[inline]
    fn to_physical(&self, pos: Idx3d) -> Point3<f64> {
        self.geometry().to_physical(pos)
    }

    /// 获取 `(i, j, k)` 三个方向的体素分辨率, 以毫米为单位.
    #[inline]
    fn spacing(&self) -> [f64; 3] {
        self.geometry().affine().spacing()
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.geometry().affine().voxel_volume()
    }
}

/// 3D 标量体数据 (例如血管增强滤波的输出). 采样值以 `f32` 保存.
///
/// 载入后只读. 流水线通过移动 (而非共享) 将其交给下一阶段.
#[derive(Debug, Clone)]
pub struct Volume {
    geometry: Geometry,
    data: Array3<f32>,
}

impl VoxelSpace for Volume {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

impl Index<Idx3d> for Volume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl Volume {
    /// 由 `(z, y, x)` 排列的数据和体素到物理坐标的变换直接创建.
    ///
    /// 任何一维为 0 时返回 [`crate::AngioError::EmptyVolume`].
    pub fn new(data: Array3<f32>, affine: Affine) -> AngioResult<Self> {
        let geometry = Geometry::new(data.dim(), affine)?;
        Ok(Self { geometry, data })
    }

    /// 由任意数值类型的采样创建. 无法表示为 `f32` 的采样被记为 NaN,
    /// 从而在阈值分割中永远是背景.
    pub fn from_samples<T>(data: Array3<T>, affine: Affine) -> AngioResult<Self>
    where
        T: num::ToPrimitive + Clone,
    {
        Self::new(data.mapv(|v| v.to_f32().unwrap_or(f32::NAN)), affine)
    }

    /// 打开 nii 文件格式的 3D 标量体数据. `path` 为 nii 文件的本地路径.
    ///
    /// 仿射变换按 [`Affine::from_nifti_header`] 的规则获取.
    /// 末尾长度为 1 的第四维 (单时间点) 会被去掉; 其它四维数据返回错误.
    pub fn open<P: AsRef<Path>>(path: P) -> AngioResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let affine = Affine::from_nifti_header(obj.header())?;

        // [i, j, k] -> [k, j, i]. 之后均按照 (z, y, x) 访问.
        let data: ArrayD<f32> = obj.into_volume().into_ndarray::<f32>()?;
        let data = if data.ndim() == 4 && data.shape()[3] == 1 {
            data.index_axis_move(Axis(3), 0)
        } else {
            data
        };
        let data = data
            .into_dimensionality::<Ix3>()?
            .permuted_axes([2, 1, 0])
            .as_standard_layout()
            .into_owned();

        Self::new(data, affine)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }

    /// 获取 `pos` 处的采样值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<&f32> {
        self.data.get(pos)
    }

    /// 采样值的 (最小值, 最大值), 忽略 NaN. 全为 NaN 时返回 `None`.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// 消费自我, 获得几何信息与底层数据.
    #[inline]
    pub fn into_raw(self) -> (Geometry, Array3<f32>) {
        (self.geometry, self.data)
    }
}

/// 3D 二值掩码. 体素值只可能是 [`MASK_BACKGROUND`] 或 [`MASK_FOREGROUND`].
///
/// 掩码从不被后续阶段就地修改: 每个阶段都产生新的掩码.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    geometry: Geometry,
    data: Array3<u8>,
}

impl VoxelSpace for BinaryMask {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

impl Index<Idx3d> for BinaryMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl BinaryMask {
    /// 由 `(z, y, x)` 排列的数据直接创建. 非零体素被视为前景.
    pub fn new(data: Array3<u8>, affine: Affine) -> AngioResult<Self> {
        let geometry = Geometry::new(data.dim(), affine)?;
        Ok(Self::from_parts(geometry, data.mapv_into(normalize)))
    }

    /// 内部方法. 调用者保证 `data` 的形状与 `geometry` 一致, 且只含 0 和 1.
    #[inline]
    pub(crate) fn from_parts(geometry: Geometry, data: Array3<u8>) -> Self {
        debug_assert_eq!(geometry.shape(), data.dim());
        debug_assert!(data.iter().all(|p| *p <= MASK_FOREGROUND));
        Self { geometry, data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// `pos` 是否为前景. 越界时返回 `false`.
    #[inline]
    pub fn is_foreground_at(&self, pos: Idx3d) -> bool {
        self.data.get(pos).is_some_and(|p| is_foreground(*p))
    }

    /// 前景体素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 该掩码是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 收集所有前景体素的下标, 结果按光栅序 (z, y, x) 存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| is_foreground(*p).then_some(pos))
            .collect()
    }

    /// 前景的轴对齐包围盒 `(最小索引, 最大索引)`, 均为闭区间.
    /// 全背景时返回 `None`.
    pub fn bounding_box(&self) -> Option<(Idx3d, Idx3d)> {
        self.data
            .indexed_iter()
            .filter(|(_, p)| is_foreground(**p))
            .fold(None, |acc, ((z, y, x), _)| match acc {
                None => Some(((z, y, x), (z, y, x))),
                Some(((z0, y0, x0), (z1, y1, x1))) => Some((
                    (z0.min(z), y0.min(y), x0.min(x)),
                    (z1.max(z), y1.max(y), x1.max(x)),
                )),
            })
    }

    /// 获取 z 空间的第 `z_index` 层不可变切片.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> MaskSlice<'_> {
        MaskSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代水平不可变切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = MaskSlice<'_>> {
        self.data.axis_iter(Axis(0)).map(MaskSlice::new)
    }

    /// 消费自我, 获得几何信息与底层数据.
    #[inline]
    pub fn into_raw(self) -> (Geometry, Array3<u8>) {
        (self.geometry, self.data)
    }
}

/// 非零即前景.
#[inline]
fn normalize(p: u8) -> u8 {
    if is_background(p) {
        MASK_BACKGROUND
    } else {
        MASK_FOREGROUND
    }
}

impl From<LabeledVolume> for BinaryMask {
    /// 保留所有岛屿.
    fn from(value: LabeledVolume) -> Self {
        let (geometry, data, _) = value.into_raw();
        let data = data.mapv(|l| {
            if l == crate::consts::BACKGROUND_LABEL {
                MASK_BACKGROUND
            } else {
                MASK_FOREGROUND
            }
        });
        Self::from_parts(geometry, data)
    }
}

#[cfg(test)]
mod tests {
    use super::{Affine, BinaryMask, Volume, VoxelSpace};
    use crate::AngioError;
    use ndarray::Array3;

    #[test]
    fn test_empty_volume() {
        let err = Volume::new(Array3::zeros((2, 0, 2)), Affine::identity()).unwrap_err();
        assert!(matches!(err, AngioError::EmptyVolume(_)));
    }

    #[test]
    fn test_from_integer_samples() {
        let data = Array3::<i16>::from_shape_fn((2, 2, 2), |(z, y, x)| (z * 4 + y * 2 + x) as i16);
        let v = Volume::from_samples(data, Affine::identity()).unwrap();
        assert_eq!(v[(1, 1, 1)], 7.0);
        assert_eq!(v.min_max(), Some((0.0, 7.0)));
        assert_eq!(v.dims(), [2, 2, 2]);
    }

    #[test]
    fn test_mask_normalize() {
        let mut data = Array3::<u8>::zeros((3, 3, 3));
        data[(0, 1, 2)] = 255;
        data[(2, 2, 0)] = 1;
        let m = BinaryMask::new(data, Affine::identity()).unwrap();
        assert_eq!(m[(0, 1, 2)], 1);
        assert_eq!(m.count_foreground(), 2);
        assert_eq!(m.foreground_pos(), vec![(0, 1, 2), (2, 2, 0)]);
        assert_eq!(m.bounding_box(), Some(((0, 1, 0), (2, 2, 2))));
        assert!(!m.is_foreground_at((9, 9, 9)));
    }

    #[test]
    fn test_mask_background() {
        let m = BinaryMask::new(Array3::zeros((1, 2, 3)), Affine::identity()).unwrap();
        assert!(m.is_background());
        assert_eq!(m.bounding_box(), None);
        assert_eq!(m.slice_iter().len(), 1);
    }
}
