//! 体素索引与物理坐标之间的仿射映射.
//!
//! 体素索引以 `(i, j, k)` 即 `(x, y, z)` 的顺序参与矩阵运算,
//! 而 crate 内部的 [`Idx3d`] 以 `(z, y, x)` 的顺序存储. 两者的转换只发生在本模块.

use crate::{AngioError, AngioResult, Idx3d};
use nalgebra::{Matrix3, Matrix4, Point3};
use nifti::NiftiHeader;

/// 4x4 仿射变换 (体素 -> 物理) 及其缓存的逆矩阵.
///
/// 该对象是只读的. 若要修改变换, 你应该创建新的实例.
#[derive(Debug, Clone, PartialEq)]
pub struct Affine {
    forward: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl Default for Affine {
    #[inline]
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    /// 由体素到物理坐标的齐次矩阵构建. 逆矩阵在此一次性计算.
    ///
    /// 如果矩阵包含非有限值或不可逆, 返回 [`AngioError::SingularAffine`].
    pub fn new(forward: Matrix4<f64>) -> AngioResult<Self> {
        if !forward.iter().all(|v| v.is_finite()) {
            return Err(AngioError::SingularAffine);
        }
        let inverse = forward
            .try_inverse()
            .ok_or(AngioError::SingularAffine)?;
        Ok(Self { forward, inverse })
    }

    /// 单位变换: 物理坐标即体素索引.
    #[inline]
    pub fn identity() -> Self {
        Self {
            forward: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }

    /// 由矩阵前三行 (nifti `srow_{x, y, z}` 的格式) 构建.
    pub fn from_rows(rows: [[f64; 4]; 3]) -> AngioResult<Self> {
        let [x, y, z] = rows;
        #[rustfmt::skip]
        let m = Matrix4::new(
            x[0], x[1], x[2], x[3],
            y[0], y[1], y[2], y[3],
            z[0], z[1], z[2], z[3],
            0.0, 0.0, 0.0, 1.0,
        );
        Self::new(m)
    }

    /// 轴对齐的体素网格: `spacing` 为 `(i, j, k)` 方向的体素尺寸,
    /// `origin` 为体素 `(0, 0, 0)` 中心的物理坐标.
    pub fn from_spacing_origin(spacing: [f64; 3], origin: [f64; 3]) -> AngioResult<Self> {
        let [sx, sy, sz] = spacing;
        let [ox, oy, oz] = origin;
        Self::from_rows([
            [sx, 0.0, 0.0, ox],
            [0.0, sy, 0.0, oy],
            [0.0, 0.0, sz, oz],
        ])
    }

    /// 从 nifti header 获取体素到物理坐标 (RAS+) 的变换.
    ///
    /// 优先级依次为: `sform_code > 0` 时使用 `srow_{x, y, z}`;
    /// `qform_code > 0` 时使用四元数 + `pixdim` + `quatern_{x, y, z}` 平移;
    /// 否则仅按 `pixdim` 缩放. `pixdim` 为 0 的方向视为 1 毫米.
    pub fn from_nifti_header(h: &NiftiHeader) -> AngioResult<Self> {
        if h.sform_code > 0 {
            let row = |r: [f32; 4]| r.map(f64::from);
            return Self::from_rows([row(h.srow_x), row(h.srow_y), row(h.srow_z)]);
        }

        let [qfac, dx, dy, dz, ..] = h.pixdim.map(f64::from);
        let positive = |d: f64| if d > 0.0 { d } else { 1.0 };
        let (dx, dy, dz) = (positive(dx), positive(dy), positive(dz));

        if h.qform_code <= 0 {
            return Self::from_spacing_origin([dx, dy, dz], [0.0; 3]);
        }

        let (b, c, d) = (
            f64::from(h.quatern_b),
            f64::from(h.quatern_c),
            f64::from(h.quatern_d),
        );
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if qfac < 0.0 { -1.0 } else { 1.0 };

        #[rustfmt::skip]
        let rotation = Matrix3::new(
            a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d),         2.0 * (b * d + a * c),
            2.0 * (b * c + a * d),         a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b),
            2.0 * (b * d - a * c),         2.0 * (c * d + a * b),         a * a + d * d - b * b - c * c,
        );
        let scale = Matrix3::from_diagonal(&nalgebra::Vector3::new(dx, dy, qfac * dz));
        let linear = rotation * scale;

        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
        m[(0, 3)] = f64::from(h.quatern_x);
        m[(1, 3)] = f64::from(h.quatern_y);
        m[(2, 3)] = f64::from(h.quatern_z);
        Self::new(m)
    }

    /// 体素到物理坐标的齐次矩阵.
    #[inline]
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.forward
    }

    /// 物理坐标到体素的齐次矩阵.
    #[inline]
    pub fn inverse_matrix(&self) -> &Matrix4<f64> {
        &self.inverse
    }

    /// 连续体素坐标 `(i, j, k)` -> 物理坐标.
    #[inline]
    pub fn ijk_to_physical(&self, ijk: &Point3<f64>) -> Point3<f64> {
        self.forward.transform_point(ijk)
    }

    /// 物理坐标 -> 连续体素坐标 `(i, j, k)`. 不做取整.
    #[inline]
    pub fn physical_to_ijk(&self, physical: &Point3<f64>) -> Point3<f64> {
        self.inverse.transform_point(physical)
    }

    /// 3x3 线性部分.
    #[inline]
    fn linear(&self) -> Matrix3<f64> {
        self.forward.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// `(i, j, k)` 三个方向的体素尺寸 (线性部分各列的模).
    pub fn spacing(&self) -> [f64; 3] {
        let l = self.linear();
        [l.column(0).norm(), l.column(1).norm(), l.column(2).norm()]
    }

    /// 线性部分的行列式.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.linear().determinant()
    }

    /// 单个体素的物理体积.
    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.determinant().abs()
    }

    /// 变换是否包含镜像 (行列式为负). 镜像变换会翻转三角形的朝向.
    #[inline]
    pub fn is_mirrored(&self) -> bool {
        self.determinant() < 0.0
    }
}

/// 体数据的几何信息: 形状 + 仿射变换.
///
/// [`crate::Volume`], [`crate::BinaryMask`], [`crate::LabeledVolume`]
/// 沿流水线传递同一份几何信息.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    shape: Idx3d,
    affine: Affine,
}

impl Geometry {
    /// 初始化. `shape` 以 `(z, y, x)` 顺序给出, 任何一维为 0 则返回
    /// [`AngioError::EmptyVolume`].
    pub fn new(shape: Idx3d, affine: Affine) -> AngioResult<Self> {
        let (z, y, x) = shape;
        if z == 0 || y == 0 || x == 0 {
            return Err(AngioError::EmptyVolume(shape));
        }
        Ok(Self { shape, affine })
    }

    /// `(z, y, x)` 形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// `(nx, ny, nz)` 大小.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        let (z, y, x) = self.shape;
        [x, y, z]
    }

    /// 体素总数.
    #[inline]
    pub fn size(&self) -> usize {
        let (z, y, x) = self.shape;
        z * y * x
    }

    /// 仿射变换.
    #[inline]
    pub fn affine(&self) -> &Affine {
        &self.affine
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (z0, y0, x0): &Idx3d) -> bool {
        let (z, y, x) = self.shape;
        *z0 < z && *y0 < y && *x0 < x
    }

    /// 物理坐标 -> 体素索引.
    ///
    /// 每个分量四舍五入到最近整数 (0.5 远离零). 若结果越界则返回
    /// [`AngioError::OutOfBounds`].
    #[inline]
    pub fn to_voxel(&self, physical: &Point3<f64>) -> AngioResult<Idx3d> {
        let ijk = self.affine.physical_to_ijk(physical);
        self.round_ijk([ijk.x, ijk.y, ijk.z])
    }

    /// 连续体素坐标 `(i, j, k)` -> 体素索引. 取整与越界规则同 [`Self::to_voxel`].
    pub fn round_ijk(&self, ijk: [f64; 3]) -> AngioResult<Idx3d> {
        // `f64::round` 恰好是 "0.5 远离零".
        let rounded = ijk.map(f64::round);
        let dims = self.dims();
        // NaN 不满足任何比较, 自然被视为越界.
        let inside = rounded
            .iter()
            .zip(dims.iter())
            .all(|(&v, &n)| v >= 0.0 && v < n as f64);
        if !inside {
            return Err(AngioError::OutOfBounds {
                ijk: rounded,
                dims,
            });
        }
        let [i, j, k] = rounded.map(|v| v as usize);
        Ok((k, j, i))
    }

    /// 体素索引 -> 体素中心的物理坐标.
    #[inline]
    pub fn to_physical(&self, (k, j, i): Idx3d) -> Point3<f64> {
        self.affine
            .ijk_to_physical(&Point3::new(i as f64, j as f64, k as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::{Affine, Geometry};
    use crate::AngioError;
    use nalgebra::{Matrix4, Point3};
    use nifti::NiftiHeader;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    fn oblique() -> Affine {
        // 各向异性 + 旋转 + 平移.
        let (s, c) = (0.3f64.sin(), 0.3f64.cos());
        Affine::from_rows([
            [0.7 * c, -0.7 * s, 0.0, -12.5],
            [0.7 * s, 0.7 * c, 0.0, 30.0],
            [0.0, 0.0, -1.5, 4.25],
        ])
        .unwrap()
    }

    #[test]
    fn test_singular_affine() {
        let err = Affine::new(Matrix4::zeros()).unwrap_err();
        assert!(matches!(err, AngioError::SingularAffine));

        let mut m = Matrix4::identity();
        m[(0, 3)] = f64::NAN;
        assert!(Affine::new(m).is_err());
    }

    #[test]
    fn test_empty_geometry() {
        let err = Geometry::new((0, 3, 3), Affine::identity()).unwrap_err();
        assert!(matches!(err, AngioError::EmptyVolume((0, 3, 3))));
    }

    /// `to_voxel(to_physical(v)) == v` 对所有合法体素成立.
    #[test]
    fn test_round_trip() {
        let g = Geometry::new((4, 5, 6), oblique()).unwrap();
        for k in 0..4 {
            for j in 0..5 {
                for i in 0..6 {
                    let p = g.to_physical((k, j, i));
                    assert_eq!(g.to_voxel(&p).unwrap(), (k, j, i));
                }
            }
        }
    }

    #[test]
    fn test_rounding_ties_away_from_zero() {
        let g = Geometry::new((3, 3, 3), Affine::identity()).unwrap();
        assert_eq!(g.round_ijk([0.5, 1.49, 1.5]).unwrap(), (2, 1, 1));
        assert_eq!(g.round_ijk([-0.4, 0.0, 0.0]).unwrap(), (0, 0, 0));

        // -0.5 -> -1, 越界.
        let err = g.round_ijk([-0.5, 0.0, 0.0]).unwrap_err();
        match err {
            AngioError::OutOfBounds { ijk, dims } => {
                assert_eq!(ijk, [-1.0, 0.0, 0.0]);
                assert_eq!(dims, [3, 3, 3]);
            }
            other => panic!("unexpected error {other:?}"),
        }

        // 2.5 -> 3, 越界.
        assert!(g.round_ijk([0.0, 2.5, 0.0]).is_err());
        assert!(g.round_ijk([f64::NAN, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_to_voxel_with_spacing() {
        let a = Affine::from_spacing_origin([0.5, 0.5, 2.0], [-10.0, 0.0, 100.0]).unwrap();
        let g = Geometry::new((10, 10, 10), a).unwrap();
        // i = (x + 10) / 0.5, j = y / 0.5, k = (z - 100) / 2.
        assert_eq!(g.to_voxel(&Point3::new(-8.0, 1.0, 106.0)).unwrap(), (3, 2, 4));
        assert_eq!(g.to_voxel(&Point3::new(-8.1, 1.1, 106.9)).unwrap(), (3, 2, 4));
        assert!(g.to_voxel(&Point3::new(-20.0, 0.0, 100.0)).is_err());

        let p = g.to_physical((1, 2, 3));
        assert!(f64_eq(p.x, -8.5) && f64_eq(p.y, 1.0) && f64_eq(p.z, 102.0));
    }

    #[test]
    fn test_spacing_and_mirroring() {
        let a = oblique();
        let [sx, sy, sz] = a.spacing();
        assert!(f64_eq(sx, 0.7) && f64_eq(sy, 0.7) && f64_eq(sz, 1.5));
        assert!(a.is_mirrored());
        assert!(f64_eq(a.voxel_volume(), 0.7 * 0.7 * 1.5));
    }

    #[test]
    fn test_nifti_sform() {
        let mut h = NiftiHeader::default();
        h.sform_code = 1;
        h.srow_x = [2.0, 0.0, 0.0, 1.0];
        h.srow_y = [0.0, 3.0, 0.0, 2.0];
        h.srow_z = [0.0, 0.0, 4.0, 3.0];
        let a = Affine::from_nifti_header(&h).unwrap();
        let p = a.ijk_to_physical(&Point3::new(1.0, 1.0, 1.0));
        assert!(f64_eq(p.x, 3.0) && f64_eq(p.y, 5.0) && f64_eq(p.z, 7.0));
    }

    #[test]
    fn test_nifti_qform() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 1;
        // 绕 z 轴旋转 180 度: (b, c, d) = (0, 0, 1), a = 0.
        h.quatern_b = 0.0;
        h.quatern_c = 0.0;
        h.quatern_d = 1.0;
        h.pixdim = [1.0, 0.5, 0.5, 2.0, 0.0, 0.0, 0.0, 0.0];
        h.quatern_x = 10.0;
        h.quatern_y = 20.0;
        h.quatern_z = -5.0;
        let a = Affine::from_nifti_header(&h).unwrap();
        let p = a.ijk_to_physical(&Point3::new(2.0, 4.0, 1.0));
        assert!(f64_eq(p.x, 10.0 - 1.0));
        assert!(f64_eq(p.y, 20.0 - 2.0));
        assert!(f64_eq(p.z, -5.0 + 2.0));
    }

    #[test]
    fn test_nifti_pixdim_only() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 0;
        h.pixdim = [0.0, 0.8, 0.0, 1.2, 0.0, 0.0, 0.0, 0.0];
        let a = Affine::from_nifti_header(&h).unwrap();
        let [sx, sy, sz] = a.spacing();
        assert!(f64_eq(sx, f64::from(0.8f32)));
        assert!(f64_eq(sy, 1.0));
        assert!(f64_eq(sz, f64::from(1.2f32)));
    }
}
