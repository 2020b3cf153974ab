//! 双闭区间阈值分割.

use super::{BinaryMask, Volume, VoxelSpace};
use crate::consts::{ElemType, DEFAULT_THRESHOLD_MAX, DEFAULT_THRESHOLD_MIN};
use crate::{AngioError, AngioResult};

/// 强度阈值区间 `[lo, hi]`, 两端均包含.
///
/// 该区间是只读的. 若要修改阈值, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "[f32; 2]", into = "[f32; 2]"))]
pub struct IntensityRange {
    lo: f32,
    hi: f32,
}

impl Default for IntensityRange {
    #[inline]
    fn default() -> Self {
        Self::from_vessel_defaults()
    }
}

impl IntensityRange {
    /// 构建阈值区间.
    ///
    /// `lo`, `hi` 必须是有限值且 `lo <= hi`, 否则返回 [`AngioError::InvalidRange`].
    /// `lo == hi` 是合法的, 此时只有恰好等于该值的体素是前景.
    pub fn new(lo: f32, hi: f32) -> AngioResult<IntensityRange> {
        if lo.is_finite() && hi.is_finite() && lo <= hi {
            Ok(Self { lo, hi })
        } else {
            Err(AngioError::InvalidRange {
                lo: f64::from(lo),
                hi: f64::from(hi),
            })
        }
    }

    /// 血管增强滤波输出的常用区间 `[0.8, 1.0]`.
    #[inline]
    pub const fn from_vessel_defaults() -> IntensityRange {
        Self {
            lo: DEFAULT_THRESHOLD_MIN,
            hi: DEFAULT_THRESHOLD_MAX,
        }
    }

    /// 下限.
    #[inline]
    pub fn lo(&self) -> f32 {
        self.lo
    }

    /// 上限.
    #[inline]
    pub fn hi(&self) -> f32 {
        self.hi
    }

    /// `v` 是否落在区间内. NaN 永远不在区间内.
    #[inline]
    pub fn contains(&self, v: f32) -> bool {
        self.lo <= v && v <= self.hi
    }

    /// 求采样值 `v` 对应的体素类型.
    #[inline]
    pub fn eval(&self, v: f32) -> ElemType {
        if self.contains(v) {
            ElemType::Foreground
        } else {
            ElemType::Background
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<[f32; 2]> for IntensityRange {
    type Error = AngioError;

    fn try_from([lo, hi]: [f32; 2]) -> Result<Self, Self::Error> {
        Self::new(lo, hi)
    }
}

#[cfg(feature = "serde")]
impl From<IntensityRange> for [f32; 2] {
    fn from(value: IntensityRange) -> Self {
        [value.lo, value.hi]
    }
}

impl Volume {
    /// 按 `range` 生成二值掩码: `lo <= v <= hi` 的体素为前景.
    pub fn threshold(&self, range: &IntensityRange) -> BinaryMask {
        let data = self.data.mapv(|v| range.eval(v).gray());
        BinaryMask::from_parts(self.geometry().clone(), data)
    }

    /// [`Self::threshold`] 的并行版本. 结果与串行版本逐体素相同.
    #[cfg(feature = "rayon")]
    pub fn par_threshold(&self, range: &IntensityRange) -> BinaryMask {
        let data = ndarray::Zip::from(&self.data).par_map_collect(|&v| range.eval(v).gray());
        BinaryMask::from_parts(self.geometry().clone(), data)
    }
}

/// 阈值分割. 体素 `v` 为前景当且仅当 `lo <= volume[v] <= hi`.
///
/// `lo > hi` 或任一端非有限时返回 [`AngioError::InvalidRange`].
/// 启用 `rayon` feature 时并行计算.
pub fn segment(volume: &Volume, lo: f32, hi: f32) -> AngioResult<BinaryMask> {
    let range = IntensityRange::new(lo, hi)?;
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            Ok(volume.par_threshold(&range))
        } else {
            Ok(volume.threshold(&range))
        }
    }
}
