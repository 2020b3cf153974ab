//! 运行时错误.

use crate::Idx3d;
use std::path::PathBuf;
use thiserror::Error;

/// 分割, 筛选, 表面提取与导出过程中的运行时错误.
#[derive(Debug, Error)]
pub enum AngioError {
    /// 阈值区间不合法 (`lo > hi`, 或包含非有限值).
    #[error("无效的阈值区间 [{lo}, {hi}]")]
    InvalidRange {
        /// 下限.
        lo: f64,
        /// 上限.
        hi: f64,
    },

    /// 坐标映射后的体素索引落在体数据范围之外.
    ///
    /// 对单个种子点而言这是可恢复错误, 由流水线编排器决定跳过还是终止.
    #[error("坐标映射到体素 {ijk:?}, 超出体数据范围 {dims:?}")]
    OutOfBounds {
        /// 四舍五入后的 `(i, j, k)` 连续索引.
        ijk: [f64; 3],
        /// 体数据大小 `(nx, ny, nz)`.
        dims: [usize; 3],
    },

    /// 没有任何岛屿被选中. 后续表面提取没有意义, 流水线终止.
    #[error("没有任何岛屿被选中 (共 {seeds} 个种子点, 其中 {skipped} 个越界)")]
    NoIslandSelected {
        /// 种子点总数. 最大岛屿模式下为 0.
        seeds: usize,
        /// 因越界而被跳过的种子点个数.
        skipped: usize,
    },

    /// 掩码为全背景, 无法提取表面.
    #[error("掩码为全背景, 无法提取表面")]
    EmptyMask,

    /// 仿射矩阵不可逆或包含非有限值.
    #[error("仿射矩阵不可逆或包含非有限值")]
    SingularAffine,

    /// 体数据至少有一个维度为 0.
    #[error("体数据为空, 形状 {0:?}")]
    EmptyVolume(Idx3d),

    /// 流水线阶段调用顺序错误.
    #[error("流水线无法从 `{from}` 状态执行 `{to}`")]
    InvalidTransition {
        /// 当前状态.
        from: &'static str,
        /// 试图进入的状态.
        to: &'static str,
    },

    /// nifti 文件读取错误.
    #[error("nifti 读取错误: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 数组形状错误 (例如 nifti 文件不是三维的).
    #[error("数组形状错误: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// 文件读写错误.
    #[error("读写 {path} 失败: {source}")]
    Io {
        /// 出错的路径.
        path: PathBuf,
        /// 底层 I/O 错误.
        #[source]
        source: std::io::Error,
    },

    /// `.npy` 写入错误.
    #[error("npy 写入错误: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    /// 图像保存错误.
    #[error("图像保存错误: {0}")]
    Image(#[from] image::ImageError),

    /// 配置文件解析错误.
    #[cfg(feature = "serde")]
    #[error("配置文件解析错误: {0}")]
    Config(#[from] serde_json::Error),
}

impl AngioError {
    /// 该错误对单个种子点而言是否可恢复 (跳过并警告).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }

    /// 包装一个带路径的 I/O 错误.
    #[inline]
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// 运行时结果.
pub type AngioResult<T> = Result<T, AngioError>;
