#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 将血管增强滤波后的 3D 血管造影标量场精化为二值掩码,
//! 按 3D 连通岛屿进行筛选, 并提取可导出的闭合表面网格.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. DICOM 导入与血管增强滤波 (vesselness) 不在该 crate 的范围内,
//!   输入是已经滤波完成的标量体数据 (通常以 nifti 格式保存).
//! 2. 除 [`pipeline`] 编排器外, 所有算法都是纯函数: 每个阶段读取完整输入,
//!   并分配新的输出缓冲, 从不就地修改上游数据.
//!
//! # 开发计划
//!
//! ### 仿射坐标映射 ✅
//!
//! 体素索引 `(i, j, k)` 与物理坐标之间的双向映射. 逆矩阵只计算一次,
//! 与几何信息一起缓存. 物理坐标到体素索引时四舍五入 (0.5 远离零).
//!
//! 实现位于 `angio-berry/src/data/geometry.rs`.
//!
//! ### 双闭区间阈值分割 ✅
//!
//! `lo <= v <= hi` 的体素为前景. 默认区间为 `[0.8, 1.0]`.
//!
//! 实现位于 `angio-berry/src/data/threshold.rs`.
//!
//! ### 26-邻域连通岛屿标记 ✅
//!
//! 并查集单遍扫描 + 压缩重标号. 标号按各岛屿首个光栅扫描体素的顺序分配,
//! 同时给出每个岛屿的体素个数.
//!
//! 实现位于 `angio-berry/src/label`.
//!
//! ### 岛屿筛选 (最大岛屿 / 种子点) ✅
//!
//! 物理坐标种子与体素坐标种子共用同一实现.
//!
//! 实现位于 `angio-berry/src/select.rs`.
//!
//! ### 闭合表面提取与平滑 ✅
//!
//! 实现位于 `angio-berry/src/surface`.
//!
//! ### 网格与标签导出 ✅
//!
//! STL (二进制 / ASCII), OBJ, PLY; 标签以 `.npy` 保存. 支持 RAS / LPS.
//!
//! 实现位于 `angio-berry/src/export`.
//!
//! ### 流水线编排 ✅
//!
//! `Loaded -> Thresholded -> Labeled -> Selected -> Meshed`.
//!
//! 实现位于 `angio-berry/src/pipeline`.

/// 三维索引, 按 `(z, y, x)` 即 `(k, j, i)` 顺序存储. 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 二维索引, 按 `(y, x)` 顺序存储.
pub type Idx2d = (usize, usize);

/// 岛屿标号. `0` 代表背景.
pub type Label = u32;

pub mod consts;

mod error;

pub use error::{AngioError, AngioResult};

/// 3D 体数据基础数据结构.
mod data;

pub use data::{
    segment, Affine, BinaryMask, Geometry, ImgWriteVis, IntensityRange, LabelSlice,
    LabeledVolume, MaskSlice, Volume, VoxelSpace,
};

pub mod label;

pub mod select;

pub mod surface;

pub mod export;

pub mod pipeline;

pub mod dataset;
pub mod prelude;
