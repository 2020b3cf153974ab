//! 网格与标签体的导出.
//!
//! 核心算法只产生抽象的 [`Mesh`] 与标签体; 本模块负责坐标系转换与具体编码.

mod labelmap;
mod mesh_io;

pub use labelmap::{save_labelmap, save_mask};
pub use mesh_io::MeshWrite;

use crate::consts::DEFAULT_SEGMENT_NAME;
use crate::surface::Mesh;
use crate::{AngioError, AngioResult};
use nalgebra::Point3;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// 导出网格所使用的物理坐标系.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum CoordinateSystem {
    /// Right-Anterior-Superior. nifti 仿射变换给出的坐标即为 RAS.
    #[default]
    Ras,

    /// Left-Posterior-Superior. DICOM 与多数手术导航软件使用该坐标系.
    Lps,
}

impl CoordinateSystem {
    /// 将 RAS 坐标转换到当前坐标系.
    #[inline]
    pub fn convert(self, p: &Point3<f64>) -> Point3<f64> {
        match self {
            Self::Ras => *p,
            Self::Lps => Point3::new(-p.x, -p.y, p.z),
        }
    }

    /// 将 RAS 网格转换到当前坐标系.
    ///
    /// RAS -> LPS 是绕 z 轴旋转 180 度, 不是镜像, 所以三角形朝向不变.
    pub fn apply(self, mesh: Mesh) -> Mesh {
        match self {
            Self::Ras => mesh,
            Self::Lps => mesh.map_vertices(|p| self.convert(p), false),
        }
    }
}

/// 网格文件格式.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MeshFormat {
    /// 二进制 STL.
    #[default]
    Stl,

    /// ASCII STL.
    StlAscii,

    /// Wavefront OBJ.
    Obj,

    /// ASCII PLY.
    Ply,
}

impl MeshFormat {
    /// 文件扩展名 (不含点).
    #[inline]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Stl | Self::StlAscii => "stl",
            Self::Obj => "obj",
            Self::Ply => "ply",
        }
    }
}

impl FromStr for MeshFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stl" => Ok(Self::Stl),
            "stl_ascii" | "stl-ascii" => Ok(Self::StlAscii),
            "obj" => Ok(Self::Obj),
            "ply" => Ok(Self::Ply),
            other => Err(format!("不支持的网格格式 `{other}`, 可选 stl, stl-ascii, obj, ply")),
        }
    }
}

impl FromStr for CoordinateSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RAS" => Ok(Self::Ras),
            "LPS" => Ok(Self::Lps),
            other => Err(format!("不支持的坐标系 `{other}`, 可选 RAS, LPS")),
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ras => "RAS",
            Self::Lps => "LPS",
        })
    }
}

/// 导出设置.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExportConfig {
    /// 输出文件夹. 不存在时会被创建.
    pub folder: PathBuf,

    /// 分段名称, 同时也是输出文件的主文件名.
    pub segment_name: String,

    /// 网格格式.
    pub format: MeshFormat,

    /// 坐标系.
    pub coordinate_system: CoordinateSystem,

    /// 是否同时保存筛选后的掩码 (`<segment_name>.npy`).
    pub save_mask: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            segment_name: DEFAULT_SEGMENT_NAME.to_string(),
            format: MeshFormat::default(),
            coordinate_system: CoordinateSystem::default(),
            save_mask: false,
        }
    }
}

impl ExportConfig {
    /// `<folder>/<segment_name>.<ext>`. 分段名称中的 `.` 原样保留.
    fn file_path(&self, ext: &str) -> PathBuf {
        self.folder.join(format!("{}.{ext}", self.segment_name))
    }

    /// 网格文件的完整路径.
    pub fn mesh_path(&self) -> PathBuf {
        self.file_path(self.format.extension())
    }

    /// 掩码文件的完整路径.
    pub fn mask_path(&self) -> PathBuf {
        self.file_path("npy")
    }

    /// 确保输出文件夹存在.
    pub(crate) fn ensure_folder(&self) -> AngioResult<&Path> {
        std::fs::create_dir_all(&self.folder).map_err(|e| AngioError::io(&self.folder, e))?;
        Ok(&self.folder)
    }
}

/// 按 `config` 转换坐标系并保存网格, 返回写入的文件路径.
pub fn export_mesh(mesh: Mesh, config: &ExportConfig) -> AngioResult<PathBuf> {
    config.ensure_folder()?;
    let path = config.mesh_path();
    config
        .coordinate_system
        .apply(mesh)
        .save(&path, config.format)?;
    Ok(path)
}
