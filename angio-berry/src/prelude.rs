//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Label};

pub use crate::{AngioError, AngioResult};

pub use crate::data::{
    segment, Affine, BinaryMask, Geometry, ImgWriteVis, IntensityRange, LabelSlice,
    LabeledVolume, MaskSlice, Volume, VoxelSpace,
};

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::{ElemType, BACKGROUND_LABEL};

pub use crate::label::label;
pub use crate::select::{filter, CoordSpace, SeedPoint, SeedWarning, Selection};
pub use crate::surface::{extract, Mesh, SmoothingOptions};

pub use crate::export::{CoordinateSystem, ExportConfig, MeshFormat, MeshWrite};
pub use crate::pipeline::{Pipeline, PipelineConfig, RunConfig, RunOutput, SeedPolicy};

pub use crate::dataset::home_dataset_dir_with;
pub use crate::dataset::{self, generic::volume_loader};
