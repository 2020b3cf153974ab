//! 闭合表面提取, 网格诊断与平滑.

mod extract;
mod mesh;
mod smooth;

pub use extract::extract;
pub use mesh::{triangle_normal, Mesh};
pub use smooth::SmoothingOptions;
