//! 流水线与导出设置.

use crate::export::ExportConfig;
use crate::select::Selection;
use crate::surface::SmoothingOptions;
use crate::IntensityRange;

/// 单个种子点越界时的处理策略. 只有编排器会使用它.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SeedPolicy {
    /// 跳过并记录警告. 只有全部种子点都失败时才终止.
    #[default]
    Skip,

    /// 任何一个种子点越界都立即终止.
    Strict,
}

/// 流水线设置.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// 阈值区间, 默认 `[0.8, 1.0]`.
    pub threshold: IntensityRange,

    /// 岛屿选择方式, 默认只保留最大岛屿.
    pub selection: Selection,

    /// 种子点越界策略.
    pub seed_policy: SeedPolicy,

    /// 表面平滑, 默认关闭.
    pub smoothing: SmoothingOptions,
}

/// 一次完整运行 (流水线 + 导出) 的设置.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunConfig {
    /// 流水线设置.
    pub pipeline: PipelineConfig,

    /// 导出设置.
    pub export: ExportConfig,
}

#[cfg(feature = "serde")]
impl RunConfig {
    /// 解析 JSON 字符串. 缺失的字段使用默认值.
    pub fn from_json_str(s: &str) -> crate::AngioResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// 读取并解析 JSON 配置文件.
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> crate::AngioResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| crate::AngioError::io(path, e))?;
        Self::from_json_str(&text)
    }

    /// 序列化为格式化的 JSON.
    pub fn to_json_string(&self) -> crate::AngioResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::{RunConfig, SeedPolicy};
    use crate::export::{CoordinateSystem, MeshFormat};
    use crate::select::{SeedPoint, Selection};
    use crate::{AngioError, IntensityRange};

    #[test]
    fn test_defaults_from_empty_json() {
        let c = RunConfig::from_json_str("{}").unwrap();
        assert_eq!(c, RunConfig::default());
        assert_eq!(c.pipeline.threshold, IntensityRange::from_vessel_defaults());
        assert_eq!(c.pipeline.selection, Selection::Largest);
        assert_eq!(c.export.segment_name, "VesselSegmentation");
    }

    #[test]
    fn test_full_json() {
        let text = r#"{
            "pipeline": {
                "threshold": [0.5, 0.9],
                "selection": { "seeds": [
                    { "space": "physical", "coord": [2.5, 30.0, 42.0] },
                    { "space": "voxel", "coord": [1, 2, 3] }
                ] },
                "seed_policy": "strict",
                "smoothing": { "iterations": 5 }
            },
            "export": {
                "folder": "/tmp/out",
                "format": "ply",
                "coordinate_system": "LPS"
            }
        }"#;
        let c = RunConfig::from_json_str(text).unwrap();
        assert_eq!(c.pipeline.threshold, IntensityRange::new(0.5, 0.9).unwrap());
        assert_eq!(
            c.pipeline.selection,
            Selection::Seeds(vec![
                SeedPoint::physical(2.5, 30.0, 42.0),
                SeedPoint::voxel(1.0, 2.0, 3.0)
            ])
        );
        assert_eq!(c.pipeline.seed_policy, SeedPolicy::Strict);
        assert_eq!(c.pipeline.smoothing.iterations, 5);
        assert_eq!(c.pipeline.smoothing.lambda, 0.5);
        assert_eq!(c.export.format, MeshFormat::Ply);
        assert_eq!(c.export.coordinate_system, CoordinateSystem::Lps);

        let again = RunConfig::from_json_str(&c.to_json_string().unwrap()).unwrap();
        assert_eq!(again, c);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let err = RunConfig::from_json_str(r#"{ "pipeline": { "threshold": [1.0, 0.0] } }"#)
            .unwrap_err();
        assert!(matches!(err, AngioError::Config(_)));
    }
}
