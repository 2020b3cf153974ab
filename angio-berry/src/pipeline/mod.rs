//! 流水线编排器.
//!
//! 状态只能向前推进: `Loaded -> Thresholded -> Labeled -> Selected -> Meshed`.
//! 每次转换都消费旧的 [`Pipeline`] 并返回新的实例; 转换失败时整条流水线连同
//! 中间结果一起被丢弃, 调用者得到原始错误, 不存在 "部分完成" 的状态.
//!
//! 编排器是唯一决定种子点越界策略 ([`SeedPolicy`]) 的组件, 也是核心库中
//! 唯一输出日志的组件.

mod config;

pub use config::{PipelineConfig, RunConfig, SeedPolicy};

use crate::label::label;
use crate::select::{self, IslandSelection, SeedWarning, Selection};
use crate::surface::{extract, Mesh};
use crate::{AngioError, AngioResult, BinaryMask, Label, LabeledVolume, Volume, VoxelSpace};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// 流水线当前持有的产物.
#[derive(Debug, Clone)]
pub enum Stage {
    /// 已载入标量体数据.
    Loaded(Volume),

    /// 已完成阈值分割.
    Thresholded(BinaryMask),

    /// 已完成岛屿标记.
    Labeled(LabeledVolume),

    /// 已完成岛屿筛选.
    Selected {
        /// 标签体.
        labeled: LabeledVolume,
        /// 被保留的标号.
        keep: BTreeSet<Label>,
        /// 筛选后的掩码.
        mask: BinaryMask,
    },

    /// 已提取表面.
    Meshed(RunOutput),
}

impl Stage {
    /// 状态名称.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loaded(_) => "loaded",
            Self::Thresholded(_) => "thresholded",
            Self::Labeled(_) => "labeled",
            Self::Selected { .. } => "selected",
            Self::Meshed(_) => "meshed",
        }
    }
}

/// 一次运行的最终产物.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// 标签体.
    pub labeled: LabeledVolume,

    /// 被保留的标号.
    pub keep: BTreeSet<Label>,

    /// 筛选后的掩码.
    pub mask: BinaryMask,

    /// 物理坐标 (RAS) 下的封闭表面.
    pub mesh: Mesh,

    /// 运行过程中累积的警告.
    pub warnings: Vec<SeedWarning>,
}

impl RunOutput {
    /// 被保留岛屿的体素总数.
    pub fn kept_voxels(&self) -> usize {
        self.keep
            .iter()
            .filter_map(|&l| self.labeled.voxel_count(l))
            .sum()
    }
}

/// 流水线.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    stage: Stage,
    warnings: Vec<SeedWarning>,
}

impl Pipeline {
    /// 以已载入的标量体数据开始.
    pub fn new(volume: Volume, config: PipelineConfig) -> Self {
        debug!("流水线载入体数据, 形状 {:?}", volume.shape());
        Self {
            config,
            stage: Stage::Loaded(volume),
            warnings: Vec::new(),
        }
    }

    /// 以外部给出的二值掩码开始, 跳过阈值分割.
    pub fn from_mask(mask: BinaryMask, config: PipelineConfig) -> Self {
        debug!("流水线载入掩码, 形状 {:?}", mask.shape());
        Self {
            config,
            stage: Stage::Thresholded(mask),
            warnings: Vec::new(),
        }
    }

    /// 当前状态.
    #[inline]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// 设置.
    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 至今累积的警告.
    #[inline]
    pub fn warnings(&self) -> &[SeedWarning] {
        &self.warnings
    }

    /// `Loaded -> Thresholded`.
    pub fn threshold(self) -> AngioResult<Self> {
        let Self {
            config,
            stage,
            warnings,
        } = self;
        let volume = match stage {
            Stage::Loaded(volume) => volume,
            other => return Err(invalid(&other, "thresholded")),
        };
        let range = config.threshold;
        let mask = crate::segment(&volume, range.lo(), range.hi())?;
        info!(
            "阈值 [{}, {}]: {} 个前景体素",
            range.lo(),
            range.hi(),
            mask.count_foreground()
        );
        Ok(Self::advanced(config, Stage::Thresholded(mask), warnings))
    }

    /// `Thresholded -> Labeled`.
    pub fn label(self) -> AngioResult<Self> {
        let Self {
            config,
            stage,
            warnings,
        } = self;
        let mask = match stage {
            Stage::Thresholded(mask) => mask,
            other => return Err(invalid(&other, "labeled")),
        };
        let labeled = label(&mask);
        info!("共 {} 个 26-连通岛屿", labeled.label_count());
        Ok(Self::advanced(config, Stage::Labeled(labeled), warnings))
    }

    /// `Labeled -> Selected`.
    ///
    /// 种子点模式下, [`SeedPolicy::Skip`] 会跳过越界的种子点并记录警告;
    /// [`SeedPolicy::Strict`] 则在第一个越界的种子点处终止.
    pub fn select(self) -> AngioResult<Self> {
        let Self {
            config,
            stage,
            mut warnings,
        } = self;
        let labeled = match stage {
            Stage::Labeled(labeled) => labeled,
            other => return Err(invalid(&other, "selected")),
        };

        if let (Selection::Seeds(seeds), SeedPolicy::Strict) =
            (&config.selection, config.seed_policy)
        {
            for seed in seeds.iter() {
                select::locate(labeled.geometry(), seed)?;
            }
        }

        let IslandSelection {
            keep,
            warnings: found,
        } = select::select(&labeled, &config.selection)?;
        for w in found.iter() {
            warn!("{w}");
        }
        warnings.extend(found);

        let mask = select::filter(&labeled, &keep);
        info!(
            "保留 {} 个岛屿 {:?}, 共 {} 个体素",
            keep.len(),
            keep,
            mask.count_foreground()
        );
        let stage = Stage::Selected {
            labeled,
            keep,
            mask,
        };
        Ok(Self::advanced(config, stage, warnings))
    }

    /// `Selected -> Meshed`.
    pub fn mesh(self) -> AngioResult<Self> {
        let Self {
            config,
            stage,
            warnings,
        } = self;
        let (labeled, keep, mask) = match stage {
            Stage::Selected {
                labeled,
                keep,
                mask,
            } => (labeled, keep, mask),
            other => return Err(invalid(&other, "meshed")),
        };

        let mesh = extract(&mask)?.smoothed(&config.smoothing);
        info!(
            "表面: {} 个顶点, {} 个三角形, 体积 {:.3} mm^3",
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.volume()
        );
        let output = RunOutput {
            labeled,
            keep,
            mask,
            mesh,
            warnings: warnings.clone(),
        };
        Ok(Self::advanced(config, Stage::Meshed(output), warnings))
    }

    #[inline]
    fn advanced(config: PipelineConfig, stage: Stage, warnings: Vec<SeedWarning>) -> Self {
        debug!("流水线进入 `{}` 状态", stage.name());
        Self {
            config,
            stage,
            warnings,
        }
    }

    /// 从当前状态一直推进到 `Meshed`, 返回最终产物.
    pub fn run(self) -> AngioResult<RunOutput> {
        let mut p = self;
        loop {
            p = match p.stage {
                Stage::Loaded(_) => p.threshold()?,
                Stage::Thresholded(_) => p.label()?,
                Stage::Labeled(_) => p.select()?,
                Stage::Selected { .. } => p.mesh()?,
                Stage::Meshed(_) => return p.finish(),
            };
        }
    }

    /// 消费自我, 获得最终产物. 只能在 `Meshed` 状态调用.
    pub fn finish(self) -> AngioResult<RunOutput> {
        match self.stage {
            Stage::Meshed(output) => Ok(output),
            other => Err(invalid(&other, "finished")),
        }
    }
}

#[inline]
fn invalid(stage: &Stage, to: &'static str) -> AngioError {
    AngioError::InvalidTransition {
        from: stage.name(),
        to,
    }
}

/// 以 `config` 运行完整流水线.
pub fn run(volume: Volume, config: PipelineConfig) -> AngioResult<RunOutput> {
    Pipeline::new(volume, config).run()
}
