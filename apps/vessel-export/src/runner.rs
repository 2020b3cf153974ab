//! 程序运行函数.

use crate::profile::{Profile, Step};
use crate::result::BatchResult;
use angio_berry::dataset::generic::{list_volumes, nifti_stem};
use angio_berry::export::{export_mesh, save_labelmap, save_mask};
use angio_berry::pipeline::{Pipeline, RunConfig, RunOutput};
use angio_berry::{ImgWriteVis, Volume, VoxelSpace};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::thread;

/// 处理单个体数据: 读取, 运行流水线, 导出.
///
/// `debug_dir` 非空时额外保存标签体 (`.npy`) 与含前景的掩码切片 (`.png`).
pub fn run_one(input: &Path, config: &RunConfig, debug_dir: Option<&Path>) -> Result<Profile> {
    let mut profile = Profile::default();

    let volume = profile
        .time(Step::Load, || Volume::open(input))
        .with_context(|| format!("无法读取体数据 {}", input.display()))?;
    profile.dims = volume.dims();
    if let Some((lo, hi)) = volume.min_max() {
        debug!("{}: 强度范围 [{lo}, {hi}]", input.display());
    }

    let p = Pipeline::new(volume, config.pipeline.clone());
    let p = profile.time(Step::Threshold, || p.threshold())?;
    let p = profile.time(Step::Label, || p.label())?;
    let p = profile.time(Step::Select, || p.select())?;
    let out = profile.time(Step::Mesh, || p.mesh())?.finish()?;
    profile.record(&out);

    let path = profile.time(Step::Export, || export(&out, config))?;
    info!("{} -> {}", input.display(), path.display());

    if let Some(dir) = debug_dir {
        dump_debug(&out, dir, &config.export.segment_name)?;
    }
    Ok(profile)
}

/// 保存网格, 以及按需保存掩码.
fn export(out: &RunOutput, config: &RunConfig) -> Result<PathBuf> {
    let path = export_mesh(out.mesh.clone(), &config.export)?;
    if config.export.save_mask {
        save_mask(&out.mask, config.export.mask_path())?;
    }
    Ok(path)
}

/// 保存排查问题用的中间结果.
fn dump_debug(out: &RunOutput, dir: &Path, name: &str) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("无法创建目录 {}", dir.display()))?;
    save_labelmap(&out.labeled, dir.join(format!("{name}_labels.npy")))?;
    for (z, slice) in out.mask.slice_iter().enumerate() {
        if slice.count_foreground() == 0 {
            continue;
        }
        slice.save(dir.join(format!("{name}_mask_z{z:04}.png")))?;
        out.labeled
            .slice_at(z)
            .save(dir.join(format!("{name}_labels_z{z:04}.png")))?;
    }
    debug!("中间结果已保存到 {}", dir.display());
    Ok(())
}

/// 批量处理 `input_dir` 下的所有 nifti 体数据.
///
/// 每个体数据的结果保存在 `{export.folder}/{文件名}/` 下. 使用 `threads` 个工作线程,
/// 每个线程独占自己的体数据与中间结果.
pub fn run_batch(input_dir: &Path, config: &RunConfig, threads: usize) -> Result<BatchResult> {
    let paths = list_volumes(input_dir)?;
    if paths.is_empty() {
        return Err(anyhow!("{} 下没有 nifti 文件", input_dir.display()));
    }
    let threads = threads.clamp(1, paths.len());
    info!("批量处理 {} 个体数据, {threads} 个线程", paths.len());

    let jobs: Vec<(String, PathBuf, RunConfig)> = paths
        .into_iter()
        .map(|path| {
            let stem = nifti_stem(&path).unwrap_or_else(|| "volume".to_string());
            let mut c = config.clone();
            c.export.folder = config.export.folder.join(&stem);
            (stem, path, c)
        })
        .collect();

    let mut done = thread::scope(|s| {
        let jobs = &jobs;
        let handles: Vec<_> = (0..threads)
            .map(|w| {
                s.spawn(move || {
                    jobs.iter()
                        .enumerate()
                        .skip(w)
                        .step_by(threads)
                        .map(|(i, (stem, path, c))| (i, stem.clone(), run_one(path, c, None)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().map_err(|_| anyhow!("工作线程异常退出")))
            .collect::<Result<Vec<_>>>()
    })?
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    done.sort_by_key(|(i, ..)| *i);
    Ok(BatchResult::from_iter(
        done.into_iter().map(|(_, stem, r)| (stem, r)),
    ))
}
