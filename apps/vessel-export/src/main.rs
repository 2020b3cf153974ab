//! vessel-export: 将血管增强后的 3D 体数据转换为血管表面网格.
//!
//! # 日志
//!
//! 使用 `-v` (info), `-vv` (debug), `-vvv` (trace) 提高日志详细程度.
//! 默认只输出警告, 例如被跳过的种子点.
//!
//! # 示例
//!
//! ```bash
//! # 只保留包含种子点的血管, 导出 LPS 坐标的 STL
//! vessel-export run filtered.nii.gz --seed 2.5,30,42 --coords lps -o out/
//!
//! # 使用配置文件批量处理 $ANGIO_INPUT_DIR 下的所有体数据
//! vessel-export batch -c angio.json
//! ```

mod profile;
mod result;
mod runner;

use angio_berry::export::{CoordinateSystem, MeshFormat};
use angio_berry::pipeline::{RunConfig, SeedPolicy};
use angio_berry::select::{SeedPoint, Selection};
use angio_berry::surface::SmoothingOptions;
use angio_berry::IntensityRange;
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// vessel-export - 阈值分割, 连通岛屿筛选与血管表面导出.
#[derive(Parser)]
#[command(name = "vessel-export")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 提高日志详细程度 (-v info, -vv debug, -vvv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// 处理单个 nifti 体数据
    Run {
        /// 输入 nifti 文件 (.nii / .nii.gz)
        input: PathBuf,

        #[command(flatten)]
        overrides: Overrides,

        /// 额外保存标签体与掩码切片到该目录
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },

    /// 批量处理目录下的所有 nifti 体数据
    Batch {
        /// 输入目录, 默认 $ANGIO_INPUT_DIR 或 $HOME/dataset/angio
        input: Option<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,

        /// 工作线程数, 默认为可用核心数
        #[arg(short, long)]
        threads: Option<usize>,
    },
}

/// 覆盖配置文件的命令行参数.
#[derive(Args)]
struct Overrides {
    /// JSON 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 阈值下限
    #[arg(long)]
    lo: Option<f32>,

    /// 阈值上限
    #[arg(long)]
    hi: Option<f32>,

    /// 物理坐标种子点 `x,y,z`, 可重复
    #[arg(long = "seed", value_parser = parse_triple)]
    seeds: Vec<[f64; 3]>,

    /// 体素坐标种子点 `i,j,k`, 可重复
    #[arg(long = "voxel-seed", value_parser = parse_triple)]
    voxel_seeds: Vec<[f64; 3]>,

    /// 保留所有岛屿 (与种子点互斥)
    #[arg(long, conflicts_with_all = ["seeds", "voxel_seeds"])]
    all: bool,

    /// 任何种子点越界即终止
    #[arg(long)]
    strict: bool,

    /// Taubin 平滑迭代次数
    #[arg(long)]
    smooth: Option<usize>,

    /// 网格格式: stl, stl-ascii, obj, ply
    #[arg(long)]
    format: Option<MeshFormat>,

    /// 导出坐标系: RAS, LPS
    #[arg(long)]
    coords: Option<CoordinateSystem>,

    /// 输出目录, 默认 $ANGIO_OUTPUT_DIR 或 $HOME/dataset/angio/out
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 分段名称, 也是输出文件的主文件名
    #[arg(long)]
    name: Option<String>,

    /// 同时保存筛选后的掩码 (.npy)
    #[arg(long)]
    save_mask: bool,
}

/// 解析 `a,b,c`.
fn parse_triple(s: &str) -> std::result::Result<[f64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [a, b, c] = parts.as_slice() else {
        return Err(format!("需要 3 个以逗号分隔的数, 实际为 `{s}`"));
    };
    let num = |v: &str| v.parse::<f64>().map_err(|e| format!("`{v}`: {e}"));
    Ok([num(a)?, num(b)?, num(c)?])
}

impl Overrides {
    /// 读取配置文件 (若有), 再用命令行参数覆盖.
    fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)
                .with_context(|| format!("无法读取配置文件 {}", path.display()))?,
            None => RunConfig::default(),
        };
        let p = &mut config.pipeline;

        if self.lo.is_some() || self.hi.is_some() {
            let lo = self.lo.unwrap_or(p.threshold.lo());
            let hi = self.hi.unwrap_or(p.threshold.hi());
            p.threshold = IntensityRange::new(lo, hi)?;
        }

        let seeds: Vec<SeedPoint> = self
            .seeds
            .iter()
            .map(|&[x, y, z]| SeedPoint::physical(x, y, z))
            .chain(
                self.voxel_seeds
                    .iter()
                    .map(|&[i, j, k]| SeedPoint::voxel(i, j, k)),
            )
            .collect();
        if !seeds.is_empty() {
            p.selection = Selection::Seeds(seeds);
        } else if self.all {
            p.selection = Selection::All;
        }

        if self.strict {
            p.seed_policy = SeedPolicy::Strict;
        }
        if let Some(n) = self.smooth {
            p.smoothing = SmoothingOptions {
                iterations: n,
                ..p.smoothing
            };
        }

        let e = &mut config.export;
        if let Some(format) = self.format {
            e.format = format;
        }
        if let Some(coords) = self.coords {
            e.coordinate_system = coords;
        }
        if let Some(name) = &self.name {
            e.segment_name = name.clone();
        }
        if self.save_mask {
            e.save_mask = true;
        }
        match &self.output {
            Some(dir) => e.folder = dir.clone(),
            // 配置文件中没有指定输出目录时才使用环境变量.
            None if self.config.is_none() => {
                e.folder = utils::loader::output_dir_from_env_or_home()
                    .ok_or_else(|| anyhow!("无法确定输出目录, 请使用 --output"))?;
            }
            None => {}
        }
        Ok(config)
    }
}

fn init_logger(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .context("无法初始化日志")
}

fn run(cli: Cli) -> Result<()> {
    init_logger(cli.verbose)?;
    match cli.command {
        Commands::Run {
            input,
            overrides,
            debug_dir,
        } => {
            let config = overrides.resolve()?;
            let profile = runner::run_one(&input, &config, debug_dir.as_deref())?;
            let name = angio_berry::dataset::generic::nifti_stem(&input)
                .unwrap_or_else(|| input.display().to_string());
            result::describe(&name, &profile)?;
        }
        Commands::Batch {
            input,
            overrides,
            threads,
        } => {
            let config = overrides.resolve()?;
            let input = match input {
                Some(dir) => dir,
                None => utils::loader::input_dir_from_env_or_home()
                    .ok_or_else(|| anyhow!("无法确定输入目录"))?,
            };
            ensure_dir(&input)?;
            let threads = threads.unwrap_or_else(utils::cpus);
            let result = runner::run_batch(&input, &config, threads)?;
            result.analyze()?;
            if result.failures() > 0 {
                return Err(anyhow!("{} 个体数据处理失败", result.failures()));
            }
        }
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(anyhow!("{} 不是目录", path.display()))
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_triple, Cli, Commands};
    use angio_berry::export::{CoordinateSystem, MeshFormat};
    use angio_berry::pipeline::SeedPolicy;
    use angio_berry::select::{SeedPoint, Selection};
    use clap::Parser;

    #[test]
    fn test_parse_triple() {
        assert_eq!(parse_triple("2.5, 30,42"), Ok([2.5, 30.0, 42.0]));
        assert!(parse_triple("1,2").is_err());
        assert!(parse_triple("1,2,x").is_err());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "vessel-export",
            "run",
            "in.nii.gz",
            "--seed",
            "1,2,3",
            "--voxel-seed",
            "4,5,6",
            "--lo",
            "0.5",
            "--strict",
            "--format",
            "ply",
            "--coords",
            "lps",
            "-o",
            "/tmp/out",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Run { overrides, .. } = cli.command else {
            panic!("expected `run`");
        };
        let c = overrides.resolve().unwrap();
        assert_eq!(
            c.pipeline.selection,
            Selection::Seeds(vec![
                SeedPoint::physical(1.0, 2.0, 3.0),
                SeedPoint::voxel(4.0, 5.0, 6.0)
            ])
        );
        assert_eq!(c.pipeline.threshold.lo(), 0.5);
        assert_eq!(c.pipeline.threshold.hi(), 1.0);
        assert_eq!(c.pipeline.seed_policy, SeedPolicy::Strict);
        assert_eq!(c.export.format, MeshFormat::Ply);
        assert_eq!(c.export.coordinate_system, CoordinateSystem::Lps);
        assert_eq!(c.export.folder, std::path::PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_invalid_threshold_override() {
        let cli = Cli::parse_from(["vessel-export", "run", "in.nii", "--lo", "2", "-o", "."]);
        let Commands::Run { overrides, .. } = cli.command else {
            panic!("expected `run`");
        };
        assert!(overrides.resolve().is_err());
    }

    #[test]
    fn test_all_conflicts_with_seeds() {
        let r = Cli::try_parse_from(["vessel-export", "run", "in.nii", "--all", "--seed", "1,2,3"]);
        assert!(r.is_err());
    }
}
