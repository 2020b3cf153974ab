//! 单次运行统计.

use angio_berry::pipeline::RunOutput;
use std::time::{Duration, Instant};

/// 分阶段计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
pub struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时 (`self.start()`).
    /// 如果用户不希望这种行为, 可以在真正需要时重新调用 `self.start()` 覆盖之.
    #[inline]
    pub fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    pub fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// # 注意
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    pub fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 获得总共累计下来的时间 (以微秒为单位).
    #[inline]
    pub fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// 流水线阶段.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    /// 读取 nifti.
    Load,
    /// 阈值分割.
    Threshold,
    /// 岛屿标记.
    Label,
    /// 岛屿筛选.
    Select,
    /// 表面提取 (含平滑).
    Mesh,
    /// 写文件.
    Export,
}

impl Step {
    /// 所有阶段, 按执行顺序排列.
    pub const ALL: [Step; 6] = [
        Self::Load,
        Self::Threshold,
        Self::Label,
        Self::Select,
        Self::Mesh,
        Self::Export,
    ];

    /// 阶段名称.
    pub fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Threshold => "threshold",
            Self::Label => "label",
            Self::Select => "select",
            Self::Mesh => "mesh",
            Self::Export => "export",
        }
    }
}

/// 单个体数据的运行统计.
#[derive(Clone, Debug, Default)]
pub struct Profile {
    /// 各阶段耗时, 与 [`Step::ALL`] 一一对应.
    timers: [AccTimer; 6],

    /// 体数据形状 `(nx, ny, nz)`.
    pub dims: [usize; 3],

    /// 岛屿个数.
    pub islands: usize,

    /// 被保留的岛屿个数.
    pub kept: usize,

    /// 被保留的体素个数.
    pub kept_voxels: usize,

    /// 三角形个数.
    pub triangles: usize,

    /// 表面包围的体积, 立方毫米.
    pub volume_mm3: f64,

    /// 种子点警告个数.
    pub warnings: usize,
}

impl Profile {
    /// 对 `step` 阶段计时, 运行 `f`.
    pub fn time<T, F: FnOnce() -> T>(&mut self, step: Step, f: F) -> T {
        let timer = &mut self.timers[step as usize];
        timer.start();
        let ans = f();
        timer.elapsed();
        ans
    }

    /// 以微秒为单位获得 `step` 阶段耗时.
    #[inline]
    pub fn get_us(&self, step: Step) -> u64 {
        self.timers[step as usize].get_total_us()
    }

    /// 以微秒为单位获得总耗时.
    pub fn get_total_us(&self) -> u64 {
        Step::ALL.iter().map(|s| self.get_us(*s)).sum()
    }

    /// 记录流水线产物的统计量.
    pub fn record(&mut self, out: &RunOutput) {
        self.islands = out.labeled.label_count();
        self.kept = out.keep.len();
        self.kept_voxels = out.kept_voxels();
        self.triangles = out.mesh.triangle_count();
        self.volume_mm3 = out.mesh.volume();
        self.warnings = out.warnings.len();
    }
}
