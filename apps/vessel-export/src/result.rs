//! 运行结果汇总.

use crate::profile::{Profile, Step};
use std::io::{self, Write};

/// 将 `profile` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let [nx, ny, nz] = p.dims;
    writeln!(w, "Volume `{name}` ({nx} x {ny} x {nz}):")?;
    writeln!(w, "{S4}Islands: {}", p.islands)?;
    writeln!(w, "{S4}Kept islands: {} ({} voxels)", p.kept, p.kept_voxels)?;
    writeln!(w, "{S4}Seed warnings: {}", p.warnings)?;
    writeln!(w, "{S4}Triangles: {}", p.triangles)?;
    writeln!(w, "{S4}Enclosed volume: {:.3} mm^3", p.volume_mm3)?;
    for step in Step::ALL {
        writeln!(w, "{S4}{:<10} {} us", step.name(), p.get_us(step))?;
    }
    write!(w, "{S4}Total machine time: {} us", p.get_total_us())?;
    Ok(())
}

/// 批量运行的最终结果.
pub struct BatchResult {
    data: Vec<(String, anyhow::Result<Profile>)>,
}

impl BatchResult {
    pub fn from_iter<I: IntoIterator<Item = (String, anyhow::Result<Profile>)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 失败的体数据个数.
    pub fn failures(&self) -> usize {
        self.data.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// 将运行结果写进 `w` 中.
    pub fn analyze_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        utils::sep_to(&mut *w)?;
        for (key, result) in self.data.iter() {
            match result {
                Ok(profile) => describe_into(key, profile, w)?,
                Err(e) => write!(w, "Volume `{key}` failed: {e:#}")?,
            }
            writeln!(w)?;
            utils::sep_to(&mut *w)?;
        }
        write!(
            w,
            "{} succeeded, {} failed",
            self.data.len() - self.failures(),
            self.failures()
        )?;
        Ok(())
    }

    /// 分析运行结果, 输出到标准输出.
    pub fn analyze(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.analyze_into(&mut lock)?;
        writeln!(lock)
    }
}

/// 单次运行的结果, 输出到标准输出.
pub fn describe(name: &str, p: &Profile) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    utils::sep_to(&mut lock)?;
    describe_into(name, p, &mut lock)?;
    writeln!(lock)?;
    utils::sep_to(&mut lock)
}
