//! Taubin (λ/μ) 网格平滑.
//!
//! 体素边界面提取得到的表面呈阶梯状. 单纯的拉普拉斯平滑会使封闭表面收缩,
//! Taubin 平滑交替使用正的 `λ` 与负的 `μ`, 以抑制收缩. 但在体素阶梯这类高频表面上,
//! `|μ| > λ` 的膨胀步仍会让体积缓慢漂移, 因此平滑结束后把每个连通分量
//! 绕其顶点重心等比缩放, 恢复平滑前的体积.
//! 平滑只移动顶点, 不改变拓扑, 因此封闭性与朝向保持不变.

use super::Mesh;
use crate::label::DisjointSet;
use nalgebra::{Point3, Vector3};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
    }
}

/// 平滑参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmoothingOptions {
    /// 迭代次数. 每次迭代包含一次 `λ` 步与一次 `μ` 步. 为 0 时不做平滑.
    pub iterations: usize,

    /// 收缩步长, 通常位于 `(0, 1)`.
    pub lambda: f64,

    /// 膨胀步长, 为负数且 `|μ| > λ`.
    pub mu: f64,

    /// 平滑后按连通分量缩放, 使每个分量的体积与平滑前一致.
    pub preserve_volume: bool,
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self {
            iterations: 0,
            lambda: 0.5,
            mu: -0.53,
            preserve_volume: true,
        }
    }
}

impl SmoothingOptions {
    /// 使用默认步长, 迭代 `iterations` 次.
    #[inline]
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            iterations,
            ..Default::default()
        }
    }

    /// 是否实际需要平滑.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.iterations > 0
    }
}

/// 顶点的一环邻居 (去重, 升序).
fn one_ring(vertex_count: usize, faces: &[[u32; 3]]) -> Vec<Vec<u32>> {
    let mut ring: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];
    for &[a, b, c] in faces {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            ring[u as usize].push(v);
            ring[v as usize].push(u);
        }
    }
    for r in ring.iter_mut() {
        r.sort_unstable();
        r.dedup();
    }
    ring
}

/// 单个顶点的拉普拉斯步: `p += factor * (邻居均值 - p)`.
#[inline]
fn relax_one(points: &[Point3<f64>], p: &Point3<f64>, r: &[u32], factor: f64) -> Point3<f64> {
    if r.is_empty() {
        return *p;
    }
    let sum: Vector3<f64> = r.iter().map(|&n| points[n as usize].coords).sum();
    let mean = sum / r.len() as f64;
    p + (mean - p.coords) * factor
}

/// 对所有顶点做一次拉普拉斯步. 启用 `rayon` feature 时并行计算.
fn relax(points: &[Point3<f64>], ring: &[Vec<u32>], factor: f64) -> Vec<Point3<f64>> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            points
                .par_iter()
                .zip(ring.par_iter())
                .map(|(p, r)| relax_one(points, p, r, factor))
                .collect()
        } else {
            points
                .iter()
                .zip(ring)
                .map(|(p, r)| relax_one(points, p, r, factor))
                .collect()
        }
    }
}

/// 三角形连通分量: 返回每个顶点所属分量的编号 (孤立顶点为 `None`) 与分量个数.
fn components(vertex_count: usize, faces: &[[u32; 3]]) -> (Vec<Option<usize>>, usize) {
    let mut ds = DisjointSet::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        ds.make_set();
    }
    let mut used = vec![false; vertex_count];
    for &[a, b, c] in faces {
        ds.union(a as usize, b as usize);
        ds.union(a as usize, c as usize);
        for v in [a, b, c] {
            used[v as usize] = true;
        }
    }

    let mut ids = vec![None; vertex_count];
    let mut by_root = std::collections::HashMap::new();
    for v in 0..vertex_count {
        if used[v] {
            let next = by_root.len();
            ids[v] = Some(*by_root.entry(ds.find(v)).or_insert(next));
        }
    }
    (ids, by_root.len())
}

/// 每个分量的有向体积.
fn component_volumes(
    points: &[Point3<f64>],
    faces: &[[u32; 3]],
    ids: &[Option<usize>],
    n: usize,
) -> Vec<f64> {
    let mut volumes = vec![0.0; n];
    for &[a, b, c] in faces {
        let (p, q, r) = (points[a as usize], points[b as usize], points[c as usize]);
        if let Some(id) = ids[a as usize] {
            volumes[id] += p.coords.dot(&q.coords.cross(&r.coords)) / 6.0;
        }
    }
    volumes
}

/// 把每个分量绕其顶点重心缩放, 使其有向体积恢复为 `target`.
/// 体积变号或退化的分量保持不动.
fn restore_volumes(
    points: &mut [Point3<f64>],
    faces: &[[u32; 3]],
    ids: &[Option<usize>],
    target: &[f64],
) {
    let n = target.len();
    let current = component_volumes(points, faces, ids, n);

    let mut centroid = vec![Vector3::zeros(); n];
    let mut count = vec![0usize; n];
    for (p, id) in points.iter().zip(ids) {
        if let Some(id) = *id {
            centroid[id] += p.coords;
            count[id] += 1;
        }
    }

    let scale: Vec<f64> = target
        .iter()
        .zip(&current)
        .map(|(&t, &c)| {
            let ratio = t / c;
            if ratio.is_finite() && ratio > 0.0 {
                ratio.cbrt()
            } else {
                1.0
            }
        })
        .collect();

    for (p, id) in points.iter_mut().zip(ids) {
        if let Some(id) = *id {
            let center = centroid[id] / count[id] as f64;
            p.coords = center + (p.coords - center) * scale[id];
        }
    }
}

impl Mesh {
    /// 按 `options` 平滑, 返回新网格. 迭代次数为 0 时原样返回.
    pub fn smoothed(self, options: &SmoothingOptions) -> Mesh {
        if !options.is_enabled() {
            return self;
        }
        let (mut points, faces) = self.into_raw();
        let ring = one_ring(points.len(), &faces);
        let (ids, n) = components(points.len(), &faces);
        let target = component_volumes(&points, &faces, &ids, n);
        for _ in 0..options.iterations {
            points = relax(&points, &ring, options.lambda);
            points = relax(&points, &ring, options.mu);
        }
        if options.preserve_volume {
            restore_volumes(&mut points, &faces, &ids, &target);
        }
        Mesh::new(points, faces)
    }
}
