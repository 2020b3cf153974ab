//! 体素边界面 (cuberille) 表面提取.
//!
//! 二值场在 0.5 等值面处的边界恰好由前景与背景之间的体素面组成.
//! 每个暴露的体素面产生两个三角形, 顶点位于体素格点 (体素中心 ± 0.5).
//!
//! 26-连通的岛屿中, 两个体素可能只共享一条棱或一个角. 直接按格点共享顶点会得到
//! 被 4 个三角形共用的棱, 或者两个表面片只在一点相接的 "夹点". 因此:
//!
//! 1. 每个格点按其周围暴露面组成的扇形分别建立顶点: 同一格点上互不相邻的表面片
//!    拥有各自的顶点;
//! 2. 被 4 个暴露面共用的棱, 为其两侧的前景体素各插入一个棱中点,
//!    相关的面以面中心为顶点扇形三角化.
//!
//! 于是任意一条棱恰好属于两个三角形, 每个顶点的一环邻域都是一个圆盘.

use crate::consts::gray::is_foreground;
use crate::label::{shift, DisjointSet};
use crate::surface::Mesh;
use crate::{AngioError, AngioResult, BinaryMask, Idx3d, VoxelSpace};
use nalgebra::Point3;
use std::collections::{HashMap, HashSet};

/// 格点坐标 `(x, y, z)`. 格点 `(x, y, z)` 位于体素 `(x, y, z)` 中心的 `(-0.5, -0.5, -0.5)` 处.
type Corner = (usize, usize, usize);

/// 格点间的一条单位棱, 两端按字典序排列.
type Edge = (Corner, Corner);

/// 体素的一个面: 法向对应的邻居偏移 `(dz, dy, dx)`, 以及从外部看逆时针排列的
/// 四个角 (相对体素最小角的 `(x, y, z)` 偏移).
struct Face {
    towards: (isize, isize, isize),
    corners: [Corner; 4],
}

#[rustfmt::skip]
const FACES: [Face; 6] = [
    // -x
    Face { towards: (0, 0, -1), corners: [(0, 0, 0), (0, 0, 1), (0, 1, 1), (0, 1, 0)] },
    // +x
    Face { towards: (0, 0, 1),  corners: [(1, 0, 0), (1, 1, 0), (1, 1, 1), (1, 0, 1)] },
    // -y
    Face { towards: (0, -1, 0), corners: [(0, 0, 0), (1, 0, 0), (1, 0, 1), (0, 0, 1)] },
    // +y
    Face { towards: (0, 1, 0),  corners: [(0, 1, 0), (0, 1, 1), (1, 1, 1), (1, 1, 0)] },
    // -z
    Face { towards: (-1, 0, 0), corners: [(0, 0, 0), (0, 1, 0), (1, 1, 0), (1, 0, 0)] },
    // +z
    Face { towards: (1, 0, 0),  corners: [(0, 0, 1), (1, 0, 1), (1, 1, 1), (0, 1, 1)] },
];

/// 一个暴露面: 所属体素与逆时针排列的四个格点.
struct Quad {
    cell: Idx3d,
    corners: [Corner; 4],
}

impl Quad {
    /// 第 `k` 条棱 (`corners[k] -> corners[k + 1]`).
    #[inline]
    fn edge(&self, k: usize) -> Edge {
        let (a, b) = (self.corners[k], self.corners[(k + 1) % 4]);
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// 格点 `c` 在该面中的位置.
    #[inline]
    fn slot_of(&self, c: Corner) -> Option<usize> {
        self.corners.iter().position(|&x| x == c)
    }
}

/// 收集 `mask` 中所有暴露面. 越界方向视为背景.
fn exposed_quads(mask: &BinaryMask) -> Vec<Quad> {
    let shape = mask.shape();
    let data = mask.data();
    let mut quads = Vec::new();
    for (pos, &p) in data.indexed_iter() {
        if !is_foreground(p) {
            continue;
        }
        let (z, y, x) = pos;
        for face in FACES.iter() {
            let exposed = match shift(pos, face.towards, shape) {
                Some(n) => !is_foreground(data[n]),
                None => true,
            };
            if exposed {
                quads.push(Quad {
                    cell: pos,
                    corners: face.corners.map(|(cx, cy, cz)| (x + cx, y + cy, z + cz)),
                });
            }
        }
    }
    quads
}

/// 按棱配对暴露面, 求每个 (面, 角) 所属的格点扇形, 并找出被 4 个面共用的棱.
///
/// 返回的并查集以 `面序号 * 4 + 角序号` 标识每个 (面, 角).
fn pair_quads(quads: &[Quad]) -> (DisjointSet, HashSet<Edge>) {
    let mut by_edge: HashMap<Edge, Vec<usize>> = HashMap::new();
    for (q, quad) in quads.iter().enumerate() {
        for k in 0..4 {
            by_edge.entry(quad.edge(k)).or_default().push(q);
        }
    }

    let mut ds = DisjointSet::with_capacity(quads.len() * 4);
    for _ in 0..quads.len() * 4 {
        ds.make_set();
    }
    let join = |ds: &mut DisjointSet, (a, b): Edge, f: usize, g: usize| {
        for c in [a, b] {
            if let (Some(i), Some(j)) = (quads[f].slot_of(c), quads[g].slot_of(c)) {
                ds.union(f * 4 + i, g * 4 + j);
            }
        }
    };

    let mut pinched = HashSet::new();
    for (&edge, faces) in by_edge.iter() {
        match faces.as_slice() {
            &[f, g] => join(&mut ds, edge, f, g),
            // 对角放置的两个前景体素: 同一体素上的两个面配对.
            &[f0, f1, f2, f3] => {
                let same = |a: usize, b: usize| quads[a].cell == quads[b].cell;
                let (a, b) = if same(f0, f1) {
                    ((f0, f1), (f2, f3))
                } else if same(f0, f2) {
                    ((f0, f2), (f1, f3))
                } else {
                    ((f0, f3), (f1, f2))
                };
                join(&mut ds, edge, a.0, a.1);
                join(&mut ds, edge, b.0, b.1);
                pinched.insert(edge);
            }
            _ => debug_assert!(false, "cuberille edge with {} faces", faces.len()),
        }
    }
    (ds, pinched)
}

/// 顶点表, 以体素格点坐标 (而非物理坐标) 保存.
#[derive(Default)]
struct VertexPool {
    index: HashMap<usize, u32>,
    midpoints: HashMap<(Edge, Idx3d), u32>,
    points: Vec<[f64; 3]>,
}

impl VertexPool {
    fn push(&mut self, p: [f64; 3]) -> u32 {
        self.points.push(p);
        self.points.len() as u32 - 1
    }

    /// (面, 角) 对应的顶点. 同一扇形中的 (面, 角) 共享顶点.
    fn corner(&mut self, root: usize, (x, y, z): Corner) -> u32 {
        if let Some(&v) = self.index.get(&root) {
            return v;
        }
        let v = self.push([x as f64, y as f64, z as f64]);
        self.index.insert(root, v);
        v
    }

    /// 棱 `edge` 靠近体素 `cell` 一侧的中点.
    fn midpoint(&mut self, edge: Edge, cell: Idx3d) -> u32 {
        if let Some(&v) = self.midpoints.get(&(edge, cell)) {
            return v;
        }
        let (a, b) = edge;
        let v = self.push([
            (a.0 + b.0) as f64 / 2.0,
            (a.1 + b.1) as f64 / 2.0,
            (a.2 + b.2) as f64 / 2.0,
        ]);
        self.midpoints.insert((edge, cell), v);
        v
    }
}

/// 提取 `mask` 前景的封闭边界表面, 顶点位于物理坐标.
///
/// 输出总是封闭的二维流形: 每条棱恰好属于两个三角形, 且朝向一致.
/// 单个孤立体素得到 12 个三角形, 8 个顶点的立方体. 若仿射变换包含镜像,
/// 三角形顺序会被翻转, 保证法向在物理空间中依然朝外.
///
/// 掩码为全背景时返回 [`AngioError::EmptyMask`].
pub fn extract(mask: &BinaryMask) -> AngioResult<Mesh> {
    let quads = exposed_quads(mask);
    if quads.is_empty() {
        return Err(AngioError::EmptyMask);
    }
    let (mut ds, pinched) = pair_quads(&quads);

    let mut pool = VertexPool::default();
    let mut faces: Vec<[u32; 3]> = Vec::with_capacity(quads.len() * 2);
    for (q, quad) in quads.iter().enumerate() {
        let mut ring: Vec<u32> = Vec::with_capacity(8);
        for (k, &c) in quad.corners.iter().enumerate() {
            ring.push(pool.corner(ds.find(q * 4 + k), c));
            let edge = quad.edge(k);
            if pinched.contains(&edge) {
                ring.push(pool.midpoint(edge, quad.cell));
            }
        }

        if let &[a, b, c, d] = ring.as_slice() {
            faces.push([a, b, c]);
            faces.push([a, c, d]);
        } else {
            let [p, _, r, _] = quad.corners;
            let center = pool.push([
                (p.0 + r.0) as f64 / 2.0,
                (p.1 + r.1) as f64 / 2.0,
                (p.2 + r.2) as f64 / 2.0,
            ]);
            for (i, &v) in ring.iter().enumerate() {
                faces.push([v, ring[(i + 1) % ring.len()], center]);
            }
        }
    }

    let affine = mask.geometry().affine();
    let vertices = pool
        .points
        .iter()
        .map(|&[x, y, z]| affine.ijk_to_physical(&Point3::new(x - 0.5, y - 0.5, z - 0.5)))
        .collect();
    if affine.is_mirrored() {
        for f in faces.iter_mut() {
            f.swap(1, 2);
        }
    }
    Ok(Mesh::new(vertices, faces))
}
