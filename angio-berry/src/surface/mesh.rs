use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

/// 物理空间中的索引三角网格.
///
/// 三角形按逆时针 (从外部看) 排列, 即法向朝外.
/// 网格由表面提取产生, 之后交给导出器, 不再被修改;
/// 平滑与坐标系转换都会消费旧网格并返回新网格.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Point3<f64>>,
    faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// 由顶点与三角形索引创建.
    ///
    /// 调用者保证所有索引都小于 `vertices.len()`.
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        debug_assert!(faces
            .iter()
            .flatten()
            .all(|&v| (v as usize) < vertices.len()));
        Self { vertices, faces }
    }

    /// 顶点.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// 三角形的顶点索引.
    #[inline]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    /// 顶点个数.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 三角形个数.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.faces.len()
    }

    /// 网格是否不含任何三角形.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// 按顺序迭代每个三角形的三个顶点.
    pub fn triangles(&self) -> impl ExactSizeIterator<Item = [Point3<f64>; 3]> + '_ {
        self.faces
            .iter()
            .map(|f| f.map(|v| self.vertices[v as usize]))
    }

    /// 封闭网格的有向体积 (各三角形与原点构成的四面体体积之和).
    ///
    /// 法向朝外时为正.
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)))
            .sum::<f64>()
            / 6.0
    }

    /// 封闭网格包围的体积.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// 表面积.
    pub fn surface_area(&self) -> f64 {
        self.triangles()
            .map(|t| triangle_normal(&t).norm() / 2.0)
            .sum()
    }

    /// 网格是否封闭且朝向一致: 每条有向边 `a -> b` 都恰好对应同样多条 `b -> a`.
    pub fn is_closed(&self) -> bool {
        if self.faces.is_empty() {
            return false;
        }
        let mut balance: HashMap<(u32, u32), i64> = HashMap::new();
        for &[a, b, c] in self.faces.iter() {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                if u < v {
                    *balance.entry((u, v)).or_default() += 1;
                } else {
                    *balance.entry((v, u)).or_default() -= 1;
                }
            }
        }
        balance.values().all(|&n| n == 0)
    }

    /// 网格是否为封闭的二维流形: 每条棱恰好属于两个三角形,
    /// 且每个顶点周围的三角形首尾相接成一圈 (没有夹点).
    pub fn is_manifold(&self) -> bool {
        if !self.is_closed() {
            return false;
        }
        let mut uses: HashMap<(u32, u32), u32> = HashMap::new();
        // 顶点 -> 其一环上的有向边 `b -> c`.
        let mut rings: HashMap<u32, HashMap<u32, u32>> = HashMap::new();
        for &[a, b, c] in self.faces.iter() {
            for (u, v, w) in [(a, b, c), (b, c, a), (c, a, b)] {
                *uses.entry((u.min(v), u.max(v))).or_default() += 1;
                if rings.entry(u).or_default().insert(v, w).is_some() {
                    return false;
                }
            }
        }
        if uses.values().any(|&n| n != 2) {
            return false;
        }
        rings.values().all(|next| {
            let start = match next.keys().next() {
                Some(&v) => v,
                None => return false,
            };
            let mut cur = start;
            for steps in 1..=next.len() {
                cur = match next.get(&cur) {
                    Some(&v) => v,
                    None => return false,
                };
                if cur == start {
                    return steps == next.len();
                }
            }
            false
        })
    }

    /// 轴对齐包围盒 `(最小角, 最大角)`. 空网格返回 `None`.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), p| (lo.inf(p), hi.sup(p))),
        )
    }

    /// 对每个顶点应用 `f`, 返回新网格. `flip` 为真时同时翻转所有三角形的朝向.
    pub fn map_vertices<F>(self, f: F, flip: bool) -> Self
    where
        F: Fn(&Point3<f64>) -> Point3<f64>,
    {
        let Self { vertices, faces } = self;
        let vertices = vertices.iter().map(f).collect();
        let faces = if flip {
            faces.into_iter().map(|[a, b, c]| [a, c, b]).collect()
        } else {
            faces
        };
        Self { vertices, faces }
    }

    /// 消费自我, 获得顶点与三角形索引.
    #[inline]
    pub fn into_raw(self) -> (Vec<Point3<f64>>, Vec<[u32; 3]>) {
        (self.vertices, self.faces)
    }
}

/// 三角形的非归一化法向, 模长为面积的两倍.
#[inline]
pub fn triangle_normal([a, b, c]: &[Point3<f64>; 3]) -> Vector3<f64> {
    (b - a).cross(&(c - a))
}
