//! 可增长的并查集.

/// 并查集. 集合以 `0..len()` 的整数标识.
///
/// `find` 使用路径减半, `union` 按集合大小合并, 两者均摊近似常数时间.
#[derive(Debug, Default, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    /// 创建空并查集, 预留 `capacity` 个元素的空间.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: Vec::with_capacity(capacity),
            size: Vec::with_capacity(capacity),
        }
    }

    /// 元素个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// 新建一个只含自身的集合, 返回其标识.
    #[inline]
    pub fn make_set(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.size.push(1);
        id
    }

    /// 找到 `x` 所在集合的根.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            let grand = self.parent[self.parent[x]];
            self.parent[x] = grand;
            x = grand;
        }
        x
    }

    /// 合并 `x` 与 `y` 所在的集合, 返回合并后的根.
    pub fn union(&mut self, x: usize, y: usize) -> usize {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx == ry {
            return rx;
        }
        let (big, small) = if self.size[rx] >= self.size[ry] {
            (rx, ry)
        } else {
            (ry, rx)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }

    /// `x` 与 `y` 是否在同一集合中.
    #[inline]
    pub fn same(&mut self, x: usize, y: usize) -> bool {
        self.find(x) == self.find(y)
    }
}

#[cfg(test)]
mod tests {
    use super::DisjointSet;

    #[test]
    fn test_union_find() {
        let mut ds = DisjointSet::with_capacity(6);
        assert!(ds.is_empty());
        let ids: Vec<usize> = (0..6).map(|_| ds.make_set()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);

        ds.union(0, 1);
        ds.union(2, 3);
        assert!(ds.same(0, 1));
        assert!(!ds.same(1, 2));

        ds.union(1, 3);
        assert!(ds.same(0, 2));
        assert_eq!(ds.union(0, 3), ds.find(2));
        assert!(!ds.same(4, 5));
        assert_eq!(ds.len(), 6);
    }

    #[test]
    fn test_long_chain() {
        let mut ds = DisjointSet::default();
        let n = 10_000;
        for _ in 0..n {
            ds.make_set();
        }
        for i in 1..n {
            ds.union(i - 1, i);
        }
        let root = ds.find(0);
        assert!((0..n).all(|i| ds.find(i) == root));
    }
}
