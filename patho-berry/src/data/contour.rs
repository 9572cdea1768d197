//! 细胞轮廓 (闭合简单多边形) 及其几何量.
//!
//! 轮廓点以图像坐标 `(x, y)` 保存, 即 `x` 沿宽度方向向右增长,
//! `y` 沿高度方向向下增长. 这与分割记录 (`[[x, y], ...]`) 的约定一致,
//! 与 [`crate::Idx2d`] 的 `(h, w)` 约定**相反**, 转换时请注意.

use crate::{Idx2d, Point};

/// 闭合多边形轮廓. 至少包含 3 个顶点, 末点与首点隐式相连.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    points: Vec<Point>,
}

/// 轮廓的紧致外接矩形 (包含边界像素).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    /// 左上角 x.
    pub x: i32,
    /// 左上角 y.
    pub y: i32,
    /// 宽度, 即 `max_x - min_x + 1`.
    pub width: u32,
    /// 高度, 即 `max_y - min_y + 1`.
    pub height: u32,
}

impl BoundingBox {
    /// 矩形是否完全位于 `width * height` 的图像内.
    #[inline]
    pub fn within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= width as i64
            && self.y as i64 + self.height as i64 <= height as i64
    }

    /// 矩形的形状 `(h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx2d {
        (self.height as usize, self.width as usize)
    }
}

impl Contour {
    /// 从顶点序列构造轮廓. 顶点少于 3 个时返回 `None`.
    pub fn new(points: Vec<Point>) -> Option<Self> {
        if points.len() < 3 {
            None
        } else {
            Some(Self { points })
        }
    }

    /// 顶点序列.
    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// 顶点个数, 至少为 3.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// 首尾相连的边 `(起点, 终点)` 迭代器.
    #[inline]
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        self.points
            .iter()
            .copied()
            .zip(self.points.iter().copied().cycle().skip(1))
    }

    /// 鞋带公式求有向面积的两倍. 使用整数运算, 结果精确.
    pub fn signed_area_doubled(&self) -> i64 {
        self.edges()
            .map(|((x1, y1), (x2, y2))| x1 as i64 * y2 as i64 - x2 as i64 * y1 as i64)
            .sum()
    }

    /// 多边形面积 (非负).
    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area_doubled().abs() as f64 / 2.0
    }

    /// 闭合多边形周长.
    pub fn perimeter(&self) -> f64 {
        self.edges()
            .map(|((x1, y1), (x2, y2))| {
                let dx = (x2 - x1) as f64;
                let dy = (y2 - y1) as f64;
                dx.hypot(dy)
            })
            .sum()
    }

    /// 顶点均值 `(x, y)`. 下游空间统计把它当作细胞中心.
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.points.len() as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0i64, 0i64), |(sx, sy), &(x, y)| (sx + x as i64, sy + y as i64));
        (sx as f64 / n, sy as f64 / n)
    }

    /// 紧致外接矩形.
    pub fn bounding_box(&self) -> BoundingBox {
        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
        for &(x, y) in self.points.iter() {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        BoundingBox {
            x: min_x,
            y: min_y,
            width: (max_x as i64 - min_x as i64 + 1) as u32,
            height: (max_y as i64 - min_y as i64 + 1) as u32,
        }
    }

    /// 像素 `(x, y)` 是否被轮廓覆盖.
    ///
    /// 位于边上的像素总是算作内部 (与填充轮廓时连同边界一起绘制的约定一致),
    /// 其余像素按奇偶规则判断.
    pub fn contains(&self, (px, py): Point) -> bool {
        let (px, py) = (px as i64, py as i64);
        let mut inside = false;
        for ((ax, ay), (bx, by)) in self.edges() {
            let (ax, ay, bx, by) = (ax as i64, ay as i64, bx as i64, by as i64);

            // 在边上
            let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
            if cross == 0 && px >= ax.min(bx) && px <= ax.max(bx) && py >= ay.min(by) && py <= ay.max(by)
            {
                return true;
            }

            // 向右的水平射线与边相交
            if (ay > py) != (by > py) {
                let dy = by - ay;
                let lhs = px * dy;
                let rhs = ax * dy + (py - ay) * (bx - ax);
                if (dy > 0 && lhs < rhs) || (dy < 0 && lhs > rhs) {
                    inside = !inside;
                }
            }
        }
        inside
    }
}
