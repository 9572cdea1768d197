//! Altieri 空间熵.
//!
//! 把所有无序点对按距离划分到若干区间 `w`, 点对的类别组合记为 `z`, 则
//!
//! ```text
//! H(Z) = MI(Z, W) + Σ_w p(w) H(Z | w)
//! ```
//!
//! 前一项为空间互信息, 后一项为空间残差熵. 全部使用自然对数.
//!
//! 参考: Altieri, L., Cocchi, D., & Roli, G. (2018).
//! "A new approach to spatial entropy measures".

use crate::consts::CLASS_NUM;
use crate::data::CellLabel;
use itertools::Itertools;
use ordered_float::NotNan;

/// 类别组合个数上界 (有序对, 实际只使用 `a <= b` 的部分).
const PAIR_SLOTS: usize = CLASS_NUM * CLASS_NUM;

/// Altieri 空间熵的三个分量.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AltieriEntropy {
    /// 空间互信息 `MI(Z, W)`.
    pub mutual_info: f64,

    /// 空间残差熵 `Σ_w p(w) H(Z | w)`.
    pub residue: f64,

    /// 总熵, 等于前两项之和.
    pub entropy: f64,
}

/// 整理距离分段点: 丢弃 NaN 和非正值, 升序去重.
fn normalize_cuts(cuts: &[f64]) -> Vec<NotNan<f64>> {
    let mut cuts: Vec<NotNan<f64>> = cuts
        .iter()
        .filter_map(|&c| NotNan::new(c).ok())
        .filter(|c| c.into_inner() > 0.0)
        .collect();
    cuts.sort_unstable();
    cuts.dedup();
    cuts
}

/// 距离 `d` 所在区间的下标. 区间为 `[0, c1], (c1, c2], ..., (ck, ∞)`.
#[inline]
fn interval_of(cuts: &[NotNan<f64>], d: f64) -> usize {
    cuts.partition_point(|c| c.into_inner() < d)
}

/// 无序类别组合的下标.
#[inline]
fn pair_slot(a: CellLabel, b: CellLabel) -> usize {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    lo.index() * CLASS_NUM + hi.index()
}

fn entropy_of(counts: &[u64; PAIR_SLOTS], total: u64) -> f64 {
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}

/// 计算 Altieri 空间熵.
///
/// `points` 为细胞中心 `(y, x)`, `labels` 为对应类别, 两者长度必须一致,
/// 否则程序 panic. `cuts` 为距离分段点 (单位: 像素).
///
/// 点数少于 2 时没有点对, 三个分量均为 0.
pub fn altieri_entropy(
    points: &[(f64, f64)],
    labels: &[CellLabel],
    cuts: &[f64],
) -> AltieriEntropy {
    assert_eq!(points.len(), labels.len());
    let cuts = normalize_cuts(cuts);

    let mut by_interval = vec![[0u64; PAIR_SLOTS]; cuts.len() + 1];
    for (i, j) in (0..points.len()).tuple_combinations() {
        let ((y1, x1), (y2, x2)) = (points[i], points[j]);
        let d = (y1 - y2).hypot(x1 - x2);
        by_interval[interval_of(&cuts, d)][pair_slot(labels[i], labels[j])] += 1;
    }

    let mut overall = [0u64; PAIR_SLOTS];
    for counts in by_interval.iter() {
        for (o, c) in overall.iter_mut().zip(counts) {
            *o += c;
        }
    }
    let total: u64 = overall.iter().sum();
    if total == 0 {
        return AltieriEntropy::default();
    }

    let mut mutual_info = 0.0;
    let mut residue = 0.0;
    for counts in by_interval.iter() {
        let n_w: u64 = counts.iter().sum();
        if n_w == 0 {
            continue;
        }
        let p_w = n_w as f64 / total as f64;
        residue += p_w * entropy_of(counts, n_w);
        mutual_info += p_w
            * counts
                .iter()
                .zip(overall.iter())
                .filter(|(&c, _)| c > 0)
                .map(|(&c, &o)| {
                    let p_zw = c as f64 / n_w as f64;
                    let p_z = o as f64 / total as f64;
                    p_zw * (p_zw / p_z).ln()
                })
                .sum::<f64>();
    }

    AltieriEntropy {
        mutual_info,
        residue,
        entropy: mutual_info + residue,
    }
}
