//! 逐 ROI 批处理驱动.
//!
//! 驱动从加载器逐个取出 `(ROI 名称, 输入)`, 交给 [`RoiTask`] 处理, 并把结果分为三类:
//!
//! 1. 成功, 保存输出;
//! 2. 跳过 (细胞数不足), 以 `warn` 级别记录;
//! 3. 失败 (其他单 ROI 错误), 以 `error` 级别记录.
//!
//! 遇到致命错误 (例如模型未载入) 时立即终止, 并返回该错误.
//!
//! # 注意
//!
//! 启用 `rayon` 特性后, [`run_par`] 会把 ROI 分发到线程池中.
//! 结果最终按 ROI 名称排序, 与顺序执行 [`run`] 的结果相同.

pub mod steps;

pub use steps::{
    CellMaskStep, ConvertStep, EmbedStep, ExtractStep, LesionStep, TextureStep,
};

use crate::data::RoiName;
use crate::error::{RoiError, RoiResult};

/// 每处理这么多 ROI 输出一次进度.
pub const PROGRESS_EVERY: usize = 100;

/// 单个 ROI 上的处理步骤.
///
/// 实现必须可以在多个线程间共享; 除输出文件外不应有其他副作用.
pub trait RoiTask: Sync {
    /// 加载器产出的输入.
    type Input: Send;

    /// 单个 ROI 的输出.
    type Output: Send;

    /// 处理一个 ROI.
    fn process(&self, name: &RoiName, input: Self::Input) -> RoiResult<Self::Output>;
}

/// 批处理结果汇总.
#[derive(Debug)]
pub struct BatchReport<O> {
    /// 成功处理的 ROI 及其输出, 按名称升序.
    pub outputs: Vec<(RoiName, O)>,

    /// 被跳过的 ROI 及原因.
    pub skipped: Vec<(RoiName, RoiError)>,

    /// 处理失败的 ROI 及原因.
    pub failed: Vec<(RoiName, RoiError)>,
}

impl<O> Default for BatchReport<O> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<O> BatchReport<O> {
    /// 参与处理的 ROI 总数.
    #[inline]
    pub fn total(&self) -> usize {
        self.outputs.len() + self.skipped.len() + self.failed.len()
    }

    /// 成功个数.
    #[inline]
    pub fn succeeded(&self) -> usize {
        self.outputs.len()
    }

    /// 是否全部成功.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    /// 只保留输出, 丢弃 ROI 名称.
    pub fn into_outputs(self) -> Vec<O> {
        self.outputs.into_iter().map(|(_, o)| o).collect()
    }

    /// 记录一个 ROI 的结果. 致命错误原样返回.
    fn record(&mut self, name: RoiName, r: RoiResult<O>) -> RoiResult<()> {
        match r {
            Ok(o) => self.outputs.push((name, o)),
            Err(e) if e.is_fatal() => {
                log::error!("{name}: {e}, aborting");
                return Err(e);
            }
            Err(e) if e.is_skip() => {
                log::warn!("{name}: {e}, skipped");
                self.skipped.push((name, e));
            }
            Err(e) => {
                log::error!("{name}: {e}");
                self.failed.push((name, e));
            }
        }
        Ok(())
    }
}

#[inline]
fn progress(done: usize, total: usize) {
    if done % PROGRESS_EVERY == 0 {
        log::info!("processed {done}/{total} ROI(s)");
    }
}

/// 顺序执行批处理.
///
/// 加载阶段的错误 (文件缺失, 解析失败等) 与处理阶段的错误一样按 ROI 记录.
///
/// # 错误
///
/// 仅在遇到致命错误时返回 `Err`, 此时后续 ROI 不再处理.
pub fn run<I, T>(loader: I, task: &T) -> RoiResult<BatchReport<T::Output>>
where
    I: Iterator<Item = (RoiName, RoiResult<T::Input>)>,
    T: RoiTask + ?Sized,
{
    let total = loader.size_hint().0;
    let mut report = BatchReport::default();
    for (i, (name, input)) in loader.enumerate() {
        let r = input.and_then(|input| task.process(&name, input));
        report.record(name, r)?;
        progress(i + 1, total);
    }
    Ok(report)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{ParallelBridge, ParallelIterator};
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        /// 借助 `rayon`, 并行执行批处理. 语义同 [`run`].
        ///
        /// 出现致命错误后, 尚未开始的 ROI 不再处理.
        pub fn run_par<I, T>(loader: I, task: &T) -> RoiResult<BatchReport<T::Output>>
        where
            I: Iterator<Item = (RoiName, RoiResult<T::Input>)> + Send,
            T: RoiTask + ?Sized,
        {
            let total = loader.size_hint().0;
            let stop = AtomicBool::new(false);
            let done = AtomicUsize::new(0);

            let mut results: Vec<(RoiName, RoiResult<T::Output>)> = loader
                .par_bridge()
                .filter_map(|(name, input)| {
                    if stop.load(Ordering::Acquire) {
                        return None;
                    }
                    let r = input.and_then(|input| task.process(&name, input));
                    if matches!(&r, Err(e) if e.is_fatal()) {
                        stop.store(true, Ordering::Release);
                    }
                    progress(done.fetch_add(1, Ordering::AcqRel) + 1, total);
                    Some((name, r))
                })
                .collect();
            results.sort_unstable_by(|a, b| a.0.cmp(&b.0));

            let mut report = BatchReport::default();
            for (name, r) in results {
                report.record(name, r)?;
            }
            Ok(report)
        }

        /// 设置全局线程池大小. `n == 0` 时使用 `rayon` 默认值.
        pub fn init_workers(n: usize) {
            if n == 0 {
                return;
            }
            if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
                log::warn!("cannot configure {n} worker(s): {e}");
            }
        }
    } else {
        /// 未启用 `rayon` 特性, 退化为 [`run`].
        #[inline]
        pub fn run_par<I, T>(loader: I, task: &T) -> RoiResult<BatchReport<T::Output>>
        where
            I: Iterator<Item = (RoiName, RoiResult<T::Input>)> + Send,
            T: RoiTask + ?Sized,
        {
            run(loader, task)
        }

        /// 未启用 `rayon` 特性, 什么也不做.
        #[inline]
        pub fn init_workers(n: usize) {
            if n > 1 {
                log::warn!("built without `rayon`, ignoring {n} worker(s)");
            }
        }
    }
}
