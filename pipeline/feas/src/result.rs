//! 运行结果.

use patho_berry::batch::BatchReport;
use patho_berry::error::RoiError;
use patho_berry::RoiName;
use std::io::{self, Write};
use std::path::PathBuf;

/// 单个子命令的运行结果.
#[derive(Debug, Default)]
pub struct StepResult {
    step: &'static str,
    total: usize,
    succeeded: usize,
    skipped: Vec<(RoiName, String)>,
    failed: Vec<(RoiName, String)>,
    outputs: Vec<PathBuf>,
}

impl StepResult {
    /// 不涉及逐 ROI 处理的子命令.
    pub fn single(step: &'static str) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    /// 由批处理汇总构造.
    pub fn from_report<O>(step: &'static str, report: &BatchReport<O>) -> Self {
        let describe = |v: &[(RoiName, RoiError)]| -> Vec<(RoiName, String)> {
            v.iter().map(|(n, e)| (n.clone(), e.to_string())).collect()
        };
        Self {
            step,
            total: report.total(),
            succeeded: report.succeeded(),
            skipped: describe(&report.skipped),
            failed: describe(&report.failed),
            outputs: Vec::new(),
        }
    }

    /// 追加一个输出文件.
    pub fn with_output<P: Into<PathBuf>>(mut self, p: P) -> Self {
        self.outputs.push(p.into());
        self
    }

    /// 将结果写进 `w` 中.
    fn describe_into<W: Write>(&self, w: &mut W) -> io::Result<()> {
        const S4: &str = "    ";

        writeln!(w, "Step `{}`:", self.step)?;
        if self.total > 0 {
            writeln!(w, "{S4}ROIs in total: {}", self.total)?;
            writeln!(w, "{S4}Succeeded: {}", self.succeeded)?;
            writeln!(w, "{S4}Skipped: {}", self.skipped.len())?;
            for (name, why) in self.skipped.iter() {
                writeln!(w, "{S4}{S4}{name}: {why}")?;
            }
            writeln!(w, "{S4}Failed: {}", self.failed.len())?;
            for (name, why) in self.failed.iter() {
                writeln!(w, "{S4}{S4}{name}: {why}")?;
            }
        }
        for p in self.outputs.iter() {
            writeln!(w, "{S4}Wrote {}", p.display())?;
        }
        Ok(())
    }

    /// 打印运行结果.
    pub fn analyze(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut w = stdout.lock();
        utils::sep_to(&mut w)?;
        self.describe_into(&mut w)?;
        utils::sep_to(&mut w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let report = BatchReport {
            outputs: vec![(RoiName::new("a"), 1)],
            skipped: vec![(
                RoiName::new("b"),
                RoiError::InsufficientCells {
                    found: 3,
                    required: 10,
                },
            )],
            failed: Vec::new(),
        };
        let r = StepResult::from_report("extract", &report).with_output("/tmp/x.csv");
        let mut buf = Vec::new();
        r.describe_into(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Step `extract`:\n    ROIs in total: 2\n    Succeeded: 1\n"));
        assert!(text.contains("        b: only 3 cell(s) detected, at least 10 required\n"));
        assert!(text.ends_with("    Wrote /tmp/x.csv\n"));
    }
}
