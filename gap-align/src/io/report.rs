use anyhow::Result;
use std::io::Write;

use crate::align::overlap::PadSymbols;
use crate::batch::{BatchReport, Hit};

pub const COLUMNS: [&str; 12] = [
    "seq1", "seq2", "strand", "direction", "length", "percent", "score", "left1", "right1", "left2",
    "right2", "aligned_len",
];

/// 制表符分隔的重叠报告；`alignment_width` 非空时在每行后附上比对图
pub struct ReportWriter<W: Write> {
    out: W,
    alignment_width: Option<usize>,
    pads: PadSymbols,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, pads: PadSymbols) -> Self {
        Self { out, alignment_width: None, pads }
    }

    pub fn with_alignments(mut self, width: usize) -> Self {
        self.alignment_width = Some(width);
        self
    }

    pub fn header(&mut self, command: &str) -> Result<()> {
        writeln!(
            self.out,
            "# gap-align {} {} {}",
            env!("CARGO_PKG_VERSION"),
            command,
            chrono::Utc::now().to_rfc3339()
        )?;
        writeln!(self.out, "{}", COLUMNS.join("\t"))?;
        Ok(())
    }

    pub fn hit(&mut self, hit: &Hit, name1: &str, name2: &str) -> Result<()> {
        let ov = &hit.overlap;
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.0}\t{}\t{}\t{}\t{}\t{}",
            name1,
            name2,
            if hit.complemented { '-' } else { '+' },
            ov.direction.as_str(),
            ov.length,
            ov.percent,
            ov.score,
            ov.left1,
            ov.right1,
            ov.left2,
            ov.right2,
            ov.seq1_out.len(),
        )?;
        if let Some(width) = self.alignment_width {
            write!(self.out, "{}", ov.display_alignment(width, self.pads))?;
        }
        Ok(())
    }

    /// 写出批处理的全部命中和汇总行
    pub fn report(&mut self, report: &BatchReport, names1: &[String], names2: &[String]) -> Result<()> {
        for hit in &report.hits {
            let n1 = names1.get(hit.seq1).map(String::as_str).unwrap_or("?");
            let n2 = names2.get(hit.seq2).map(String::as_str).unwrap_or("?");
            self.hit(hit, n1, n2)?;
        }
        writeln!(
            self.out,
            "# pairs compared {}, hits {}, skipped {}, failed {}",
            report.compared,
            report.hits.len(),
            report.skipped,
            report.failed
        )?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
