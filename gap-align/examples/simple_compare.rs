//! 演示如何在 library 模式下使用 gap-align 比较两条带 pad 的序列。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_compare
//! ```

use gap_align::align::overlap::PadSymbols;
use gap_align::align::Comparer;
use gap_align::config::{CompareOpt, SearchMode};
use gap_align::index::BulkIndex;

fn main() -> anyhow::Result<()> {
    // 1. 两条读段：read2 的前 42 个碱基与 read1 的末尾重叠，read1 在重叠区内带一个已有 pad
    let read1 = b"TTGACCGATAGGCTAACGTTGCAGGATCCATGCAAGTCGATCGGATTAGCA*CCTAGGCTAGCTAGGTTACGAT";
    let read2 = b"GCAAGTCGATCGGATTAGCACCTAGGCTAGCTAGGTTACGATGCATTGGACCTAGATCCGGTACA";
    println!("read1: {} bp, read2: {} bp", read1.len(), read2.len());

    // 2. 块模式：精确匹配块 -> 链 -> 分段比对
    let mut cmp = Comparer::new(CompareOpt::default())?;
    let index = cmp.build_index(read1)?;
    match cmp.compare_blocks(&index, read2)? {
        Some(ov) => {
            println!(
                "\n块模式: {} 重叠 {} bp, 一致性 {:.1}%, 得分 {:.0}",
                ov.direction.as_str(),
                ov.length,
                ov.percent,
                ov.score
            );
            print!("{}", ov.display_alignment(60, cmp.pads()));
        }
        None => println!("\n块模式: 无重叠"),
    }

    // 3. 灵敏模式：对角线直方图 + 显著性阈值，再做一次带状比对
    let opt = CompareOpt { mode: SearchMode::Sensitive, word_length: 4, ..CompareOpt::default() };
    let mut sensitive = Comparer::new(opt)?;
    let index = sensitive.build_index(read1)?;
    if let Some(ov) = sensitive.compare(&index, read2)? {
        println!("\n灵敏模式: 重叠 {} bp, 一致性 {:.1}%", ov.length, ov.percent);
        println!("  seq1 [{}..={}], seq2 [{}..={}]", ov.left1, ov.right1, ov.left2, ov.right2);
    }

    // 4. 一条读段对多条 contig
    let contigs: [&[u8]; 2] = [b"GGGGCCCCAAAATTTTGGGGCCCCAAAATTTTGGGGCCCC", read1];
    let bulk = BulkIndex::build(&contigs, 8)?;
    let hits = cmp.compare_bulk(&bulk, read2)?;
    println!("\n批量 contig 比较: {} 个命中", hits.len());
    let pads = PadSymbols { old: Some(b'*'), new: b'.' };
    for hit in &hits {
        println!("  contig {}: {} bp, {:.1}%", hit.contig, hit.overlap.length, hit.overlap.percent);
        print!("{}", hit.overlap.display_alignment(60, pads));
    }

    println!("\n完成！");
    Ok(())
}
