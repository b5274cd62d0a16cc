use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::Path;

/// 一条（可能带 pad 的）序列记录
#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

impl FastaRecord {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// 逐条读取 FASTA。序列字符转为大写，pad 符号原样保留，空白与行内编号被丢弃；
/// 其余非打印字符视为格式错误。
pub struct FastaReader<R: BufRead> {
    reader: R,
    line: String,
    line_no: usize,
    done: bool,
    peek_header: Option<String>,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            line_no: 0,
            done: false,
            peek_header: None,
        }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        self.line_no += 1;
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        let header = match self.peek_header.take() {
            Some(h) => h,
            None => loop {
                if !self.read_line()? {
                    self.done = true;
                    return Ok(None);
                }
                if let Some(rest) = self.line.strip_prefix('>') {
                    break rest.trim().to_string();
                }
                if !self.line.trim().is_empty() {
                    bail!("line {}: sequence data before the first '>' header", self.line_no);
                }
            },
        };

        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let mut seq: Vec<u8> = Vec::new();
        loop {
            if !self.read_line()? {
                self.done = true;
                break;
            }
            if let Some(rest) = self.line.strip_prefix('>') {
                self.peek_header = Some(rest.trim().to_string());
                break;
            }
            for &b in self.line.as_bytes() {
                match b {
                    b if b.is_ascii_whitespace() || b.is_ascii_digit() => {}
                    b if b.is_ascii_graphic() => seq.push(b.to_ascii_uppercase()),
                    _ => bail!("line {}: unexpected byte {:#04x} in record '{}'", self.line_no, b, id),
                }
            }
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }

    pub fn read_all(&mut self) -> Result<Vec<FastaRecord>> {
        let mut out = Vec::new();
        while let Some(rec) = self.next_record()? {
            out.push(rec);
        }
        Ok(out)
    }
}

/// 读取整个 FASTA 文件；没有任何记录时报错
pub fn read_fasta_file<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>> {
    let path = path.as_ref();
    let fh = std::fs::File::open(path)
        .with_context(|| format!("cannot open FASTA '{}'", path.display()))?;
    let records = FastaReader::new(std::io::BufReader::new(fh))
        .read_all()
        .with_context(|| format!("while reading '{}'", path.display()))?;
    if records.is_empty() {
        bail!("FASTA file '{}' contains no sequences", path.display());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_padded_records() {
        let data = b">read1 first\nACgT**\nNNac\n>read2\nAAA\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "read1");
        assert_eq!(r1.desc.as_deref(), Some("first"));
        assert_eq!(r1.seq, b"ACGT**NNAC");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "read2");
        assert_eq!(r2.desc, None);
        assert_eq!(r2.len(), 3);

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn crlf_whitespace_and_numbering_are_dropped() {
        let data = b"\n\n>c1 desc\r\n1 AC g t *\r\n 61 acgt\r\n>c2 \r\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));
        let all = r.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].seq, b"ACGT*ACGT");
        assert_eq!(all[1].id, "c2");
        assert!(all[1].is_empty());
    }

    #[test]
    fn data_before_header_is_an_error() {
        let mut r = FastaReader::new(Cursor::new(&b"ACGT\n>x\nA\n"[..]));
        let err = r.next_record().unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
