use anyhow::Result;
use std::io::BufRead;

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
}

/// 流式 FASTA 解析器，容忍 CRLF、行内空白与前导空行。
pub struct FastaReader<R: BufRead> {
    reader: R,
    pending_header: Option<String>,
    done: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, pending_header: None, done: false }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            self.done = true;
            return Ok(None);
        }
        Ok(Some(line))
    }

    pub fn next_record(&mut self) -> Result<Option<FastaRecord>> {
        if self.done && self.pending_header.is_none() {
            return Ok(None);
        }

        let header = loop {
            if let Some(h) = self.pending_header.take() {
                break h;
            }
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.starts_with('>') => break line[1..].trim().to_string(),
                Some(_) => continue,
            }
        };

        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let mut seq = Vec::new();
        while let Some(line) = self.next_line()? {
            if line.starts_with('>') {
                self.pending_header = Some(line[1..].trim().to_string());
                break;
            }
            seq.extend(
                line.bytes()
                    .filter(|b| !b.is_ascii_whitespace())
                    .map(|b| b.to_ascii_uppercase()),
            );
        }

        Ok(Some(FastaRecord { id, desc, seq }))
    }

    /// 读完整个文件；空文件或全空序列时报错。
    pub fn read_all(mut self) -> Result<Vec<FastaRecord>> {
        let mut records = Vec::new();
        while let Some(rec) = self.next_record()? {
            records.push(rec);
        }
        if records.is_empty() {
            anyhow::bail!("FASTA input contains no sequences");
        }
        if records.iter().all(|r| r.seq.is_empty()) {
            anyhow::bail!("FASTA input contains only empty sequences");
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_simple_fasta() {
        let data = b">chr1 first\nACgTtt\n>chr2\nAAA\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "chr1");
        assert_eq!(r1.desc.as_deref(), Some("first"));
        assert_eq!(r1.seq, b"ACGTTT");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "chr2");
        assert_eq!(r2.desc, None);
        assert_eq!(r2.seq, b"AAA");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn parse_fasta_with_crlf_and_wrapped_lines() {
        let data = b"\n>chr1 desc\r\nACGT\r\nacgt\r\n>chr2\r\nTT TT\r\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.seq, b"ACGTACGT");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "chr2");
        assert_eq!(r2.seq, b"TTTT");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn read_all_rejects_empty_input() {
        let r = FastaReader::new(Cursor::new(&b""[..]));
        assert!(r.read_all().is_err());

        let r = FastaReader::new(Cursor::new(&b">only_header\n"[..]));
        assert!(r.read_all().is_err());
    }
}
