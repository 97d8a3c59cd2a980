use std::io::BufRead;

use crate::error::InputSkipped;

/// 单个事件的汇总统计：一段原始电流样本的均值/标准差/时长。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub mean: f64,
    pub stdev: f64,
    pub duration: f64,
}

/// 解析事件 TSV：每行 `mean  stdev  duration`，允许 `#` 注释与一行表头。
/// 文件不可读、无事件行或数值行损坏都归为该 read 被跳过的条件，
/// 不终止整次运行。
pub fn read_events_file(path: &str) -> Result<Vec<Event>, InputSkipped> {
    let f = std::fs::File::open(path).map_err(|source| InputSkipped::Unreadable {
        path: path.to_string(),
        source,
    })?;
    read_events(std::io::BufReader::new(f), path)
}

pub fn read_events<R: BufRead>(reader: R, path: &str) -> Result<Vec<Event>, InputSkipped> {
    let mut events = Vec::new();
    let mut saw_header = false;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| InputSkipped::Unreadable {
            path: path.to_string(),
            source,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let parsed: Option<Vec<f64>> = fields.iter().map(|s| s.parse().ok()).collect();
        match parsed {
            Some(nums) if nums.len() >= 3 => {
                events.push(Event { mean: nums[0], stdev: nums[1], duration: nums[2] });
            }
            _ if !saw_header && events.is_empty() => {
                // 首个非数值行视作表头
                saw_header = true;
            }
            _ => {
                return Err(InputSkipped::MalformedRow {
                    path: path.to_string(),
                    line: lineno + 1,
                });
            }
        }
    }

    if events.is_empty() {
        return Err(InputSkipped::NoEvents { path: path.to_string() });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_events_with_header_and_comments() {
        let data = "# eventdetection dump\nmean\tstdev\tduration\n82.5\t1.3\t0.004\n90.125 2.0 0.0033\n";
        let events = read_events(Cursor::new(data.as_bytes()), "read1.tsv").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event { mean: 82.5, stdev: 1.3, duration: 0.004 });
        assert_eq!(events[1].mean, 90.125);
    }

    #[test]
    fn file_without_events_is_skipped() {
        let data = "# nothing here\n";
        let err = read_events(Cursor::new(data.as_bytes()), "empty.tsv").unwrap_err();
        assert!(matches!(err, InputSkipped::NoEvents { .. }));
    }

    #[test]
    fn malformed_row_is_skipped_with_location() {
        let data = "82.5\t1.3\t0.004\nnot-a-number\t1\t2\n";
        let err = read_events(Cursor::new(data.as_bytes()), "bad.tsv").unwrap_err();
        match err {
            InputSkipped::MalformedRow { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn missing_file_is_skipped() {
        let err = read_events_file("/definitely/not/here.tsv").unwrap_err();
        assert!(matches!(err, InputSkipped::Unreadable { .. }));
    }
}
