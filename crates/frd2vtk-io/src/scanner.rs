//! Block scanner for CalculiX FRD result files.
//!
//! The FRD format is organized as sequential tagged blocks with
//! fixed-column numeric fields (cgx manual § 11):
//!
//! - `    2C` node block header, then ` -1` node records, then ` -3`
//! - `    3C` element block header, then ` -1` element records with
//!   ` -2` connectivity continuation lines, then ` -3`
//! - `  100C` result block header, then one ` -4` field descriptor,
//!   ` -5` component descriptors, ` -1` value records (with ` -2`
//!   continuation lines for vectors wider than six columns), then ` -3`
//! - ` 9999` file terminator
//!
//! The scanner turns that stream into a finite, single-pass sequence of
//! validated [`Record`]s. It is not restartable: all bookkeeping (the
//! current block, the stored component width of the current field, a
//! one-line pushback and the line counter) lives in the scanner itself
//! and is discarded with it.

use std::io::BufRead;

use crate::error::{ConvertError, Result};

/// One validated record from the input stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Header/info line (`1C` job name, `1U` user line, `1PSTEP`, ...)
    Info(String),
    /// Node block header with its declared node total
    NodeBlockStart { declared: usize },
    /// One node coordinate record
    Node { id: i32, coords: [f64; 3] },
    /// Element block header with its declared element total
    ElementBlockStart { declared: usize },
    /// One element with fully gathered connectivity
    Element {
        id: i32,
        source_type: i32,
        nodes: Vec<i32>,
    },
    /// Result block header
    ResultBlockStart {
        step: i32,
        time: f64,
        declared_rows: usize,
    },
    /// Field descriptor inside a result block
    FieldStart { name: String, ncomps: usize },
    /// Component descriptor; `calculated` components have no stored column
    Component { label: String, calculated: bool },
    /// One value record, continuation lines already merged
    ResultRow { node: i32, values: Vec<f64> },
    /// Block terminator (` -3`)
    BlockEnd,
    /// File terminator (` 9999` or end of input)
    FileEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Nodes,
    Elements,
    Results,
}

/// Produce-once scanner over an FRD input stream.
pub struct FrdScanner<R: BufRead> {
    reader: R,
    line_no: usize,
    pushback: Option<String>,
    block: Block,
    /// Declared component count of the current field (` -4` record)
    declared_width: usize,
    /// Stored component count (` -5` records with a zero exists-flag)
    stored_width: usize,
    finished: bool,
}

impl<R: BufRead> FrdScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            pushback: None,
            block: Block::None,
            declared_width: 0,
            stored_width: 0,
            finished: false,
        }
    }

    fn read_raw(&mut self) -> std::io::Result<Option<String>> {
        if let Some(line) = self.pushback.take() {
            return Ok(Some(line));
        }
        let mut buf = String::new();
        let n = self.reader.read_line(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    fn scan_next(&mut self) -> Result<Option<Record>> {
        loop {
            let Some(line) = self.read_raw()? else {
                // EOF without ` 9999` is tolerated
                self.finished = true;
                return Ok(Some(Record::FileEnd));
            };
            if line.trim().is_empty() {
                continue;
            }
            let record = match self.block {
                Block::None => self.scan_top_level(&line)?,
                Block::Nodes => self.scan_node_record(&line)?,
                Block::Elements => self.scan_element_record(&line)?,
                Block::Results => self.scan_result_record(&line)?,
            };
            return Ok(Some(record));
        }
    }

    fn scan_top_level(&mut self, line: &str) -> Result<Record> {
        let key = col(line, 0, 5).unwrap_or("");
        match key {
            "1" => Ok(Record::Info(line.trim().to_string())),
            "2" => {
                self.block = Block::Nodes;
                let declared = self.parse_usize(line, 24, 36, "node block total")?;
                Ok(Record::NodeBlockStart { declared })
            }
            "3" => {
                self.block = Block::Elements;
                let declared = self.parse_usize(line, 24, 36, "element block total")?;
                Ok(Record::ElementBlockStart { declared })
            }
            "100" => {
                self.block = Block::Results;
                self.declared_width = 0;
                self.stored_width = 0;
                let time = self.parse_f64(line, 12, 24, "result block time value")?;
                let declared_rows = self.parse_usize(line, 24, 36, "result block row count")?;
                let step = self.parse_i32(line, 58, 63, "result block step number")?;
                if let Some(fmt) = col(line, 73, 75)
                    && let Ok(code) = fmt.parse::<i32>()
                    && code >= 2
                {
                    return Err(ConvertError::format(
                        self.line_no,
                        "binary FRD result blocks are not supported",
                    ));
                }
                Ok(Record::ResultBlockStart {
                    step,
                    time,
                    declared_rows,
                })
            }
            "9999" => {
                self.finished = true;
                Ok(Record::FileEnd)
            }
            _ => Err(ConvertError::format(
                self.line_no,
                format!("unrecognized record tag {key:?}"),
            )),
        }
    }

    fn scan_node_record(&mut self, line: &str) -> Result<Record> {
        match col(line, 1, 3).unwrap_or("") {
            "-1" => {
                let id = self.parse_i32(line, 3, 13, "node id")?;
                let mut coords = [0.0f64; 3];
                for (i, coord) in coords.iter_mut().enumerate() {
                    *coord = self.parse_f64(line, 13 + 12 * i, 25 + 12 * i, "node coordinate")?;
                }
                Ok(Record::Node { id, coords })
            }
            "-3" => {
                self.block = Block::None;
                Ok(Record::BlockEnd)
            }
            tag => Err(ConvertError::format(
                self.line_no,
                format!("unrecognized tag {tag:?} in node block"),
            )),
        }
    }

    fn scan_element_record(&mut self, line: &str) -> Result<Record> {
        match col(line, 1, 3).unwrap_or("") {
            "-1" => {
                let id = self.parse_i32(line, 3, 13, "element id")?;
                let source_type = self.parse_i32(line, 13, 18, "element type")?;
                let nodes = self.gather_connectivity()?;
                if nodes.is_empty() {
                    return Err(ConvertError::format(
                        self.line_no,
                        format!("element {id} has no connectivity records"),
                    ));
                }
                Ok(Record::Element {
                    id,
                    source_type,
                    nodes,
                })
            }
            "-3" => {
                self.block = Block::None;
                Ok(Record::BlockEnd)
            }
            tag => Err(ConvertError::format(
                self.line_no,
                format!("unrecognized tag {tag:?} in element block"),
            )),
        }
    }

    /// Collect ` -2` connectivity lines (ten-character ids from column 3)
    /// until the next record, which is pushed back.
    fn gather_connectivity(&mut self) -> Result<Vec<i32>> {
        let mut nodes = Vec::new();
        while let Some(line) = self.read_raw()? {
            if col(&line, 1, 3) != Some("-2") {
                self.pushback = Some(line);
                break;
            }
            let mut start = 3;
            while let Some(field) = col(&line, start, start + 10) {
                let id = field.parse::<i32>().map_err(|_| {
                    ConvertError::format(
                        self.line_no,
                        format!("invalid connectivity entry {field:?}"),
                    )
                })?;
                nodes.push(id);
                start += 10;
            }
        }
        Ok(nodes)
    }

    fn scan_result_record(&mut self, line: &str) -> Result<Record> {
        match col(line, 1, 3).unwrap_or("") {
            "-4" => {
                let name = col(line, 5, 13)
                    .ok_or_else(|| {
                        ConvertError::format(self.line_no, "field descriptor without a name")
                    })?
                    .to_string();
                let ncomps = self.parse_usize(line, 13, 18, "field component count")?;
                self.declared_width = ncomps;
                self.stored_width = 0;
                Ok(Record::FieldStart { name, ncomps })
            }
            "-5" => {
                let label = col(line, 5, 13)
                    .ok_or_else(|| {
                        ConvertError::format(self.line_no, "component descriptor without a label")
                    })?
                    .to_string();
                // A nonzero exists-flag marks a calculated component
                // (e.g. ALL) that has no stored value column.
                let calculated = match col(line, 33, 38) {
                    Some(flag) => flag.parse::<i32>().unwrap_or(0) != 0,
                    None => false,
                };
                if !calculated {
                    self.stored_width += 1;
                }
                Ok(Record::Component { label, calculated })
            }
            "-1" => self.gather_result_row(line),
            "-3" => {
                self.block = Block::None;
                Ok(Record::BlockEnd)
            }
            tag => Err(ConvertError::format(
                self.line_no,
                format!("unrecognized tag {tag:?} in result block"),
            )),
        }
    }

    /// Read one value record, merging ` -2` continuation lines until the
    /// stored component width is satisfied.
    fn gather_result_row(&mut self, first: &str) -> Result<Record> {
        let width = if self.stored_width > 0 {
            self.stored_width
        } else {
            self.declared_width
        };
        if width == 0 {
            return Err(ConvertError::format(
                self.line_no,
                "value record before any field descriptor",
            ));
        }
        let node = self.parse_i32(first, 3, 13, "result node id")?;
        let mut values = Vec::with_capacity(width);
        let mut line = first.to_string();
        loop {
            // Up to six 12-character columns per line, starting at column 13
            let offset = values.len() % 6;
            for i in offset..6 {
                if values.len() == width {
                    break;
                }
                let value =
                    self.parse_f64(&line, 13 + 12 * i, 25 + 12 * i, "result value column")?;
                values.push(value);
            }
            if values.len() == width {
                break;
            }
            let Some(next) = self.read_raw()? else {
                return Err(ConvertError::format(
                    self.line_no,
                    format!("truncated value record for node {node}"),
                ));
            };
            if col(&next, 1, 3) != Some("-2") {
                return Err(ConvertError::format(
                    self.line_no,
                    format!(
                        "value record for node {node} declares {width} components \
                         but has no continuation line"
                    ),
                ));
            }
            line = next;
        }
        Ok(Record::ResultRow { node, values })
    }

    fn parse_i32(&self, line: &str, start: usize, end: usize, what: &str) -> Result<i32> {
        col(line, start, end)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ConvertError::format(self.line_no, format!("missing or invalid {what}")))
    }

    fn parse_usize(&self, line: &str, start: usize, end: usize, what: &str) -> Result<usize> {
        col(line, start, end)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ConvertError::format(self.line_no, format!("missing or invalid {what}")))
    }

    fn parse_f64(&self, line: &str, start: usize, end: usize, what: &str) -> Result<f64> {
        col(line, start, end)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ConvertError::format(self.line_no, format!("missing or invalid {what}")))
    }
}

impl<R: BufRead> Iterator for FrdScanner<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.scan_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Trimmed fixed-column slice, or `None` when the line ends before the
/// column starts, the columns are blank, or a multibyte character
/// straddles a column boundary (the format is ASCII-only, so such a
/// line is malformed and the caller reports it).
fn col(line: &str, start: usize, end: usize) -> Option<&str> {
    if line.len() <= start {
        return None;
    }
    let end = end.min(line.len());
    let field = line.get(start..end)?.trim();
    if field.is_empty() { None } else { Some(field) }
}
