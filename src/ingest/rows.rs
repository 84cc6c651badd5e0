use super::error::UploadRejected;
use std::collections::HashMap;

pub const DELIMITER: char = ',';

/// Column name -> position, built once from the header line and shared
/// read-only by every row of the upload.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    width: usize,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn parse(line: &str) -> Self {
        let line = line.strip_prefix('\u{feff}').unwrap_or(line);
        let mut positions = HashMap::new();
        let mut width = 0usize;
        for (i, name) in line.split(DELIMITER).enumerate() {
            // A repeated name points at its last occurrence.
            positions.insert(name.trim().to_ascii_lowercase(), i);
            width = i + 1;
        }
        HeaderIndex { width, positions }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// First required name absent from the header, in the order given.
    pub fn require(&self, required: &[&str]) -> Result<(), UploadRejected> {
        match required.iter().find(|name| !self.positions.contains_key(**name)) {
            Some(missing) => Err(UploadRejected::MissingColumn((*missing).to_string())),
            None => Ok(()),
        }
    }
}

/// One data line split into slots sized to the header. Fields are trimmed;
/// quoting is not understood, so a literal comma always splits.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line_no: usize,
    slots: Vec<Option<String>>,
}

impl RawRow {
    pub fn tokenize(line_no: usize, line: &str, header: &HeaderIndex) -> Self {
        let mut slots: Vec<Option<String>> = vec![None; header.width()];
        for (i, field) in line.split(DELIMITER).enumerate() {
            if let Some(slot) = slots.get_mut(i) {
                *slot = Some(field.trim().to_string());
            }
        }
        RawRow { line_no, slots }
    }

    /// The named field, or `""` when the header lacks the column or the line
    /// was too short to reach it.
    pub fn field<'a>(&'a self, header: &HeaderIndex, name: &str) -> &'a str {
        header
            .position(name)
            .and_then(|i| self.slots.get(i))
            .and_then(|s| s.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct Upload {
    pub header: HeaderIndex,
    pub rows: Vec<RawRow>,
}

/// Splits an upload into header and data rows. The header is line 1; every
/// following line advances the line number, blank ones included, but only
/// non-blank lines become rows.
pub fn parse_upload(text: &str) -> Result<Upload, UploadRejected> {
    if text.is_empty() {
        return Err(UploadRejected::EmptyFile);
    }
    let mut lines = text.lines();
    let header_line = match lines.next() {
        Some(l) if !l.trim().is_empty() && l.trim() != "\u{feff}" => l,
        _ => return Err(UploadRejected::MissingHeader),
    };
    let header = HeaderIndex::parse(header_line);

    let mut rows = Vec::new();
    let mut line_no = 1usize;
    for line in lines {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(RawRow::tokenize(line_no, line, &header));
    }
    Ok(Upload { header, rows })
}
