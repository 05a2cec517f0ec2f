use std::collections::BTreeMap;

/// Address to source-line mapping recovered from an image's debug table.
///
/// Only consulted by the debug-position hook; execution never looks at it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugSymbolTable {
    lines: BTreeMap<u16, String>,
}

impl DebugSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from (address, line) records. A later record for the
    /// same address replaces an earlier one.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (u16, String)>,
    {
        Self {
            lines: records.into_iter().collect(),
        }
    }

    /// Source line recorded for exactly `pc`
    pub fn line_for(&self, pc: u16) -> Option<&str> {
        self.lines.get(&pc).map(String::as_str)
    }

    /// Closest record at or below `pc`
    pub fn nearest(&self, pc: u16) -> Option<(u16, &str)> {
        self.lines
            .range(..=pc)
            .next_back()
            .map(|(&addr, line)| (addr, line.as_str()))
    }

    /// Records in address order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.lines.iter().map(|(&addr, line)| (addr, line.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
