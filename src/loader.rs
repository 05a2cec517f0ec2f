use std::path::Path;

use log::info;

use crate::bus::{ADDRESS_SPACE_SIZE, MemoryBus};
use crate::display::DisplayMode;
use crate::error::LoadError;
use crate::symbols::DebugSymbolTable;

/// Magic tag at the start of every image ("B33")
pub const MAGIC: [u8; 3] = [0x42, 0x33, 0x33];

/// Size of the fixed image header
pub const HEADER_SIZE: usize = 10;

/// A parsed B33 program image
///
/// Header layout (multi-byte fields little-endian):
/// - `[0..3)` magic "B33"
/// - `[3..5)` load address
/// - `[5..7)` entry address
/// - `[7..9)` debug table pointer (0 = none)
/// - `[9]`    display mode flag (0 = single, else dual)
/// - `[10..)` payload, loaded verbatim at the load address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    load_address: u16,
    entry_address: u16,
    debug_pointer: u16,
    display_mode: DisplayMode,
    payload: Vec<u8>,
    symbols: DebugSymbolTable,
}

impl ProgramImage {
    /// Parse and validate image bytes. Nothing is loaded anywhere yet.
    pub fn parse(data: &[u8]) -> Result<Self, LoadError> {
        if data.len() < HEADER_SIZE {
            return Err(LoadError::Truncated { len: data.len() });
        }
        if data[0..3] != MAGIC {
            return Err(LoadError::BadMagic([data[0], data[1], data[2]]));
        }

        let load_address = u16::from_le_bytes([data[3], data[4]]);
        let entry_address = u16::from_le_bytes([data[5], data[6]]);
        let debug_pointer = u16::from_le_bytes([data[7], data[8]]);
        let display_mode = DisplayMode::from_flag(data[9]);
        let payload = data[HEADER_SIZE..].to_vec();

        if load_address as usize + payload.len() > ADDRESS_SPACE_SIZE {
            return Err(LoadError::PayloadOverflow {
                load_address,
                len: payload.len(),
            });
        }

        let symbols = if debug_pointer != 0 {
            parse_debug_table(&payload, load_address, debug_pointer)?
        } else {
            DebugSymbolTable::new()
        };

        Ok(Self {
            load_address,
            entry_address,
            debug_pointer,
            display_mode,
            payload,
            symbols,
        })
    }

    /// Read and parse an image file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let data = std::fs::read(path)?;
        Self::parse(&data)
    }

    /// Copy the payload into the bus at the load address
    pub fn load_into(&self, bus: &MemoryBus) {
        info!(
            "Loading {} bytes at {:04X}, entry {:04X}, {} debug lines",
            self.payload.len(),
            self.load_address,
            self.entry_address,
            self.symbols.len()
        );
        bus.load(self.load_address, &self.payload);
    }

    pub fn load_address(&self) -> u16 {
        self.load_address
    }

    pub fn entry_address(&self) -> u16 {
        self.entry_address
    }

    pub fn debug_pointer(&self) -> u16 {
        self.debug_pointer
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn symbols(&self) -> &DebugSymbolTable {
        &self.symbols
    }
}

/// Walk the {address, NUL-terminated text} records at `pointer` until a
/// record whose address is 0x0000
fn parse_debug_table(
    payload: &[u8],
    load_address: u16,
    pointer: u16,
) -> Result<DebugSymbolTable, LoadError> {
    let start = (pointer as usize)
        .checked_sub(load_address as usize)
        .filter(|&offset| offset < payload.len())
        .ok_or(LoadError::DebugTableOutOfRange { pointer })?;

    let mut records = Vec::new();
    let mut offset = start;
    loop {
        let address_bytes = payload
            .get(offset..offset + 2)
            .ok_or(LoadError::TruncatedDebugTable { offset })?;
        let address = u16::from_le_bytes([address_bytes[0], address_bytes[1]]);
        if address == 0 {
            break;
        }

        let text_start = offset + 2;
        let text_len = payload
            .get(text_start..)
            .and_then(|rest| rest.iter().position(|&b| b == 0))
            .ok_or(LoadError::TruncatedDebugTable { offset: text_start })?;
        let text = &payload[text_start..text_start + text_len];
        records.push((address, String::from_utf8_lossy(text).into_owned()));

        offset = text_start + text_len + 1;
    }

    Ok(DebugSymbolTable::from_records(records))
}
