use crate::device::{Device, PenCommand};

/// Display-mode flag from the image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// One display window
    Single,
    /// Two display windows
    Dual,
}

impl DisplayMode {
    /// Decode the header byte: 0 is single, anything else is dual
    pub fn from_flag(flag: u8) -> Self {
        if flag == 0 {
            DisplayMode::Single
        } else {
            DisplayMode::Dual
        }
    }
}

/// Address windows claimed by the display devices of a given mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLayout {
    pub windows: Vec<(u16, usize)>,
}

impl DisplayLayout {
    const DISPLAY_BASE: u16 = 0x8000;
    const SINGLE_SIZE: usize = 0x4000;
    const DUAL_SIZE: usize = 0x2000;

    pub fn for_mode(mode: DisplayMode) -> Self {
        let windows = match mode {
            DisplayMode::Single => vec![(Self::DISPLAY_BASE, Self::SINGLE_SIZE)],
            DisplayMode::Dual => vec![
                (Self::DISPLAY_BASE, Self::DUAL_SIZE),
                (Self::DISPLAY_BASE + Self::DUAL_SIZE as u16, Self::DUAL_SIZE),
            ],
        };
        Self { windows }
    }

    /// Build one display device per window
    pub fn devices(&self) -> Vec<DisplayDevice> {
        self.windows
            .iter()
            .map(|&(base, size)| DisplayDevice::new(base, size))
            .collect()
    }
}

/// Memory-mapped display.
///
/// Keeps a private shadow of every byte written into its window plus the log
/// of pen commands, for a renderer to pick up. Rendering itself happens
/// elsewhere; `force_refresh` only marks the device dirty and counts.
pub struct DisplayDevice {
    base: u16,
    shadow: Vec<u8>,
    commands: Vec<PenCommand>,
    dirty: bool,
    refresh_count: u64,
}

impl DisplayDevice {
    pub fn new(base: u16, size: usize) -> Self {
        DisplayDevice {
            base,
            shadow: vec![0; size],
            commands: Vec::new(),
            dirty: false,
            refresh_count: 0,
        }
    }

    /// Pen commands received since the last reset
    pub fn commands(&self) -> &[PenCommand] {
        &self.commands
    }

    /// Drain the pen command log
    pub fn take_commands(&mut self) -> Vec<PenCommand> {
        std::mem::take(&mut self.commands)
    }

    /// True if a refresh was forced since the last [`DisplayDevice::clear_dirty`]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }

    /// Everything written into the window so far
    pub fn shadow(&self) -> &[u8] {
        &self.shadow
    }
}

impl Device for DisplayDevice {
    fn reset(&mut self) {
        self.shadow.fill(0);
        self.commands.clear();
        self.dirty = false;
        self.refresh_count = 0;
    }

    fn poke(&mut self, address: u16, value: u8) {
        if self.owns(address) {
            let offset = (address - self.base) as usize;
            self.shadow[offset] = value;
        }
    }

    fn peek(&self, address: u16) -> u8 {
        if self.owns(address) {
            self.shadow[(address - self.base) as usize]
        } else {
            0
        }
    }

    fn force_refresh(&mut self) {
        self.dirty = true;
        self.refresh_count += 1;
    }

    fn pen(&mut self, command: PenCommand) {
        self.commands.push(command);
    }

    fn window_base(&self) -> u16 {
        self.base
    }

    fn window_size(&self) -> usize {
        self.shadow.len()
    }
}
