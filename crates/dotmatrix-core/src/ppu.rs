use log::debug;

use crate::bus::{Bus, REG_BGP, REG_IF, REG_LCDC, REG_LY, REG_LYC, REG_SCX, REG_SCY, REG_STAT};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

// Timing constants per LCD mode in T-cycles
const MODE0_CYCLES: u16 = 204; // HBlank
const MODE1_CYCLES: u16 = 456; // One line during VBlank
const MODE2_CYCLES: u16 = 80; // OAM scan
const MODE3_CYCLES: u16 = 172; // Pixel transfer

/// Dots in one full frame, V-Blank included.
pub const DOTS_PER_FRAME: u32 = 70224;

// Number of lines spent in VBlank
const VBLANK_LINES: u8 = 10;

// VRAM layout
const BG_MAP_0_BASE: u16 = 0x9800;
const BG_MAP_1_BASE: u16 = 0x9C00;
const TILE_DATA_0_BASE: u16 = 0x8000;
const TILE_DATA_1_BASE: u16 = 0x8800;

// LCDC bits
const LCDC_ENABLE: u8 = 0x80;
const LCDC_TILE_DATA: u8 = 0x10;
const LCDC_BG_MAP: u8 = 0x08;
const LCDC_BG_ENABLE: u8 = 0x01;

pub type Rgb = [u8; 3];

/// The visible screen, row-major: `frame[line][x]`.
pub type FrameBuffer = [[Rgb; SCREEN_WIDTH]; SCREEN_HEIGHT];

/// LCD mode as encoded in STAT bits 0-1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamScan = 2,
    Drawing = 3,
}

/// What a call to [`Ppu::step`] asks the rest of the machine to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PpuEvent {
    None,
    /// Line 144 was reached. IF bit 0 has already been raised on the bus;
    /// the CPU should be told to enable interrupts.
    VBlank,
}

/// RGB values for the four DMG shades, lightest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette(pub [Rgb; 4]);

impl Palette {
    pub const GRAYSCALE: Self = Self([[255, 255, 255], [192, 192, 192], [96, 96, 96], [0, 0, 0]]);

    #[inline(always)]
    pub fn shade(&self, index: u8) -> Rgb {
        self.0[(index & 0x03) as usize]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::GRAYSCALE
    }
}

pub struct Ppu {
    mode: Mode,
    mode_clock: u16,
    ly: u8,
    lcd_on: bool,
    palette: Palette,
    framebuffer: Box<FrameBuffer>,
    frame_counter: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self::with_palette(Palette::default())
    }

    pub fn with_palette(palette: Palette) -> Self {
        Self {
            mode: Mode::OamScan,
            mode_clock: 0,
            ly: 0,
            lcd_on: true,
            palette,
            framebuffer: Box::new([[palette.shade(0); SCREEN_WIDTH]; SCREEN_HEIGHT]),
            frame_counter: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    /// Dots accumulated in the current mode.
    pub fn dots(&self) -> u16 {
        self.mode_clock
    }

    /// Number of frames that have been completed since power on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Replace the shade colors. Already rendered rows keep their colors.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Returns the current framebuffer. Rows are replaced one at a time as
    /// their lines finish drawing, so a mid-frame read mixes two frames.
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// Publish LY and the STAT mode/coincidence bits to the bus.
    pub fn sync_registers<B: Bus>(&self, bus: &mut B) {
        bus.write(REG_LY, self.ly);
        let coincidence = if bus.read(REG_LYC) == self.ly { 0x04 } else { 0 };
        let stat = bus.read(REG_STAT);
        bus.write(REG_STAT, (stat & 0xF8) | 0x80 | coincidence | self.mode as u8);
    }

    /// Advance by `cycles` dots.
    pub fn step<B: Bus>(&mut self, cycles: u32, bus: &mut B) -> PpuEvent {
        let mut event = PpuEvent::None;
        let mut remaining = cycles;
        while remaining > 0 {
            let increment = remaining.min(4) as u16;
            remaining -= increment as u32;

            if bus.read(REG_LCDC) & LCDC_ENABLE == 0 {
                if self.lcd_on {
                    debug!("LCD switched off on line {}", self.ly);
                    self.lcd_on = false;
                }
                self.mode = Mode::OamScan;
                self.mode_clock = 0;
                self.ly = 0;
                self.sync_registers(bus);
                continue;
            }
            if !self.lcd_on {
                debug!("LCD switched on");
                self.lcd_on = true;
            }

            self.mode_clock += increment;

            match self.mode {
                Mode::OamScan => {
                    if self.mode_clock >= MODE2_CYCLES {
                        self.mode_clock -= MODE2_CYCLES;
                        self.mode = Mode::Drawing;
                        self.sync_registers(bus);
                    }
                }
                Mode::Drawing => {
                    if self.mode_clock >= MODE3_CYCLES {
                        self.mode_clock -= MODE3_CYCLES;
                        self.render_scanline(bus);
                        self.mode = Mode::HBlank;
                        self.sync_registers(bus);
                    }
                }
                Mode::HBlank => {
                    if self.mode_clock >= MODE0_CYCLES {
                        self.mode_clock -= MODE0_CYCLES;
                        self.ly += 1;
                        if self.ly as usize == SCREEN_HEIGHT {
                            self.mode = Mode::VBlank;
                            let if_reg = bus.read(REG_IF);
                            bus.write(REG_IF, if_reg | 0x01);
                            event = PpuEvent::VBlank;
                        } else {
                            self.mode = Mode::OamScan;
                        }
                        self.sync_registers(bus);
                    }
                }
                Mode::VBlank => {
                    if self.mode_clock >= MODE1_CYCLES {
                        self.mode_clock -= MODE1_CYCLES;
                        self.ly += 1;
                        if self.ly > SCREEN_HEIGHT as u8 + VBLANK_LINES - 1 {
                            self.ly = 0;
                            self.frame_counter = self.frame_counter.wrapping_add(1);
                            self.mode = Mode::OamScan;
                        }
                        self.sync_registers(bus);
                    }
                }
            }
        }
        event
    }

    #[inline(always)]
    fn dmg_shade(palette: u8, color_id: u8) -> u8 {
        (palette >> (color_id * 2)) & 0x03
    }

    /// Draw the background for the current line into its framebuffer row.
    fn render_scanline<B: Bus>(&mut self, bus: &mut B) {
        let line = self.ly as usize;
        if line >= SCREEN_HEIGHT {
            return;
        }
        let lcdc = bus.read(REG_LCDC);

        // With the background disabled the DMG outputs white, whatever BGP says.
        if lcdc & LCDC_BG_ENABLE == 0 {
            self.framebuffer[line] = [self.palette.shade(0); SCREEN_WIDTH];
            return;
        }

        let bgp = bus.read(REG_BGP);
        let scy = bus.read(REG_SCY);
        let scx = bus.read(REG_SCX);
        let tile_map_base = if lcdc & LCDC_BG_MAP != 0 {
            BG_MAP_1_BASE
        } else {
            BG_MAP_0_BASE
        };
        let unsigned_tiles = lcdc & LCDC_TILE_DATA != 0;

        let py = self.ly.wrapping_add(scy) as u16;
        let tile_row = py / 8;
        let tile_y = py % 8;

        for x in 0..SCREEN_WIDTH {
            let px = (x as u8).wrapping_add(scx) as u16;
            let tile_col = px / 8;
            let tile_index = bus.read(tile_map_base + tile_row * 32 + tile_col);
            let addr = if unsigned_tiles {
                TILE_DATA_0_BASE + tile_index as u16 * 16
            } else {
                TILE_DATA_1_BASE + (tile_index as i8 as i16 + 128) as u16 * 16
            };
            let lo = bus.read(addr + tile_y * 2);
            let hi = bus.read(addr + tile_y * 2 + 1);
            let bit = 7 - (px % 8);
            let color_id = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
            self.framebuffer[line][x] = self.palette.shade(Self::dmg_shade(bgp, color_id));
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Mmu;

    fn lcd_on_mmu() -> Mmu {
        let mut mmu = Mmu::new();
        mmu.write(REG_LCDC, 0x91);
        mmu.write(REG_BGP, 0xE4);
        mmu
    }

    #[test]
    fn mode_transitions_within_a_line() {
        let mut mmu = lcd_on_mmu();
        let mut ppu = Ppu::new();
        assert_eq!(ppu.mode(), Mode::OamScan);

        ppu.step(76, &mut mmu);
        assert_eq!(ppu.mode(), Mode::OamScan);
        ppu.step(4, &mut mmu);
        assert_eq!(ppu.mode(), Mode::Drawing);
        assert_eq!(mmu.read(REG_STAT) & 0x03, 3);

        ppu.step(172, &mut mmu);
        assert_eq!(ppu.mode(), Mode::HBlank);
        assert_eq!(mmu.read(REG_STAT) & 0x03, 0);

        ppu.step(204, &mut mmu);
        assert_eq!(ppu.mode(), Mode::OamScan);
        assert_eq!(ppu.ly(), 1);
        assert_eq!(mmu.read(REG_LY), 1);
        assert_eq!(ppu.dots(), 0);
    }

    #[test]
    fn overshoot_carries_into_next_mode() {
        let mut mmu = lcd_on_mmu();
        let mut ppu = Ppu::new();
        ppu.step(84, &mut mmu);
        assert_eq!(ppu.mode(), Mode::Drawing);
        assert_eq!(ppu.dots(), 4);
    }

    #[test]
    fn vblank_raises_interrupt_flag() {
        let mut mmu = lcd_on_mmu();
        mmu.write(REG_IF, 0x00);
        let mut ppu = Ppu::new();
        let mut events = 0;
        for _ in 0..144 * 456 / 4 {
            if ppu.step(4, &mut mmu) == PpuEvent::VBlank {
                events += 1;
            }
        }
        assert_eq!(events, 1);
        assert_eq!(ppu.mode(), Mode::VBlank);
        assert_eq!(ppu.ly(), 144);
        assert_eq!(mmu.read(REG_IF) & 0x01, 0x01);
        assert_eq!(mmu.read(REG_STAT) & 0x03, 1);
    }

    #[test]
    fn lcd_off_resets_line_and_renders_nothing() {
        let mut mmu = lcd_on_mmu();
        let mut ppu = Ppu::new();
        ppu.step(456 * 3 + 100, &mut mmu);
        assert_eq!(ppu.ly(), 3);

        mmu.write(REG_LCDC, 0x11);
        let before = *ppu.framebuffer();
        ppu.step(456 * 10, &mut mmu);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.dots(), 0);
        assert_eq!(ppu.mode(), Mode::OamScan);
        assert_eq!(mmu.read(REG_LY), 0);
        assert_eq!(mmu.read(REG_STAT) & 0x03, Mode::OamScan as u8);
        assert_eq!(*ppu.framebuffer(), before);

        mmu.write(REG_LCDC, 0x91);
        ppu.step(80, &mut mmu);
        assert_eq!(ppu.mode(), Mode::Drawing);
    }

    #[test]
    fn lyc_coincidence_is_mirrored_into_stat() {
        let mut mmu = lcd_on_mmu();
        mmu.write(REG_LYC, 2);
        let mut ppu = Ppu::new();
        ppu.step(456, &mut mmu);
        assert_eq!(mmu.read(REG_STAT) & 0x04, 0);
        ppu.step(456, &mut mmu);
        assert_eq!(ppu.ly(), 2);
        assert_eq!(mmu.read(REG_STAT) & 0x04, 0x04);
    }

    fn write_tile_row(mmu: &mut Mmu, addr: u16, lo: u8, hi: u8) {
        mmu.write(addr, lo);
        mmu.write(addr + 1, hi);
    }

    #[test]
    fn renders_unsigned_tile_data() {
        let mut mmu = lcd_on_mmu();
        // Tile 1, row 0: pixel colors 3,2,1,0,0,0,0,0
        write_tile_row(&mut mmu, 0x8010, 0b1010_0000, 0b1100_0000);
        mmu.write(0x9800, 1);
        let mut ppu = Ppu::new();
        ppu.render_scanline(&mut mmu);
        let row = ppu.framebuffer()[0];
        let p = Palette::GRAYSCALE;
        assert_eq!(row[0], p.shade(3));
        assert_eq!(row[1], p.shade(2));
        assert_eq!(row[2], p.shade(1));
        assert_eq!(row[3], p.shade(0));
        assert_eq!(row[8], p.shade(0));
    }

    #[test]
    fn renders_signed_tile_data() {
        let mut mmu = lcd_on_mmu();
        mmu.write(REG_LCDC, 0x81);
        // Index 0 resolves to 0x9000, index 0xFF to 0x8FF0.
        write_tile_row(&mut mmu, 0x9000, 0xFF, 0xFF);
        write_tile_row(&mut mmu, 0x8FF0, 0xFF, 0x00);
        mmu.write(0x9800, 0x00);
        mmu.write(0x9801, 0xFF);
        let mut ppu = Ppu::new();
        ppu.render_scanline(&mut mmu);
        let row = ppu.framebuffer()[0];
        assert_eq!(row[0], Palette::GRAYSCALE.shade(3));
        assert_eq!(row[8], Palette::GRAYSCALE.shade(1));
        assert_eq!(row[16], Palette::GRAYSCALE.shade(3));
    }

    #[test]
    fn scroll_wraps_around_the_map() {
        let mut mmu = lcd_on_mmu();
        // Tile 2 is solid color 3, placed in the last column of map row 31.
        for row in 0..8 {
            write_tile_row(&mut mmu, 0x8020 + row * 2, 0xFF, 0xFF);
        }
        mmu.write(0x9800 + 31 * 32 + 31, 2);
        mmu.write(REG_SCX, 248);
        mmu.write(REG_SCY, 248);
        let mut ppu = Ppu::new();
        ppu.render_scanline(&mut mmu);
        let row = ppu.framebuffer()[0];
        for x in 0..8 {
            assert_eq!(row[x], Palette::GRAYSCALE.shade(3), "x={x}");
        }
        assert_eq!(row[8], Palette::GRAYSCALE.shade(0));
    }

    #[test]
    fn palette_register_remaps_shades() {
        let mut mmu = lcd_on_mmu();
        mmu.write(REG_BGP, 0b0001_1011);
        let mut ppu = Ppu::new();
        ppu.render_scanline(&mut mmu);
        assert!(ppu.framebuffer()[0].iter().all(|&c| c == Palette::GRAYSCALE.shade(3)));
    }

    #[test]
    fn disabled_background_draws_white() {
        let mut mmu = lcd_on_mmu();
        for addr in 0x8000..0x8010 {
            mmu.write(addr, 0xFF);
        }
        mmu.write(REG_LCDC, 0x90);
        // Every color maps to black; the blank line must ignore BGP.
        mmu.write(REG_BGP, 0xFF);
        let mut ppu = Ppu::with_palette(Palette([[1, 1, 1], [2, 2, 2], [3, 3, 3], [4, 4, 4]]));
        ppu.render_scanline(&mut mmu);
        assert!(ppu.framebuffer()[0].iter().all(|&c| c == [1, 1, 1]));

        let mut ppu = Ppu::new();
        ppu.render_scanline(&mut mmu);
        assert_eq!(ppu.framebuffer()[0][0], [255, 255, 255]);
    }

    #[test]
    fn zero_tiles_render_a_white_row() {
        let mut mmu = lcd_on_mmu();
        assert_eq!(mmu.read(REG_BGP), 0b1110_0100);
        let mut ppu = Ppu::with_palette(Palette([[9, 9, 9], [0, 0, 0], [0, 0, 0], [0, 0, 0]]));
        ppu.render_scanline(&mut mmu);
        let row = ppu.framebuffer()[0];
        assert_eq!(row.len(), SCREEN_WIDTH);
        assert!(row.iter().all(|&c| c == [9, 9, 9]));
    }

    #[test]
    fn lcd_off_mid_line_publishes_mode() {
        let mut mmu = lcd_on_mmu();
        let mut ppu = Ppu::new();
        ppu.step(100, &mut mmu);
        assert_eq!(mmu.read(REG_STAT) & 0x03, Mode::Drawing as u8);

        mmu.write(REG_LCDC, 0x11);
        ppu.step(8, &mut mmu);
        assert_eq!(ppu.mode(), Mode::OamScan);
        assert_eq!(mmu.read(REG_STAT) & 0x03, Mode::OamScan as u8);
        // LY == LYC == 0 while the LCD is off.
        assert_eq!(mmu.read(REG_STAT) & 0x04, 0x04);
    }

    #[test]
    fn one_frame_walks_every_line() {
        let mut mmu = lcd_on_mmu();
        let mut ppu = Ppu::new();
        let mut transitions = Vec::new();
        let mut prev = (ppu.mode(), ppu.ly());
        for _ in 0..DOTS_PER_FRAME / 4 {
            ppu.step(4, &mut mmu);
            let now = (ppu.mode(), ppu.ly());
            if now != prev {
                transitions.push(now);
                prev = now;
            }
        }

        let drawn = transitions
            .iter()
            .filter(|(mode, _)| *mode == Mode::HBlank)
            .count();
        assert_eq!(drawn, SCREEN_HEIGHT);

        let vblank_lines: Vec<u8> = transitions
            .iter()
            .filter(|(mode, _)| *mode == Mode::VBlank)
            .map(|&(_, ly)| ly)
            .collect();
        assert_eq!(vblank_lines, (144..=153).collect::<Vec<u8>>());

        // Lines 0..144 each go OAM -> Drawing -> HBlank.
        for line in 0..SCREEN_HEIGHT as u8 {
            let seq: Vec<Mode> = transitions
                .iter()
                .filter(|&&(mode, ly)| ly == line && mode != Mode::VBlank)
                .map(|&(mode, _)| mode)
                .collect();
            let expected = if line == 0 {
                vec![Mode::Drawing, Mode::HBlank, Mode::OamScan]
            } else {
                vec![Mode::OamScan, Mode::Drawing, Mode::HBlank]
            };
            assert_eq!(seq, expected, "line {line}");
        }

        assert_eq!(transitions.last(), Some(&(Mode::OamScan, 0)));
        assert_eq!(ppu.frames(), 1);
        assert_eq!(ppu.dots(), 0);
    }

    #[test]
    fn replaced_palette_applies_to_later_lines() {
        let mut mmu = lcd_on_mmu();
        let mut ppu = Ppu::new();
        ppu.step(456, &mut mmu);
        let green = Palette([[224, 248, 208], [136, 192, 112], [52, 104, 86], [8, 24, 32]]);
        ppu.set_palette(green);
        assert_eq!(ppu.palette(), green);
        ppu.step(456, &mut mmu);
        assert_eq!(ppu.framebuffer()[0][0], [255, 255, 255]);
        assert_eq!(ppu.framebuffer()[1][0], [224, 248, 208]);
    }
}
