use crate::error::GbError;
use crate::hardware::Hardware;
use crate::lr35902::irq::Interrupt;
use crate::memory::registers::{LcdControl, LcdStatus};
use crate::video::palette::{self, Color};
use crate::video::state::*;
use crate::video::tile::{TileAttributes, TileRow};
use crate::video::*;
use log::{debug, trace};

/// Pixel processing unit.
///
/// The state machine advances only through clock callbacks: entering a phase
/// schedules the transition out of it. Disabling the LCD parks the machine by
/// bumping `epoch`, which turns every callback scheduled before into a no-op.
pub struct Ppu {
    state: State,
    enabled: bool,
    epoch: u64,
    background: Vec<Color>,
    frame: Vec<Color>,
    screen: Vec<u8>,
    frames: u64,
}

impl Ppu {
    pub fn new() -> Ppu {
        Ppu {
            state: State::HBlank,
            enabled: false,
            epoch: 0,
            background: vec![palette::BLACK; BACKGROUND_WIDTH * BACKGROUND_HEIGHT],
            frame: vec![palette::BLACK; SCREEN_WIDTH * SCREEN_HEIGHT],
            screen: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT * 4],
            frames: 0,
        }
    }

    /// Hooks the PPU onto LCDC and starts scanning if the display is on.
    pub fn install(hw: &mut Hardware) {
        hw.watch(LCD_CONTROL_REGISTER, Ppu::on_control_write);

        if hw.mmu.read_as_io::<LcdControl>(LCD_CONTROL_REGISTER).contains(LcdControl::LCD_DISPLAY) {
            Ppu::start(hw);
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Frames presented so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Last presented frame, RGBA8888, `SCREEN_WIDTH` x `SCREEN_HEIGHT`.
    #[inline]
    pub fn emulated_frame(&self) -> &[u8] {
        &self.screen
    }

    /// The full 256x256 background surface as composited so far.
    #[inline]
    pub fn background(&self) -> &[Color] {
        &self.background
    }

    fn on_control_write(hw: &mut Hardware, data: u8) -> Result<(), GbError> {
        let display = LcdControl::from(data).contains(LcdControl::LCD_DISPLAY);

        match (hw.ppu.enabled, display) {
            (false, true) => {
                debug!("LCD enabled");
                Ppu::start(hw);
            }
            (true, false) => {
                debug!("LCD disabled");
                Ppu::park(hw);
            }
            _ => {}
        }

        Ok(())
    }

    fn start(hw: &mut Hardware) {
        hw.ppu.enabled = true;
        hw.ppu.epoch += 1;
        Ppu::set_scanline(hw, 0);
        Ppu::enter(hw, State::OamScan);
    }

    fn park(hw: &mut Hardware) {
        hw.ppu.enabled = false;
        hw.ppu.epoch += 1;
        hw.ppu.state = State::HBlank;
        hw.mmu.write_io(SCANLINE_Y_REGISTER, 0);
        Ppu::update_status(hw, false);
    }

    /// Schedules `next` unless the PPU got parked or restarted in the meantime.
    fn schedule(hw: &mut Hardware, delay: u64, next: fn(&mut Hardware)) {
        let epoch = hw.ppu.epoch;
        hw.clock.schedule(delay, move |hw: &mut Hardware| {
            if hw.ppu.enabled && hw.ppu.epoch == epoch {
                next(hw);
            }
            Ok(())
        });
    }

    fn enter(hw: &mut Hardware, state: State) {
        trace!("PPU: {:?} on line {}", state, hw.mmu.read_io(SCANLINE_Y_REGISTER));
        hw.ppu.state = state;
        Ppu::update_status(hw, true);

        match state {
            State::OamScan => {
                Ppu::schedule(hw, OAM_SCAN_CYCLES, |hw| Ppu::enter(hw, State::Drawing));
            }
            State::Drawing => {
                Ppu::render_scanline(hw);
                Ppu::schedule(hw, DRAWING_CYCLES, |hw| Ppu::enter(hw, State::HBlank));
            }
            State::HBlank => {
                Ppu::schedule(hw, HBLANK_CYCLES, Ppu::end_hblank);
            }
            State::VBlank => {
                Ppu::present(hw);
                hw.mmu.request_interrupt(Interrupt::VBlank);
                Ppu::schedule(hw, SCANLINE_CYCLES, Ppu::next_vblank_line);
            }
        }
    }

    fn end_hblank(hw: &mut Hardware) {
        let line = hw.mmu.read_io(SCANLINE_Y_REGISTER) + 1;
        Ppu::set_scanline(hw, line);

        if line == VISIBLE_LINES {
            Ppu::enter(hw, State::VBlank);
        } else {
            Ppu::enter(hw, State::OamScan);
        }
    }

    fn next_vblank_line(hw: &mut Hardware) {
        let line = hw.mmu.read_io(SCANLINE_Y_REGISTER) + 1;

        if line == TOTAL_LINES {
            Ppu::set_scanline(hw, 0);
            Ppu::enter(hw, State::OamScan);
        } else {
            Ppu::set_scanline(hw, line);
            Ppu::schedule(hw, SCANLINE_CYCLES, Ppu::next_vblank_line);
        }
    }

    fn set_scanline(hw: &mut Hardware, line: u8) {
        hw.mmu.write_io(SCANLINE_Y_REGISTER, line);
        Ppu::update_status(hw, false);
    }

    /// Publishes mode and coincidence in STAT and raises the STAT interrupt when
    /// one of its enabled conditions holds. Mode sources only count on a mode change.
    fn update_status(hw: &mut Hardware, mode_changed: bool) {
        let mut status = hw.mmu.read_as_io::<LcdStatus>(LCD_STATUS_REGISTER);
        let ly = hw.mmu.read_io(SCANLINE_Y_REGISTER);
        let lyc = hw.mmu.read_io(SCANLINE_Y_COMPARE_REGISTER);
        let coincidence = ly == lyc;

        status.remove(LcdStatus::MODE);
        status.insert(LcdStatus::from_bits_retain(hw.ppu.state.as_u8()));
        status.set(LcdStatus::COINCIDENCE, coincidence);
        hw.mmu.write_io(LCD_STATUS_REGISTER, 0b1000_0000 | status.bits());

        if !hw.ppu.enabled {
            return;
        }

        let mode_source = match hw.ppu.state {
            State::HBlank => LcdStatus::HBLANK_INTERRUPT,
            State::VBlank => LcdStatus::VBLANK_INTERRUPT,
            State::OamScan => LcdStatus::OAM_INTERRUPT,
            State::Drawing => LcdStatus::empty(),
        };

        let coincidence_hit = coincidence && status.contains(LcdStatus::COINCIDENCE_INTERRUPT);
        let mode_hit = mode_changed && !mode_source.is_empty() && status.contains(mode_source);
        if coincidence_hit || mode_hit {
            hw.mmu.request_interrupt(Interrupt::LcdStat);
        }
    }

    /// Composites the background row under the current scanline into the
    /// 256x256 surface and copies the visible slice into the frame.
    fn render_scanline(hw: &mut Hardware) {
        let ly = hw.mmu.read_io(SCANLINE_Y_REGISTER);
        if ly >= VISIBLE_LINES {
            return;
        }

        let control = hw.mmu.read_as_io::<LcdControl>(LCD_CONTROL_REGISTER);
        let scroll_y = hw.mmu.read_io(SCROLL_Y_REGISTER);
        let scroll_x = hw.mmu.read_io(SCROLL_X_REGISTER);
        let tile_map = if control.contains(LcdControl::BG_TILE_MAP) {
            TILEMAP_1_ADDRESS
        } else {
            TILEMAP_0_ADDRESS
        };

        let bg_y = ly.wrapping_add(scroll_y);
        let row_start = bg_y as usize * BACKGROUND_WIDTH;

        for column in 0..32u16 {
            let map_address = tile_map + (bg_y as u16 / 8) * 32 + column;
            let index = hw.mmu.read_from_vram(map_address, 0);
            let attributes = TileAttributes::from(hw.mmu.read_from_vram(map_address, 1));
            let row = TileRow::from(&hw.mmu, index, attributes, bg_y % 8);

            for (x, color) in row.colors.iter().enumerate() {
                let rgb = hw.mmu.cram.fetch_bg(attributes.palette(), *color);
                hw.ppu.background[row_start + column as usize * 8 + x] = palette::from_rgb555(rgb);
            }
        }

        let line_start = ly as usize * SCREEN_WIDTH;
        for x in 0..SCREEN_WIDTH {
            let bg_x = (x + scroll_x as usize) % BACKGROUND_WIDTH;
            hw.ppu.frame[line_start + x] = hw.ppu.background[row_start + bg_x];
        }
    }

    fn present(hw: &mut Hardware) {
        let ppu = &mut hw.ppu;
        for (pixel, color) in ppu.screen.chunks_exact_mut(4).zip(ppu.frame.iter()) {
            pixel.copy_from_slice(color);
        }
        ppu.frames += 1;
        trace!("PPU: Presented frame {}", ppu.frames);
    }
}

impl Default for Ppu {
    fn default() -> Ppu {
        Ppu::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::tests::hardware;
    use crate::memory::{
        BACKGROUND_PALETTE_DATA_REGISTER, BACKGROUND_PALETTE_INDEX_REGISTER, INTERRUPT_FLAGS_REGISTER,
        VRAM_BANK_REGISTER,
    };

    fn mode(hw: &Hardware) -> u8 {
        hw.read(LCD_STATUS_REGISTER).unwrap() & 0b11
    }

    fn ly(hw: &Hardware) -> u8 {
        hw.read(SCANLINE_Y_REGISTER).unwrap()
    }

    fn requested(hw: &Hardware, interrupt: Interrupt) -> bool {
        hw.mmu.interrupt_info().iter().any(|info| info.interrupt == interrupt && info.requested)
    }

    #[test]
    fn walks_through_a_full_frame() {
        let mut hw = hardware();
        hw.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        assert_eq!(mode(&hw), 2);
        assert_eq!(ly(&hw), 0);

        let mut vblanks = 0;
        for line in 0..VISIBLE_LINES {
            hw.advance(OAM_SCAN_CYCLES).unwrap();
            assert_eq!(mode(&hw), 2, "line {}", line);
            assert_eq!(ly(&hw), line);
            hw.advance(DRAWING_CYCLES).unwrap();
            assert_eq!(mode(&hw), 3, "line {}", line);
            hw.advance(HBLANK_CYCLES).unwrap();
            assert_eq!(mode(&hw), 0, "line {}", line);

            if requested(&hw, Interrupt::VBlank) {
                vblanks += 1;
            }
        }
        assert_eq!(vblanks, 0);

        hw.advance(VBLANK_CYCLES).unwrap();
        assert_eq!(mode(&hw), 1);
        assert!(requested(&hw, Interrupt::VBlank));
        assert_eq!(ly(&hw), 153);
        assert_eq!(hw.ppu.frames(), 1);

        hw.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        hw.advance(OAM_SCAN_CYCLES).unwrap();
        assert_eq!(mode(&hw), 2);
        assert_eq!(ly(&hw), 0);
        assert!(!requested(&hw, Interrupt::VBlank));
    }

    #[test]
    fn vblank_interrupt_once_per_frame() {
        let mut hw = hardware();
        hw.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();

        let frame = SCANLINE_CYCLES * TOTAL_LINES as u64;
        let mut count = 0;
        for _ in 0..(frame * 3 / 4) {
            hw.advance(4).unwrap();
            if requested(&hw, Interrupt::VBlank) {
                count += 1;
                hw.mmu.unrequest_interrupt(Interrupt::VBlank);
            }
        }

        assert_eq!(count, 3);
        assert_eq!(hw.ppu.frames(), 3);
    }

    #[test]
    fn disabling_parks_and_enabling_restarts() {
        let mut hw = hardware();
        hw.advance(SCANLINE_CYCLES * 5 + 100).unwrap();
        assert_eq!(ly(&hw), 5);

        let control = hw.read(LCD_CONTROL_REGISTER).unwrap();
        hw.write(LCD_CONTROL_REGISTER, control & 0x7f).unwrap();
        assert!(!hw.ppu.is_enabled());
        assert_eq!(ly(&hw), 0);
        assert_eq!(mode(&hw), 0);

        hw.advance(SCANLINE_CYCLES * 20).unwrap();
        assert_eq!(ly(&hw), 0);
        assert_eq!(mode(&hw), 0);

        hw.write(LCD_CONTROL_REGISTER, control).unwrap();
        assert_eq!(mode(&hw), 2);
        hw.advance(OAM_SCAN_CYCLES + 1).unwrap();
        assert_eq!(mode(&hw), 3);
        hw.advance(SCANLINE_CYCLES).unwrap();
        assert_eq!(ly(&hw), 1);
    }

    #[test]
    fn quick_toggle_does_not_double_the_state_machine() {
        let mut hw = hardware();
        let control = hw.read(LCD_CONTROL_REGISTER).unwrap();

        hw.advance(40).unwrap();
        hw.write(LCD_CONTROL_REGISTER, control & 0x7f).unwrap();
        hw.write(LCD_CONTROL_REGISTER, control).unwrap();

        // Only the restarted chain is live: the stale 80 cycle transition is dropped
        hw.advance(50).unwrap();
        assert_eq!(mode(&hw), 2);
        hw.advance(40).unwrap();
        assert_eq!(mode(&hw), 3);
    }

    #[test]
    fn stat_interrupt_on_enabled_mode() {
        let mut hw = hardware();
        hw.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        hw.write(SCANLINE_Y_COMPARE_REGISTER, 0xff).unwrap();
        hw.write(LCD_STATUS_REGISTER, LcdStatus::HBLANK_INTERRUPT.bits()).unwrap();

        hw.advance(OAM_SCAN_CYCLES + DRAWING_CYCLES).unwrap();
        assert!(!requested(&hw, Interrupt::LcdStat));
        hw.advance(1).unwrap();
        assert!(requested(&hw, Interrupt::LcdStat));
    }

    #[test]
    fn coincidence_bit_and_interrupt() {
        let mut hw = hardware();
        hw.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        hw.write(SCANLINE_Y_COMPARE_REGISTER, 3).unwrap();
        hw.write(LCD_STATUS_REGISTER, LcdStatus::COINCIDENCE_INTERRUPT.bits()).unwrap();

        hw.advance(SCANLINE_CYCLES * 2 + 1).unwrap();
        assert_eq!(hw.read(LCD_STATUS_REGISTER).unwrap() & 0b100, 0);
        assert!(!requested(&hw, Interrupt::LcdStat));

        hw.advance(SCANLINE_CYCLES).unwrap();
        assert_eq!(ly(&hw), 3);
        assert_ne!(hw.read(LCD_STATUS_REGISTER).unwrap() & 0b100, 0);
        assert!(requested(&hw, Interrupt::LcdStat));
    }

    fn write_palette(hw: &mut Hardware, slot: u8, colors: [u16; 4]) {
        hw.write(BACKGROUND_PALETTE_INDEX_REGISTER, 0x80 | (slot * 8)).unwrap();
        for color in colors {
            let [lo, hi] = color.to_le_bytes();
            hw.write(BACKGROUND_PALETTE_DATA_REGISTER, lo).unwrap();
            hw.write(BACKGROUND_PALETTE_DATA_REGISTER, hi).unwrap();
        }
    }

    #[test]
    fn renders_background_through_palettes() {
        let mut hw = hardware();
        write_palette(&mut hw, 0, [0x7fff, 0x001f, 0x03e0, 0x7c00]);
        write_palette(&mut hw, 2, [0x0000, 0x0000, 0x0000, 0x001f]);

        // Tile 1 is solid color 3, tile 0 stays color 0
        for offset in 0..16 {
            hw.write(0x8010 + offset, 0xff).unwrap();
        }
        // Second map cell uses tile 1 with palette 2
        hw.write(TILEMAP_0_ADDRESS + 1, 0x01).unwrap();
        hw.write(VRAM_BANK_REGISTER, 1).unwrap();
        hw.write(TILEMAP_0_ADDRESS + 1, 0x02).unwrap();
        hw.write(VRAM_BANK_REGISTER, 0).unwrap();

        let control = hw.read(LCD_CONTROL_REGISTER).unwrap();
        hw.write(LCD_CONTROL_REGISTER, control & !LcdControl::BG_TILE_MAP.bits()).unwrap();

        hw.advance(SCANLINE_CYCLES * TOTAL_LINES as u64).unwrap();
        assert_eq!(hw.ppu.frames(), 1);

        let frame = hw.ppu.emulated_frame();
        assert_eq!(&frame[0..4], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(&frame[8 * 4..8 * 4 + 4], &[0xff, 0x00, 0x00, 0xff]);
        assert_eq!(&frame[16 * 4..16 * 4 + 4], &[0xff, 0xff, 0xff, 0xff]);
        // Every visible line of that map row repeats the pattern
        let line_7 = 7 * SCREEN_WIDTH * 4;
        assert_eq!(&frame[line_7 + 8 * 4..line_7 + 8 * 4 + 4], &[0xff, 0x00, 0x00, 0xff]);
    }

    #[test]
    fn scroll_wraps_around_the_background() {
        let mut hw = hardware();
        write_palette(&mut hw, 0, [0x0000, 0x0000, 0x0000, 0x7fff]);
        for offset in 0..16 {
            hw.write(0x8010 + offset, 0xff).unwrap();
        }
        // Last cell of the first map row is white
        hw.write(TILEMAP_0_ADDRESS + 31, 0x01).unwrap();
        let control = hw.read(LCD_CONTROL_REGISTER).unwrap();
        hw.write(LCD_CONTROL_REGISTER, control & !LcdControl::BG_TILE_MAP.bits()).unwrap();
        hw.write(SCROLL_X_REGISTER, 248).unwrap();

        hw.advance(SCANLINE_CYCLES * TOTAL_LINES as u64).unwrap();

        let frame = hw.ppu.emulated_frame();
        assert_eq!(&frame[0..4], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(&frame[7 * 4..7 * 4 + 4], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(&frame[8 * 4..8 * 4 + 4], &[0x00, 0x00, 0x00, 0xff]);
        assert_eq!(hw.ppu.background()[248], [0xff, 0xff, 0xff, 0xff]);
    }
}
