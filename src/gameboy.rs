use crate::error::GbError;
use crate::hardware::Hardware;
use crate::joypad::Button;
use crate::lr35902::cpu::Cpu;
use crate::lr35902::irq::Interrupt;
use crate::memory::mapper;
use crate::video::state::{SCANLINE_CYCLES, TOTAL_LINES};
use log::debug;

/// Upper bound for [`GameBoy::run_frame`] when the display is switched off
/// and never presents anything.
const FRAME_TIMEOUT_CYCLES: usize = 2 * SCANLINE_CYCLES as usize * TOTAL_LINES as usize;

pub struct GameBoy {
    pub cpu: Cpu,
    pub hardware: Hardware,
}

impl GameBoy {
    pub fn new(rom: Vec<u8>) -> Result<GameBoy, GbError> {
        let cartridge = mapper::from_cartridge(rom)?;

        Ok(GameBoy {
            cpu: Cpu::new(),
            hardware: Hardware::new(cartridge),
        })
    }

    #[inline]
    pub fn step(&mut self) -> Result<usize, GbError> {
        self.cpu.step(&mut self.hardware)
    }

    /// Steps until the PPU presents the next frame and returns the cycles spent.
    pub fn run_frame(&mut self) -> Result<usize, GbError> {
        let frame = self.hardware.ppu.frames();
        let mut cycles = 0;

        while self.hardware.ppu.frames() == frame && cycles < FRAME_TIMEOUT_CYCLES {
            cycles += self.step()?;
        }

        Ok(cycles)
    }

    /// Last presented frame, RGBA8888.
    #[inline]
    pub fn frame(&self) -> &[u8] {
        self.hardware.ppu.emulated_frame()
    }

    pub fn update_button(&mut self, button: Button, pressed: bool) {
        if self.hardware.mmu.joypad.update_button(button, pressed) {
            debug!("{:?} pressed", button);
            self.hardware.mmu.request_interrupt(Interrupt::Joypad);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{INTERRUPT_FLAGS_REGISTER, JOYPAD_REGISTER};
    use crate::video::{LCD_CONTROL_REGISTER, SCREEN_HEIGHT, SCREEN_WIDTH};

    const FRAME_CYCLES: usize = SCANLINE_CYCLES as usize * TOTAL_LINES as usize;

    /// Plain ROM whose entry point spins on `jr -2`.
    fn spinning_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0100] = 0x18;
        rom[0x0101] = 0xfe;
        rom
    }

    #[test]
    fn rejects_unusable_images() {
        assert!(matches!(
            GameBoy::new(vec![0u8; 0x100]),
            Err(GbError::CartridgeTooSmall { size: 0x100 })
        ));

        let mut rom = spinning_rom();
        rom[0x0147] = 0x1b;
        assert!(matches!(GameBoy::new(rom), Err(GbError::UnsupportedCartridge { kind: 0x1b })));
    }

    #[test]
    fn frames_come_once_per_frame_period() {
        let mut gb = GameBoy::new(spinning_rom()).unwrap();

        gb.run_frame().unwrap();
        assert_eq!(gb.hardware.ppu.frames(), 1);

        let cycles = gb.run_frame().unwrap();
        assert_eq!(gb.hardware.ppu.frames(), 2);
        assert!(cycles.abs_diff(FRAME_CYCLES) <= 12, "{} cycles", cycles);

        assert_eq!(gb.frame().len(), SCREEN_WIDTH * SCREEN_HEIGHT * 4);
        assert_eq!(gb.cpu.registers.pc, 0x0100);
    }

    #[test]
    fn run_frame_gives_up_with_the_display_off() {
        let mut gb = GameBoy::new(spinning_rom()).unwrap();
        gb.hardware.write(LCD_CONTROL_REGISTER, 0x11).unwrap();

        let cycles = gb.run_frame().unwrap();
        assert!(cycles >= 2 * FRAME_CYCLES);
        assert_eq!(gb.hardware.ppu.frames(), 0);
    }

    #[test]
    fn pressing_a_button_requests_the_joypad_interrupt() {
        let mut gb = GameBoy::new(spinning_rom()).unwrap();
        gb.hardware.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        gb.hardware.write(JOYPAD_REGISTER, 0x10).unwrap();

        gb.update_button(Button::A, true);
        assert!(gb.hardware.mmu.interrupt_info()[4].requested);
        assert_eq!(gb.hardware.read(JOYPAD_REGISTER).unwrap(), 0b1101_1110);

        gb.hardware.write(INTERRUPT_FLAGS_REGISTER, 0x00).unwrap();
        gb.update_button(Button::A, true);
        assert!(!gb.hardware.mmu.interrupt_info()[4].requested);
    }
}
