#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

#[derive(Clone, Default)]
pub struct Joypad {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub a: bool,
    pub b: bool,
    pub start: bool,
    pub select: bool,
}

impl Joypad {
    pub fn new() -> Joypad {
        Joypad::default()
    }

    /// Returns true when the button went from released to pressed.
    pub fn update_button(&mut self, button: Button, pressed: bool) -> bool {
        let state = match button {
            Button::Up => &mut self.up,
            Button::Down => &mut self.down,
            Button::Left => &mut self.left,
            Button::Right => &mut self.right,
            Button::A => &mut self.a,
            Button::B => &mut self.b,
            Button::Start => &mut self.start,
            Button::Select => &mut self.select,
        };

        let newly_pressed = pressed && !*state;
        *state = pressed;
        newly_pressed
    }

    /// P1 as the CPU sees it: `joypad_state` holds the select bits last written.
    pub fn as_u8(&self, joypad_state: u8) -> u8 {
        let button_select = joypad_state & 0b0010_0000 == 0;
        let direction_select = joypad_state & 0b0001_0000 == 0;

        let mut pressed = 0;

        if button_select {
            if self.start {
                pressed |= 0b0000_1000;
            }
            if self.select {
                pressed |= 0b0000_0100;
            }
            if self.b {
                pressed |= 0b0000_0010;
            }
            if self.a {
                pressed |= 0b0000_0001;
            }
        }
        if direction_select {
            if self.down {
                pressed |= 0b0000_1000;
            }
            if self.up {
                pressed |= 0b0000_0100;
            }
            if self.left {
                pressed |= 0b0000_0010;
            }
            if self.right {
                pressed |= 0b0000_0001;
            }
        }

        0b1100_0000 | (joypad_state & 0b0011_0000) | (!pressed & 0b0000_1111)
    }
}
