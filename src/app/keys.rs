//! Keyboard commands.
//!
//! Debug keys simulate sensor input through the same event path the serial
//! decoder feeds, so an installation can be exercised without the controller.

use crate::sensor::PhotoId;

/// Keys the runners forward to the installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Quits.
    Escape,
    /// Toggles fullscreen.
    F11,
    /// A printable key, lowercase.
    Char(char),
}

/// Something the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Leave the control loop.
    Quit,
    /// Switch between windowed and fullscreen.
    ToggleFullscreen,
    /// Stop the current video and show blank.
    Stop,
    /// Pretend the current tag left the reader.
    SimulateTagLost,
    /// Pretend the tag with this table index was detected.
    SimulateTag(usize),
    /// Flip a photoresistor.
    TogglePhoto(PhotoId),
}

/// Default key bindings.
///
/// | key | command |
/// |-----|---------|
/// | `Esc` | quit |
/// | `F11` | toggle fullscreen |
/// | `s` | stop |
/// | `d` | tag lost |
/// | `f` `g` `h` `j` | tag 1 to 4 detected |
/// | `v` `b` `n` | toggle photoresistor 1 to 3 |
pub fn command_for_key(key: Key) -> Option<Command> {
    let command = match key {
        Key::Escape => Command::Quit,
        Key::F11 => Command::ToggleFullscreen,
        Key::Char(c) => match c.to_ascii_lowercase() {
            's' => Command::Stop,
            'd' => Command::SimulateTagLost,
            'f' => Command::SimulateTag(1),
            'g' => Command::SimulateTag(2),
            'h' => Command::SimulateTag(3),
            'j' => Command::SimulateTag(4),
            'v' => Command::TogglePhoto(PhotoId::One),
            'b' => Command::TogglePhoto(PhotoId::Two),
            'n' => Command::TogglePhoto(PhotoId::Three),
            _ => return None,
        },
    };
    Some(command)
}
