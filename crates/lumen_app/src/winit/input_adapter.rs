//! Translates winit key events into platform-independent [`Key`]s.

use winit::keyboard::{KeyCode, PhysicalKey};

use crate::input::Key;

#[must_use]
pub fn translate_key(physical_key: PhysicalKey) -> Option<Key> {
    let PhysicalKey::Code(code) = physical_key else {
        return None;
    };

    let key = match code {
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::KeyT => Key::T,
        KeyCode::Escape => Key::Escape,
        _ => return None,
    };
    Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NativeKeyCode;

    #[test]
    fn function_keys_translate() {
        assert_eq!(translate_key(PhysicalKey::Code(KeyCode::F2)), Some(Key::F2));
        assert_eq!(translate_key(PhysicalKey::Code(KeyCode::KeyT)), Some(Key::T));
        assert_eq!(translate_key(PhysicalKey::Code(KeyCode::KeyQ)), None);
        assert_eq!(
            translate_key(PhysicalKey::Unidentified(NativeKeyCode::Unidentified)),
            None
        );
    }
}
