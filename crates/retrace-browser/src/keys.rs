//! CDP key descriptors and modifier masks

#[derive(Debug)]
pub struct KeyDescriptor {
    pub key: String,
    pub code: String,
    pub virtual_key_code: u32,
    pub text: Option<String>,
}

fn descriptor(key: &str, code: &str, virtual_key_code: u32, text: Option<&str>) -> KeyDescriptor {
    KeyDescriptor {
        key: key.to_string(),
        code: code.to_string(),
        virtual_key_code,
        text: text.map(ToString::to_string),
    }
}

/// Resolve a recorded key value to a CDP key descriptor. Named keys map to
/// their key constants, single characters fall back to their own code, and
/// anything else defaults to Enter.
pub fn key_descriptor(key: &str) -> KeyDescriptor {
    let normalized = key.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "enter" => descriptor("Enter", "Enter", 13, Some("\r")),
        "tab" => descriptor("Tab", "Tab", 9, Some("\t")),
        "escape" | "esc" => descriptor("Escape", "Escape", 27, None),
        "backspace" => descriptor("Backspace", "Backspace", 8, None),
        "delete" => descriptor("Delete", "Delete", 46, None),
        "arrowup" | "up" => descriptor("ArrowUp", "ArrowUp", 38, None),
        "arrowdown" | "down" => descriptor("ArrowDown", "ArrowDown", 40, None),
        "arrowleft" | "left" => descriptor("ArrowLeft", "ArrowLeft", 37, None),
        "arrowright" | "right" => descriptor("ArrowRight", "ArrowRight", 39, None),
        "space" => descriptor(" ", "Space", 32, Some(" ")),
        _ => {
            if key.chars().count() == 1 {
                let ch = key.chars().next().unwrap_or_default();
                if ch.is_ascii_alphabetic() {
                    let upper = ch.to_ascii_uppercase();
                    return KeyDescriptor {
                        key: ch.to_string(),
                        code: format!("Key{}", upper),
                        virtual_key_code: upper as u32,
                        text: Some(ch.to_string()),
                    };
                }
                if ch.is_ascii_digit() {
                    return KeyDescriptor {
                        key: ch.to_string(),
                        code: format!("Digit{}", ch),
                        virtual_key_code: ch as u32,
                        text: Some(ch.to_string()),
                    };
                }
                return KeyDescriptor {
                    key: ch.to_string(),
                    code: "Unidentified".to_string(),
                    virtual_key_code: 0,
                    text: Some(ch.to_string()),
                };
            }
            descriptor("Enter", "Enter", 13, Some("\r"))
        }
    }
}

pub const MODIFIER_CTRL: u8 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_resolve() {
        assert_eq!(key_descriptor("Enter").key, "Enter");
        assert_eq!(key_descriptor("tab").virtual_key_code, 9);
        assert_eq!(key_descriptor("ArrowDown").code, "ArrowDown");
    }

    #[test]
    fn single_characters_get_their_own_code() {
        let descriptor = key_descriptor("a");
        assert_eq!(descriptor.code, "KeyA");
        assert_eq!(descriptor.text.as_deref(), Some("a"));

        let descriptor = key_descriptor("7");
        assert_eq!(descriptor.code, "Digit7");
    }

    #[test]
    fn unknown_multi_char_keys_default_to_enter() {
        assert_eq!(key_descriptor("Ctrl+Shift+K").key, "Enter");
        assert_eq!(key_descriptor("").key, "Enter");
    }
}
