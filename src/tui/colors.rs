//! Theme colors for the terminal user interface.

use ratatui::style::Color;

use crate::config::ThemeConfig;

// Fallbacks matching the starter config's "slate" theme.
const DEFAULT_BACKGROUND: Color = Color::Rgb(16, 20, 24);
const DEFAULT_PRIMARY: Color = Color::Rgb(86, 156, 214);
const DEFAULT_ACCENT: Color = Color::Rgb(229, 146, 94);
const DEFAULT_MUTED: Color = Color::Rgb(42, 47, 54);
const DEFAULT_TEXT: Color = Color::Rgb(212, 216, 222);

/// The resolved color set used by every render function.
#[derive(Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub primary: Color,
    pub accent: Color,
    pub muted: Color,
    pub text: Color,
}

impl Palette {
    pub fn from_theme(theme: &ThemeConfig) -> Palette {
        Palette {
            background: parse_hex(&theme.background).unwrap_or(DEFAULT_BACKGROUND),
            primary: parse_hex(&theme.primary).unwrap_or(DEFAULT_PRIMARY),
            accent: parse_hex(&theme.accent).unwrap_or(DEFAULT_ACCENT),
            muted: parse_hex(&theme.muted).unwrap_or(DEFAULT_MUTED),
            text: parse_hex(&theme.text).unwrap_or(DEFAULT_TEXT),
        }
    }
}

/// Parse `#rrggbb` into an RGB color.
pub fn parse_hex(s: &str) -> Option<Color> {
    let hex = s.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_hex() {
        assert_eq!(parse_hex("#ff8000"), Some(Color::Rgb(255, 128, 0)));
        assert_eq!(parse_hex(" #000000 "), Some(Color::Rgb(0, 0, 0)));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(parse_hex("ff8000"), None);
        assert_eq!(parse_hex("#ff80"), None);
        assert_eq!(parse_hex("#ggff00"), None);
    }

    #[test]
    fn bad_theme_values_fall_back() {
        let theme = ThemeConfig {
            primary: "not-a-color".into(),
            ..ThemeConfig::default()
        };
        let palette = Palette::from_theme(&theme);
        assert_eq!(palette.primary, DEFAULT_PRIMARY);
        assert_eq!(palette.text, DEFAULT_TEXT);
    }
}
