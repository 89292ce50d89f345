use ratatui::style::Color;

/// Client-owned visuals for the seeded cost categories. Unknown ids fall back
/// to [`CategoryVisual::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryVisual {
    Materials,
    Labor,
    Equipment,
    Transport,
    Utilities,
    Permits,
    Subcontractors,
    Other,
}

impl CategoryVisual {
    pub fn from_id(id: &str) -> Self {
        match id {
            "materials" => Self::Materials,
            "labor" => Self::Labor,
            "equipment" => Self::Equipment,
            "transport" => Self::Transport,
            "utilities" => Self::Utilities,
            "permits" => Self::Permits,
            "subcontractors" => Self::Subcontractors,
            _ => Self::Other,
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Self::Materials => "▣",
            Self::Labor => "⚒",
            Self::Equipment => "⚙",
            Self::Transport => "⛟",
            Self::Utilities => "⚡",
            Self::Permits => "§",
            Self::Subcontractors => "⚇",
            Self::Other => "•",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Materials => Color::Blue,
            Self::Labor => Color::LightRed,
            Self::Equipment => Color::Magenta,
            Self::Transport => Color::Green,
            Self::Utilities => Color::Yellow,
            Self::Permits => Color::Red,
            Self::Subcontractors => Color::Cyan,
            Self::Other => Color::Gray,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_ids_map_to_their_own_visual() {
        assert_eq!(CategoryVisual::from_id("materials"), CategoryVisual::Materials);
        assert_eq!(CategoryVisual::from_id("labor").color(), Color::LightRed);
        assert_eq!(CategoryVisual::from_id("subcontractors").glyph(), "⚇");
    }

    #[test]
    fn unknown_ids_fall_back_to_other() {
        assert_eq!(CategoryVisual::from_id("drones"), CategoryVisual::Other);
        assert_eq!(CategoryVisual::from_id(""), CategoryVisual::Other);
    }
}
