//! Palette for the search popup.
//!
//! Muted low-saturation base with accents used sparingly: focus, the active
//! suggestion, and tag chips.

use ratatui::style::{Color, Modifier, Style};

pub mod colors {
    use ratatui::style::Color;

    // ═══════════════════════════════════════════════════════════════════════════
    // BASE COLORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deep background - primary canvas color
    pub const BG_DEEP: Color = Color::Rgb(26, 27, 38); // #1a1b26

    /// Elevated surface - cards, modals, popups
    pub const BG_SURFACE: Color = Color::Rgb(36, 40, 59); // #24283b

    /// Selected card / active suggestion
    pub const BG_HIGHLIGHT: Color = Color::Rgb(41, 46, 66); // #292e42

    pub const BORDER: Color = Color::Rgb(59, 66, 97); // #3b4261

    pub const BORDER_FOCUS: Color = Color::Rgb(125, 145, 200); // #7d91c8

    // ═══════════════════════════════════════════════════════════════════════════
    // TEXT COLORS
    // ═══════════════════════════════════════════════════════════════════════════

    pub const TEXT_PRIMARY: Color = Color::Rgb(192, 202, 245); // #c0caf5

    /// Lightened from Tokyo Night #565f89 to meet WCAG AA-large (3:1) contrast
    pub const TEXT_MUTED: Color = Color::Rgb(105, 114, 158); // #696e9e

    pub const TEXT_DISABLED: Color = Color::Rgb(68, 75, 106); // #444b6a

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCENTS + STATUS
    // ═══════════════════════════════════════════════════════════════════════════

    pub const ACCENT_PRIMARY: Color = Color::Rgb(122, 162, 247); // #7aa2f7

    pub const ACCENT_SECONDARY: Color = Color::Rgb(187, 154, 247); // #bb9af7

    pub const STATUS_SUCCESS: Color = Color::Rgb(115, 218, 202); // #73daca

    pub const STATUS_ERROR: Color = Color::Rgb(247, 118, 142); // #f7768e
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemePalette {
    pub accent: Color,
    pub accent_alt: Color,
    pub bg: Color,
    pub fg: Color,
    pub surface: Color,
    pub hint: Color,
    pub border: Color,
    pub success: Color,
    pub error: Color,
    /// Alternating card backgrounds
    pub stripe_even: Color,
    pub stripe_odd: Color,
}

impl ThemePalette {
    pub fn light() -> Self {
        Self {
            accent: Color::Rgb(47, 107, 231),       // Rich blue
            accent_alt: Color::Rgb(124, 93, 198),   // Purple
            bg: Color::Rgb(250, 250, 252),          // Off-white
            fg: Color::Rgb(36, 41, 46),             // Near-black
            surface: Color::Rgb(240, 241, 245),     // Light gray
            hint: Color::Rgb(125, 134, 144),        // Medium gray
            border: Color::Rgb(216, 222, 228),      // Border gray
            success: Color::Rgb(45, 138, 72),       // Forest green
            error: Color::Rgb(200, 40, 70),         // Crimson
            stripe_even: Color::Rgb(250, 250, 252), // Same as bg
            stripe_odd: Color::Rgb(240, 241, 245),  // Slightly darker
        }
    }

    pub fn dark() -> Self {
        Self {
            accent: colors::ACCENT_PRIMARY,
            accent_alt: colors::ACCENT_SECONDARY,
            bg: colors::BG_DEEP,
            fg: colors::TEXT_PRIMARY,
            surface: colors::BG_SURFACE,
            hint: colors::TEXT_MUTED,
            border: colors::BORDER,
            success: colors::STATUS_SUCCESS,
            error: colors::STATUS_ERROR,
            stripe_even: colors::BG_DEEP,
            stripe_odd: Color::Rgb(30, 32, 48), // #1e2030
        }
    }

    pub fn title(self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn hint_style(self) -> Style {
        Style::default().fg(self.hint)
    }

    pub fn border_style(self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn border_focus_style(self) -> Style {
        Style::default().fg(colors::BORDER_FOCUS)
    }

    pub fn surface_style(self) -> Style {
        Style::default().bg(self.surface).fg(self.fg)
    }

    /// Active autocomplete option
    pub fn highlight_style(self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn selected_style(self) -> Style {
        Style::default()
            .bg(colors::BG_HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    /// Grid while a search is in flight
    pub fn busy_style(self) -> Style {
        Style::default()
            .fg(colors::TEXT_DISABLED)
            .add_modifier(Modifier::DIM)
    }

    pub fn stripe(self, index: usize) -> Color {
        if index % 2 == 0 {
            self.stripe_even
        } else {
            self.stripe_odd
        }
    }
}

/// Tag chip
pub fn chip_style(palette: ThemePalette) -> Style {
    Style::default()
        .fg(palette.accent_alt)
        .add_modifier(Modifier::BOLD)
}

/// Keyboard shortcut (help text)
pub fn kbd_style(palette: ThemePalette) -> Style {
    Style::default()
        .fg(palette.accent)
        .add_modifier(Modifier::BOLD)
}
