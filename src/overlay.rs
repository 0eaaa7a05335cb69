use crate::render::{draw_box, draw_centered, draw_text, Cell, CellBuffer, Rgb};
use crossterm::style::Color;

const TITLE: &str = "MASAIC";
const SUBTITLE: &str = "HIGH AGENCY SYSTEMS";
const CREDIT: &str = "From the creators of Eclipse LMOS.";
const TAGLINE: [&str; 2] = ["In quiet, we build.", "For teams who won't settle."];
const BUTTON: &str = "[Notify me]";
const FOOTER: &str = "© 2025 Masaic AI. All rights reserved.";
const CURSOR: char = '▌';

const TEXT: Rgb = Rgb::hex(0xffffff);
const ACCENT: Rgb = Rgb::hex(0xaab4d4);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rect {
    pub(crate) x: u16,
    pub(crate) y: u16,
    pub(crate) w: u16,
    pub(crate) h: u16,
}

impl Rect {
    pub(crate) fn contains(&self, col: u16, row: u16) -> bool {
        col >= self.x && col < self.x + self.w && row >= self.y && row < self.y + self.h
    }
}

fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn ease_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Opacity of something that starts fading in `delay` seconds after `t = 0`.
pub(crate) fn fade_in(t: f32, delay: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return if t >= delay { 1.0 } else { 0.0 };
    }
    ease_in_out((t - delay) / duration)
}

fn ink(col: Rgb, opacity: f32, enable_color: bool) -> Color {
    col.scale(opacity).to_color(enable_color)
}

/// The typing block, re-centred every frame as lines arrive.
pub(crate) fn draw_intro(
    buf: &mut CellBuffer,
    shown: &[String],
    partial: Option<&str>,
    cursor: bool,
    enable_color: bool,
) {
    let total = shown.len() + usize::from(partial.is_some());
    let top = (buf.h / 2).saturating_sub(total as u16);

    let done = ink(TEXT, 0.8, enable_color);
    for (i, line) in shown.iter().enumerate() {
        // two rows per line, blank lines keep their slot
        draw_centered(buf, top + 2 * i as u16, line, done, false);
    }

    if let Some(text) = partial {
        let y = top + 2 * shown.len() as u16;
        let mut s = text.to_string();
        s.push(if cursor { CURSOR } else { ' ' });
        draw_centered(buf, y, &s, ink(TEXT, 1.0, enable_color), false);
    }
}

/// Title, subtitle, credit, tagline, button and footer. `t` is seconds since
/// the title phase began. Returns the button's cells once it is clickable.
pub(crate) fn draw_title(
    buf: &mut CellBuffer,
    t: f32,
    button_hover: bool,
    enable_color: bool,
) -> Option<Rect> {
    let mid = buf.h / 2;

    let a = fade_in(t, 0.0, 2.0);
    if a > 0.0 {
        let spacing = 1 + (ease_out(t / 3.0) * 2.0).round() as usize;
        let gap = " ".repeat(spacing);
        let spaced = TITLE
            .chars()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(&gap);
        let fg = ink(TEXT, 0.8 * a, enable_color);
        draw_centered(buf, mid.saturating_sub(2), &spaced, fg, true);
    }

    let a = fade_in(t, 1.0, 3.0);
    if a > 0.0 {
        draw_centered(buf, mid, SUBTITLE, ink(ACCENT, a, enable_color), false);
    }

    let late = fade_in(t, 2.0, 2.0);
    if late <= 0.0 {
        return None;
    }
    draw_centered(buf, mid + 2, CREDIT, ink(ACCENT, 0.5 * late, enable_color), false);
    draw_centered(
        buf,
        buf.h.saturating_sub(1),
        FOOTER,
        ink(TEXT, 0.4 * late, enable_color),
        false,
    );

    let rect = button_rect(buf.w, buf.h)?;
    let tag = ink(TEXT, 0.6 * late, enable_color);
    for (i, line) in TAGLINE.iter().enumerate() {
        let len = line.chars().count() as u16;
        let x = (rect.x + rect.w).saturating_sub(len);
        let y = rect.y.saturating_sub(3 - i as u16);
        draw_text(buf, x, y, line, tag, false);
    }

    draw_box(buf, rect.x, rect.y, rect.w, rect.h, ink(TEXT, 0.3 * late, enable_color));
    let label = ink(TEXT, 0.8 * late, enable_color);
    draw_text(buf, rect.x + 2, rect.y + 1, BUTTON, label, false);
    if button_hover {
        let bg = ink(TEXT, 0.1, enable_color);
        for x in rect.x + 1..rect.x + rect.w - 1 {
            let i = buf.idx(x, rect.y + 1);
            buf.cells[i].bg = bg;
        }
    }

    Some(rect)
}

/// Bottom-right button box, or None if the terminal is too small for it.
pub(crate) fn button_rect(cols: u16, rows: u16) -> Option<Rect> {
    let w = BUTTON.chars().count() as u16 + 4;
    let h = 3;
    if cols < w + 4 || rows < h + 8 {
        return None;
    }
    Some(Rect {
        x: cols - w - 3,
        y: rows - h - 3,
        w,
        h,
    })
}

/// Tooltip box above a hovered node at cell (`col`, `row`).
pub(crate) fn draw_tooltip(buf: &mut CellBuffer, col: u16, row: u16, text: &str) {
    let w = text.chars().count() as u16 + 4;
    let x = col.saturating_sub(w / 2).min(buf.w.saturating_sub(w));
    let y = row.saturating_sub(4);
    for yy in y..y + 3 {
        for xx in x..x + w {
            buf.set(xx, yy, Cell::default());
        }
    }
    draw_box(buf, x, y, w, 3, Color::DarkGrey);
    draw_text(buf, x + 2, y + 1, text, Color::White, false);
}

pub(crate) fn draw_status(buf: &mut CellBuffer, msg: &str) {
    draw_text(buf, 1, buf.h.saturating_sub(1), msg, Color::Grey, false);
}
