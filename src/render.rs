use anyhow::Context;
use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const BLACK: Rgb = Rgb::hex(0x000000);

    pub(crate) const fn hex(v: u32) -> Self {
        Self {
            r: ((v >> 16) & 0xff) as u8,
            g: ((v >> 8) & 0xff) as u8,
            b: (v & 0xff) as u8,
        }
    }

    pub(crate) fn lerp(self, o: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t + 0.5) as u8;
        Rgb {
            r: mix(self.r, o.r),
            g: mix(self.g, o.g),
            b: mix(self.b, o.b),
        }
    }

    pub(crate) fn scale(self, k: f32) -> Rgb {
        let f = |c: u8| (c as f32 * k).clamp(0.0, 255.0) as u8;
        Rgb {
            r: f(self.r),
            g: f(self.g),
            b: f(self.b),
        }
    }

    pub(crate) fn luma(self) -> f32 {
        (0.2126 * self.r as f32 + 0.7152 * self.g as f32 + 0.0722 * self.b as f32) / 255.0
    }

    pub(crate) fn to_color(self, enable_color: bool) -> Color {
        if enable_color {
            Color::Rgb {
                r: self.r,
                g: self.g,
                b: self.b,
            }
        } else if self.luma() > 0.45 {
            Color::White
        } else if self.luma() > 0.12 {
            Color::Grey
        } else {
            Color::DarkGrey
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
    pub(crate) bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
            bold: false,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    #[cfg(test)]
    pub(crate) fn get(&self, x: u16, y: u16) -> Option<Cell> {
        if x < self.w && y < self.h {
            Some(self.cells[self.idx(x, y)])
        } else {
            None
        }
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            *c = Cell {
                bg,
                ..Cell::default()
            };
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl Pixel {
    pub(crate) fn rgb(self) -> Rgb {
        Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Sub-pixel canvas, 2×4 pixels per terminal cell.
pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self) {
        self.px.fill(Pixel::default());
    }

    #[cfg(test)]
    pub(crate) fn get(&self, x: i32, y: i32) -> Option<Pixel> {
        if x < 0 || y < 0 || x as u32 >= self.w || y as u32 >= self.h {
            return None;
        }
        Some(self.px[self.idx(x as u32, y as u32)])
    }

    /// Source-over compositing of `col` at coverage `alpha` (0..1).
    pub(crate) fn blend(&mut self, x: i32, y: i32, col: Rgb, alpha: f32) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let sa = alpha.clamp(0.0, 1.0);
        if sa <= 1e-4 {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        let mix = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: mix(col.r, dst.r),
            g: mix(col.g, dst.g),
            b: mix(col.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }

    pub(crate) fn disc(&mut self, cx: f32, cy: f32, r: f32, col: Rgb, alpha: f32) {
        let r = r.max(0.5);
        let x0 = (cx - r).floor() as i32;
        let x1 = (cx + r).ceil() as i32;
        let y0 = (cy - r).floor() as i32;
        let y1 = (cy + r).ceil() as i32;
        let r2 = r * r;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let d2 = dx * dx + dy * dy;
                if d2 > r2 {
                    continue;
                }
                // soft edge
                let t = 1.0 - (d2 / r2) * 0.5;
                self.blend(x, y, col, alpha * t);
            }
        }
    }

    pub(crate) fn line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, col: Rgb, alpha: f32) {
        let dx = x1 - x0;
        let dy = y1 - y0;
        let len = (dx * dx + dy * dy).sqrt();
        let steps = (len * 1.6).ceil().max(1.0) as i32;
        let mut last = (i32::MIN, i32::MIN);
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let p = ((x0 + dx * t).floor() as i32, (y0 + dy * t).floor() as i32);
            if p == last {
                continue;
            }
            last = p;
            self.blend(p.0, p.1, col, alpha);
        }
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            EnableMouseCapture,
            terminal::Clear(ClearType::All)
        )
        .context("could not set up the terminal")?;
        terminal::enable_raw_mode().context("could not enable raw mode")?;

        let (cols, rows) = terminal::size()?;
        log::debug!("terminal {cols}x{rows}");

        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
            canvas: PixelCanvas::new(cols as u32 * 2, rows as u32 * 4),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            SetAttribute(Attribute::Reset),
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            DisableMouseCapture,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        log::debug!("resized to {c}x{r}");
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, r as u32 * 4);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;
        let mut last_bold = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_bold != Some(c.bold) {
                    let attr = if c.bold {
                        Attribute::Bold
                    } else {
                        Attribute::NormalIntensity
                    };
                    queue!(self.out, SetAttribute(attr))?;
                    last_bold = Some(c.bold);
                }
                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

fn bayer_2x4_threshold(dx: u32, dy: u32) -> f32 {
    const M: [[u8; 2]; 4] = [[0, 4], [6, 2], [1, 5], [7, 3]];
    let v = M[(dy & 3) as usize][(dx & 1) as usize] as f32;
    (v + 0.5) / 8.0
}

/// Folds the canvas into braille cells. Faint pixels are dithered so a
/// low-opacity line shows as a sparse dotted trail rather than vanishing.
/// Cells with no ink keep whatever text is already in `out`.
pub(crate) fn canvas_to_cells(canvas: &PixelCanvas, out: &mut CellBuffer, enable_color: bool) {
    let cols = out.w as u32;
    let rows = out.h as u32;

    for cy in 0..rows {
        for cx in 0..cols {
            let mut mask: u8 = 0;
            let (mut sr, mut sg, mut sb, mut sa) = (0u32, 0u32, 0u32, 0u32);
            let mut ink: u32 = 0;

            for dy in 0..4 {
                for dx in 0..2 {
                    let x = cx * 2 + dx;
                    let y = cy * 4 + dy;
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];
                    if p.a == 0 {
                        continue;
                    }
                    let cover = (p.a as f32 / 255.0).sqrt();
                    if cover > bayer_2x4_threshold(dx, dy) * 0.9 {
                        mask |= braille_bit(dx, dy);
                        sr += p.r as u32;
                        sg += p.g as u32;
                        sb += p.b as u32;
                        sa += p.a as u32;
                        ink += 1;
                    }
                }
            }

            if ink == 0 {
                continue;
            }

            let avg = Rgb {
                r: (sr / ink) as u8,
                g: (sg / ink) as u8,
                b: (sb / ink) as u8,
            };
            let cover = (sa / ink) as f32 / 255.0;
            let col = avg.scale(0.35 + 0.65 * cover);

            let ch = char::from_u32(0x2800 + mask as u32).unwrap_or(' ');
            out.set(
                cx as u16,
                cy as u16,
                Cell {
                    ch,
                    fg: col.to_color(enable_color),
                    bg: Color::Black,
                    bold: false,
                },
            );
        }
    }
}

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bold: bool) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(
            xx,
            y,
            Cell {
                ch,
                fg,
                bg: Color::Black,
                bold,
            },
        );
    }
}

/// Draws `s` horizontally centred on row `y`; returns the starting column.
pub(crate) fn draw_centered(buf: &mut CellBuffer, y: u16, s: &str, fg: Color, bold: bool) -> u16 {
    let len = s.chars().count() as u16;
    let x = buf.w.saturating_sub(len) / 2;
    draw_text(buf, x, y, s, fg, bold);
    x
}

pub(crate) fn draw_box(buf: &mut CellBuffer, x0: u16, y0: u16, bw: u16, bh: u16, fg: Color) {
    if bw < 2 || bh < 2 {
        return;
    }
    let x1 = x0.saturating_add(bw - 1);
    let y1 = y0.saturating_add(bh - 1);
    let cell = |ch| Cell {
        ch,
        fg,
        bg: Color::Black,
        bold: false,
    };
    for x in x0 + 1..x1 {
        buf.set(x, y0, cell('─'));
        buf.set(x, y1, cell('─'));
    }
    for y in y0 + 1..y1 {
        buf.set(x0, y, cell('│'));
        buf.set(x1, y, cell('│'));
    }
    buf.set(x0, y0, cell('┌'));
    buf.set(x1, y0, cell('┐'));
    buf.set(x0, y1, cell('└'));
    buf.set(x1, y1, cell('┘'));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_pixels_fill_every_dot() {
        let mut canvas = PixelCanvas::new(2, 4);
        for y in 0..4 {
            for x in 0..2 {
                canvas.blend(x, y, Rgb::hex(0x8899dd), 1.0);
            }
        }
        let mut cells = CellBuffer::new(1, 1);
        canvas_to_cells(&canvas, &mut cells, true);
        let c = cells.get(0, 0).unwrap();
        assert_eq!(c.ch, '\u{28FF}');
        assert_eq!(
            c.fg,
            Color::Rgb {
                r: 0x88,
                g: 0x99,
                b: 0xdd
            }
        );
    }

    #[test]
    fn empty_cells_keep_existing_text() {
        let canvas = PixelCanvas::new(4, 4);
        let mut cells = CellBuffer::new(2, 1);
        draw_text(&mut cells, 0, 0, "hi", Color::White, false);
        canvas_to_cells(&canvas, &mut cells, true);
        assert_eq!(cells.get(0, 0).unwrap().ch, 'h');
        assert_eq!(cells.get(1, 0).unwrap().ch, 'i');
    }

    #[test]
    fn faint_ink_is_dithered() {
        let mut canvas = PixelCanvas::new(2, 4);
        for y in 0..4 {
            for x in 0..2 {
                canvas.blend(x, y, Rgb::hex(0x4466aa), 0.1);
            }
        }
        let mut cells = CellBuffer::new(1, 1);
        canvas_to_cells(&canvas, &mut cells, true);
        let dots = (cells.get(0, 0).unwrap().ch as u32 - 0x2800).count_ones();
        assert!(dots > 0 && dots < 8, "{dots} dots");
    }

    #[test]
    fn blend_stacks_toward_opaque() {
        let mut canvas = PixelCanvas::new(1, 1);
        canvas.blend(0, 0, Rgb::hex(0xffffff), 0.5);
        canvas.blend(0, 0, Rgb::hex(0xffffff), 0.5);
        let p = canvas.get(0, 0).unwrap();
        assert!(p.a > 180 && p.a < 200);
        assert_eq!(p.rgb(), Rgb::hex(0xffffff));
        // off-canvas writes are ignored
        canvas.blend(-1, 0, Rgb::BLACK, 1.0);
        canvas.blend(5, 5, Rgb::BLACK, 1.0);
        assert!(canvas.get(1, 0).is_none());
    }

    #[test]
    fn centred_text_lands_in_the_middle() {
        let mut buf = CellBuffer::new(10, 1);
        let x = draw_centered(&mut buf, 0, "abcd", Color::White, true);
        assert_eq!(x, 3);
        assert!(buf.get(3, 0).unwrap().bold);
    }

    #[test]
    fn mono_fallback_buckets_by_brightness() {
        assert_eq!(Rgb::hex(0xffffff).to_color(false), Color::White);
        assert_eq!(Rgb::hex(0x101010).to_color(false), Color::DarkGrey);
    }
}
