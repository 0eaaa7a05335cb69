use crate::model::{Node, Vec3};
use crate::network::Network;
use crate::render::{CellBuffer, PixelCanvas, Rgb};
use rand::Rng;
use std::f32::consts::{FRAC_PI_2, TAU};

const CAMERA_DISTANCE: f32 = 15.0;
const FOV_DEG: f32 = 45.0;
const NEAR: f32 = 0.1;
/// Orbit speed in the same units as a 60 fps orbit control (one turn per
/// minute at 1.0).
const AUTO_ROTATE_SPEED: f32 = 0.1;
const ROTATE_SPEED: f32 = 0.2;
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.05;

pub(crate) const DEFAULT_STARS: usize = 1500;
const STAR_RADIUS: f32 = 100.0;
const STAR_DEPTH: f32 = 50.0;
const STAR_FADE_SPEED: f32 = 0.5;

const BLOOM_THRESHOLD: f32 = 0.1;
const BLOOM_SMOOTHING: f32 = 0.9;
const BLOOM_INTENSITY: f32 = 0.7;
const NOISE_OPACITY: f32 = 0.01;

const COLOR_EASE: f32 = 0.05;
const HOVER: Rgb = Rgb::hex(0x99aadd);
const LINK: Rgb = Rgb::hex(0x4466aa);
const LINK_BRANCH: Rgb = Rgb::hex(0x6688cc);
const HALO_SCALE: f32 = 1.8;
const HALO_ALPHA: f32 = 0.1;
const HIT_RADIUS_PX: f32 = 3.0;

fn base_color(n: &Node) -> Rgb {
    match (n.flags.active, n.flags.bright) {
        (true, true) => Rgb::hex(0x8899dd),
        (true, false) => Rgb::hex(0x6677bb),
        (false, true) => Rgb::hex(0x667799),
        (false, false) => Rgb::hex(0x445577),
    }
}

fn glow_color(n: &Node) -> Rgb {
    if n.flags.bright {
        Rgb::hex(0x99aadd)
    } else {
        Rgb::hex(0x7788cc)
    }
}

/// Size multiplier for twinkle and pulse at time `t`.
fn node_scale(n: &Node, t: f32) -> f32 {
    let twinkle = if n.flags.bright {
        1.0 + (t * 0.2).sin() * 0.05
    } else {
        1.0 + (t * 0.1).sin() * 0.02
    };
    if n.flags.pulsing {
        ((t * 0.15).sin() * 0.03 + 1.0) * twinkle
    } else {
        twinkle
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Camera {
    pub(crate) yaw: f32,
    pub(crate) pitch: f32,
}

impl Camera {
    fn auto_rotate(&mut self, delta: f32) {
        self.yaw = (self.yaw + TAU / 60.0 * AUTO_ROTATE_SPEED * delta).rem_euclid(TAU);
    }

    /// Drag-style rotation; `dx`/`dy` are in rows of screen travel,
    /// `rows` is the screen height.
    pub(crate) fn drag(&mut self, dx: f32, dy: f32, rows: f32) {
        let rows = rows.max(1.0);
        self.yaw = (self.yaw - TAU * dx / rows * ROTATE_SPEED).rem_euclid(TAU);
        self.pitch = (self.pitch + TAU * dy / rows * ROTATE_SPEED).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    fn view(&self, p: Vec3) -> Vec3 {
        p.rot_y(-self.yaw).rot_x(self.pitch)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Projected {
    pub(crate) x: f32,
    pub(crate) y: f32,
    /// Pixels per world unit at this depth.
    pub(crate) scale: f32,
}

/// Perspective projection onto a `w`×`h` pixel canvas.
pub(crate) fn project(cam: &Camera, p: Vec3, w: u32, h: u32) -> Option<Projected> {
    let v = cam.view(p);
    let depth = CAMERA_DISTANCE - v.z;
    if depth < NEAR {
        return None;
    }
    let focal = 1.0 / (FOV_DEG.to_radians() * 0.5).tan();
    let scale = focal * (h as f32 * 0.5) / depth;
    Some(Projected {
        x: w as f32 * 0.5 + v.x * scale,
        y: h as f32 * 0.5 - v.y * scale,
        scale,
    })
}

#[derive(Clone, Copy)]
struct Star {
    pos: Vec3,
    phase: f32,
    level: f32,
}

fn build_stars<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Star> {
    let mut stars = Vec::with_capacity(count);
    for _ in 0..count {
        let u: f32 = rng.gen_range(-1.0..1.0);
        let theta = rng.gen_range(0.0..TAU);
        let s = (1.0 - u * u).sqrt();
        let r = STAR_RADIUS + rng.gen::<f32>() * STAR_DEPTH;
        stars.push(Star {
            pos: Vec3::new(s * theta.cos(), s * theta.sin(), u) * r,
            phase: rng.gen_range(0.0..TAU),
            level: rng.gen_range(0.25..0.9),
        });
    }
    stars
}

/// Presentation state for the particle field: camera, starfield, eased node
/// colours, and where each node landed on screen last frame (for hovering).
pub(crate) struct Scene {
    pub(crate) camera: Camera,
    stars: Vec<Star>,
    tints: Vec<[f32; 3]>,
    screen: Vec<Option<(f32, f32)>>,
    hovered: Option<usize>,
    bloom: bool,
    noise: bool,
}

impl Scene {
    pub(crate) fn new<R: Rng + ?Sized>(
        star_count: usize,
        bloom: bool,
        noise: bool,
        rng: &mut R,
    ) -> Self {
        Self {
            camera: Camera {
                yaw: 0.0,
                pitch: 0.0,
            },
            stars: build_stars(star_count, rng),
            tints: Vec::new(),
            screen: Vec::new(),
            hovered: None,
            bloom,
            noise,
        }
    }

    pub(crate) fn tick_camera(&mut self, delta: f32) {
        self.camera.auto_rotate(delta);
    }

    /// Draws stars, connections, and nodes into `canvas`, scaled by `fade`.
    pub(crate) fn render<R: Rng + ?Sized>(
        &mut self,
        canvas: &mut PixelCanvas,
        net: &Network,
        t: f32,
        fade: f32,
        rng: &mut R,
    ) {
        let fade = fade.clamp(0.0, 1.0);
        if fade <= 0.0 {
            return;
        }
        let (w, h) = (canvas.w, canvas.h);

        for s in &self.stars {
            let Some(p) = project(&self.camera, s.pos, w, h) else {
                continue;
            };
            let lum = s.level * (0.6 + 0.4 * (t * STAR_FADE_SPEED + s.phase).sin());
            canvas.blend(p.x as i32, p.y as i32, Rgb::hex(0xffffff), lum * fade);
        }

        let spin = net.rotation;
        let cam = self.camera;
        let to_screen = |p: Vec3| project(&cam, p.rot_y(spin), w, h);

        for c in &net.connections {
            let alpha = c.visible_opacity() * (0.6 + 0.4 * c.thickness) * fade;
            if alpha <= 0.0 {
                continue;
            }
            let col = if c.branching() { LINK_BRANCH } else { LINK };
            let pts: Vec<Projected> = c.path().into_iter().filter_map(to_screen).collect();
            for seg in pts.windows(2) {
                canvas.line(seg[0].x, seg[0].y, seg[1].x, seg[1].y, col, alpha);
            }
        }

        if self.tints.len() != net.nodes.len() {
            self.tints = net
                .nodes
                .iter()
                .map(|n| {
                    let c = base_color(n);
                    [c.r as f32, c.g as f32, c.b as f32]
                })
                .collect();
        }
        self.screen.clear();

        for (i, n) in net.nodes.iter().enumerate() {
            let base = base_color(n);
            let target = if self.hovered == Some(i) {
                HOVER
            } else if n.flags.glow {
                glow_color(n).lerp(base, 0.8 + (t * 0.5).sin() * 0.2)
            } else {
                base
            };
            let tint = &mut self.tints[i];
            tint[0] += (target.r as f32 - tint[0]) * COLOR_EASE;
            tint[1] += (target.g as f32 - tint[1]) * COLOR_EASE;
            tint[2] += (target.b as f32 - tint[2]) * COLOR_EASE;
            let col = Rgb {
                r: tint[0] as u8,
                g: tint[1] as u8,
                b: tint[2] as u8,
            };

            let Some(p) = to_screen(n.pos) else {
                self.screen.push(None);
                continue;
            };
            self.screen.push(Some((p.x, p.y)));

            let r = n.size * node_scale(n, t) * p.scale;
            if n.flags.glow {
                canvas.disc(p.x, p.y, r * HALO_SCALE, glow_color(n), HALO_ALPHA * fade);
            }
            canvas.disc(p.x, p.y, r, col, fade);
        }

        if self.bloom {
            bloom(canvas);
        }
        if self.noise {
            grain(canvas, rng);
        }
    }

    /// Nearest node drawn within a few pixels of (`x`, `y`).
    pub(crate) fn pick(&self, x: f32, y: f32) -> Option<usize> {
        self.screen
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                let (sx, sy) = (*s)?;
                let d = ((sx - x).powi(2) + (sy - y).powi(2)).sqrt();
                (d <= HIT_RADIUS_PX).then_some((i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    pub(crate) fn set_hovered(&mut self, node: Option<usize>) {
        self.hovered = node;
    }

    pub(crate) fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub(crate) fn screen_pos(&self, node: usize) -> Option<(f32, f32)> {
        self.screen.get(node).copied().flatten()
    }
}

/// Bright pixels bleed into their neighbours.
fn bloom(canvas: &mut PixelCanvas) {
    let src = canvas.px.clone();
    let w = canvas.w as i32;
    let knee = BLOOM_THRESHOLD * BLOOM_SMOOTHING;
    for (i, p) in src.iter().enumerate() {
        if p.a == 0 {
            continue;
        }
        let lum = p.rgb().luma() * (p.a as f32 / 255.0);
        if lum <= BLOOM_THRESHOLD - knee {
            continue;
        }
        let k = ((lum - (BLOOM_THRESHOLD - knee)) / (1.0 - BLOOM_THRESHOLD + knee)).clamp(0.0, 1.0);
        let amount = k * k * BLOOM_INTENSITY * 0.3;
        let x = i as i32 % w;
        let y = i as i32 / w;
        for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            canvas.blend(x + dx, y + dy, p.rgb(), amount);
        }
    }
}

fn grain<R: Rng + ?Sized>(canvas: &mut PixelCanvas, rng: &mut R) {
    let amp = (NOISE_OPACITY * 255.0).ceil() as i32;
    for p in canvas.px.iter_mut().filter(|p| p.a > 0) {
        let j = rng.gen_range(-amp..=amp);
        p.a = (p.a as i32 + j).clamp(1, 255) as u8;
    }
}

/// Faint radial haze behind everything, tinted toward deep blue in the
/// middle of the screen.
pub(crate) fn cosmic_backdrop(buf: &mut CellBuffer, fade: f32, enable_color: bool) {
    if !enable_color || fade <= 0.0 {
        return;
    }
    let centre = Rgb::hex(0x141428);
    let (w, h) = (buf.w as f32, buf.h as f32);
    for y in 0..buf.h {
        for x in 0..buf.w {
            let dx = (x as f32 + 0.5) / w - 0.5;
            let dy = (y as f32 + 0.5) / h - 0.5;
            let d = ((dx * dx + dy * dy).sqrt() * 2.0).min(1.0);
            let col = centre.lerp(Rgb::BLACK, d).scale(fade.min(1.0));
            let i = buf.idx(x, y);
            buf.cells[i].bg = col.to_color(true);
        }
    }
}
