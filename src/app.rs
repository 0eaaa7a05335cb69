use crate::config::Settings;
use crate::field::generate;
use crate::input::{collect_input_nonblocking, Action};
use crate::mail::{notify_link, MailHandler, SystemMailer, RECIPIENT};
use crate::network::{FrameReport, Network};
use crate::overlay::{button_rect, draw_intro, draw_status, draw_title, draw_tooltip, Rect};
use crate::page::{Page, PagePhase};
use crate::render::{canvas_to_cells, Terminal};
use crate::scene::{cosmic_backdrop, Scene};
use crate::typing::{TypingEvent, TypingSequence, INTRO_LINES};
use crossterm::style::Color;
use rand::{rngs::StdRng, SeedableRng};
use std::time::{Duration, Instant};

/// Constellation and backdrop fade in over this long.
const SCENE_FADE_SECS: f32 = 2.0;
const STATUS_TTL: Duration = Duration::from_secs(4);

pub(crate) struct App {
    settings: Settings,
    term: Terminal,
    rng: StdRng,
    page: Page,
    typing: TypingSequence,
    network: Option<Network>,
    scene: Option<Scene>,
    mailer: Box<dyn MailHandler>,
    started: Instant,
    pointer: Option<(u16, u16)>,
    dragging: bool,
    button: Option<Rect>,
    status: Option<(String, Duration)>,
    should_quit: bool,
}

impl App {
    fn init(settings: Settings) -> anyhow::Result<Self> {
        let rng = match settings.seed {
            Some(seed) => {
                log::info!("seeded run, seed {seed}");
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        let term = Terminal::begin()?;
        let typing = TypingSequence::new(&INTRO_LINES, settings.reveal);

        let mut page = Page::new();
        page.mount(Duration::ZERO);

        Ok(Self {
            settings,
            term,
            rng,
            page,
            typing,
            network: None,
            scene: None,
            mailer: Box::new(SystemMailer),
            started: Instant::now(),
            pointer: None,
            dragging: false,
            button: None,
            status: None,
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let frame_dt = Duration::from_secs_f32(1.0 / self.settings.fps_cap as f32);
        let mut last = Duration::ZERO;

        while !self.should_quit {
            let frame_start = Instant::now();
            let now = self.started.elapsed();
            let delta = (now - last).as_secs_f32();
            last = now;

            self.term.resize_if_needed()?;

            for action in collect_input_nonblocking(frame_dt)? {
                self.handle(action, now);
                if self.should_quit {
                    break;
                }
            }

            self.step(now, delta);
            self.render_frame(now)?;

            spin_sleep(frame_dt, frame_start);
        }
        Ok(())
    }

    fn handle(&mut self, action: Action, now: Duration) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::Notify => {
                if self.page.phase() == PagePhase::Title {
                    self.notify(now);
                }
            }
            Action::Rotate { dx, dy } => {
                let rows = self.term.rows as f32;
                if let Some(scene) = self.scene.as_mut() {
                    scene.camera.drag(dx, dy, rows);
                }
            }
            Action::Hover { col, row } => {
                self.pointer = Some((col, row));
                if let Some(scene) = self.scene.as_mut() {
                    let hit = scene.pick(col as f32 * 2.0 + 1.0, row as f32 * 4.0 + 2.0);
                    scene.set_hovered(hit);
                }
            }
            Action::Press { col, row } => {
                self.pointer = Some((col, row));
                if self.button.is_some_and(|b| b.contains(col, row)) {
                    self.notify(now);
                } else {
                    self.dragging = true;
                }
            }
            Action::Drag { col, row } => {
                let prev = self.pointer.replace((col, row));
                if !self.dragging {
                    return;
                }
                let rows = self.term.rows as f32;
                if let (Some((pc, pr)), Some(scene)) = (prev, self.scene.as_mut()) {
                    // cells are about twice as tall as wide
                    let dx = (col as f32 - pc as f32) * 0.5;
                    let dy = row as f32 - pr as f32;
                    scene.camera.drag(dx, dy, rows);
                }
            }
            Action::Release => self.dragging = false,
        }
    }

    fn notify(&mut self, now: Duration) {
        let opened = notify_link().and_then(|link| {
            log::info!("opening {link}");
            self.mailer.open(&link)
        });
        let msg = match opened {
            Ok(()) => "Opening your mail client…".to_string(),
            Err(e) => {
                log::warn!("notify failed: {e:#}");
                format!("No mail client found. Write to {RECIPIENT}")
            }
        };
        self.status = Some((msg, now + STATUS_TTL));
    }

    fn step(&mut self, now: Duration, delta: f32) {
        for (at, phase) in self.page.advance(now) {
            match phase {
                // start from when the transition was due, not this frame
                PagePhase::Typing => self.typing.mount(at, &mut self.rng),
                PagePhase::Constellation => {
                    let field = generate(self.settings.scattered_nodes, &mut self.rng);
                    self.network = Some(Network::mount(field));
                    self.scene = Some(Scene::new(
                        self.settings.stars,
                        self.settings.enable_bloom,
                        self.settings.enable_noise,
                        &mut self.rng,
                    ));
                }
                PagePhase::Idle | PagePhase::Title => {}
            }
        }

        for ev in self.typing.advance(now, &mut self.rng) {
            match ev {
                TypingEvent::Char { line, typed } => log::trace!("line {line}: {typed} chars"),
                TypingEvent::LineDone(line) => log::debug!("intro line {line} done"),
                TypingEvent::Complete => self.page.typing_complete(now),
            }
        }

        if let (Some(net), Some(since)) = (
            self.network.as_mut(),
            self.page.since(PagePhase::Constellation, now),
        ) {
            let report = net.frame(since.as_secs_f32(), delta, &mut self.rng);
            if report != FrameReport::default() {
                log::trace!("network frame {report:?}");
            }
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.tick_camera(delta);
        }

        if self.status.as_ref().is_some_and(|(_, until)| now >= *until) {
            self.status = None;
        }
    }

    fn render_frame(&mut self, now: Duration) -> anyhow::Result<()> {
        let color = self.settings.enable_color;
        self.term.cur.clear(Color::Black);
        self.term.canvas.clear();

        let t = now.as_secs_f32();
        let fade = self
            .page
            .since(PagePhase::Constellation, now)
            .map_or(0.0, |d| (d.as_secs_f32() / SCENE_FADE_SECS).min(1.0));

        if let (Some(net), Some(scene)) = (self.network.as_ref(), self.scene.as_mut()) {
            scene.render(&mut self.term.canvas, net, t, fade, &mut self.rng);
        }
        canvas_to_cells(&self.term.canvas, &mut self.term.cur, color);

        let vis = self.page.visibility();
        if vis.constellation {
            cosmic_backdrop(&mut self.term.cur, fade, color);
        }
        if vis.intro_text {
            let partial = self.typing.partial();
            draw_intro(
                &mut self.term.cur,
                self.typing.shown_lines(),
                partial.as_deref(),
                self.typing.cursor_visible(now),
                color,
            );
        }

        self.button = None;
        if vis.title {
            let t = self
                .page
                .since(PagePhase::Title, now)
                .unwrap_or_default()
                .as_secs_f32();
            let hover = match (self.pointer, button_rect(self.term.cols, self.term.rows)) {
                (Some((c, r)), Some(b)) => b.contains(c, r),
                _ => false,
            };
            self.button = draw_title(&mut self.term.cur, t, hover, color);
        }

        if let (Some(net), Some(scene)) = (self.network.as_ref(), self.scene.as_ref()) {
            if let Some(i) = scene.hovered() {
                let text = net.nodes.get(i).and_then(|n| n.tooltip.as_deref());
                if let (Some(text), Some((x, y))) = (text, scene.screen_pos(i)) {
                    draw_tooltip(&mut self.term.cur, (x / 2.0) as u16, (y / 4.0) as u16, text);
                }
            }
        }

        if let Some((msg, _)) = &self.status {
            draw_status(&mut self.term.cur, msg);
        }

        self.term.present()
    }

    /// Cancels every pending timer so nothing fires after teardown.
    fn unmount(&mut self) {
        self.typing.unmount();
        if let Some(net) = self.network.as_mut() {
            net.unmount();
        }
        self.page.unmount();
        log::info!(
            "shutting down after {:.1}s in {:?} (intro finished: {})",
            self.started.elapsed().as_secs_f32(),
            self.page.phase(),
            self.typing.is_complete()
        );
    }
}

pub(crate) fn run(settings: Settings) -> anyhow::Result<()> {
    let mut app = App::init(settings)?;
    let res = app.run();
    app.unmount();
    // restore the terminal even if the loop failed
    let restored = app.term.end();
    res?;
    restored
}

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
