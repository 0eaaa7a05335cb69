use crate::timeline::Timeline;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

pub(crate) const INTRO_LINES: [&str; 6] = [
    "It's not AI.",
    "It's an operating system for human agency.",
    "",
    "You won't use it.",
    "You'll build with it.",
    "From the builders of Eclipse LMOS.",
];

const KEY_DELAY_MIN_MS: u64 = 50;
const KEY_DELAY_SPREAD_MS: u64 = 30;
const LINE_PAUSE: Duration = Duration::from_millis(700);
const SPACER: Duration = Duration::from_millis(500);
const TRAILING: Duration = Duration::from_millis(1000);
const SMOOTH_STEP: Duration = Duration::from_millis(700);
const CURSOR_BLINK: Duration = Duration::from_millis(300);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum RevealStyle {
    /// one character at a time with a blinking cursor
    #[default]
    Typewriter,
    /// whole lines fade in one after another
    Smooth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Key,
    EndLine,
    Spacer,
    ShowLine(usize),
    Finish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TypingEvent {
    Char { line: usize, typed: usize },
    LineDone(usize),
    Complete,
}

/// Plays the intro lines once. Driven by `advance` with the time since mount;
/// `Complete` is reported exactly once, after the trailing pause that
/// follows the last line.
pub(crate) struct TypingSequence {
    lines: Vec<String>,
    style: RevealStyle,
    timers: Timeline<Step>,
    /// Lines fully shown, in order.
    shown: Vec<String>,
    line: usize,
    typed: usize,
    /// True while characters are still going in (drives the cursor).
    typing: bool,
    done: bool,
}

impl TypingSequence {
    pub(crate) fn new<S: AsRef<str>>(lines: &[S], style: RevealStyle) -> Self {
        Self {
            lines: lines.iter().map(|s| s.as_ref().to_string()).collect(),
            style,
            timers: Timeline::new(),
            shown: Vec::new(),
            line: 0,
            typed: 0,
            typing: false,
            done: false,
        }
    }

    pub(crate) fn mount<R: Rng + ?Sized>(&mut self, now: Duration, rng: &mut R) {
        match self.style {
            RevealStyle::Typewriter => self.begin_line(now, rng),
            RevealStyle::Smooth => {
                if self.lines.is_empty() {
                    self.timers.schedule(now + TRAILING, Step::Finish);
                }
                for i in 0..self.lines.len() {
                    self.timers
                        .schedule(now + SMOOTH_STEP * i as u32, Step::ShowLine(i));
                }
            }
        }
    }

    /// Cancels every pending step; nothing fires afterwards.
    pub(crate) fn unmount(&mut self) {
        let dropped = self.timers.close();
        log::debug!("typing sequence unmounted, {dropped} timers cancelled");
    }

    pub(crate) fn advance<R: Rng + ?Sized>(
        &mut self,
        now: Duration,
        rng: &mut R,
    ) -> Vec<TypingEvent> {
        let mut out = Vec::new();
        while let Some((at, step)) = self.timers.pop_due(now) {
            self.apply(at, step, rng, &mut out);
        }
        out
    }

    fn begin_line<R: Rng + ?Sized>(&mut self, now: Duration, rng: &mut R) {
        self.typed = 0;
        match self.lines.get(self.line) {
            None => {
                self.typing = false;
                self.timers.schedule(now + TRAILING, Step::Finish);
            }
            Some(l) if l.is_empty() => {
                // the cursor keeps blinking on a blank line
                self.typing = true;
                self.timers.schedule(now + SPACER, Step::Spacer);
            }
            Some(_) => {
                self.typing = true;
                self.timers.schedule(now + key_delay(rng), Step::Key);
            }
        }
    }

    fn apply<R: Rng + ?Sized>(
        &mut self,
        at: Duration,
        step: Step,
        rng: &mut R,
        out: &mut Vec<TypingEvent>,
    ) {
        match step {
            Step::Key => {
                let len = self.current_len();
                self.typed += 1;
                out.push(TypingEvent::Char {
                    line: self.line,
                    typed: self.typed,
                });
                if self.typed < len {
                    self.timers.schedule(at + key_delay(rng), Step::Key);
                } else {
                    self.typing = false;
                    self.timers.schedule(at + LINE_PAUSE, Step::EndLine);
                }
            }
            Step::EndLine | Step::Spacer => {
                let text = self.lines[self.line].clone();
                self.shown.push(text);
                out.push(TypingEvent::LineDone(self.line));
                self.line += 1;
                self.begin_line(at, rng);
            }
            Step::ShowLine(i) => {
                self.shown.push(self.lines[i].clone());
                self.line = i + 1;
                out.push(TypingEvent::LineDone(i));
                if self.line == self.lines.len() {
                    self.timers.schedule(at + TRAILING, Step::Finish);
                }
            }
            Step::Finish => {
                if !self.done {
                    self.done = true;
                    out.push(TypingEvent::Complete);
                }
            }
        }
    }

    fn current_len(&self) -> usize {
        self.lines
            .get(self.line)
            .map(|l| l.chars().count())
            .unwrap_or(0)
    }

    pub(crate) fn shown_lines(&self) -> &[String] {
        &self.shown
    }

    /// The line currently being typed, cut to what has appeared so far.
    pub(crate) fn partial(&self) -> Option<String> {
        if self.style == RevealStyle::Smooth {
            return None;
        }
        let line = self.lines.get(self.line)?;
        Some(line.chars().take(self.typed).collect())
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.done
    }

    pub(crate) fn cursor_visible(&self, now: Duration) -> bool {
        self.typing && (now.as_millis() / CURSOR_BLINK.as_millis()) % 2 == 0
    }
}

fn key_delay<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    Duration::from_millis(KEY_DELAY_MIN_MS + rng.gen_range(0..KEY_DELAY_SPREAD_MS))
}
