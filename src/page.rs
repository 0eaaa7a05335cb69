use crate::timeline::Timeline;
use std::time::Duration;

const STARTUP_DELAY: Duration = Duration::from_millis(500);
const CONSTELLATION_DELAY: Duration = Duration::from_millis(500);
const TITLE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PagePhase {
    Idle,
    Typing,
    Constellation,
    Title,
}

impl PagePhase {
    fn next(self) -> Option<PagePhase> {
        match self {
            PagePhase::Idle => Some(PagePhase::Typing),
            PagePhase::Typing => Some(PagePhase::Constellation),
            PagePhase::Constellation => Some(PagePhase::Title),
            PagePhase::Title => None,
        }
    }
}

/// Which groups are on screen for a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Visibility {
    pub(crate) intro_text: bool,
    pub(crate) constellation: bool,
    pub(crate) title: bool,
}

/// Page-level sequencing. Phases only move forward, one step per transition,
/// and each transition is a timer on the owner's virtual clock.
pub(crate) struct Page {
    phase: PagePhase,
    entered_at: [Option<Duration>; 4],
    typing_done: bool,
    timers: Timeline<PagePhase>,
}

impl Page {
    pub(crate) fn new() -> Self {
        Self {
            phase: PagePhase::Idle,
            entered_at: [Some(Duration::ZERO), None, None, None],
            typing_done: false,
            timers: Timeline::new(),
        }
    }

    pub(crate) fn mount(&mut self, now: Duration) {
        self.entered_at[PagePhase::Idle as usize] = Some(now);
        self.timers.schedule(now + STARTUP_DELAY, PagePhase::Typing);
    }

    /// Hard stop: pending transitions are dropped and never fire.
    pub(crate) fn unmount(&mut self) {
        let dropped = self.timers.close();
        log::debug!("page unmounted in {:?}, {dropped} timers cancelled", self.phase);
    }

    /// Completion signal from the intro text. Only the first call counts,
    /// and only while typing.
    pub(crate) fn typing_complete(&mut self, now: Duration) {
        if self.phase != PagePhase::Typing || self.typing_done {
            return;
        }
        self.typing_done = true;
        self.timers
            .schedule(now + CONSTELLATION_DELAY, PagePhase::Constellation);
    }

    /// Applies due transitions, returning every phase entered along with
    /// the time it was due.
    pub(crate) fn advance(&mut self, now: Duration) -> Vec<(Duration, PagePhase)> {
        let mut entered = Vec::new();
        while let Some((at, target)) = self.timers.pop_due(now) {
            if self.phase.next() != Some(target) {
                log::warn!("ignoring out-of-order transition {:?} -> {:?}", self.phase, target);
                continue;
            }
            self.phase = target;
            self.entered_at[target as usize] = Some(at);
            log::info!("page phase -> {:?} at {:?}", target, at);
            if target == PagePhase::Constellation {
                self.timers.schedule(at + TITLE_DELAY, PagePhase::Title);
            }
            entered.push((at, target));
        }
        entered
    }

    pub(crate) fn phase(&self) -> PagePhase {
        self.phase
    }

    /// Time spent in `phase` so far, if it has been entered.
    pub(crate) fn since(&self, phase: PagePhase, now: Duration) -> Option<Duration> {
        self.entered_at[phase as usize].map(|at| now.saturating_sub(at))
    }

    pub(crate) fn visibility(&self) -> Visibility {
        Visibility {
            intro_text: self.phase == PagePhase::Typing && !self.typing_done,
            constellation: self.phase >= PagePhase::Constellation,
            title: self.phase == PagePhase::Title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn full_sequence_on_a_virtual_clock() {
        let mut page = Page::new();
        page.mount(ms(0));
        assert_eq!(page.phase(), PagePhase::Idle);
        assert!(page.advance(ms(499)).is_empty());

        assert_eq!(page.advance(ms(500)), vec![(ms(500), PagePhase::Typing)]);
        assert!(page.visibility().intro_text);

        // typing takes as long as it takes
        assert!(page.advance(ms(9_000)).is_empty());
        page.typing_complete(ms(9_000));
        assert!(!page.visibility().intro_text);
        assert!(!page.visibility().constellation);

        assert!(page.advance(ms(9_499)).is_empty());
        assert_eq!(
            page.advance(ms(9_500)),
            vec![(ms(9_500), PagePhase::Constellation)]
        );
        assert!(page.visibility().constellation);
        assert!(!page.visibility().title);

        assert!(page.advance(ms(10_499)).is_empty());
        assert_eq!(page.advance(ms(10_500)), vec![(ms(10_500), PagePhase::Title)]);
        let v = page.visibility();
        assert!(v.constellation && v.title && !v.intro_text);
    }

    #[test]
    fn title_needs_at_least_two_seconds() {
        let mut page = Page::new();
        page.mount(ms(0));
        page.advance(ms(500));
        // the earliest possible completion
        page.typing_complete(ms(500));
        let mut t = 500;
        while page.phase() != PagePhase::Title {
            t += 1;
            page.advance(ms(t));
        }
        assert!(t >= 2000);
        assert_eq!(page.since(PagePhase::Title, ms(t)), Some(ms(0)));
    }

    #[test]
    fn late_jump_replays_transitions_in_order() {
        let mut page = Page::new();
        page.mount(ms(0));
        page.advance(ms(600));
        page.typing_complete(ms(600));
        assert_eq!(
            page.advance(ms(60_000)),
            vec![
                (ms(1100), PagePhase::Constellation),
                (ms(2100), PagePhase::Title)
            ]
        );
        assert_eq!(page.since(PagePhase::Constellation, ms(1100)), Some(ms(0)));
        assert_eq!(page.since(PagePhase::Title, ms(3100)), Some(ms(1000)));
    }

    #[test]
    fn completion_is_ignored_outside_typing_and_after_the_first() {
        let mut page = Page::new();
        page.mount(ms(0));
        page.typing_complete(ms(100));
        assert!(page.advance(ms(400)).is_empty());
        // a late frame still reports when the transition was due
        assert_eq!(page.advance(ms(700)), vec![(ms(500), PagePhase::Typing)]);

        page.typing_complete(ms(800));
        page.typing_complete(ms(900));
        let phases: Vec<PagePhase> = page
            .advance(ms(5_000))
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        assert_eq!(phases, vec![PagePhase::Constellation, PagePhase::Title]);
        assert!(page.advance(ms(50_000)).is_empty());
        assert_eq!(page.phase(), PagePhase::Title);
    }

    #[test]
    fn unmount_cancels_pending_transitions() {
        let mut page = Page::new();
        page.mount(ms(0));
        page.unmount();
        assert!(page.advance(ms(10_000)).is_empty());
        assert_eq!(page.phase(), PagePhase::Idle);

        let mut page = Page::new();
        page.mount(ms(0));
        page.advance(ms(500));
        page.typing_complete(ms(600));
        page.unmount();
        assert!(page.advance(ms(10_000)).is_empty());
        assert_eq!(page.phase(), PagePhase::Typing);
    }
}
