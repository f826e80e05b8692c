use crate::page_api::{KeyPhase, PageApi};
use crate::protocol::{CloseOutcome, KEY_ESCAPE};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerTicket(pub u64);

pub trait Timers {
    fn schedule(&mut self, ticket: TimerTicket, delay: Duration);
    fn cancel(&mut self, ticket: TimerTicket);
}

pub type Completion = Box<dyn FnOnce(CloseOutcome)>;

/// A run that reached `Satisfied` or `Exhausted`. The caller invokes
/// [`FinishedClose::complete`] once it no longer holds the bridge.
pub struct FinishedClose {
    pub outcome: CloseOutcome,
    completion: Completion,
}

impl FinishedClose {
    pub fn complete(self) {
        (self.completion)(self.outcome);
    }
}

struct CloseRun {
    pending: Option<TimerTicket>,
    remaining: u32,
    escapes: u32,
    completion: Completion,
}

pub struct UiCloseLoop {
    retries: u32,
    delay: Duration,
    next_ticket: u64,
    run: Option<CloseRun>,
}

impl UiCloseLoop {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self {
            retries,
            delay,
            next_ticket: 0,
            run: None,
        }
    }

    pub fn pending_ticket(&self) -> Option<TimerTicket> {
        self.run.as_ref().and_then(|r| r.pending)
    }

    /// A run still waiting on its timer is cancelled and finished as
    /// `Exhausted` before the new one starts. Finished runs come back in that
    /// order.
    pub fn start(
        &mut self,
        api: &dyn PageApi,
        timers: &mut dyn Timers,
        completion: Completion,
    ) -> Vec<FinishedClose> {
        let mut finished = Vec::new();
        if let Some(prev) = self.run.take() {
            debug!(escapes = prev.escapes, "ui close run superseded");
            finished.push(Self::finish(timers, prev, |escapes| CloseOutcome::Exhausted {
                escapes,
            }));
        }

        self.run = Some(CloseRun {
            pending: None,
            remaining: self.retries,
            escapes: 0,
            completion,
        });
        finished.extend(self.poll(api, timers));
        finished
    }

    pub fn on_timer(
        &mut self,
        api: &dyn PageApi,
        timers: &mut dyn Timers,
        ticket: TimerTicket,
    ) -> Option<FinishedClose> {
        let current = self.run.as_mut()?;
        if current.pending != Some(ticket) {
            debug!(?ticket, "stale ui close timer ignored");
            return None;
        }
        current.pending = None;
        self.poll(api, timers)
    }

    fn poll(&mut self, api: &dyn PageApi, timers: &mut dyn Timers) -> Option<FinishedClose> {
        api.disable_suggestions_watcher();
        api.disable_overlay_watcher();

        let mut run = self.run.take()?;

        if api.is_all_player_ui_closed() {
            debug!(escapes = run.escapes, "player ui closed, running callback");
            return Some(Self::finish(timers, run, |escapes| CloseOutcome::Satisfied {
                escapes,
            }));
        }

        if run.remaining == 0 {
            debug!(escapes = run.escapes, "player ui still open and retries are out, running callback anyway");
            return Some(Self::finish(timers, run, |escapes| CloseOutcome::Exhausted {
                escapes,
            }));
        }

        match api.active_element() {
            Some(el) => {
                for phase in [KeyPhase::Down, KeyPhase::Up] {
                    if let Err(e) = api.dispatch_key(el, phase, KEY_ESCAPE) {
                        warn!("escape {} failed: {e}", phase.event_type());
                    }
                }
            }
            None => debug!("no focused element to send escape to"),
        }
        run.remaining -= 1;
        run.escapes += 1;

        self.next_ticket += 1;
        let ticket = TimerTicket(self.next_ticket);
        timers.schedule(ticket, self.delay);
        run.pending = Some(ticket);
        debug!(remaining = run.remaining, ?ticket, "player ui not closed, retry scheduled");
        self.run = Some(run);
        None
    }

    fn finish(
        timers: &mut dyn Timers,
        mut run: CloseRun,
        outcome: impl FnOnce(u32) -> CloseOutcome,
    ) -> FinishedClose {
        if let Some(ticket) = run.pending.take() {
            timers.cancel(ticket);
        }
        FinishedClose {
            outcome: outcome(run.escapes),
            completion: run.completion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_page::{ManualTimers, MockPage, PageEvent};
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_completion() -> (Completion, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        (Box::new(move |_| seen.set(seen.get() + 1)), calls)
    }

    #[test]
    fn stale_ticket_does_not_advance_the_run() {
        let page = MockPage::youtube_tv();
        page.set_ui_closed(false);
        let mut timers = ManualTimers::default();
        let mut lp = UiCloseLoop::new(4, Duration::from_millis(300));
        let (completion, calls) = counting_completion();

        assert!(lp.start(&page, &mut timers, completion).is_empty());
        let live = lp.pending_ticket().unwrap();
        assert!(lp.on_timer(&page, &mut timers, TimerTicket(live.0 + 100)).is_none());
        assert_eq!(lp.pending_ticket(), Some(live));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn restart_finishes_previous_run_once() {
        let page = MockPage::youtube_tv();
        page.set_ui_closed(false);
        let mut timers = ManualTimers::default();
        let mut lp = UiCloseLoop::new(4, Duration::from_millis(300));

        let (first, first_calls) = counting_completion();
        assert!(lp.start(&page, &mut timers, first).is_empty());
        let first_ticket = lp.pending_ticket().unwrap();

        let (second, second_calls) = counting_completion();
        let finished = lp.start(&page, &mut timers, second);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].outcome, CloseOutcome::Exhausted { escapes: 1 });
        assert!(timers.cancelled().contains(&first_ticket));
        assert_eq!(timers.pending_len(), 1);
        finished.into_iter().for_each(FinishedClose::complete);
        assert_eq!(first_calls.get(), 1);

        // The old timer fires anyway (a real setTimeout may already be queued).
        assert!(lp.on_timer(&page, &mut timers, first_ticket).is_none());

        page.set_ui_closed(true);
        let ticket = lp.pending_ticket().unwrap();
        lp.on_timer(&page, &mut timers, ticket).unwrap().complete();
        assert_eq!(first_calls.get(), 1);
        assert_eq!(second_calls.get(), 1);
    }

    #[test]
    fn escape_goes_to_the_focused_element() {
        let page = MockPage::youtube_tv();
        page.set_ui_closed(false);
        let focused = page.focus(".icon-like.toggle-button").unwrap();
        let mut timers = ManualTimers::default();
        let mut lp = UiCloseLoop::new(1, Duration::from_millis(300));
        let (completion, _) = counting_completion();
        lp.start(&page, &mut timers, completion);

        let keys: Vec<PageEvent> = page
            .events()
            .into_iter()
            .filter(|e| matches!(e, PageEvent::Key { .. }))
            .collect();
        assert_eq!(
            keys,
            vec![
                PageEvent::Key {
                    element: focused,
                    phase: KeyPhase::Down,
                    key_code: KEY_ESCAPE
                },
                PageEvent::Key {
                    element: focused,
                    phase: KeyPhase::Up,
                    key_code: KEY_ESCAPE
                },
            ]
        );
    }
}
