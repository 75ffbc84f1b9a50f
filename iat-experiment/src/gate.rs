use std::time::Duration;

use iat_core::{Element, Region, Surface};
use iat_timing::{Scheduler, TaskHandle, TimerSlot, deadline_after};
use tracing::debug;

use crate::config::UiTexts;
use crate::plan::Block;
use crate::state::SessionTask;

/// Holds the participant on a block's instructions until its minimum dwell
/// time has passed.
///
/// Remaining time is recomputed from a fixed end timestamp on every tick,
/// so a late or skipped tick never stretches the wait.
#[derive(Debug, Default)]
pub struct InstructionGate {
    can_continue: bool,
    end_ns: Option<u64>,
    countdown: TimerSlot,
}

impl InstructionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `block`'s instructions and arms the countdown if it has a dwell.
    pub fn enter<S: Surface + ?Sized>(
        &mut self,
        block: &Block,
        texts: &UiTexts,
        poll: Duration,
        now_ns: u64,
        scheduler: &mut Scheduler<SessionTask>,
        surface: &mut S,
    ) {
        surface.show_only(Some(Region::Instruction));
        surface.set_text(Element::InstructionBody, &block.instructions);
        surface.set_text(Element::ContinueControl, &texts.continue_label);

        self.countdown.clear(scheduler);
        self.end_ns = None;
        surface.set_text(Element::CountdownText, "");

        match block.min_dwell {
            Some(dwell) if !dwell.is_zero() => {
                self.can_continue = false;
                surface.set_continue_enabled(false);
                self.end_ns = Some(deadline_after(now_ns, dwell));
                debug!(
                    block = block.number,
                    dwell_ms = u64::try_from(dwell.as_millis()).unwrap_or(u64::MAX),
                    "instruction countdown"
                );

                self.refresh(now_ns, texts, scheduler, surface);
                if !self.can_continue {
                    let handle = scheduler.schedule_every(
                        deadline_after(now_ns, poll),
                        poll,
                        SessionTask::Countdown,
                    );
                    self.countdown.replace(scheduler, handle);
                }
            }
            _ => {
                self.can_continue = true;
                surface.set_continue_enabled(true);
            }
        }
    }

    /// Countdown tick. Ticks from a handle this gate no longer holds are
    /// ignored.
    pub fn tick<S: Surface + ?Sized>(
        &mut self,
        handle: TaskHandle,
        now_ns: u64,
        texts: &UiTexts,
        scheduler: &mut Scheduler<SessionTask>,
        surface: &mut S,
    ) -> bool {
        if !self.countdown.holds(handle) {
            return false;
        }
        self.refresh(now_ns, texts, scheduler, surface);
        true
    }

    fn refresh<S: Surface + ?Sized>(
        &mut self,
        now_ns: u64,
        texts: &UiTexts,
        scheduler: &mut Scheduler<SessionTask>,
        surface: &mut S,
    ) {
        let Some(end_ns) = self.end_ns else {
            return;
        };
        if now_ns >= end_ns {
            surface.set_text(Element::CountdownText, &texts.ready);
            surface.set_continue_enabled(true);
            self.can_continue = true;
            self.end_ns = None;
            self.countdown.clear(scheduler);
            return;
        }
        let secs = (end_ns - now_ns).div_ceil(1_000_000_000);
        surface.set_text(Element::CountdownText, &texts.countdown(secs));
    }

    /// Accepts the continue request if the dwell is over. On acceptance the
    /// countdown is torn down and the gate closes behind the participant.
    pub fn try_continue<S: Surface + ?Sized>(
        &mut self,
        scheduler: &mut Scheduler<SessionTask>,
        surface: &mut S,
    ) -> bool {
        if !self.can_continue {
            return false;
        }
        self.leave(scheduler);
        surface.set_text(Element::CountdownText, "");
        true
    }

    /// Cancels the countdown without accepting.
    pub fn leave(&mut self, scheduler: &mut Scheduler<SessionTask>) {
        self.countdown.clear(scheduler);
        self.can_continue = false;
        self.end_ns = None;
    }

    pub fn can_continue(&self) -> bool {
        self.can_continue
    }
}
