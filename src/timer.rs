//! Brew timer.
//!
//! A one-second stopwatch that runs alongside the scale's own timer
//! display. Each state change returns the scale commands that keep the
//! scale in step; the caller forwards them through the client.

use crate::scale::ScaleCommand;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Running,
    #[default]
    Stopped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrewTimer {
    state: TimerState,
    seconds: u32,
}

impl BrewTimer {
    pub const fn new() -> Self {
        Self {
            state: TimerState::Stopped,
            seconds: 0,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Toggle between running and stopped.
    pub fn start_stop(&mut self) -> ScaleCommand {
        match self.state {
            TimerState::Running => {
                info!("Timer stop at {}s", self.seconds);
                self.state = TimerState::Stopped;
                ScaleCommand::TimerOff
            }
            TimerState::Stopped => {
                info!("Timer start");
                self.state = TimerState::Running;
                ScaleCommand::TimerOn
            }
        }
    }

    /// Zero the count. Only honoured while stopped.
    pub fn reset(&mut self) -> Option<[ScaleCommand; 2]> {
        if self.state == TimerState::Running {
            return None;
        }
        info!("Timer reset");
        self.seconds = 0;
        Some([ScaleCommand::TimerReset, ScaleCommand::TimerOff])
    }

    /// One second elapsed. Counts only while running and connected.
    pub fn tick(&mut self, link_ready: bool) -> u32 {
        if self.state == TimerState::Running && link_ready {
            self.seconds = self.seconds.saturating_add(1);
        }
        self.seconds
    }
}

/// `mm:ss`, with minutes running past 99 if need be.
pub fn split_minutes(seconds: u32) -> (u32, u32) {
    (seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped_at_zero() {
        let timer = BrewTimer::new();
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.seconds(), 0);
    }

    #[test]
    fn start_stop_mirrors_scale_commands() {
        let mut timer = BrewTimer::new();
        assert_eq!(timer.start_stop(), ScaleCommand::TimerOn);
        assert_eq!(timer.state(), TimerState::Running);
        assert_eq!(timer.start_stop(), ScaleCommand::TimerOff);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn ticks_only_while_running_and_ready() {
        let mut timer = BrewTimer::new();
        assert_eq!(timer.tick(true), 0);

        timer.start_stop();
        assert_eq!(timer.tick(true), 1);
        assert_eq!(timer.tick(false), 1);
        assert_eq!(timer.tick(true), 2);

        timer.start_stop();
        assert_eq!(timer.tick(true), 2);
    }

    #[test]
    fn reset_ignored_while_running() {
        let mut timer = BrewTimer::new();
        timer.start_stop();
        timer.tick(true);
        assert_eq!(timer.reset(), None);
        assert_eq!(timer.seconds(), 1);
    }

    #[test]
    fn reset_when_stopped_zeroes_and_syncs_scale() {
        let mut timer = BrewTimer::new();
        timer.start_stop();
        timer.tick(true);
        timer.tick(true);
        timer.start_stop();

        assert_eq!(
            timer.reset(),
            Some([ScaleCommand::TimerReset, ScaleCommand::TimerOff])
        );
        assert_eq!(timer.seconds(), 0);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn minutes_and_seconds() {
        assert_eq!(split_minutes(0), (0, 0));
        assert_eq!(split_minutes(59), (0, 59));
        assert_eq!(split_minutes(61), (1, 1));
        assert_eq!(split_minutes(6000), (100, 0));
    }
}
