//! Clocks that drive animations: a free running [`Timer`] and a playable [`Controller`].

use az::SaturatingAs;

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ControllerError {
    /// Playing backwards from the finished state needs a length to start from.
    #[error("cannot play backwards without a known length")]
    UnknownLength,
}

/// Something a controller reports while advancing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Signal {
    Finished,
    Paused,
}

/// Uncontrolled clock. Counts up forever, animations driven by it loop on their own.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Timer {
    progress: u64,
}
impl Timer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Milliseconds since the last reset.
    #[must_use]
    pub fn progress(&self) -> u64 {
        self.progress
    }
    pub fn set_progress(&mut self, progress: u64) {
        self.progress = progress;
    }
    pub fn reset(&mut self) {
        self.progress = 0;
    }
    fn advance(&mut self, elapsed: u64) {
        self.progress = self.progress.saturating_add(elapsed);
    }
}

/// Playable clock with speed, direction, looping and an optional length.
///
/// Progress accumulates as a float so that non-unit speeds don't lose time to rounding.
#[derive(Clone, Debug, PartialEq)]
pub struct Controller {
    progress: f64,
    speed: f32,
    /// Zero when unknown. Animations then tell when they are over.
    length: u64,
    paused: bool,
    looping: bool,
    finished: bool,
    pause_at: Option<u64>,
}
impl Default for Controller {
    fn default() -> Self {
        Self {
            progress: 0.0,
            speed: 1.0,
            length: 0,
            paused: false,
            looping: false,
            finished: false,
            pause_at: None,
        }
    }
}
impl Controller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn with_length(length: u64) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }
    /// Start playing. A finished controller restarts from its beginning, which for reverse play
    /// is its end.
    /// # Errors
    /// [`ControllerError::UnknownLength`] when restarting in reverse without a length. The
    /// controller is left unchanged.
    pub fn play(&mut self) -> Result<(), ControllerError> {
        if self.finished {
            if self.speed >= 0.0 {
                self.progress = 0.0;
            } else if self.length == 0 {
                return Err(ControllerError::UnknownLength);
            } else {
                self.progress = self.length as f64;
            }
            self.finished = false;
        }
        self.paused = false;
        Ok(())
    }
    /// [`Self::play`], looping from now on.
    /// # Errors
    /// See [`Self::play`].
    pub fn play_looping(&mut self) -> Result<(), ControllerError> {
        self.play()?;
        self.looping = true;
        Ok(())
    }
    pub fn pause(&mut self) {
        self.paused = true;
    }
    pub fn resume(&mut self) {
        self.paused = false;
    }
    /// Pause once progress reaches `time`, in the current direction of play.
    pub fn pause_at(&mut self, time: u64) {
        self.pause_at = Some(time);
    }
    /// Back to the start at normal speed, playing.
    pub fn reset(&mut self) {
        self.speed = 1.0;
        self.progress = 0.0;
        self.paused = false;
        self.finished = false;
        self.pause_at = None;
    }
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }
    pub fn reverse(&mut self) {
        self.speed = -self.speed;
    }
    pub fn set_length(&mut self, length: u64) {
        self.length = length;
    }
    pub fn set_progress(&mut self, progress: u64) {
        self.progress = progress as f64;
    }
    /// Progress in milliseconds, rounded.
    #[must_use]
    pub fn progress(&self) -> u64 {
        self.progress.round().saturating_as()
    }
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.speed
    }
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
    #[must_use]
    pub fn is_playing(&self) -> bool {
        !self.paused && !self.finished
    }
    /// Reverse play can only loop with a known length.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        if self.speed >= 0.0 {
            self.looping
        } else {
            self.looping && self.length != 0
        }
    }

    fn advance(&mut self, elapsed: u64, signals: &mut Vec<Signal>) {
        if !self.is_playing() {
            return;
        }
        self.progress += elapsed as f64 * f64::from(self.speed);
        let length = self.length as f64;

        if self.speed >= 0.0 {
            if self.length != 0 && self.progress >= length {
                if self.looping {
                    self.progress %= length;
                } else {
                    self.progress = length;
                    self.finish(signals);
                }
            }
        } else if self.progress < 0.0 {
            if self.is_looping() {
                self.progress = self.progress.rem_euclid(length);
            } else {
                self.progress = 0.0;
                self.finish(signals);
            }
        }

        if let Some(at) = self.pause_at {
            let at = at as f64;
            let reached = if self.speed >= 0.0 {
                self.progress >= at
            } else {
                self.progress <= at
            };
            if reached {
                self.pause_at = None;
                self.paused = true;
                signals.push(Signal::Paused);
            }
        }
    }
    fn finish(&mut self, signals: &mut Vec<Signal>) {
        if !self.finished {
            self.finished = true;
            signals.push(Signal::Finished);
        }
    }
}

/// The two kinds of clock an animation can be attached to.
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerBase {
    Timer(Timer),
    Controller(Controller),
}
impl ControllerBase {
    #[must_use]
    pub fn progress(&self) -> u64 {
        match self {
            Self::Timer(timer) => timer.progress(),
            Self::Controller(controller) => controller.progress(),
        }
    }
    /// Whether progress is bounded by play state, rather than counting up forever.
    #[must_use]
    pub fn is_controlled(&self) -> bool {
        matches!(self, Self::Controller(_))
    }
    pub fn reset(&mut self) {
        match self {
            Self::Timer(timer) => timer.reset(),
            Self::Controller(controller) => controller.reset(),
        }
    }
    #[must_use]
    pub fn as_timer(&self) -> Option<&Timer> {
        match self {
            Self::Timer(timer) => Some(timer),
            Self::Controller(_) => None,
        }
    }
    #[must_use]
    pub fn as_controller(&self) -> Option<&Controller> {
        match self {
            Self::Controller(controller) => Some(controller),
            Self::Timer(_) => None,
        }
    }
    pub fn as_controller_mut(&mut self) -> Option<&mut Controller> {
        match self {
            Self::Controller(controller) => Some(controller),
            Self::Timer(_) => None,
        }
    }
    pub(super) fn advance(&mut self, elapsed: u64, signals: &mut Vec<Signal>) {
        match self {
            Self::Timer(timer) => timer.advance(elapsed),
            Self::Controller(controller) => controller.advance(elapsed, signals),
        }
    }
    /// Whether animations that run out start over on their own, rather than waiting on this clock.
    pub(super) fn rewinds(&self) -> bool {
        match self {
            Self::Timer(_) => true,
            Self::Controller(controller) => controller.length == 0 && controller.is_looping(),
        }
    }
    /// Whether this clock has no end of its own and stops once its animations have run out.
    pub(super) fn ends_with_animations(&self) -> bool {
        match self {
            Self::Timer(_) => false,
            Self::Controller(controller) => {
                controller.length == 0 && !controller.is_looping() && !controller.finished
            }
        }
    }
    /// Stop a controller at `end`, where its last animation ran out. Timers never finish.
    pub(super) fn finish_at(&mut self, end: u64, signals: &mut Vec<Signal>) {
        if let Self::Controller(controller) = self {
            controller.progress = end as f64;
            controller.finish(signals);
        }
    }
}
impl From<Timer> for ControllerBase {
    fn from(timer: Timer) -> Self {
        Self::Timer(timer)
    }
}
impl From<Controller> for ControllerBase {
    fn from(controller: Controller) -> Self {
        Self::Controller(controller)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn advance(controller: &mut Controller, elapsed: u64) -> Vec<Signal> {
        let mut signals = Vec::new();
        controller.advance(elapsed, &mut signals);
        signals
    }

    #[test]
    fn finishes_once_at_length() {
        let mut controller = Controller::with_length(1000);
        assert!(advance(&mut controller, 600).is_empty());
        assert_eq!(controller.progress(), 600);
        assert_eq!(advance(&mut controller, 600), [Signal::Finished]);
        assert_eq!(controller.progress(), 1000);
        assert!(controller.is_finished());
        // Finished controllers stand still.
        assert!(advance(&mut controller, 600).is_empty());
        assert_eq!(controller.progress(), 1000);

        controller.play().unwrap();
        assert_eq!(controller.progress(), 0);
        assert!(controller.is_playing());
    }
    #[test]
    fn looping_wraps() {
        let mut controller = Controller::with_length(1000);
        controller.play_looping().unwrap();
        assert!(advance(&mut controller, 1200).is_empty());
        assert_eq!(controller.progress(), 200);
        assert!(!controller.is_finished());

        controller.reverse();
        assert!(advance(&mut controller, 500).is_empty());
        assert_eq!(controller.progress(), 700);
    }
    #[test]
    fn reverse_play() {
        let mut controller = Controller::new();
        controller.set_speed(-1.0);
        controller.set_progress(100);
        assert_eq!(advance(&mut controller, 150), [Signal::Finished]);
        assert_eq!(controller.progress(), 0);
        // Looping backwards needs a length.
        controller.set_looping(true);
        assert!(!controller.is_looping());
        assert_eq!(controller.play(), Err(ControllerError::UnknownLength));
        assert!(controller.is_finished());

        controller.set_length(400);
        assert!(controller.is_looping());
        controller.play().unwrap();
        assert_eq!(controller.progress(), 400);
        assert!(advance(&mut controller, 500).is_empty());
        assert_eq!(controller.progress(), 300);
    }
    #[test]
    fn fractional_speed_keeps_time() {
        let mut controller = Controller::new();
        controller.set_speed(0.25);
        for _ in 0..10 {
            advance(&mut controller, 1);
        }
        // Truncating each step would have lost all of it.
        assert_eq!(controller.progress(), 3);
        assert!((controller.progress - 2.5).abs() < 1e-9);
    }
    #[test]
    fn pause_points() {
        let mut controller = Controller::new();
        controller.pause_at(250);
        assert!(advance(&mut controller, 200).is_empty());
        assert_eq!(advance(&mut controller, 100), [Signal::Paused]);
        assert!(controller.is_paused());
        assert!(advance(&mut controller, 100).is_empty());
        assert_eq!(controller.progress(), 300);
        controller.resume();
        advance(&mut controller, 100);
        assert_eq!(controller.progress(), 400);

        controller.reset();
        assert_eq!(controller.progress(), 0);
        assert!(controller.is_playing());
    }
    #[test]
    fn clocks_without_length() {
        let mut signals = Vec::new();
        let mut base = ControllerBase::from(Controller::new());
        base.advance(450, &mut signals);
        assert!(!base.rewinds());
        assert!(base.ends_with_animations());
        base.finish_at(200, &mut signals);
        assert_eq!(base.progress(), 200);
        assert_eq!(signals, [Signal::Finished]);
        assert!(!base.ends_with_animations());

        let mut looping = Controller::new();
        looping.play_looping().unwrap();
        let looping = ControllerBase::from(looping);
        assert!(looping.rewinds());
        assert!(!looping.ends_with_animations());

        // Controllers with a length wrap or clamp on their own.
        let mut bounded = Controller::with_length(1000);
        bounded.play_looping().unwrap();
        let bounded = ControllerBase::from(bounded);
        assert!(!bounded.rewinds());
        assert!(!bounded.ends_with_animations());

        signals.clear();
        let mut timer = ControllerBase::from(Timer::new());
        timer.advance(450, &mut signals);
        assert!(timer.rewinds());
        timer.finish_at(50, &mut signals);
        assert_eq!(timer.progress(), 450);
        assert!(signals.is_empty());
        assert!(!timer.is_controlled());
    }
}
