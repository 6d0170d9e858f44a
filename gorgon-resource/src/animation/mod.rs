//! # Animation
//!
//! Running animations are driven by a clock, either a [`Timer`] that counts up forever or a
//! [`Controller`] with play state. The [`AnimationScheduler`] owns both and advances them together.

pub mod controller;
pub mod scheduler;

pub use controller::{Controller, ControllerBase, ControllerError, Timer};
pub use scheduler::{AnimationId, AnimationScheduler, ControllerEvent, ControllerId, SchedulerError};

/// Index of the frame shown at `time` milliseconds, for frames lasting `durations` each.
/// Time wraps around the total length. `None` if the total is zero.
pub fn frame_at<I>(durations: I, time: u64) -> Option<usize>
where
    I: IntoIterator<Item = u32>,
    I::IntoIter: Clone,
{
    let durations = durations.into_iter();
    let total: u64 = durations.clone().map(u64::from).sum();
    if total == 0 {
        return None;
    }
    let mut time = time % total;
    for (index, duration) in durations.enumerate() {
        let duration = u64::from(duration);
        if time < duration {
            return Some(index);
        }
        time -= duration;
    }
    None
}

/// Clock state handed to an animation on every tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Clock {
    /// Milliseconds into the animation.
    pub progress: u64,
    /// Set when driven by a [`Controller`]. Uncontrolled animations loop on their own.
    pub controlled: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Progressed {
    Running,
    /// Ran past the end by `leftover` milliseconds.
    Finished { leftover: u64 },
}

/// Type erasure helper, so schedulers can hand back concrete animations.
pub trait AsAny: std::any::Any {
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
impl<T: std::any::Any> AsAny for T {
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// A running instance of some animated resource.
pub trait Animation: AsAny {
    fn progress(&mut self, clock: Clock) -> Progressed;
}

/// Instance of a frame animation, tracking which frame is showing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameAnimation {
    durations: Vec<u32>,
    total: u64,
    current: Option<usize>,
}
impl FrameAnimation {
    #[must_use]
    pub fn new(durations: Vec<u32>) -> Self {
        let total = durations.iter().copied().map(u64::from).sum();
        let current = if total == 0 { None } else { Some(0) };
        Self {
            durations,
            total,
            current,
        }
    }
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.total
    }
    /// Frame to draw, `None` when there is nothing to show.
    #[must_use]
    pub fn current_frame(&self) -> Option<usize> {
        self.current
    }
}
impl Animation for FrameAnimation {
    fn progress(&mut self, clock: Clock) -> Progressed {
        if self.total == 0 {
            self.current = None;
            return Progressed::Running;
        }
        if !clock.controlled {
            self.current = frame_at(self.durations.iter().copied(), clock.progress);
            return Progressed::Running;
        }
        if clock.progress >= self.total {
            // Hold the last frame.
            self.current = self.durations.len().checked_sub(1);
            if clock.progress > self.total {
                return Progressed::Finished {
                    leftover: clock.progress - self.total,
                };
            }
            return Progressed::Running;
        }
        self.current = frame_at(self.durations.iter().copied(), clock.progress);
        Progressed::Running
    }
}

impl crate::graphics::BitmapAnimationProvider {
    #[must_use]
    pub fn create_animation(&self) -> FrameAnimation {
        FrameAnimation::new(self.durations())
    }
}
impl crate::resources::animation::Animation {
    #[must_use]
    pub fn create_animation(&self) -> FrameAnimation {
        FrameAnimation::new(self.durations().to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frame_lookup() {
        let durations = [100, 50, 0, 200];
        assert_eq!(frame_at(durations, 0), Some(0));
        assert_eq!(frame_at(durations, 99), Some(0));
        assert_eq!(frame_at(durations, 100), Some(1));
        // Zero length frames are never shown.
        assert_eq!(frame_at(durations, 150), Some(3));
        assert_eq!(frame_at(durations, 349), Some(3));
        assert_eq!(frame_at(durations, 350), Some(0));
        assert_eq!(frame_at([0, 0], 10), None);
        assert_eq!(frame_at(Vec::<u32>::new(), 10), None);
    }
    #[test]
    fn controlled_frames_hold_and_overrun() {
        let mut anim = FrameAnimation::new(vec![100, 100]);
        let controlled = |progress| Clock {
            progress,
            controlled: true,
        };
        assert_eq!(anim.progress(controlled(150)), Progressed::Running);
        assert_eq!(anim.current_frame(), Some(1));
        assert_eq!(anim.progress(controlled(200)), Progressed::Running);
        assert_eq!(anim.current_frame(), Some(1));
        assert_eq!(
            anim.progress(controlled(230)),
            Progressed::Finished { leftover: 30 }
        );
        assert_eq!(anim.current_frame(), Some(1));

        assert_eq!(
            anim.progress(Clock {
                progress: 230,
                controlled: false
            }),
            Progressed::Running
        );
        assert_eq!(anim.current_frame(), Some(0));
    }
    #[test]
    fn instances_from_providers() {
        use crate::graphics::{Bitmap, BitmapAnimationProvider, ColorMode};
        let mut provider = BitmapAnimationProvider::default();
        provider.push(Bitmap::new(1, 1, ColorMode::Alpha).unwrap(), 30);
        provider.push(Bitmap::new(1, 1, ColorMode::Alpha).unwrap(), 70);
        let mut anim = provider.create_animation();
        assert_eq!(anim.duration(), 100);
        anim.progress(Clock {
            progress: 40,
            controlled: true,
        });
        assert_eq!(anim.current_frame(), Some(1));
    }
    #[test]
    fn empty_animation_shows_nothing() {
        let mut anim = FrameAnimation::new(Vec::new());
        assert_eq!(anim.current_frame(), None);
        assert_eq!(
            anim.progress(Clock {
                progress: 10,
                controlled: true
            }),
            Progressed::Running
        );
        assert_eq!(anim.current_frame(), None);
    }
}
