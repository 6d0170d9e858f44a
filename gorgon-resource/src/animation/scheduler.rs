//! Owns clocks and the animations attached to them, advancing everything once per tick.

use super::{
    controller::{ControllerBase, Signal, Timer},
    Animation, Clock, Progressed,
};
use crate::arena::{Arena, Key};

/// Bound on how often one animation is re-driven in a single tick after running past its end.
/// Zero length animations would otherwise never settle.
const MAX_REDISPATCH: usize = 32;

pub struct ControllerSlot {
    base: ControllerBase,
    /// In attach order.
    animations: Vec<AnimationId>,
    /// Remove once the last animation detaches.
    auto_destruct: bool,
}
pub struct AnimationSlot {
    animation: Box<dyn Animation>,
    controller: Option<ControllerId>,
}
pub type ControllerId = Key<ControllerSlot>;
pub type AnimationId = Key<AnimationSlot>;

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum SchedulerError {
    #[error("no controller {0}")]
    MissingController(ControllerId),
    #[error("no animation {0}")]
    MissingAnimation(AnimationId),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ControllerEvent {
    /// Reached its end. `by` is the animation that ran out, for controllers without a length.
    Finished {
        controller: ControllerId,
        by: Option<AnimationId>,
    },
    /// Hit its pause point.
    Paused { controller: ControllerId },
}

#[derive(Default)]
pub struct AnimationScheduler {
    controllers: Arena<ControllerSlot>,
    /// Insertion order, which is also tick order.
    order: Vec<ControllerId>,
    animations: Arena<AnimationSlot>,
}
impl AnimationScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_timer(&mut self) -> ControllerId {
        self.add_controller(Timer::new())
    }
    pub fn add_controller(&mut self, base: impl Into<ControllerBase>) -> ControllerId {
        let id = self.controllers.insert(ControllerSlot {
            base: base.into(),
            animations: Vec::new(),
            auto_destruct: false,
        });
        self.order.push(id);
        id
    }
    /// Remove a controller. Its animations stay, detached.
    pub fn remove_controller(&mut self, id: ControllerId) -> Option<ControllerBase> {
        let slot = self.controllers.remove(id)?;
        self.order.retain(|&other| other != id);
        for animation in slot.animations {
            if let Some(entry) = self.animations.get_mut(animation) {
                entry.controller = None;
            }
        }
        Some(slot.base)
    }
    #[must_use]
    pub fn controller(&self, id: ControllerId) -> Option<&ControllerBase> {
        self.controllers.get(id).map(|slot| &slot.base)
    }
    pub fn controller_mut(&mut self, id: ControllerId) -> Option<&mut ControllerBase> {
        self.controllers.get_mut(id).map(|slot| &mut slot.base)
    }
    /// Animations driven by `id`, in the order they are driven.
    #[must_use]
    pub fn animations_of(&self, id: ControllerId) -> Option<&[AnimationId]> {
        self.controllers
            .get(id)
            .map(|slot| slot.animations.as_slice())
    }
    /// # Errors
    /// `id` is stale.
    pub fn set_auto_destruct(
        &mut self,
        id: ControllerId,
        auto_destruct: bool,
    ) -> Result<(), SchedulerError> {
        self.controllers
            .get_mut(id)
            .ok_or(SchedulerError::MissingController(id))?
            .auto_destruct = auto_destruct;
        Ok(())
    }
    #[must_use]
    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    /// Add an animation without a clock. It won't progress until attached.
    pub fn insert<A: Animation>(&mut self, animation: A) -> AnimationId {
        self.animations.insert(AnimationSlot {
            animation: Box::new(animation),
            controller: None,
        })
    }
    /// Add an animation driven by a timer of its own, which goes away with it.
    pub fn insert_with_timer<A: Animation>(&mut self, animation: A) -> (AnimationId, ControllerId) {
        let timer = self.add_timer();
        if let Some(slot) = self.controllers.get_mut(timer) {
            slot.auto_destruct = true;
        }
        let id = self.animations.insert(AnimationSlot {
            animation: Box::new(animation),
            controller: Some(timer),
        });
        if let Some(slot) = self.controllers.get_mut(timer) {
            slot.animations.push(id);
        }
        (id, timer)
    }
    /// Drive `animation` by `controller`, detaching it from any previous one.
    /// # Errors
    /// Either id is stale.
    pub fn attach(
        &mut self,
        animation: AnimationId,
        controller: ControllerId,
    ) -> Result<(), SchedulerError> {
        if !self.controllers.contains(controller) {
            return Err(SchedulerError::MissingController(controller));
        }
        if self.controller_of(animation) == Some(controller) {
            return Ok(());
        }
        self.detach(animation)?;
        if let Some(slot) = self.controllers.get_mut(controller) {
            slot.animations.push(animation);
        }
        if let Some(entry) = self.animations.get_mut(animation) {
            entry.controller = Some(controller);
        }
        Ok(())
    }
    /// Stop driving `animation`, returning the controller it was attached to.
    /// # Errors
    /// `animation` is stale.
    pub fn detach(&mut self, animation: AnimationId) -> Result<Option<ControllerId>, SchedulerError> {
        let entry = self
            .animations
            .get_mut(animation)
            .ok_or(SchedulerError::MissingAnimation(animation))?;
        let Some(controller) = entry.controller.take() else {
            return Ok(None);
        };
        let emptied = self.controllers.get_mut(controller).is_some_and(|slot| {
            slot.animations.retain(|&other| other != animation);
            slot.auto_destruct && slot.animations.is_empty()
        });
        if emptied {
            log::trace!("dropping timer {controller} with its last animation");
            self.remove_controller(controller);
        }
        Ok(Some(controller))
    }
    pub fn remove_animation(&mut self, animation: AnimationId) -> Option<Box<dyn Animation>> {
        self.detach(animation).ok()?;
        self.animations
            .remove(animation)
            .map(|entry| entry.animation)
    }
    #[must_use]
    pub fn controller_of(&self, animation: AnimationId) -> Option<ControllerId> {
        self.animations.get(animation)?.controller
    }
    /// The animation, if it exists and is an `A`.
    #[must_use]
    pub fn animation<A: Animation>(&self, id: AnimationId) -> Option<&A> {
        self.animations
            .get(id)?
            .animation
            .as_ref()
            .as_any()
            .downcast_ref()
    }
    pub fn animation_mut<A: Animation>(&mut self, id: AnimationId) -> Option<&mut A> {
        self.animations
            .get_mut(id)?
            .animation
            .as_mut()
            .as_any_mut()
            .downcast_mut()
    }

    /// Advance every clock by `elapsed` milliseconds, then drive its animations.
    /// Clocks go in the order they were added, animations in the order they were attached.
    pub fn tick(&mut self, elapsed: u64) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        if elapsed == 0 {
            return events;
        }
        let mut signals = Vec::new();
        for &id in &self.order {
            let Some(ControllerSlot {
                base, animations, ..
            }) = self.controllers.get_mut(id)
            else {
                continue;
            };
            base.advance(elapsed, &mut signals);
            events.extend(signals.drain(..).map(|signal| event(id, None, signal)));

            // Every animation sees the same clock reading. Re-dispatch happens on a local copy.
            let progress = base.progress();
            let controlled = base.is_controlled();
            let rewinds = base.rewinds();
            let mut all_ended = !animations.is_empty();
            let mut last_end: Option<(u64, AnimationId)> = None;
            for &animation in animations.iter() {
                let Some(entry) = self.animations.get_mut(animation) else {
                    continue;
                };
                let clock = Clock {
                    progress,
                    controlled,
                };
                match drive(entry.animation.as_mut(), clock, rewinds) {
                    Some(end) => {
                        if last_end.map_or(true, |(latest, _)| end > latest) {
                            last_end = Some((end, animation));
                        }
                    }
                    None => all_ended = false,
                }
            }
            if all_ended && base.ends_with_animations() {
                if let Some((end, animation)) = last_end {
                    base.finish_at(end, &mut signals);
                    events.extend(
                        signals
                            .drain(..)
                            .map(|signal| event(id, Some(animation), signal)),
                    );
                }
            }
        }
        events
    }
}

fn event(controller: ControllerId, by: Option<AnimationId>, signal: Signal) -> ControllerEvent {
    match signal {
        Signal::Finished => ControllerEvent::Finished { controller, by },
        Signal::Paused => ControllerEvent::Paused { controller },
    }
}

/// Hand the clock to `animation`. Returns where it ran out, if it did and the clock does not rewind.
/// On a rewinding clock an overrun wraps around the animation's own length and is tried again.
fn drive(animation: &mut dyn Animation, mut clock: Clock, rewinds: bool) -> Option<u64> {
    for _ in 0..MAX_REDISPATCH {
        match animation.progress(clock) {
            Progressed::Running => return None,
            Progressed::Finished { leftover } => {
                // Zero or nonsense lengths have nothing to wrap around.
                let length = clock.progress.checked_sub(leftover).filter(|&len| len > 0)?;
                if !rewinds {
                    return Some(length);
                }
                clock.progress = leftover % length;
            }
        }
    }
    log::warn!("animation still overrunning after {MAX_REDISPATCH} passes");
    None
}
