//! # Moving drawables out of the tree
//!
//! A [`Provider`] is a drawable that no longer depends on the tree or the file it came from.
//! Moving out takes the pixel data of nodes nobody else holds, leaving them empty, and clones
//! whatever is shared. The [`Transfer`] tag says which of the two happened to the resource
//! itself.

use super::{
    animation::Animation,
    image::Image,
    line::Line,
    masked::MaskedObject,
    parts::{self, Composite, PartsKind},
    rectangle::Rectangle,
    scalable::ScalableObject,
    stacked::StackedObject,
    tinted::TintedObject,
};
use crate::{
    error::{FormatError, LoadError, MoveOutError},
    geometry::{Point, RgbaF},
    gid::Gid,
    graphics::{Bitmap, BitmapAnimationProvider, Orientation, SizeController},
    tree::{Handle, Node, Resource, Tree},
};

/// Whether a moved out value was taken from the tree or copied from it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transfer<T> {
    /// The tree held the only reference, its data was moved.
    Owned(T),
    /// Other owners remain, the data was cloned and the tree is untouched.
    Duplicated(T),
}
impl<T> Transfer<T> {
    #[must_use]
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Self::Owned(inner) | Self::Duplicated(inner) => inner,
        }
    }
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Transfer<U> {
        match self {
            Self::Owned(inner) => Transfer::Owned(f(inner)),
            Self::Duplicated(inner) => Transfer::Duplicated(f(inner)),
        }
    }
}

/// Parts of a composite by slot, with absent slots as `None`.
#[derive(Clone, PartialEq, Debug)]
pub enum Parts<const N: usize> {
    Bitmap([Option<Bitmap>; N]),
    Animated([Option<BitmapAnimationProvider>; N]),
    Generic([Option<Box<Provider>>; N]),
}
impl<const N: usize> Parts<N> {
    /// No part in any slot.
    #[must_use]
    pub fn empty() -> Self {
        Self::Bitmap(std::array::from_fn(|_| None))
    }
    #[must_use]
    pub fn kind(&self) -> PartsKind {
        match self {
            Self::Bitmap(_) => PartsKind::Bitmap,
            Self::Animated(_) => PartsKind::Animated,
            Self::Generic(_) => PartsKind::Generic,
        }
    }
    #[must_use]
    pub fn bitmaps(&self) -> Option<&[Option<Bitmap>; N]> {
        match self {
            Self::Bitmap(bitmaps) => Some(bitmaps),
            _ => None,
        }
    }
    #[must_use]
    pub fn animations(&self) -> Option<&[Option<BitmapAnimationProvider>; N]> {
        match self {
            Self::Animated(animations) => Some(animations),
            _ => None,
        }
    }
    #[must_use]
    pub fn generic(&self) -> Option<&[Option<Box<Provider>>; N]> {
        match self {
            Self::Generic(parts) => Some(parts),
            _ => None,
        }
    }
    fn from_providers(kind: PartsKind, providers: [Option<Provider>; N]) -> Self {
        match kind {
            PartsKind::Bitmap => Self::Bitmap(providers.map(|part| match part {
                Some(Provider::Bitmap(bitmap)) => Some(bitmap),
                _ => None,
            })),
            PartsKind::Animated => Self::Animated(providers.map(|part| match part {
                Some(Provider::Animation(animation)) => Some(animation),
                _ => None,
            })),
            PartsKind::Generic => Self::Generic(providers.map(|part| part.map(Box::new))),
        }
    }
    fn into_providers(self) -> [Option<Provider>; N] {
        match self {
            Self::Bitmap(bitmaps) => bitmaps.map(|part| part.map(Provider::Bitmap)),
            Self::Animated(animations) => animations.map(|part| part.map(Provider::Animation)),
            Self::Generic(parts) => parts.map(|part| part.map(|boxed| *boxed)),
        }
    }
    fn for_each(&mut self, bitmap: &mut dyn FnMut(&mut Bitmap)) {
        match self {
            Self::Bitmap(bitmaps) => bitmaps.iter_mut().flatten().for_each(bitmap),
            Self::Animated(animations) => {
                for frame in animations.iter_mut().flatten().flat_map(|a| a.frames_mut()) {
                    bitmap(&mut frame.bitmap);
                }
            }
            Self::Generic(parts) => {
                for part in parts.iter_mut().flatten() {
                    part.for_each_bitmap(bitmap);
                }
            }
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct LineProvider {
    pub orientation: Orientation,
    pub tiling: bool,
    pub parts: Parts<3>,
}
#[derive(Clone, PartialEq, Debug)]
pub struct RectangleProvider {
    pub tiling: bool,
    pub parts: Parts<9>,
}
#[derive(Clone, PartialEq, Debug)]
pub struct MaskedProvider {
    pub parts: Parts<2>,
}
#[derive(Clone, PartialEq, Debug)]
pub struct TintedProvider {
    pub color: RgbaF,
    pub parts: Parts<1>,
}
#[derive(Clone, PartialEq, Debug)]
pub struct ScalableProvider {
    pub controller: SizeController,
    pub parts: Parts<1>,
}
#[derive(Clone, PartialEq, Debug)]
pub struct StackedProvider {
    pub offset: Point,
    pub parts: Parts<2>,
}

/// A drawable detached from the tree.
#[derive(Clone, PartialEq, Debug)]
pub enum Provider {
    Bitmap(Bitmap),
    Animation(BitmapAnimationProvider),
    Line(LineProvider),
    Rectangle(RectangleProvider),
    Masked(MaskedProvider),
    Tinted(TintedProvider),
    Scalable(ScalableProvider),
    Stacked(StackedProvider),
}
impl Provider {
    fn for_each_bitmap(&mut self, bitmap: &mut dyn FnMut(&mut Bitmap)) {
        match self {
            Self::Bitmap(b) => bitmap(b),
            Self::Animation(animation) => {
                for frame in animation.frames_mut() {
                    bitmap(&mut frame.bitmap);
                }
            }
            Self::Line(line) => line.parts.for_each(bitmap),
            Self::Rectangle(rect) => rect.parts.for_each(bitmap),
            Self::Masked(masked) => masked.parts.for_each(bitmap),
            Self::Tinted(tinted) => tinted.parts.for_each(bitmap),
            Self::Scalable(scalable) => scalable.parts.for_each(bitmap),
            Self::Stacked(stacked) => stacked.parts.for_each(bitmap),
        }
    }
    /// Ready every bitmap for drawing.
    pub fn prepare(&mut self) {
        self.for_each_bitmap(&mut Bitmap::prepare);
    }
    /// Drop the CPU-side buffers of prepared bitmaps.
    pub fn discard(&mut self) {
        self.for_each_bitmap(&mut Bitmap::discard);
    }
}

impl Tree {
    /// Detach the drawable at `handle`. If the tree holds the only reference, its data is moved
    /// out and its children released, leaving an empty node behind. Otherwise the drawable is
    /// cloned and the tree is left as is.
    ///
    /// Within a moved resource, parts that are shared elsewhere are cloned rather than taken.
    /// # Errors
    /// Stale handles, nodes that aren't drawable, images with no data, or parts that were
    /// edited into a set the composite doesn't accept.
    pub fn move_out_provider(&mut self, handle: Handle) -> Result<Transfer<Provider>, MoveOutError> {
        let take = self.node(handle)?.refcount() == 1;
        if take {
            // Nothing is taken unless all of it can be.
            self.check_extract(handle)?;
        }
        let provider = self.extract(handle, take)?;
        Ok(if take {
            Transfer::Owned(provider)
        } else {
            Transfer::Duplicated(provider)
        })
    }
    /// Like [`Self::move_out_provider`], for a single image.
    /// # Errors
    /// Stale handle, not an image, or no pixel data.
    pub fn move_out_bitmap(&mut self, handle: Handle) -> Result<Transfer<Bitmap>, MoveOutError> {
        let take = self.node(handle)?.refcount() == 1;
        let bitmap = self.extract_bitmap(handle, take)?;
        Ok(if take {
            Transfer::Owned(bitmap)
        } else {
            Transfer::Duplicated(bitmap)
        })
    }

    fn extract(&mut self, handle: Handle, take: bool) -> Result<Provider, MoveOutError> {
        Ok(match self.node(handle)?.gid() {
            Gid::IMAGE => Provider::Bitmap(self.extract_bitmap(handle, take)?),
            Gid::ANIMATION => Provider::Animation(self.extract_animation(handle, take)?),
            Gid::LINE => {
                let line = self.get_as::<Line>(handle)?;
                let (orientation, tiling) = (line.orientation(), line.tiling());
                Provider::Line(LineProvider {
                    orientation,
                    tiling,
                    parts: self.extract_parts::<Line, 3>(handle, take)?,
                })
            }
            Gid::RECTANGLE => {
                let tiling = self.get_as::<Rectangle>(handle)?.tiling();
                Provider::Rectangle(RectangleProvider {
                    tiling,
                    parts: self.extract_parts::<Rectangle, 9>(handle, take)?,
                })
            }
            Gid::MASKED_OBJECT => Provider::Masked(MaskedProvider {
                parts: self.extract_parts::<MaskedObject, 2>(handle, take)?,
            }),
            Gid::TINTED_OBJECT => {
                let color = self.get_as::<TintedObject>(handle)?.color();
                Provider::Tinted(TintedProvider {
                    color,
                    parts: self.extract_parts::<TintedObject, 1>(handle, take)?,
                })
            }
            Gid::SCALABLE_OBJECT => {
                let controller = self.get_as::<ScalableObject>(handle)?.controller();
                Provider::Scalable(ScalableProvider {
                    controller,
                    parts: self.extract_parts::<ScalableObject, 1>(handle, take)?,
                })
            }
            Gid::STACKED_OBJECT => {
                let offset = self.get_as::<StackedObject>(handle)?.offset();
                Provider::Stacked(StackedProvider {
                    offset,
                    parts: self.extract_parts::<StackedObject, 2>(handle, take)?,
                })
            }
            gid => return Err(MoveOutError::NotDrawable { handle, gid }),
        })
    }
    /// Load everything below `handle` and fail the way [`Self::extract`] would, without
    /// touching any data.
    fn check_extract(&mut self, handle: Handle) -> Result<(), MoveOutError> {
        match self.node(handle)?.gid() {
            Gid::IMAGE => self.check_bitmap(handle),
            Gid::ANIMATION => {
                let frames = self.get_as::<Animation>(handle)?.durations().len();
                let children = self.node(handle)?.children().to_vec();
                children
                    .into_iter()
                    .take(frames)
                    .try_for_each(|frame| self.check_bitmap(frame))
            }
            Gid::LINE => self.check_parts::<Line>(handle),
            Gid::RECTANGLE => self.check_parts::<Rectangle>(handle),
            Gid::MASKED_OBJECT => self.check_parts::<MaskedObject>(handle),
            Gid::TINTED_OBJECT => self.check_parts::<TintedObject>(handle),
            Gid::SCALABLE_OBJECT => self.check_parts::<ScalableObject>(handle),
            Gid::STACKED_OBJECT => self.check_parts::<StackedObject>(handle),
            gid => Err(MoveOutError::NotDrawable { handle, gid }),
        }
    }
    fn check_bitmap(&mut self, handle: Handle) -> Result<(), MoveOutError> {
        let image = self.get_as_mut::<Image>(handle)?;
        match image.try_load() {
            Ok(()) if image.bitmap().is_some() => Ok(()),
            Ok(()) | Err(LoadError::NoFileObject) => Err(MoveOutError::NoData(handle)),
            Err(e) => Err(e.into()),
        }
    }
    fn check_parts<C: Composite>(&mut self, handle: Handle) -> Result<(), MoveOutError> {
        self.classify_parts(handle)?;
        let children = self.node(handle)?.children().to_vec();
        for (_, child) in C::layout(children.len()).iter().zip(children) {
            if self.node(child)?.gid() != Gid::NULL {
                self.check_extract(child)?;
            }
        }
        Ok(())
    }
    fn extract_bitmap(&mut self, handle: Handle, take: bool) -> Result<Bitmap, MoveOutError> {
        let image = self.get_as_mut::<Image>(handle)?;
        match image.try_load() {
            Ok(()) => (),
            Err(LoadError::NoFileObject) => return Err(MoveOutError::NoData(handle)),
            Err(e) => return Err(e.into()),
        }
        let bitmap = if take {
            image.take_bitmap()
        } else {
            image.bitmap().cloned()
        };
        bitmap.ok_or(MoveOutError::NoData(handle))
    }
    fn extract_animation(
        &mut self,
        handle: Handle,
        take: bool,
    ) -> Result<BitmapAnimationProvider, MoveOutError> {
        let durations = self.get_as::<Animation>(handle)?.durations().to_vec();
        let frames = self.node(handle)?.children().to_vec();
        let mut provider = BitmapAnimationProvider::default();
        for (frame, duration) in frames.into_iter().zip(durations) {
            let take_frame = take && self.node(frame)?.refcount() == 1;
            provider.push(self.extract_bitmap(frame, take_frame)?, duration);
        }
        if take {
            self.get_as_mut::<Animation>(handle)?.take_durations();
            self.clear_children(handle)?;
        }
        Ok(provider)
    }
    fn extract_parts<C: Composite, const N: usize>(
        &mut self,
        handle: Handle,
        take: bool,
    ) -> Result<Parts<N>, MoveOutError> {
        // Children may have been edited since loading.
        let kind = self.classify_parts(handle)?;
        let children = self.node(handle)?.children().to_vec();
        let mut slots: [Option<Provider>; N] = std::array::from_fn(|_| None);
        for (&slot, child) in C::layout(children.len()).iter().zip(children) {
            let node = self.node(child)?;
            if node.gid() == Gid::NULL {
                continue;
            }
            let take_child = take && node.refcount() == 1;
            if take && !take_child {
                log::debug!("part {child} of {handle} is shared, cloning it");
            }
            let part = self.extract(child, take_child)?;
            if let Some(target) = slots.get_mut(slot) {
                *target = Some(part);
            }
        }
        if take {
            self.clear_children(handle)?;
        }
        Ok(Parts::from_providers(kind, slots))
    }

    /// Build nodes holding a copy of `provider`. The caller holds the only reference to the
    /// returned node.
    /// # Errors
    /// Parts in slots the composite can't represent.
    pub fn insert_provider(&mut self, provider: Provider) -> Result<Handle, FormatError> {
        Ok(match provider {
            Provider::Bitmap(bitmap) => self.insert(Node::new(Resource::Image(Image::new(bitmap)))),
            Provider::Animation(animation) => {
                let durations = animation.durations();
                let frames: Vec<_> = animation
                    .frames()
                    .iter()
                    .map(|frame| {
                        self.insert(Node::new(Resource::Image(Image::new(frame.bitmap.clone()))))
                    })
                    .collect();
                self.insert_with_children(
                    Node::new(Resource::Animation(Animation::from_durations(durations))),
                    &frames,
                )
            }
            Provider::Line(LineProvider {
                orientation,
                tiling,
                parts,
            }) => self.insert_composite(Line::new(orientation, tiling), parts)?,
            Provider::Rectangle(RectangleProvider { tiling, parts }) => {
                self.insert_composite(Rectangle::new(tiling), parts)?
            }
            Provider::Masked(MaskedProvider { parts }) => {
                self.insert_composite(MaskedObject::default(), parts)?
            }
            Provider::Tinted(TintedProvider { color, parts }) => {
                self.insert_composite(TintedObject::new(color), parts)?
            }
            Provider::Scalable(ScalableProvider { controller, parts }) => {
                self.insert_composite(ScalableObject::new(controller), parts)?
            }
            Provider::Stacked(StackedProvider { offset, parts }) => {
                self.insert_composite(StackedObject::new(offset), parts)?
            }
        })
    }
    fn insert_composite<C: Composite, const N: usize>(
        &mut self,
        mut composite: C,
        parts: Parts<N>,
    ) -> Result<Handle, FormatError> {
        let mut slots = parts.into_providers();
        let present: Vec<usize> = (0..N).filter(|&slot| slots[slot].is_some()).collect();
        let layouts = || C::RULES.counts.iter().map(|&count| C::layout(count));
        // An exact layout, or the smallest one covering every part with nulls in the gaps.
        let layout = layouts()
            .find(|layout| *layout == present.as_slice())
            .or_else(|| {
                layouts()
                    .filter(|_| C::RULES.allow_null)
                    .find(|layout| present.iter().all(|slot| layout.contains(slot)))
            })
            .ok_or(FormatError::Arity {
                kind: C::GID,
                count: present.len(),
            })?;

        let mut children = Vec::with_capacity(layout.len());
        for &slot in layout {
            let child = match slots.get_mut(slot).and_then(Option::take) {
                Some(part) => self.insert_provider(part),
                None => Ok(self.insert(Node::new(Resource::Null))),
            };
            match child {
                Ok(child) => children.push(child),
                Err(e) => {
                    children.into_iter().for_each(|child| {
                        self.delete_resource(child);
                    });
                    return Err(e);
                }
            }
        }
        match parts::classify(self, C::GID, &C::RULES, &children) {
            Ok(kind) => composite.set_parts_kind(kind),
            Err(e) => {
                children.into_iter().for_each(|child| {
                    self.delete_resource(child);
                });
                return Err(e);
            }
        }
        Ok(self.insert_with_children(Node::new(composite.into_resource()), &children))
    }
}
