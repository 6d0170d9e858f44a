//! Bitmap fonts: metrics, a codepoint to glyph map, and the glyph images as children.

use super::image::{self, Image};
use crate::{
    error::{FormatError, LoadError, WriteError},
    file::LoadContext,
    geometry::Pointf,
    gid::Gid,
    graphics::Bitmap,
    io::{Reader, Writer},
    tree::{Handle, Node, Resource, SaveContext, Tree, TreeError},
};
use az::{Az, SaturatingAs};
use std::collections::BTreeMap;

const METRICS_LEN: u32 = 7 * 4;
/// Horizontal separation, superseded by glyph spacing but still written.
const LEGACY_SEPARATION: i32 = 2;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct FontMetrics {
    pub glyph_spacing: i32,
    pub baseline: i32,
    pub height: i32,
    pub line_thickness: i32,
    pub underline_offset: i32,
    pub max_width: i32,
}
impl FontMetrics {
    /// Distance between baselines of consecutive lines.
    #[must_use]
    pub fn line_gap(&self) -> i32 {
        (self.height.az::<f32>() * 1.2).round().saturating_as()
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Glyph {
    /// Index among the font's images.
    pub image: u32,
    pub offset: Pointf,
    pub advance: f32,
}

/// On-disk charmap entry, every field a little-endian 32 bit word.
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct CharmapEntry {
    codepoint: u32,
    image: u32,
    offset_x: u32,
    offset_y: u32,
    advance: u32,
}
impl CharmapEntry {
    const LEN: usize = std::mem::size_of::<Self>();

    fn decode(self) -> (i32, Glyph) {
        let float = |bits: u32| f32::from_bits(u32::from_le(bits));
        (
            u32::from_le(self.codepoint) as i32,
            Glyph {
                image: u32::from_le(self.image),
                offset: Pointf {
                    x: float(self.offset_x),
                    y: float(self.offset_y),
                },
                advance: float(self.advance),
            },
        )
    }
    fn encode(codepoint: i32, glyph: &Glyph) -> Self {
        Self {
            codepoint: (codepoint as u32).to_le(),
            image: glyph.image.to_le(),
            offset_x: glyph.offset.x.to_bits().to_le(),
            offset_y: glyph.offset.y.to_bits().to_le(),
            advance: glyph.advance.to_bits().to_le(),
        }
    }
}

/// A bitmap font. Glyphs are kept one per codepoint, so a charmap that repeats a codepoint keeps
/// its first mapping. Saving writes the charmap sorted by codepoint, whatever order it was read in.
#[derive(Clone, Debug, Default)]
pub struct Font {
    metrics: FontMetrics,
    glyphs: BTreeMap<i32, Glyph>,
}
impl Font {
    #[must_use]
    pub fn new(metrics: FontMetrics) -> Self {
        Self {
            metrics,
            glyphs: BTreeMap::new(),
        }
    }
    #[must_use]
    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }
    pub fn set_metrics(&mut self, metrics: FontMetrics) {
        self.metrics = metrics;
    }
    #[must_use]
    pub fn glyph(&self, codepoint: i32) -> Option<&Glyph> {
        self.glyphs.get(&codepoint)
    }
    /// Glyphs ordered by codepoint.
    pub fn glyphs(&self) -> impl Iterator<Item = (i32, &Glyph)> + '_ {
        self.glyphs.iter().map(|(&codepoint, glyph)| (codepoint, glyph))
    }
    /// Map `codepoint` to a glyph, returning the one it replaces. The image index is checked
    /// against the font's children when loading and saving.
    pub fn set_glyph(&mut self, codepoint: i32, glyph: Glyph) -> Option<Glyph> {
        self.glyphs.insert(codepoint, glyph)
    }
    pub fn remove_glyph(&mut self, codepoint: i32) -> Option<Glyph> {
        self.glyphs.remove(&codepoint)
    }
    fn check_indices(&self, images: usize) -> Result<(), FormatError> {
        match self.glyphs.values().find(|glyph| glyph.image as usize >= images) {
            Some(glyph) => Err(FormatError::GlyphIndex {
                index: glyph.image,
                count: images,
            }),
            None => Ok(()),
        }
    }
}

impl Tree {
    /// The bitmap drawn for `codepoint`, if the font has that glyph and its image is loaded.
    /// # Errors
    /// Stale handle, or `font` isn't a font.
    pub fn glyph_bitmap(&self, font: Handle, codepoint: i32) -> Result<Option<&Bitmap>, TreeError> {
        let Some(glyph) = self.get_as::<Font>(font)?.glyph(codepoint) else {
            return Ok(None);
        };
        let image = self.child(font, glyph.image as usize)?;
        Ok(self.get_as::<Image>(image)?.bitmap())
    }
}

fn read_charmap(reader: &mut Reader, size: u32, glyphs: &mut BTreeMap<i32, Glyph>) -> Result<(), LoadError> {
    if size as usize % CharmapEntry::LEN != 0 {
        return Err(FormatError::SizeMismatch {
            what: "font charmap",
            expected: u64::from(size) - u64::from(size) % CharmapEntry::LEN as u64,
            found: size.into(),
        }
        .into());
    }
    let data = reader.read_vec(size)?;
    for entry in data.chunks_exact(CharmapEntry::LEN) {
        let (codepoint, glyph) = bytemuck::pod_read_unaligned::<CharmapEntry>(entry).decode();
        // First mapping of a codepoint wins.
        glyphs.entry(codepoint).or_insert(glyph);
    }
    Ok(())
}

/// # Errors
/// Malformed metrics or charmap, non-image children, or glyphs referring to missing images.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let mut font = Font::default();
    let (identity, images) = ctx.read_object(reader, size, |_, reader, gid, size| {
        match gid {
            Gid::FONT_BITMAP_PROPS => {
                if size < METRICS_LEN {
                    return Err(FormatError::SizeMismatch {
                        what: "font metrics",
                        expected: METRICS_LEN.into(),
                        found: size.into(),
                    }
                    .into());
                }
                let _separation = reader.read_i32()?;
                font.metrics = FontMetrics {
                    glyph_spacing: reader.read_i32()?,
                    baseline: reader.read_i32()?,
                    height: reader.read_i32()?,
                    line_thickness: reader.read_i32()?,
                    underline_offset: reader.read_i32()?,
                    max_width: reader.read_i32()?,
                };
            }
            Gid::FONT_CHARMAP_II => read_charmap(reader, size, &mut font.glyphs)?,
            _ => return Ok(false),
        }
        Ok(true)
    })?;

    let check = || -> Result<(), FormatError> {
        if let Some(child) = images
            .iter()
            .map(|&image| ctx.tree.get(image).map_or(Gid::NONE, Node::gid))
            .find(|&gid| gid != Gid::IMAGE)
        {
            return Err(FormatError::ChildType {
                kind: Gid::FONT,
                child,
            });
        }
        font.check_indices(images.len())
    };
    if let Err(e) = check() {
        ctx.release(images);
        return Err(e.into());
    }
    log::trace!("font with {} glyphs", font.glyphs.len());
    Ok(ctx.tree.insert_with_children(
        Node::with_identity(identity, Resource::Font(font)),
        &images,
    ))
}

/// # Errors
/// Stream errors, glyphs referring to missing images, or images without data.
pub fn save<W: std::io::Write + std::io::Seek>(
    ctx: &SaveContext<'_>,
    node: &Node,
    font: &Font,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    font.check_indices(node.children().len())?;
    let metrics = &font.metrics;

    let marker = writer.object_start(Gid::FONT, node.guid(), node.name())?;
    writer.chunk_header(Gid::FONT_BITMAP_PROPS, METRICS_LEN as usize)?;
    for value in [
        LEGACY_SEPARATION,
        metrics.glyph_spacing,
        metrics.baseline,
        metrics.height,
        metrics.line_thickness,
        metrics.underline_offset,
        metrics.max_width,
    ] {
        writer.write_i32(value)?;
    }

    writer.chunk_header(Gid::FONT_CHARMAP_II, font.glyphs.len() * CharmapEntry::LEN)?;
    for (&codepoint, glyph) in &font.glyphs {
        writer.write_bytes(bytemuck::bytes_of(&CharmapEntry::encode(codepoint, glyph)))?;
    }

    for &child in node.children() {
        let child_node = ctx.tree.get(child).ok_or(WriteError::Missing(child))?;
        let Resource::Image(glyph_image) = child_node.resource() else {
            return Err(FormatError::ChildType {
                kind: Gid::FONT,
                child: child_node.gid(),
            }
            .into());
        };
        image::save(child_node, glyph_image, Gid::FONT_IMAGE, writer)?;
    }
    writer.end(marker)
}
