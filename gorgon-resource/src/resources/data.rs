//! Arrays of named, typed values. Each item is its own sub-chunk: the name as a length
//! prefixed string, then the value.

use super::{for_each_chunk, link::Link, unknown_chunk};
use crate::{
    error::{FormatError, LoadError, WriteError},
    file::LoadContext,
    geometry::{Bounds, Margins, Point, Pointf, Rect, Rgba, Size},
    gid::Gid,
    guid::SGuid,
    io::{Reader, Writer},
    tree::{Handle, Identity, Node, Resource},
};
use hashbrown::HashMap;

#[derive(Clone, PartialEq, Debug)]
pub enum DataValue {
    Int(i32),
    Float(f32),
    Text(String),
    Point(Point),
    Pointf(Pointf),
    Size(Size),
    Rectangle(Rect),
    Bounds(Bounds),
    Margins(Margins),
    Color(Rgba),
    Link(Link),
}
impl DataValue {
    #[must_use]
    pub fn gid(&self) -> Gid {
        match self {
            Self::Int(_) => Gid::DATA_INT,
            Self::Float(_) => Gid::DATA_FLOAT,
            Self::Text(_) => Gid::DATA_TEXT,
            Self::Point(_) => Gid::DATA_POINT,
            Self::Pointf(_) => Gid::DATA_POINTF,
            Self::Size(_) => Gid::DATA_SIZE,
            Self::Rectangle(_) => Gid::DATA_RECTANGLE,
            Self::Bounds(_) => Gid::DATA_BOUNDS,
            Self::Margins(_) => Gid::DATA_MARGINS,
            Self::Color(_) => Gid::DATA_COLOR,
            Self::Link(_) => Gid::DATA_LINK,
        }
    }
    fn is_item(gid: Gid) -> bool {
        matches!(
            gid,
            Gid::DATA_INT
                | Gid::DATA_FLOAT
                | Gid::DATA_TEXT
                | Gid::DATA_POINT
                | Gid::DATA_POINTF
                | Gid::DATA_SIZE
                | Gid::DATA_RECTANGLE
                | Gid::DATA_BOUNDS
                | Gid::DATA_MARGINS
                | Gid::DATA_COLOR
                | Gid::DATA_LINK
        )
    }
    /// Read the value of an item of type `gid`. `None` if it isn't a data item type.
    fn read(reader: &mut Reader, gid: Gid) -> Result<Option<Self>, LoadError> {
        let value = match gid {
            Gid::DATA_INT => Self::Int(reader.read_i32()?),
            Gid::DATA_FLOAT => Self::Float(reader.read_f32()?),
            Gid::DATA_TEXT => Self::Text(reader.read_string()?),
            Gid::DATA_POINT => Self::Point(Point {
                x: reader.read_i32()?,
                y: reader.read_i32()?,
            }),
            Gid::DATA_POINTF => Self::Pointf(Pointf {
                x: reader.read_f32()?,
                y: reader.read_f32()?,
            }),
            Gid::DATA_SIZE => Self::Size(Size {
                width: reader.read_i32()?,
                height: reader.read_i32()?,
            }),
            Gid::DATA_RECTANGLE => Self::Rectangle(Rect {
                x: reader.read_i32()?,
                y: reader.read_i32()?,
                width: reader.read_i32()?,
                height: reader.read_i32()?,
            }),
            Gid::DATA_BOUNDS => {
                let [left, top, right, bottom] = read_edges(reader)?;
                Self::Bounds(Bounds {
                    left,
                    top,
                    right,
                    bottom,
                })
            }
            Gid::DATA_MARGINS => {
                let [left, top, right, bottom] = read_edges(reader)?;
                Self::Margins(Margins {
                    left,
                    top,
                    right,
                    bottom,
                })
            }
            Gid::DATA_COLOR => Self::Color(Rgba(reader.read_u32()?)),
            Gid::DATA_LINK => Self::Link(Link::new(reader.read_guid()?)),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
    fn write<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut Writer<W>,
    ) -> Result<(), WriteError> {
        match self {
            Self::Int(value) => writer.write_i32(*value)?,
            Self::Float(value) => writer.write_f32(*value)?,
            Self::Text(value) => writer.write_string(value)?,
            Self::Point(Point { x, y }) | Self::Size(Size {
                width: x,
                height: y,
            }) => {
                writer.write_i32(*x)?;
                writer.write_i32(*y)?;
            }
            Self::Pointf(Pointf { x, y }) => {
                writer.write_f32(*x)?;
                writer.write_f32(*y)?;
            }
            Self::Rectangle(Rect {
                x,
                y,
                width,
                height,
            }) => {
                for value in [x, y, width, height] {
                    writer.write_i32(*value)?;
                }
            }
            Self::Bounds(Bounds {
                left,
                top,
                right,
                bottom,
            })
            | Self::Margins(Margins {
                left,
                top,
                right,
                bottom,
            }) => {
                for value in [left, top, right, bottom] {
                    writer.write_i32(*value)?;
                }
            }
            Self::Color(color) => writer.write_u32(color.0)?,
            Self::Link(link) => writer.write_guid(link.target())?,
        }
        Ok(())
    }
}

fn read_edges(reader: &mut Reader) -> Result<[i32; 4], LoadError> {
    Ok([
        reader.read_i32()?,
        reader.read_i32()?,
        reader.read_i32()?,
        reader.read_i32()?,
    ])
}

#[derive(Clone, PartialEq, Debug)]
pub struct DataItem {
    pub name: String,
    pub value: DataValue,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub struct DataArray {
    items: Vec<DataItem>,
}
impl DataArray {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    #[must_use]
    pub fn items(&self) -> &[DataItem] {
        &self.items
    }
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&DataItem> {
        self.items.get(index)
    }
    pub fn get_mut(&mut self, index: usize) -> Option<&mut DataItem> {
        self.items.get_mut(index)
    }
    /// First item called `name`. Names aren't required to be unique.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&DataValue> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.value)
    }
    pub fn push(&mut self, name: impl Into<String>, value: DataValue) {
        self.items.push(DataItem {
            name: name.into(),
            value,
        });
    }
    pub fn insert(&mut self, index: usize, name: impl Into<String>, value: DataValue) {
        self.items.insert(
            index,
            DataItem {
                name: name.into(),
                value,
            },
        );
    }
    pub fn remove(&mut self, index: usize) -> Option<DataItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }
    pub(crate) fn resolve(&mut self, mapping: &HashMap<SGuid, Handle>) {
        for item in &mut self.items {
            if let DataValue::Link(link) = &mut item.value {
                link.resolve(mapping);
            }
        }
    }
}

/// # Errors
/// Stream errors, items not filling their chunk, or unknown chunks in strict mode.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let strict = ctx.options().strict;
    let mut identity = Identity::default();
    let mut data = DataArray::new();
    for_each_chunk(reader, size, |reader, gid, size| {
        if identity.read_chunk(reader, gid, size)? {
            return Ok(());
        }
        if !DataValue::is_item(gid) {
            return unknown_chunk(strict, Gid::DATA, gid);
        }
        let start = reader.tell();
        let name = reader.read_string()?;
        let value = DataValue::read(reader, gid)?.ok_or(LoadError::UnknownNode(gid))?;
        let consumed = reader.tell() - start;
        if consumed != u64::from(size) {
            return Err(FormatError::SizeMismatch {
                what: "data item",
                expected: consumed,
                found: size.into(),
            }
            .into());
        }
        data.items.push(DataItem { name, value });
        Ok(())
    })?;
    Ok(ctx
        .tree
        .insert(Node::with_identity(identity, Resource::Data(data))))
}

/// # Errors
/// Stream errors, or names too long for the format.
pub fn save<W: std::io::Write + std::io::Seek>(
    node: &Node,
    data: &DataArray,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    let marker = writer.object_start(Gid::DATA, node.guid(), node.name())?;
    for item in &data.items {
        let chunk = writer.chunk_start(item.value.gid())?;
        writer.write_string(&item.name)?;
        item.value.write(writer)?;
        writer.end(chunk)?;
    }
    writer.end(marker)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        file::{File, LoadMode, LoadOptions, SaveOptions},
        io::SharedReader,
    };
    use std::io::Cursor;

    fn sample(target: SGuid) -> DataArray {
        let mut data = DataArray::new();
        data.push("count", DataValue::Int(-3));
        data.push("ratio", DataValue::Float(0.25));
        data.push("title", DataValue::Text("héllo".into()));
        data.push("at", DataValue::Point(Point::new(4, -5)));
        data.push("pivot", DataValue::Pointf(Pointf { x: 0.5, y: 1.5 }));
        data.push(
            "extent",
            DataValue::Size(Size {
                width: 10,
                height: 20,
            }),
        );
        data.push(
            "area",
            DataValue::Rectangle(Rect {
                x: 1,
                y: 2,
                width: 3,
                height: 4,
            }),
        );
        data.push(
            "bounds",
            DataValue::Bounds(Bounds {
                left: 0,
                top: 1,
                right: 2,
                bottom: 3,
            }),
        );
        data.push(
            "padding",
            DataValue::Margins(Margins {
                left: 4,
                top: 5,
                right: 6,
                bottom: 7,
            }),
        );
        data.push("tint", DataValue::Color(Rgba::from_channels([1, 2, 3, 4])));
        data.push("next", DataValue::Link(Link::new(target)));
        data
    }

    fn to_bytes(file: &File) -> Vec<u8> {
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        file.save_to(&mut writer, &SaveOptions::default()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn every_item_type() {
        let mut file = File::new();
        let root = file.root();
        let tree = file.tree_mut();
        let target = tree.insert(Node::new(Resource::Null));
        let guid = tree.node(target).unwrap().guid();
        let data = tree.insert(Node::new(Resource::Data(sample(guid))));
        tree.add_child(root, data).unwrap();
        tree.add_child(root, target).unwrap();

        let mut loaded = File::new();
        loaded
            .load_from(&SharedReader::from_bytes(to_bytes(&file)), LoadMode::Full)
            .unwrap();
        let tree = loaded.tree();
        let handle = tree.child(loaded.root(), 0).unwrap();
        let target = tree.child(loaded.root(), 1).unwrap();
        let data = tree.get_as::<DataArray>(handle).unwrap();

        let expected = sample(guid);
        assert_eq!(data.len(), expected.len());
        for (item, expected) in data.items().iter().zip(expected.items()) {
            assert_eq!(item.name, expected.name);
            if let DataValue::Link(link) = &item.value {
                assert_eq!(link.target(), guid);
                assert_eq!(link.resolved(), Some(target));
            } else {
                assert_eq!(item.value, expected.value);
            }
        }
        assert_eq!(data.find("count"), Some(&DataValue::Int(-3)));
        assert!(data.find("missing").is_none());
    }
    #[test]
    fn unknown_items() {
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        writer.write_bytes(crate::io::SIGNATURE).unwrap();
        writer
            .write_u32(crate::io::FormatVersion::CURRENT.0)
            .unwrap();
        writer.write_gid(Gid::NONE).unwrap();
        let folder = writer
            .object_start(Gid::FOLDER, SGuid::from_u64(1), "")
            .unwrap();
        let data = writer
            .object_start(Gid::DATA, SGuid::from_u64(2), "")
            .unwrap();
        let item = writer.chunk_start(Gid::DATA_INT).unwrap();
        writer.write_string("kept").unwrap();
        writer.write_i32(9).unwrap();
        writer.end(item).unwrap();
        // An item type from a newer writer.
        let item = writer.chunk_start(Gid(0x0203_0CFF)).unwrap();
        writer.write_string("skipped").unwrap();
        writer.write_u32(0).unwrap();
        writer.end(item).unwrap();
        writer.end(data).unwrap();
        writer.end(folder).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut lenient = File::new().with_options(LoadOptions::default().with_strict(false));
        lenient
            .load_from(&SharedReader::from_bytes(bytes.clone()), LoadMode::Full)
            .unwrap();
        let handle = lenient.tree().child(lenient.root(), 0).unwrap();
        let data = lenient.tree().get_as::<DataArray>(handle).unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data.find("kept"), Some(&DataValue::Int(9)));

        let mut strict = File::new().with_options(LoadOptions::default().with_strict(true));
        assert!(matches!(
            strict.load_from(&SharedReader::from_bytes(bytes), LoadMode::Full),
            Err(LoadError::UnknownNode(Gid(0x0203_0CFF)))
        ));
    }
    #[test]
    fn editing() {
        let mut data = DataArray::new();
        data.push("a", DataValue::Int(1));
        data.insert(0, "b", DataValue::Float(2.0));
        assert_eq!(data.get(0).unwrap().name, "b");
        assert!(data.remove(5).is_none());
        assert_eq!(data.remove(0).unwrap().value, DataValue::Float(2.0));
        data.get_mut(0).unwrap().value = DataValue::Int(3);
        assert_eq!(data.find("a"), Some(&DataValue::Int(3)));
    }
}
