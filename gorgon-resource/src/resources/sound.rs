//! PCM sounds. Compressed sounds go through the [`AudioCodec`](crate::codec::AudioCodec)
//! installed in [`Codecs`].

use super::{for_each_chunk, unknown_chunk, Deferred};
use crate::{
    codec::Codecs,
    error::{FormatError, LoadError, WriteError},
    file::LoadContext,
    gid::Gid,
    io::{Reader, Writer, BOOL_LEN},
    tree::{Handle, Identity, Node, Resource, SaveContext},
};

const PROPS_LEN: u32 = 16 + BOOL_LEN;

/// Interleaved little-endian PCM samples.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Wave {
    pub sample_rate: u32,
    pub channels: u32,
    /// 8 or 16.
    pub bits: u32,
    pub data: Vec<u8>,
}
impl Wave {
    /// # Errors
    /// Unsupported sample width, no channels, or data that isn't a whole number of frames.
    pub fn new(sample_rate: u32, channels: u32, bits: u32, data: Vec<u8>) -> Result<Self, FormatError> {
        let wave = Self {
            sample_rate,
            channels,
            bits,
            data,
        };
        wave.validate()?;
        Ok(wave)
    }
    fn validate(&self) -> Result<(), FormatError> {
        if !matches!(self.bits, 8 | 16) {
            return Err(FormatError::InvalidEnum {
                what: "sample width",
                value: self.bits,
            });
        }
        if self.channels == 0 {
            return Err(FormatError::InvalidEnum {
                what: "channel count",
                value: 0,
            });
        }
        let frame = self.frame_len();
        if self.data.len() % frame != 0 {
            return Err(FormatError::SizeMismatch {
                what: "sound data",
                expected: (self.data.len() - self.data.len() % frame) as u64,
                found: self.data.len() as u64,
            });
        }
        Ok(())
    }
    /// Bytes per frame, one sample for every channel.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.channels as usize * (self.bits as usize / 8)
    }
    #[must_use]
    pub fn frames(&self) -> usize {
        match self.frame_len() {
            0 => 0,
            len => self.data.len() / len,
        }
    }
    /// Length in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        match self.sample_rate {
            0 => 0,
            rate => self.frames() as u64 * 1000 / u64::from(rate),
        }
    }
}

#[derive(Debug)]
pub struct Sound {
    wave: Option<Wave>,
    compression: Gid,
    lateloading: bool,
    deferred: Option<Deferred>,
}
impl Sound {
    #[must_use]
    pub fn new(wave: Wave) -> Self {
        Self {
            wave: Some(wave),
            compression: Gid::NONE,
            lateloading: false,
            deferred: None,
        }
    }
    #[must_use]
    pub fn wave(&self) -> Option<&Wave> {
        self.wave.as_ref()
    }
    pub fn set_wave(&mut self, wave: Wave) {
        self.wave = Some(wave);
        self.deferred = None;
    }
    pub fn take_wave(&mut self) -> Option<Wave> {
        self.wave.take()
    }
    #[must_use]
    pub fn compression(&self) -> Gid {
        self.compression
    }
    /// [`Gid::NONE`] stores raw PCM, anything else needs a matching codec when saving.
    pub fn set_compression(&mut self, compression: Gid) {
        self.compression = compression;
    }
    #[must_use]
    pub fn lateloading(&self) -> bool {
        self.lateloading
    }
    pub fn set_lateloading(&mut self, lateloading: bool) {
        self.lateloading = lateloading;
    }
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.wave.is_some()
    }
    /// Read deferred samples. Returns whether the sound is loaded afterwards.
    pub fn load(&mut self) -> bool {
        if self.wave.is_some() {
            return true;
        }
        let Some(deferred) = &self.deferred else {
            return false;
        };
        let result = deferred.reopen().and_then(|(mut reader, size)| {
            read_body(&mut reader, size, deferred.codecs(), true, false)
        });
        match result {
            Ok(Body { wave: Some(wave), .. }) => {
                log::debug!("loaded deferred sound, {} frames", wave.frames());
                self.wave = Some(wave);
                self.deferred = None;
                true
            }
            Ok(_) => {
                log::warn!("deferred sound has no wave chunk");
                false
            }
            Err(e) => {
                log::warn!("deferred sound load failed: {e}");
                false
            }
        }
    }
}

struct Body {
    identity: Identity,
    compression: Gid,
    sample_rate: u32,
    channels: u32,
    bits: u32,
    lateloading: bool,
    wave: Option<Wave>,
}

fn read_body(
    reader: &mut Reader,
    size: u32,
    codecs: &Codecs,
    force: bool,
    strict: bool,
) -> Result<Body, LoadError> {
    let mut body = Body {
        identity: Identity::default(),
        compression: Gid::NONE,
        sample_rate: 0,
        channels: 0,
        bits: 0,
        lateloading: false,
        wave: None,
    };
    for_each_chunk(reader, size, |reader, gid, size| {
        let decode = !body.lateloading || force;
        match gid {
            Gid::SOUND_PROPS => {
                if size < PROPS_LEN {
                    return Err(FormatError::SizeMismatch {
                        what: "sound properties",
                        expected: PROPS_LEN.into(),
                        found: size.into(),
                    }
                    .into());
                }
                body.compression = reader.read_gid()?;
                body.sample_rate = reader.read_u32()?;
                body.channels = reader.read_u32()?;
                body.bits = reader.read_u32()?;
                body.lateloading = reader.read_bool()?;
            }
            Gid::SOUND_WAVE if decode => {
                let data = reader.read_vec(size)?;
                body.wave = Some(Wave::new(body.sample_rate, body.channels, body.bits, data)?);
            }
            Gid::SOUND_CMP_WAVE if decode => {
                let codec = codecs.audio(body.compression)?;
                let data = reader.read_vec(size)?;
                let wave = codec.decode(&data).map_err(|source| FormatError::Codec {
                    gid: body.compression,
                    source,
                })?;
                wave.validate()?;
                body.wave = Some(wave);
            }
            Gid::SOUND_WAVE | Gid::SOUND_CMP_WAVE => (),
            _ => {
                if !body.identity.read_chunk(reader, gid, size)? {
                    unknown_chunk(strict, Gid::SOUND, gid)?;
                }
            }
        }
        Ok(())
    })?;
    Ok(body)
}

/// # Errors
/// Malformed layout, invalid sample format, or no codec for compressed data.
pub fn load(ctx: &mut LoadContext<'_>, reader: &mut Reader, size: u32) -> Result<Handle, LoadError> {
    let entry = reader.tell();
    let options = ctx.options();
    let body = read_body(
        reader,
        size,
        ctx.codecs(),
        options.force_immediate,
        options.strict,
    )?;
    let deferred = match body.wave {
        None if body.lateloading && !options.force_immediate => Some(Deferred::new(
            reader.shared(),
            entry,
            ctx.codecs().clone(),
        )),
        _ => None,
    };
    let sound = Sound {
        wave: body.wave,
        compression: body.compression,
        lateloading: body.lateloading,
        deferred,
    };
    log::trace!(
        "sound {}Hz, {} channels, {} bits",
        body.sample_rate,
        body.channels,
        body.bits
    );
    Ok(ctx
        .tree
        .insert(Node::with_identity(body.identity, Resource::Sound(sound))))
}

/// # Errors
/// [`WriteError::NoData`] for an unloaded sound, a missing codec, or stream errors.
pub fn save<W: std::io::Write + std::io::Seek>(
    ctx: &SaveContext<'_>,
    node: &Node,
    sound: &Sound,
    writer: &mut Writer<W>,
) -> Result<(), WriteError> {
    let wave = sound.wave.as_ref().ok_or(WriteError::NoData(Gid::SOUND))?;
    let codec = match sound.compression {
        Gid::NONE => None,
        other => Some(ctx.codecs.audio(other)?),
    };

    let marker = writer.object_start(Gid::SOUND, node.guid(), node.name())?;
    writer.chunk_header(Gid::SOUND_PROPS, PROPS_LEN as usize)?;
    writer.write_gid(sound.compression)?;
    writer.write_u32(wave.sample_rate)?;
    writer.write_u32(wave.channels)?;
    writer.write_u32(wave.bits)?;
    writer.write_bool(sound.lateloading)?;
    match codec {
        None => {
            writer.chunk_header(Gid::SOUND_WAVE, wave.data.len())?;
            writer.write_bytes(&wave.data)?;
        }
        Some(codec) => {
            let data_marker = writer.chunk_start(Gid::SOUND_CMP_WAVE)?;
            codec
                .encode(wave, writer)
                .map_err(|source| FormatError::Codec {
                    gid: sound.compression,
                    source,
                })?;
            writer.end(data_marker)?;
        }
    }
    writer.end(marker)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        codec::{AudioCodec, CodecError},
        file::{File, LoadMode, SaveOptions},
        io::SharedReader,
    };
    use std::io::Cursor;

    /// Stores the wave raw behind a magic prefix.
    struct Tagged;
    impl AudioCodec for Tagged {
        fn gid(&self) -> Gid {
            Gid::FLAC
        }
        fn encode(&self, wave: &Wave, out: &mut dyn std::io::Write) -> Result<(), CodecError> {
            out.write_all(b"fLaC")?;
            out.write_all(&wave.sample_rate.to_le_bytes())?;
            out.write_all(&wave.data)?;
            Ok(())
        }
        fn decode(&self, data: &[u8]) -> Result<Wave, CodecError> {
            let rest = data.strip_prefix(b"fLaC").ok_or("bad magic")?;
            let (rate, samples) = rest.split_at(4);
            let rate = u32::from_le_bytes(rate.try_into()?);
            Ok(Wave::new(rate, 1, 16, samples.to_vec())?)
        }
    }
    fn codecs() -> Codecs {
        Codecs::default().with_audio(std::sync::Arc::new(Tagged))
    }
    fn tone() -> Wave {
        let data = (0..100u16).flat_map(|s| (s * 300).to_le_bytes()).collect();
        Wave::new(8000, 1, 16, data).unwrap()
    }
    fn save_bytes(sound: Sound, codecs: Codecs) -> Result<Vec<u8>, WriteError> {
        let mut file = File::new().with_codecs(codecs);
        let root = file.root();
        let handle = file.tree_mut().insert(Node::new(Resource::Sound(sound)));
        file.tree_mut().add_child(root, handle).unwrap();
        let mut writer = Writer::new(Cursor::new(Vec::new())).unwrap();
        file.save_to(&mut writer, &SaveOptions::default())?;
        Ok(writer.finish().unwrap().into_inner())
    }

    #[test]
    fn wave_shape() {
        assert_eq!(tone().frames(), 100);
        assert_eq!(tone().duration_ms(), 12);
        assert!(Wave::new(8000, 2, 12, vec![]).is_err());
        assert!(Wave::new(8000, 2, 16, vec![0; 6]).is_err());
        assert!(Wave::new(8000, 0, 8, vec![]).is_err());
    }
    #[test]
    fn raw_and_deferred() {
        let mut sound = Sound::new(tone());
        sound.set_lateloading(true);
        let bytes = save_bytes(sound, Codecs::default()).unwrap();

        let source = SharedReader::from_bytes(bytes);
        let mut file = File::new();
        file.load_from(&source, LoadMode::Full).unwrap();
        let handle = file.tree().child(file.root(), 0).unwrap();
        let sound = file.tree_mut().get_as_mut::<Sound>(handle).unwrap();
        assert!(!sound.is_loaded());
        assert!(sound.load());
        assert_eq!(sound.wave(), Some(&tone()));
        assert_eq!(source.lease_count(), 0);
    }
    #[test]
    fn compressed_through_codec() {
        let mut sound = Sound::new(tone());
        sound.set_compression(Gid::FLAC);
        let mut uncodable = Sound::new(tone());
        uncodable.set_compression(Gid::FLAC);
        assert!(matches!(
            save_bytes(uncodable, Codecs::default()),
            Err(WriteError::Format(FormatError::MissingCodec(Gid::FLAC)))
        ));

        let bytes = save_bytes(sound, codecs()).unwrap();
        let mut file = File::new().with_codecs(codecs());
        file.load_from(&SharedReader::from_bytes(bytes.clone()), LoadMode::Full)
            .unwrap();
        let handle = file.tree().child(file.root(), 0).unwrap();
        let sound = file.tree().get_as::<Sound>(handle).unwrap();
        assert_eq!(sound.compression(), Gid::FLAC);
        assert_eq!(sound.wave(), Some(&tone()));

        // Without the codec the compressed wave can't be read.
        let mut bare = File::new();
        let err = bare
            .load_from(&SharedReader::from_bytes(bytes), LoadMode::Full)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::Format(FormatError::MissingCodec(Gid::FLAC))
        ));
    }
}
