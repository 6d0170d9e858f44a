//! # Resource identity
//! Every resource carries an [`SGuid`], an 8 byte identifier persisted alongside the object.
//! Identity survives save/load cycles and is used to resolve links between resources.

/// Compact persisted identifier of a resource node.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Default, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SGuid(pub [u8; 8]);

impl SGuid {
    pub const EMPTY: Self = SGuid([0; 8]);
    pub const LEN: usize = 8;

    /// Generate a fresh identifier from random bits.
    #[must_use]
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&uuid.as_bytes()[..8]);
        // All-zero is reserved for "no identity".
        if bytes == [0; 8] {
            bytes[0] = 1;
        }
        Self(bytes)
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(value.to_le_bytes())
    }
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }
}
impl std::fmt::Display for SGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Most significant byte first, as it's read as a LE integer.
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
impl std::fmt::Debug for SGuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SGuid({self})")
    }
}
