//! # Byte Offset Registry
//!
//! Fixed mapping from logical lock name to a byte range in the lock file.
//!
//! ## Compatibility Invariant
//!
//! Every node sharing a database must agree on these offsets, across every
//! protocol version that needs to interoperate. Changing one is a wire break.
//!
//! ```text
//! offset:  0 ......... 72 ........ 120 121 122 123..127 128 ..... 4096
//!                      HALT        WRT CKP REC READ0..4 DMS       PROBE
//! ```

use std::fmt;

/// Byte offset of the HALT lock.
pub const HALT_OFFSET: u64 = 72;

/// First byte of the WAL-index lock block (WRITE, CKPT, RECOVER, READ0-4, DMS).
const WAL_LOCK_BASE: u64 = 120;

/// Number of READ slots in the WAL-index block.
pub const READ_SLOT_COUNT: u8 = 5;

/// Byte offset reserved for the startup capability probe.
pub const PROBE_OFFSET: u64 = 4096;

/// A contiguous byte range inside the lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte covered by the lock.
    pub offset: u64,
    /// Number of bytes covered. Never zero (zero means "to EOF" to fcntl).
    pub len: u64,
}

impl ByteRange {
    /// Create a range covering `len` bytes starting at `offset`.
    pub const fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// One-past-the-end offset.
    pub const fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// True when the two ranges share at least one byte.
    pub const fn overlaps(&self, other: &ByteRange) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.offset, self.len)
    }
}

/// Index of a WAL reader mark, always below [`READ_SLOT_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadSlot(u8);

impl ReadSlot {
    /// `None` when `index` has no slot in the registry.
    pub const fn new(index: u8) -> Option<Self> {
        if index < READ_SLOT_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

/// Logical locks hosted by the lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockSlot {
    /// Pauses write admission on the primary.
    Halt,
    /// WAL writer lock.
    Write,
    /// Checkpoint lock.
    Ckpt,
    /// WAL recovery lock.
    Recover,
    /// WAL reader mark.
    Read(ReadSlot),
    /// Dead-man switch held shared by every open connection.
    Dms,
    /// Reserved for the capability probe; no protocol participant contends it.
    Probe,
}

impl LockSlot {
    /// Every slot in the registry, in offset order.
    pub fn all() -> impl Iterator<Item = LockSlot> {
        [LockSlot::Halt, LockSlot::Write, LockSlot::Ckpt, LockSlot::Recover]
            .into_iter()
            .chain((0..READ_SLOT_COUNT).map(|n| LockSlot::Read(ReadSlot(n))))
            .chain([LockSlot::Dms, LockSlot::Probe])
    }

    /// Reader mark `index`, if it exists.
    pub const fn read(index: u8) -> Option<LockSlot> {
        match ReadSlot::new(index) {
            Some(slot) => Some(LockSlot::Read(slot)),
            None => None,
        }
    }

    /// The fixed byte range of this slot.
    pub const fn range(self) -> ByteRange {
        let offset = match self {
            LockSlot::Halt => HALT_OFFSET,
            LockSlot::Write => WAL_LOCK_BASE,
            LockSlot::Ckpt => WAL_LOCK_BASE + 1,
            LockSlot::Recover => WAL_LOCK_BASE + 2,
            LockSlot::Read(slot) => WAL_LOCK_BASE + 3 + slot.0 as u64,
            LockSlot::Dms => WAL_LOCK_BASE + 3 + READ_SLOT_COUNT as u64,
            LockSlot::Probe => PROBE_OFFSET,
        };
        ByteRange::new(offset, 1)
    }

    /// Short uppercase name, as used in logs.
    pub fn name(self) -> String {
        match self {
            LockSlot::Halt => "HALT".into(),
            LockSlot::Write => "WRITE".into(),
            LockSlot::Ckpt => "CKPT".into(),
            LockSlot::Recover => "RECOVER".into(),
            LockSlot::Read(slot) => format!("READ{}", slot.index()),
            LockSlot::Dms => "DMS".into(),
            LockSlot::Probe => "PROBE".into(),
        }
    }
}

impl fmt::Display for LockSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name(), self.range())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halt_offset_is_stable() {
        assert_eq!(LockSlot::Halt.range(), ByteRange::new(72, 1));
    }

    #[test]
    fn test_wal_block_layout() {
        assert_eq!(LockSlot::Write.range().offset, 120);
        assert_eq!(LockSlot::Ckpt.range().offset, 121);
        assert_eq!(LockSlot::Recover.range().offset, 122);
        assert_eq!(LockSlot::read(0).unwrap().range().offset, 123);
        assert_eq!(LockSlot::read(4).unwrap().range().offset, 127);
        assert_eq!(LockSlot::Dms.range().offset, 128);
    }

    #[test]
    fn test_slots_are_pairwise_disjoint() {
        let slots: Vec<_> = LockSlot::all().collect();
        assert_eq!(slots.len(), 11);
        for (i, a) in slots.iter().enumerate() {
            assert_eq!(a.range().len, 1, "{} must be one byte", a);
            for b in &slots[i + 1..] {
                assert!(!a.range().overlaps(&b.range()), "{} overlaps {}", a, b);
            }
        }
    }

    #[test]
    fn test_overlap_edges() {
        let a = ByteRange::new(10, 2);
        assert!(a.overlaps(&ByteRange::new(11, 1)));
        assert!(!a.overlaps(&ByteRange::new(12, 1)));
        assert!(!a.overlaps(&ByteRange::new(9, 1)));
    }

    #[test]
    fn test_read_slot_bounds() {
        assert!(LockSlot::read(READ_SLOT_COUNT - 1).is_some());
        assert!(LockSlot::read(READ_SLOT_COUNT).is_none());
        assert!(ReadSlot::new(u8::MAX).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(LockSlot::Halt.to_string(), "HALT@72+1");
        assert_eq!(LockSlot::read(2).unwrap().to_string(), "READ2@125+1");
    }
}
