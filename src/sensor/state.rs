//! Sensor state vector and the known-tag table.
//!
//! A [`SensorState`] is the 4-tuple `(tag, photo1, photo2, photo3)` the
//! playback mapping is keyed on. It is `Copy`, hashable and compared by value,
//! so a snapshot can be used directly as a `HashMap` key.

use std::fmt;

/// Index of a known RFID tag. Index 0 is reserved for "no tag present".
///
/// A `TagId` other than [`TagId::NONE`] can only be obtained from a
/// [`TagTable`], which keeps every state's tag a valid table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TagId(usize);

impl TagId {
    /// No tag on the reader.
    pub const NONE: TagId = TagId(0);

    /// Position of the tag in the table.
    pub fn index(self) -> usize {
        self.0
    }

    /// True for [`TagId::NONE`].
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the three photoresistors wired to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoId {
    /// Photoresistor 1
    One,
    /// Photoresistor 2
    Two,
    /// Photoresistor 3
    Three,
}

impl PhotoId {
    /// All photoresistors, in wire order.
    pub const ALL: [PhotoId; 3] = [PhotoId::One, PhotoId::Two, PhotoId::Three];

    /// Parse the 1-based number used on the wire.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(PhotoId::One),
            2 => Some(PhotoId::Two),
            3 => Some(PhotoId::Three),
            _ => None,
        }
    }

    /// 1-based number used on the wire.
    pub fn number(self) -> u8 {
        match self {
            PhotoId::One => 1,
            PhotoId::Two => 2,
            PhotoId::Three => 3,
        }
    }

    fn slot(self) -> usize {
        usize::from(self.number() - 1)
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Canonical sensor state vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SensorState {
    rfid: TagId,
    photos: [bool; 3],
}

impl SensorState {
    /// Build a state from its four components.
    pub fn new(rfid: TagId, photo1: bool, photo2: bool, photo3: bool) -> Self {
        Self {
            rfid,
            photos: [photo1, photo2, photo3],
        }
    }

    /// Tag currently on the reader, [`TagId::NONE`] if none.
    pub fn rfid(&self) -> TagId {
        self.rfid
    }

    /// Whether the given photoresistor is covered.
    pub fn photo(&self, photo: PhotoId) -> bool {
        self.photos[photo.slot()]
    }

    /// Copy of this state with a different tag.
    pub fn with_rfid(mut self, rfid: TagId) -> Self {
        self.rfid = rfid;
        self
    }

    /// Copy of this state with one photoresistor changed.
    pub fn with_photo(mut self, photo: PhotoId, covered: bool) -> Self {
        self.photos[photo.slot()] = covered;
        self
    }

    /// Four-digit code `{rfid}{p1}{p2}{p3}`, e.g. `2010`.
    pub fn code(&self) -> String {
        format!(
            "{}{}{}{}",
            self.rfid.index(),
            u8::from(self.photos[0]),
            u8::from(self.photos[1]),
            u8::from(self.photos[2])
        )
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |b: bool| if b { 'T' } else { 'F' };
        write!(
            f,
            "{{{},{},{},{}}}",
            self.rfid.index(),
            flag(self.photos[0]),
            flag(self.photos[1]),
            flag(self.photos[2])
        )
    }
}

/// Ordered list of known tag UIDs. Entry 0 is the "no tag" sentinel the
/// controller reports when its reader glitches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTable {
    uids: Vec<String>,
}

impl TagTable {
    /// Build a table from UIDs. The first entry is the no-tag sentinel.
    ///
    /// Returns `None` when the list is empty.
    pub fn new(uids: Vec<String>) -> Option<Self> {
        if uids.is_empty() {
            None
        } else {
            Some(Self { uids })
        }
    }

    /// Number of entries, sentinel included.
    pub fn len(&self) -> usize {
        self.uids.len()
    }

    /// Never true; a table always holds the sentinel.
    pub fn is_empty(&self) -> bool {
        self.uids.is_empty()
    }

    /// Exact-match lookup of a UID token.
    pub fn lookup(&self, uid: &str) -> Option<TagId> {
        self.uids.iter().position(|known| known == uid).map(TagId)
    }

    /// Tag id for a table index, if the index is in range.
    pub fn id(&self, index: usize) -> Option<TagId> {
        (index < self.uids.len()).then_some(TagId(index))
    }

    /// UID string of a tag.
    pub fn uid(&self, id: TagId) -> &str {
        self.uids.get(id.0).map(String::as_str).unwrap_or_default()
    }

    /// Every id in the table, sentinel first.
    pub fn ids(&self) -> impl Iterator<Item = TagId> {
        (0..self.uids.len()).map(TagId)
    }
}
