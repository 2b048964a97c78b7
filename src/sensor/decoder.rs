//! Serial line decoder.
//!
//! Turns one newline-stripped line from the sensor controller into exactly one
//! [`SensorEvent`]. The controller speaks a small text protocol:
//!
//! ```text
//! UID Value: 0xA4 0xE1 0xE7 0x53
//! Lost UID Value: 0xA4 0xE1 0xE7 0x53
//! Photo: 2
//! Lost Photo: 2
//! ```
//!
//! The decoder performs no I/O and keeps no state between calls.

use thiserror::Error;

use super::state::{PhotoId, TagId, TagTable};

const TAG_DETECTED: &str = "UID Value: ";
const TAG_LOST: &str = "Lost UID Value: ";
const PHOTO_COVERED: &str = "Photo: ";
const PHOTO_UNCOVERED: &str = "Lost Photo: ";

/// Why a non-empty line produced no usable event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No known prefix.
    #[error("unrecognized line '{0}'")]
    UnrecognizedLine(String),

    /// Known prefix, unusable payload.
    #[error("invalid payload '{payload}' after '{prefix}'")]
    InvalidPayload {
        /// The matched prefix.
        prefix: &'static str,
        /// Everything after the prefix.
        payload: String,
    },

    /// A UID that is not in the tag table.
    #[error("unknown tag UID '{0}'")]
    UnknownTag(String),

    /// The no-tag sentinel was reported as a detection.
    #[error("controller reported the no-tag UID '{0}'")]
    NoTagSentinel(String),
}

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorEvent {
    /// A known tag was placed on the reader.
    RfidDetected(TagId),
    /// The tag left the reader. Carries the id the controller named, `None`
    /// when its UID was not in the table; the tracker clears regardless.
    RfidLost(Option<TagId>),
    /// A photoresistor got covered.
    PhotoCovered(PhotoId),
    /// A photoresistor got uncovered.
    PhotoUncovered(PhotoId),
    /// The line could not be used. State is never mutated by this event.
    Malformed(DecodeError),
    /// Nothing was read.
    Empty,
}

/// Stateless decoder bound to a tag table.
#[derive(Debug, Clone)]
pub struct LineDecoder {
    tags: TagTable,
}

impl LineDecoder {
    /// Create a decoder recognizing the given tags.
    pub fn new(tags: TagTable) -> Self {
        Self { tags }
    }

    /// Known tags.
    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    /// Decode one line. Surrounding whitespace (including a stray `\r`) is
    /// ignored; an empty line yields [`SensorEvent::Empty`].
    pub fn decode(&self, line: &str) -> SensorEvent {
        let line = line.trim();
        if line.is_empty() {
            return SensorEvent::Empty;
        }

        // "Lost ..." prefixes first, the detected prefixes are their suffixes.
        let result = if let Some(uid) = line.strip_prefix(TAG_LOST) {
            self.decode_lost_tag(uid)
        } else if let Some(uid) = line.strip_prefix(TAG_DETECTED) {
            self.decode_detected_tag(uid)
        } else if let Some(number) = line.strip_prefix(PHOTO_UNCOVERED) {
            parse_photo(PHOTO_UNCOVERED, number).map(SensorEvent::PhotoUncovered)
        } else if let Some(number) = line.strip_prefix(PHOTO_COVERED) {
            parse_photo(PHOTO_COVERED, number).map(SensorEvent::PhotoCovered)
        } else {
            Err(DecodeError::UnrecognizedLine(line.to_string()))
        };

        result.unwrap_or_else(SensorEvent::Malformed)
    }

    fn decode_detected_tag(&self, uid: &str) -> Result<SensorEvent, DecodeError> {
        let uid = parse_uid(TAG_DETECTED, uid)?;
        match self.tags.lookup(uid) {
            Some(id) if id.is_none() => Err(DecodeError::NoTagSentinel(uid.to_string())),
            Some(id) => Ok(SensorEvent::RfidDetected(id)),
            None => Err(DecodeError::UnknownTag(uid.to_string())),
        }
    }

    fn decode_lost_tag(&self, uid: &str) -> Result<SensorEvent, DecodeError> {
        let uid = parse_uid(TAG_LOST, uid)?;
        Ok(SensorEvent::RfidLost(self.tags.lookup(uid)))
    }
}

/// UID tokens look like `0x44 0xDE 0xE7 0x53`: hex digits, `x` and spaces.
fn parse_uid<'a>(prefix: &'static str, payload: &'a str) -> Result<&'a str, DecodeError> {
    let well_formed = !payload.is_empty()
        && payload
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == 'x' || c == ' ');
    if well_formed {
        Ok(payload)
    } else {
        Err(DecodeError::InvalidPayload {
            prefix,
            payload: payload.to_string(),
        })
    }
}

/// Photo payloads are plain decimal digits; `+1` or ` 1` are rejected.
fn parse_photo(prefix: &'static str, payload: &str) -> Result<PhotoId, DecodeError> {
    let number = if !payload.is_empty() && payload.bytes().all(|b| b.is_ascii_digit()) {
        payload.parse::<u8>().ok()
    } else {
        None
    };
    number
        .and_then(PhotoId::from_number)
        .ok_or_else(|| DecodeError::InvalidPayload {
            prefix,
            payload: payload.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> LineDecoder {
        LineDecoder::new(
            TagTable::new(vec![
                "0x00 0x00 0x00 0x00".into(),
                "0xB4 0xE2 0xE7 0x53".into(),
                "0xA4 0xE1 0xE7 0x53".into(),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_tag_detected() {
        let d = decoder();
        match d.decode("UID Value: 0xA4 0xE1 0xE7 0x53") {
            SensorEvent::RfidDetected(id) => assert_eq!(id.index(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tag_lost_known_and_unknown() {
        let d = decoder();
        assert_eq!(
            d.decode("Lost UID Value: 0xB4 0xE2 0xE7 0x53"),
            SensorEvent::RfidLost(d.tags().id(1))
        );
        assert_eq!(
            d.decode("Lost UID Value: 0x11 0x22 0x33 0x44"),
            SensorEvent::RfidLost(None)
        );
    }

    #[test]
    fn test_unknown_and_sentinel_tags_are_malformed() {
        let d = decoder();
        assert_eq!(
            d.decode("UID Value: 0x11 0x22 0x33 0x44"),
            SensorEvent::Malformed(DecodeError::UnknownTag("0x11 0x22 0x33 0x44".into()))
        );
        assert_eq!(
            d.decode("UID Value: 0x00 0x00 0x00 0x00"),
            SensorEvent::Malformed(DecodeError::NoTagSentinel("0x00 0x00 0x00 0x00".into()))
        );
    }

    #[test]
    fn test_photo_lines() {
        let d = decoder();
        assert_eq!(d.decode("Photo: 1"), SensorEvent::PhotoCovered(PhotoId::One));
        assert_eq!(d.decode("Lost Photo: 3\r"), SensorEvent::PhotoUncovered(PhotoId::Three));
        assert!(matches!(
            d.decode("Photo: 4"),
            SensorEvent::Malformed(DecodeError::InvalidPayload { .. })
        ));
        assert!(matches!(
            d.decode("Lost Photo: one"),
            SensorEvent::Malformed(DecodeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_photo_payload_must_be_plain_digits() {
        let d = decoder();
        for line in ["Photo: +1", "Lost Photo: +3", "Photo: -1", "Photo:  2", "Photo: 2x", "Photo: "] {
            assert!(
                matches!(d.decode(line), SensorEvent::Malformed(_)),
                "{:?} should be malformed",
                line
            );
        }
        assert_eq!(d.decode("Photo: 02"), SensorEvent::PhotoCovered(PhotoId::Two));
    }

    #[test]
    fn test_empty_is_distinct_from_malformed() {
        let d = decoder();
        assert_eq!(d.decode(""), SensorEvent::Empty);
        assert_eq!(d.decode("  \r"), SensorEvent::Empty);
        assert!(matches!(
            d.decode("hello"),
            SensorEvent::Malformed(DecodeError::UnrecognizedLine(_))
        ));
        assert!(matches!(
            d.decode("UID Value: not a uid!"),
            SensorEvent::Malformed(DecodeError::InvalidPayload { .. })
        ));
    }
}
