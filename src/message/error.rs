use crate::tools::error::PcepError;

/// Reason a received buffer could not be decoded into a PCEP message.
///
/// Errors that concern a cleanly framed message (unknown classes, bad object
/// contents) leave the connection usable; the session layer answers them with
/// a PCErr and counts them against its error budget. Errors detected in the
/// common header itself mean the byte stream can no longer be trusted, see
/// [`DecodeError::is_framing_fatal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A length field promised more bytes than the buffer holds
    Truncated {
        /// bytes required by the current field
        need: usize,
        /// bytes actually remaining
        have: usize,
    },
    /// Common header version field is not 1
    BadVersion(u8),
    /// Common header length is below the header size or above the frame cap
    BadMessageLength(u16),
    /// Message type is not one of the RFC-defined types
    UnknownMessageType(u8),
    /// Object class is not implemented
    UnknownObjectClass(u8),
    /// Object class is known but the (class, type) pair is not
    UnknownObjectType {
        /// object class
        class: u8,
        /// object type
        object_type: u8,
    },
    /// Object length field is inconsistent with its body
    BadObjectLength {
        /// object class
        class: u8,
        /// declared length
        length: u16,
    },
    /// TLV length field exceeds the enclosing object body
    BadTlvLength {
        /// TLV type
        tlv_type: u16,
        /// declared body length
        length: u16,
    },
    /// Route sub-object type is not implemented
    UnknownSubobjectType(u8),
    /// Route sub-object length field is inconsistent with its type
    BadSubobjectLength {
        /// sub-object type
        subobj_type: u8,
        /// declared length
        length: u8,
    },
    /// SR sub-object flag combination violates the segment-routing draft
    SrFlagViolation(&'static str),
    /// SR sub-object NAI type is not defined
    BadNaiType(u8),
}

impl DecodeError {
    /// RFC (error-type, error-value) pair for the PCErr answering this
    /// failure. `None` when the RFC defines no error object for it (the
    /// session layer then only counts the message and may close).
    pub fn to_error_type_value(&self) -> Option<(u8, u8)> {
        match self {
            DecodeError::UnknownObjectClass(_) => Some((3, 1)),
            DecodeError::UnknownObjectType { .. } => Some((3, 2)),
            DecodeError::Truncated { .. }
            | DecodeError::BadObjectLength { .. }
            | DecodeError::BadTlvLength { .. }
            | DecodeError::UnknownSubobjectType(_)
            | DecodeError::BadSubobjectLength { .. }
            | DecodeError::SrFlagViolation(_)
            | DecodeError::BadNaiType(_) => Some((10, 1)),
            DecodeError::BadVersion(_)
            | DecodeError::BadMessageLength(_)
            | DecodeError::UnknownMessageType(_) => None,
        }
    }

    /// true when the error was found in the common header, i.e. the frame
    /// boundary itself is unreliable and the connection must be closed with
    /// reason 3 (format)
    pub fn is_framing_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::BadVersion(_) | DecodeError::BadMessageLength(_)
        )
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Truncated { need, have } => {
                write!(f, "buffer underflow, need {} bytes, have {}", need, have)
            }
            DecodeError::BadVersion(v) => write!(f, "unsupported PCEP version {}", v),
            DecodeError::BadMessageLength(len) => write!(f, "invalid message length {}", len),
            DecodeError::UnknownMessageType(t) => write!(f, "unknown message type {}", t),
            DecodeError::UnknownObjectClass(c) => write!(f, "unknown object class {}", c),
            DecodeError::UnknownObjectType { class, object_type } => {
                write!(f, "unknown object type {} for class {}", object_type, class)
            }
            DecodeError::BadObjectLength { class, length } => {
                write!(f, "invalid length {} for object class {}", length, class)
            }
            DecodeError::BadTlvLength { tlv_type, length } => {
                write!(f, "invalid length {} for TLV type {}", length, tlv_type)
            }
            DecodeError::UnknownSubobjectType(t) => write!(f, "unknown RO sub-object type {}", t),
            DecodeError::BadSubobjectLength {
                subobj_type,
                length,
            } => write!(
                f,
                "invalid length {} for RO sub-object type {}",
                length, subobj_type
            ),
            DecodeError::SrFlagViolation(msg) => write!(f, "SR sub-object flags: {}", msg),
            DecodeError::BadNaiType(t) => write!(f, "unknown SR NAI type {}", t),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for PcepError {
    fn from(err: DecodeError) -> Self {
        PcepError::new(err.to_string())
    }
}
