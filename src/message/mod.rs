pub mod cursor;
pub mod error;
/// PCEP object encoding and decoding
pub mod object;
/// Route subobjects (ERO/IRO/RRO)
pub mod subobj;
/// TLV encoding and decoding
pub mod tlv;

use cursor::ByteCursor;
use error::DecodeError;
use object::{Object, ObjectBody};

/*
 * PCEP common message header (RFC 5440 6.1)
 *
 *  0                   1                   2                   3
 *  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
 * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 * | Ver |  Flags  |  Message-Type |       Message-Length          |
 * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *
 * Message-Length is the total message length in bytes including the header.
 */

/// PCEP protocol version carried in the common header
pub const PCEP_VERSION: u8 = 1;
/// Size of the common message header in bytes
pub const COMMON_HEADER_SIZE: usize = 4;
/// Upper bound on a single encoded PCEP message
pub const MAX_MESSAGE_SIZE: usize = 6000;

/// PCEP message type (RFC 5440, RFC 8231, RFC 8281)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Open
    Open = 1,
    /// KeepAlive
    KeepAlive = 2,
    /// Path computation request
    PcReq = 3,
    /// Path computation reply
    PcRep = 4,
    /// Notification
    PcNtf = 5,
    /// Error
    Error = 6,
    /// Close
    Close = 7,
    /// LSP state report (RFC 8231)
    Report = 10,
    /// LSP update request (RFC 8231)
    Update = 11,
    /// LSP initiate request (RFC 8281)
    Initiate = 12,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(v: u8) -> std::result::Result<Self, ()> {
        match v {
            x if x == MessageType::Open as u8 => Ok(MessageType::Open),
            x if x == MessageType::KeepAlive as u8 => Ok(MessageType::KeepAlive),
            x if x == MessageType::PcReq as u8 => Ok(MessageType::PcReq),
            x if x == MessageType::PcRep as u8 => Ok(MessageType::PcRep),
            x if x == MessageType::PcNtf as u8 => Ok(MessageType::PcNtf),
            x if x == MessageType::Error as u8 => Ok(MessageType::Error),
            x if x == MessageType::Close as u8 => Ok(MessageType::Close),
            x if x == MessageType::Report as u8 => Ok(MessageType::Report),
            x if x == MessageType::Update as u8 => Ok(MessageType::Update),
            x if x == MessageType::Initiate as u8 => Ok(MessageType::Initiate),
            _ => Err(()),
        }
    }
}

impl MessageType {
    /// Human readable message type name
    pub fn to_str(&self) -> &str {
        match self {
            MessageType::Open => "Open",
            MessageType::KeepAlive => "KeepAlive",
            MessageType::PcReq => "PCReq",
            MessageType::PcRep => "PCRep",
            MessageType::PcNtf => "PCNtf",
            MessageType::Error => "PCErr",
            MessageType::Close => "Close",
            MessageType::Report => "PCRpt",
            MessageType::Update => "PCUpd",
            MessageType::Initiate => "PCInitiate",
        }
    }
}

/// A PCEP message: type and ordered object sequence.
///
/// [`Message::encode`] keeps the produced buffer on the message; a message
/// built by [`Message::decode`] keeps the received bytes the same way so
/// relay paths can echo them without re-encoding.
#[derive(Debug, Clone)]
pub struct Message {
    /// message type
    pub msg_type: MessageType,
    /// ordered object sequence
    pub objects: Vec<Object>,
    encoded: Option<Vec<u8>>,
}

impl PartialEq for Message {
    /// Structural equality, the encoded buffer is not compared
    fn eq(&self, other: &Self) -> bool {
        self.msg_type == other.msg_type && self.objects == other.objects
    }
}

impl Message {
    /// Return a new message
    pub fn new(msg_type: MessageType, objects: Vec<Object>) -> Self {
        Self {
            msg_type,
            objects,
            encoded: None,
        }
    }

    /// Return a new Open message
    pub fn open(open: object::OpenObject, tlvs: Vec<tlv::Tlv>) -> Self {
        Self::new(
            MessageType::Open,
            vec![Object::with_tlvs(ObjectBody::Open(open), tlvs)],
        )
    }

    /// Return a new KeepAlive message
    pub fn keepalive() -> Self {
        Self::new(MessageType::KeepAlive, Vec::new())
    }

    /// Return a new PCErr message carrying one Error object
    pub fn error(error_type: u8, error_value: u8) -> Self {
        Self::new(
            MessageType::Error,
            vec![Object::new(ObjectBody::Error(object::ErrorObject {
                error_type,
                error_value,
            }))],
        )
    }

    /// Return a new Close message
    pub fn close(reason: u8) -> Self {
        Self::new(
            MessageType::Close,
            vec![Object::new(ObjectBody::Close(object::CloseObject {
                reason,
            }))],
        )
    }

    /// Return a new PCReq message. The RP and EndPoints objects are
    /// mandatory, `objects` may add LSPA, Bandwidth, Metric, RRO or IRO.
    pub fn request(rp: object::RpObject, endpoints: ObjectBody, objects: Vec<Object>) -> Self {
        let mut all = vec![Object::new(ObjectBody::Rp(rp)), Object::new(endpoints)];
        all.extend(objects);
        Self::new(MessageType::PcReq, all)
    }

    /// Bytes produced by the last encode or received by decode
    pub fn encoded(&self) -> Option<&[u8]> {
        self.encoded.as_deref()
    }

    /// Encode to network byte order, keeping the buffer on the message
    pub fn encode(&mut self) -> &[u8] {
        let data = self.to_bytes();
        self.encoded = Some(data);
        self.encoded.as_deref().unwrap()
    }

    /// Encode to network byte order
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(PCEP_VERSION << 5);
        data.push(self.msg_type as u8);
        data.extend(0u16.to_be_bytes()); // length, patched below

        for object in &self.objects {
            object::push_object(&mut data, object);
        }

        let length = data.len() as u16;
        data[2..4].copy_from_slice(&length.to_be_bytes());
        data
    }

    /// Decode a single message from a complete frame
    pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
        let mut cursor = ByteCursor::new(data);
        let version_byte = cursor.read_u8()?;
        let version = version_byte >> 5;
        if version != PCEP_VERSION {
            return Err(DecodeError::BadVersion(version));
        }

        let type_byte = cursor.read_u8()?;
        let length = cursor.read_u16()?;
        if (length as usize) < COMMON_HEADER_SIZE
            || (length as usize) > data.len()
            || (length as usize) > MAX_MESSAGE_SIZE
        {
            return Err(DecodeError::BadMessageLength(length));
        }

        let msg_type: MessageType = type_byte
            .try_into()
            .map_err(|_| DecodeError::UnknownMessageType(type_byte))?;

        // the declared length bounds all sub-parsing
        let mut body = ByteCursor::new(&data[COMMON_HEADER_SIZE..length as usize]);
        let mut objects = Vec::new();
        while !body.is_empty() {
            if body.remaining() < object::OBJECT_HEADER_SIZE {
                return Err(DecodeError::Truncated {
                    need: object::OBJECT_HEADER_SIZE,
                    have: body.remaining(),
                });
            }
            objects.push(object::parse_object(&mut body)?);
        }

        Ok(Message {
            msg_type,
            objects,
            encoded: Some(data[..length as usize].to_vec()),
        })
    }

    /// First object of the given class, in message order
    pub fn first_object(&self, class: u8) -> Option<&Object> {
        self.objects.iter().find(|o| o.object_class() == class)
    }

    /// Request id of the first RP object, if any
    pub fn request_id(&self) -> Option<u32> {
        self.objects.iter().find_map(|o| match &o.body {
            ObjectBody::Rp(rp) => Some(rp.request_id),
            _ => None,
        })
    }
}

/// Total length a frame starting with `data` declares, once at least the
/// common header is available
pub fn declared_message_length(data: &[u8]) -> Option<usize> {
    if data.len() < COMMON_HEADER_SIZE {
        return None;
    }
    Some(u16::from_be_bytes([data[2], data[3]]) as usize)
}
