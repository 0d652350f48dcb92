use super::cursor::ByteCursor;
use super::error::DecodeError;

/*
 *  https://www.rfc-editor.org/rfc/rfc5440 7.1
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |              Type             |            Length             |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                            Value                              |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *
 * Length is the length of the value portion in bytes. The TLV is padded to
 * 4-byte alignment; padding is not included in the Length field.
 */

/// NO-PATH-VECTOR TLV type (RFC 5440)
pub const TLV_NO_PATH_VECTOR: u16 = 1;
/// STATEFUL-PCE-CAPABILITY TLV type (RFC 8231)
pub const TLV_STATEFUL_PCE_CAPABILITY: u16 = 16;
/// SYMBOLIC-PATH-NAME TLV type (RFC 8231)
pub const TLV_SYMBOLIC_PATH_NAME: u16 = 17;
/// LSP-ERROR-CODE TLV type (RFC 8231)
pub const TLV_LSP_ERROR_CODE: u16 = 20;
/// LSP-DB-VERSION TLV type (RFC 8232)
pub const TLV_LSP_DB_VERSION: u16 = 23;
/// SR-PCE-CAPABILITY TLV type (draft-ietf-pce-segment-routing-16)
pub const TLV_SR_PCE_CAPABILITY: u16 = 26;
/// PATH-SETUP-TYPE TLV type (RFC 8408)
pub const TLV_PATH_SETUP_TYPE: u16 = 28;

/// A PCEP TLV.
///
/// TLV types the library does not know are preserved byte for byte as
/// [`Tlv::Unknown`] so that relay and echo paths round-trip them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tlv {
    /// NO-PATH-VECTOR, carried in the NoPath object
    NoPathVector {
        /// 32-bit error bit field
        flags: u32,
    },
    /// STATEFUL-PCE-CAPABILITY, carried in the Open object
    StatefulPceCapability {
        /// capability bit field, U flag in the low bit
        flags: u32,
    },
    /// SYMBOLIC-PATH-NAME
    SymbolicPathName(
        /// symbolic name bytes
        Vec<u8>,
    ),
    /// LSP-ERROR-CODE
    LspErrorCode {
        /// error code
        code: u32,
    },
    /// LSP-DB-VERSION
    LspDbVersion {
        /// LSP state database version number
        version: u64,
    },
    /// SR-PCE-CAPABILITY
    SrPceCapability {
        /// maximum SID depth
        msd: u8,
    },
    /// PATH-SETUP-TYPE
    PathSetupType {
        /// path setup type, 0 = RSVP-TE, 1 = SR
        pst: u8,
    },
    /// Any TLV type not listed above, body kept verbatim
    Unknown {
        /// TLV type
        tlv_type: u16,
        /// unpadded body bytes
        data: Vec<u8>,
    },
}

impl Tlv {
    /// Wire TLV type
    pub fn tlv_type(&self) -> u16 {
        match self {
            Tlv::NoPathVector { .. } => TLV_NO_PATH_VECTOR,
            Tlv::StatefulPceCapability { .. } => TLV_STATEFUL_PCE_CAPABILITY,
            Tlv::SymbolicPathName(_) => TLV_SYMBOLIC_PATH_NAME,
            Tlv::LspErrorCode { .. } => TLV_LSP_ERROR_CODE,
            Tlv::LspDbVersion { .. } => TLV_LSP_DB_VERSION,
            Tlv::SrPceCapability { .. } => TLV_SR_PCE_CAPABILITY,
            Tlv::PathSetupType { .. } => TLV_PATH_SETUP_TYPE,
            Tlv::Unknown { tlv_type, .. } => *tlv_type,
        }
    }
}

/// Append a TLV, zero-padded to 4-byte alignment
pub fn push_tlv(data: &mut Vec<u8>, tlv: &Tlv) {
    let mut body: Vec<u8> = Vec::new();
    match tlv {
        Tlv::NoPathVector { flags } => body.extend(flags.to_be_bytes()),
        Tlv::StatefulPceCapability { flags } => body.extend(flags.to_be_bytes()),
        Tlv::SymbolicPathName(name) => body.extend(name),
        Tlv::LspErrorCode { code } => body.extend(code.to_be_bytes()),
        Tlv::LspDbVersion { version } => body.extend(version.to_be_bytes()),
        Tlv::SrPceCapability { msd } => {
            body.extend(0u16.to_be_bytes());
            body.push(0);
            body.push(*msd);
        }
        Tlv::PathSetupType { pst } => {
            body.extend([0u8, 0, 0]);
            body.push(*pst);
        }
        Tlv::Unknown { data, .. } => body.extend(data),
    }

    data.extend(tlv.tlv_type().to_be_bytes());
    data.extend((body.len() as u16).to_be_bytes());
    data.extend(&body);
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

/// Parse one TLV, consuming its padding
pub fn parse_tlv(cursor: &mut ByteCursor) -> Result<Tlv, DecodeError> {
    let tlv_type = cursor.read_u16()?;
    let length = cursor.read_u16()?;

    if length as usize > cursor.remaining() {
        return Err(DecodeError::BadTlvLength { tlv_type, length });
    }

    let mut body = ByteCursor::new(cursor.read_bytes(length as usize)?);
    let pad = (4 - (length as usize % 4)) % 4;
    if pad > 0 && cursor.remaining() >= pad {
        cursor.skip(pad)?;
    }

    let tlv = match tlv_type {
        TLV_NO_PATH_VECTOR => Tlv::NoPathVector {
            flags: body.read_u32()?,
        },
        TLV_STATEFUL_PCE_CAPABILITY => Tlv::StatefulPceCapability {
            flags: body.read_u32()?,
        },
        TLV_SYMBOLIC_PATH_NAME => Tlv::SymbolicPathName(body.read_bytes(length as usize)?.to_vec()),
        TLV_LSP_ERROR_CODE => Tlv::LspErrorCode {
            code: body.read_u32()?,
        },
        TLV_LSP_DB_VERSION => Tlv::LspDbVersion {
            version: body.read_u64()?,
        },
        TLV_SR_PCE_CAPABILITY => {
            body.skip(3)?;
            Tlv::SrPceCapability {
                msd: body.read_u8()?,
            }
        }
        TLV_PATH_SETUP_TYPE => {
            body.skip(3)?;
            Tlv::PathSetupType {
                pst: body.read_u8()?,
            }
        }
        _ => {
            log::debug!("Keep unknown TLV type {} as opaque", tlv_type);
            Tlv::Unknown {
                tlv_type,
                data: body.read_bytes(length as usize)?.to_vec(),
            }
        }
    };

    Ok(tlv)
}

/// Parse TLVs until the cursor is exhausted
pub fn parse_tlvs(cursor: &mut ByteCursor) -> Result<Vec<Tlv>, DecodeError> {
    let mut tlvs = Vec::new();
    while cursor.remaining() >= 4 {
        tlvs.push(parse_tlv(cursor)?);
    }
    Ok(tlvs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_tlv_padding() {
        crate::tests::init();
        let tlv = Tlv::SymbolicPathName(b"lsp-a".to_vec());
        let mut data = Vec::new();
        push_tlv(&mut data, &tlv);
        // 4 header + 5 body + 3 pad
        assert_eq!(data.len(), 12);
        assert_eq!(u16::from_be_bytes([data[2], data[3]]), 5);
        assert_eq!(&data[9..], &[0, 0, 0]);

        let mut cursor = ByteCursor::new(&data);
        assert_eq!(parse_tlv(&mut cursor).unwrap(), tlv);
        assert!(cursor.is_empty());
    }

    #[test]
    pub fn test_tlv_unknown_round_trip() {
        crate::tests::init();
        let tlv = Tlv::Unknown {
            tlv_type: 65280,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        let mut data = Vec::new();
        push_tlv(&mut data, &tlv);
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(parse_tlv(&mut cursor).unwrap(), tlv);
    }

    #[test]
    pub fn test_tlv_bad_length() {
        crate::tests::init();
        let data = [0u8, 16, 0, 8, 0, 0, 0, 1];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            parse_tlv(&mut cursor),
            Err(DecodeError::BadTlvLength {
                tlv_type: 16,
                length: 8
            })
        ));
    }
}
