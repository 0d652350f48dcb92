use std::net::{Ipv4Addr, Ipv6Addr};

use super::cursor::ByteCursor;
use super::error::DecodeError;

/*
 * Route object sub-object, shared by ERO, IRO and RRO (RFC 3209 4.3.3)
 *
 *  0                   1
 *  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
 * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+----------//----------+
 * |L|    Type     |     Length    |  Sub-object contents |
 * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+----------//----------+
 *
 * L is the loose-hop bit. Length covers the whole sub-object including
 * these two bytes.
 */

const SUBOBJ_TYPE_IPV4: u8 = 1;
const SUBOBJ_TYPE_IPV6: u8 = 2;
const SUBOBJ_TYPE_LABEL: u8 = 3;
const SUBOBJ_TYPE_UNNUMBERED: u8 = 4;
const SUBOBJ_TYPE_ASN: u8 = 32;
const SUBOBJ_TYPE_SR: u8 = 36;
/* draft-ietf-pce-segment-routing-07 used 5, accepted on decode only */
const SUBOBJ_TYPE_SR_DRAFT07: u8 = 5;

const SR_FLAG_M: u16 = 0x001;
const SR_FLAG_C: u16 = 0x002;
const SR_FLAG_S: u16 = 0x004;
const SR_FLAG_F: u16 = 0x008;

/// Node or Adjacency Identifier of an SR sub-object
/// (draft-ietf-pce-segment-routing-16)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SrNai {
    /// No NAI on the wire (F flag set)
    Absent,
    /// IPv4 node identifier
    Ipv4Node(
        /// node address
        Ipv4Addr,
    ),
    /// IPv6 node identifier
    Ipv6Node(
        /// node address
        Ipv6Addr,
    ),
    /// IPv4 adjacency
    Ipv4Adjacency {
        /// local interface address
        local: Ipv4Addr,
        /// remote interface address
        remote: Ipv4Addr,
    },
    /// IPv6 adjacency with global addresses
    Ipv6Adjacency {
        /// local interface address
        local: Ipv6Addr,
        /// remote interface address
        remote: Ipv6Addr,
    },
    /// Unnumbered adjacency with IPv4 node identifiers
    UnnumberedIpv4Adjacency {
        /// local node identifier
        local_node_id: Ipv4Addr,
        /// local interface identifier
        local_interface_id: u32,
        /// remote node identifier
        remote_node_id: Ipv4Addr,
        /// remote interface identifier
        remote_interface_id: u32,
    },
    /// IPv6 adjacency with link-local addresses
    LinkLocalIpv6Adjacency {
        /// local address
        local: Ipv6Addr,
        /// local interface identifier
        local_interface_id: u32,
        /// remote address
        remote: Ipv6Addr,
        /// remote interface identifier
        remote_interface_id: u32,
    },
}

impl SrNai {
    fn nai_type(&self) -> u8 {
        match self {
            SrNai::Absent => 0,
            SrNai::Ipv4Node(_) => 1,
            SrNai::Ipv6Node(_) => 2,
            SrNai::Ipv4Adjacency { .. } => 3,
            SrNai::Ipv6Adjacency { .. } => 4,
            SrNai::UnnumberedIpv4Adjacency { .. } => 5,
            SrNai::LinkLocalIpv6Adjacency { .. } => 6,
        }
    }
}

/// SR-ERO sub-object (draft-ietf-pce-segment-routing-16)
///
/// The SID field is an MPLS label stack entry when the M flag is set:
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                Label                  | TC  |S|       TTL     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrSubobject {
    /// loose-hop bit
    pub loose: bool,
    /// SID carries an MPLS label stack entry
    pub flag_m: bool,
    /// TC, S and TTL of the label stack entry are significant, only valid
    /// with the M flag
    pub flag_c: bool,
    /// SID absent, the receiver must derive it from the NAI
    pub flag_s: bool,
    /// NAI absent
    pub flag_f: bool,
    /// 32-bit SID, present on the wire unless the S flag is set
    pub sid: Option<u32>,
    /// node or adjacency identifier
    pub nai: SrNai,
}

impl SrSubobject {
    /// MPLS label part of the SID, when M is set
    pub fn sid_label(&self) -> Option<u32> {
        match self.flag_m {
            true => self.sid.map(|sid| (sid & 0xfffff000) >> 12),
            false => None,
        }
    }

    /// Traffic-class bits of the SID, when M is set
    pub fn sid_tc(&self) -> Option<u8> {
        match self.flag_m {
            true => self.sid.map(|sid| ((sid & 0x00000e00) >> 9) as u8),
            false => None,
        }
    }

    /// Bottom-of-stack bit of the SID, when M is set
    pub fn sid_stack_bottom(&self) -> Option<bool> {
        match self.flag_m {
            true => self.sid.map(|sid| (sid & 0x00000100) != 0),
            false => None,
        }
    }

    /// TTL part of the SID, when M is set
    pub fn sid_ttl(&self) -> Option<u8> {
        match self.flag_m {
            true => self.sid.map(|sid| (sid & 0xff) as u8),
            false => None,
        }
    }
}

/// Build an MPLS label stack entry SID from its parts
pub fn mpls_label_stack_entry(label: u32, tc: u8, stack_bottom: bool, ttl: u8) -> u32 {
    ((label << 12) & 0xfffff000)
        | (((tc as u32) << 9) & 0x00000e00)
        | match stack_bottom {
            true => 0x00000100,
            false => 0,
        }
        | (ttl as u32)
}

/// One hop of an ERO, IRO or RRO
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteSubobject {
    /// IPv4 prefix hop (RFC 3209)
    Ipv4 {
        /// loose-hop bit
        loose: bool,
        /// prefix address
        addr: Ipv4Addr,
        /// prefix length
        prefix_length: u8,
        /// local protection available (RRO)
        flag_local_protection: bool,
    },
    /// IPv6 prefix hop (RFC 3209)
    Ipv6 {
        /// loose-hop bit
        loose: bool,
        /// prefix address
        addr: Ipv6Addr,
        /// prefix length
        prefix_length: u8,
        /// local protection available (RRO)
        flag_local_protection: bool,
    },
    /// Label hop (RFC 3209)
    Label {
        /// loose-hop bit
        loose: bool,
        /// global label flag
        flag_global: bool,
        /// label class-type, generalized label = 2
        class_type: u8,
        /// 32-bit label
        label: u32,
    },
    /// Unnumbered interface hop (RFC 3477)
    Unnumbered {
        /// loose-hop bit
        loose: bool,
        /// router identifier
        router_id: Ipv4Addr,
        /// interface identifier
        interface_id: u32,
    },
    /// Autonomous system number hop (RFC 3209)
    Asn {
        /// loose-hop bit
        loose: bool,
        /// autonomous system number
        asn: u16,
    },
    /// Segment-routing hop
    Sr(
        /// SR sub-object
        SrSubobject,
    ),
}

impl RouteSubobject {
    /// loose-hop bit of any sub-object kind
    pub fn loose(&self) -> bool {
        match self {
            RouteSubobject::Ipv4 { loose, .. } => *loose,
            RouteSubobject::Ipv6 { loose, .. } => *loose,
            RouteSubobject::Label { loose, .. } => *loose,
            RouteSubobject::Unnumbered { loose, .. } => *loose,
            RouteSubobject::Asn { loose, .. } => *loose,
            RouteSubobject::Sr(sr) => sr.loose,
        }
    }

    fn clear_loose(&mut self) {
        match self {
            RouteSubobject::Ipv4 { loose, .. } => *loose = false,
            RouteSubobject::Ipv6 { loose, .. } => *loose = false,
            RouteSubobject::Label { loose, .. } => *loose = false,
            RouteSubobject::Unnumbered { loose, .. } => *loose = false,
            RouteSubobject::Asn { loose, .. } => *loose = false,
            RouteSubobject::Sr(sr) => sr.loose = false,
        }
    }
}

fn push_subobj_header(data: &mut Vec<u8>, subobj_type: u8, loose: bool, body_len: usize) {
    let type_byte = match loose {
        true => 0x80 | subobj_type,
        false => subobj_type,
    };
    data.push(type_byte);
    data.push((body_len + 2) as u8);
}

/// Append one route sub-object
pub fn push_subobject(data: &mut Vec<u8>, subobj: &RouteSubobject) {
    match subobj {
        RouteSubobject::Ipv4 {
            loose,
            addr,
            prefix_length,
            flag_local_protection,
        } => {
            push_subobj_header(data, SUBOBJ_TYPE_IPV4, *loose, 6);
            data.extend(addr.octets());
            data.push(*prefix_length);
            data.push(match flag_local_protection {
                true => 0x01,
                false => 0,
            });
        }
        RouteSubobject::Ipv6 {
            loose,
            addr,
            prefix_length,
            flag_local_protection,
        } => {
            push_subobj_header(data, SUBOBJ_TYPE_IPV6, *loose, 18);
            data.extend(addr.octets());
            data.push(*prefix_length);
            data.push(match flag_local_protection {
                true => 0x01,
                false => 0,
            });
        }
        RouteSubobject::Label {
            loose,
            flag_global,
            class_type,
            label,
        } => {
            push_subobj_header(data, SUBOBJ_TYPE_LABEL, *loose, 6);
            data.push(match flag_global {
                true => 0x01,
                false => 0,
            });
            data.push(*class_type);
            data.extend(label.to_be_bytes());
        }
        RouteSubobject::Unnumbered {
            loose,
            router_id,
            interface_id,
        } => {
            push_subobj_header(data, SUBOBJ_TYPE_UNNUMBERED, *loose, 10);
            data.extend(0u16.to_be_bytes());
            data.extend(router_id.octets());
            data.extend(interface_id.to_be_bytes());
        }
        RouteSubobject::Asn { loose, asn } => {
            push_subobj_header(data, SUBOBJ_TYPE_ASN, *loose, 2);
            data.extend(asn.to_be_bytes());
        }
        RouteSubobject::Sr(sr) => push_sr_subobject(data, sr),
    }
}

fn push_sr_subobject(data: &mut Vec<u8>, sr: &SrSubobject) {
    let mut body: Vec<u8> = Vec::new();

    let mut flags: u16 = 0;
    if sr.flag_m {
        flags |= SR_FLAG_M;
    }
    if sr.flag_c {
        flags |= SR_FLAG_C;
    }
    if sr.flag_s {
        flags |= SR_FLAG_S;
    }
    if sr.flag_f {
        flags |= SR_FLAG_F;
    }
    body.extend((((sr.nai.nai_type() as u16) << 12) | flags).to_be_bytes());

    if !sr.flag_s {
        body.extend(sr.sid.unwrap_or(0).to_be_bytes());
    }

    if !sr.flag_f {
        match &sr.nai {
            SrNai::Absent => {}
            SrNai::Ipv4Node(addr) => body.extend(addr.octets()),
            SrNai::Ipv6Node(addr) => body.extend(addr.octets()),
            SrNai::Ipv4Adjacency { local, remote } => {
                body.extend(local.octets());
                body.extend(remote.octets());
            }
            SrNai::Ipv6Adjacency { local, remote } => {
                body.extend(local.octets());
                body.extend(remote.octets());
            }
            SrNai::UnnumberedIpv4Adjacency {
                local_node_id,
                local_interface_id,
                remote_node_id,
                remote_interface_id,
            } => {
                body.extend(local_node_id.octets());
                body.extend(local_interface_id.to_be_bytes());
                body.extend(remote_node_id.octets());
                body.extend(remote_interface_id.to_be_bytes());
            }
            SrNai::LinkLocalIpv6Adjacency {
                local,
                local_interface_id,
                remote,
                remote_interface_id,
            } => {
                body.extend(local.octets());
                body.extend(local_interface_id.to_be_bytes());
                body.extend(remote.octets());
                body.extend(remote_interface_id.to_be_bytes());
            }
        }
    }

    push_subobj_header(data, SUBOBJ_TYPE_SR, sr.loose, body.len());
    data.extend(&body);
}

fn read_ipv4(cursor: &mut ByteCursor) -> Result<Ipv4Addr, DecodeError> {
    let octets: [u8; 4] = cursor.read_bytes(4)?.try_into().unwrap();
    Ok(Ipv4Addr::from(octets))
}

fn read_ipv6(cursor: &mut ByteCursor) -> Result<Ipv6Addr, DecodeError> {
    let octets: [u8; 16] = cursor.read_bytes(16)?.try_into().unwrap();
    Ok(Ipv6Addr::from(octets))
}

/// Parse one route sub-object.
///
/// `is_rro` clears the loose-hop bit with a warning: the L bit is only
/// defined for ERO and IRO, a recorded route must not set it.
pub fn parse_subobject(
    cursor: &mut ByteCursor,
    is_rro: bool,
) -> Result<RouteSubobject, DecodeError> {
    let type_byte = cursor.read_u8()?;
    let length = cursor.read_u8()?;
    let loose = (type_byte & 0x80) != 0;
    let subobj_type = type_byte & 0x7f;

    if length < 2 || (length as usize - 2) > cursor.remaining() {
        return Err(DecodeError::BadSubobjectLength {
            subobj_type,
            length,
        });
    }

    let mut body = ByteCursor::new(cursor.read_bytes(length as usize - 2)?);
    let mut subobj = match subobj_type {
        SUBOBJ_TYPE_IPV4 => {
            let addr = read_ipv4(&mut body)?;
            let prefix_length = body.read_u8()?;
            let flags = body.read_u8()?;
            RouteSubobject::Ipv4 {
                loose,
                addr,
                prefix_length,
                flag_local_protection: (flags & 0x01) != 0,
            }
        }
        SUBOBJ_TYPE_IPV6 => {
            let addr = read_ipv6(&mut body)?;
            let prefix_length = body.read_u8()?;
            let flags = body.read_u8()?;
            RouteSubobject::Ipv6 {
                loose,
                addr,
                prefix_length,
                flag_local_protection: (flags & 0x01) != 0,
            }
        }
        SUBOBJ_TYPE_LABEL => {
            let flags = body.read_u8()?;
            let class_type = body.read_u8()?;
            RouteSubobject::Label {
                loose,
                flag_global: (flags & 0x01) != 0,
                class_type,
                label: body.read_u32()?,
            }
        }
        SUBOBJ_TYPE_UNNUMBERED => {
            body.skip(2)?;
            RouteSubobject::Unnumbered {
                loose,
                router_id: read_ipv4(&mut body)?,
                interface_id: body.read_u32()?,
            }
        }
        SUBOBJ_TYPE_ASN => RouteSubobject::Asn {
            loose,
            asn: body.read_u16()?,
        },
        SUBOBJ_TYPE_SR | SUBOBJ_TYPE_SR_DRAFT07 => {
            RouteSubobject::Sr(parse_sr_subobject(&mut body, loose)?)
        }
        _ => return Err(DecodeError::UnknownSubobjectType(subobj_type)),
    };

    if is_rro && subobj.loose() {
        log::warn!("Loose-hop bit set on an RRO sub-object, clearing it");
        subobj.clear_loose();
    }

    Ok(subobj)
}

fn parse_sr_subobject(body: &mut ByteCursor, loose: bool) -> Result<SrSubobject, DecodeError> {
    let word = body.read_u16()?;
    let nai_type = (word >> 12) as u8;
    let flags = word & 0x0fff;

    let flag_m = (flags & SR_FLAG_M) != 0;
    let flag_c = (flags & SR_FLAG_C) != 0;
    let flag_s = (flags & SR_FLAG_S) != 0;
    let flag_f = (flags & SR_FLAG_F) != 0;

    if flag_c && !flag_m {
        return Err(DecodeError::SrFlagViolation("C flag set without M flag"));
    }
    if flag_s && flag_f {
        return Err(DecodeError::SrFlagViolation(
            "both SID and NAI absent from SR sub-object",
        ));
    }

    let sid = match flag_s {
        true => None,
        false => Some(body.read_u32()?),
    };

    let nai = match flag_f {
        true => SrNai::Absent,
        false => match nai_type {
            1 => SrNai::Ipv4Node(read_ipv4(body)?),
            2 => SrNai::Ipv6Node(read_ipv6(body)?),
            3 => SrNai::Ipv4Adjacency {
                local: read_ipv4(body)?,
                remote: read_ipv4(body)?,
            },
            4 => SrNai::Ipv6Adjacency {
                local: read_ipv6(body)?,
                remote: read_ipv6(body)?,
            },
            5 => SrNai::UnnumberedIpv4Adjacency {
                local_node_id: read_ipv4(body)?,
                local_interface_id: body.read_u32()?,
                remote_node_id: read_ipv4(body)?,
                remote_interface_id: body.read_u32()?,
            },
            6 => SrNai::LinkLocalIpv6Adjacency {
                local: read_ipv6(body)?,
                local_interface_id: body.read_u32()?,
                remote: read_ipv6(body)?,
                remote_interface_id: body.read_u32()?,
            },
            0 => return Err(DecodeError::SrFlagViolation("NAI type absent without F flag")),
            t => return Err(DecodeError::BadNaiType(t)),
        },
    };

    Ok(SrSubobject {
        loose,
        flag_m,
        flag_c,
        flag_s,
        flag_f,
        sid,
        nai,
    })
}

/// Parse sub-objects until the cursor is exhausted
pub fn parse_subobjects(
    cursor: &mut ByteCursor,
    is_rro: bool,
) -> Result<Vec<RouteSubobject>, DecodeError> {
    let mut subobjects = Vec::new();
    while cursor.remaining() >= 2 {
        subobjects.push(parse_subobject(cursor, is_rro)?);
    }
    Ok(subobjects)
}
