use std::net::{Ipv4Addr, Ipv6Addr};

use super::cursor::ByteCursor;
use super::error::DecodeError;
use super::subobj::{self, RouteSubobject};
use super::tlv::{self, Tlv};

/*
 * PCEP common object header (RFC 5440 7.2)
 *
 *  0                   1                   2                   3
 *  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
 * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 * | Object-Class  |   OT  |Res|P|I|   Object Length (bytes)       |
 * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 * |                        (Object body)                          |
 * +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *
 * Object Length includes the header and is a multiple of 4; the body is
 * zero-padded to the word boundary.
 */

/// Size of the common object header in bytes
pub const OBJECT_HEADER_SIZE: usize = 4;

/// Open object class
pub const OBJECT_CLASS_OPEN: u8 = 1;
/// RP object class
pub const OBJECT_CLASS_RP: u8 = 2;
/// NoPath object class
pub const OBJECT_CLASS_NOPATH: u8 = 3;
/// EndPoints object class
pub const OBJECT_CLASS_ENDPOINTS: u8 = 4;
/// Bandwidth object class
pub const OBJECT_CLASS_BANDWIDTH: u8 = 5;
/// Metric object class
pub const OBJECT_CLASS_METRIC: u8 = 6;
/// ERO object class
pub const OBJECT_CLASS_ERO: u8 = 7;
/// RRO object class
pub const OBJECT_CLASS_RRO: u8 = 8;
/// LSPA object class
pub const OBJECT_CLASS_LSPA: u8 = 9;
/// IRO object class
pub const OBJECT_CLASS_IRO: u8 = 10;
/// SVEC object class
pub const OBJECT_CLASS_SVEC: u8 = 11;
/// Notification object class
pub const OBJECT_CLASS_NOTIFY: u8 = 12;
/// Error object class
pub const OBJECT_CLASS_ERROR: u8 = 13;
/// LoadBalancing object class
pub const OBJECT_CLASS_LOAD_BALANCING: u8 = 14;
/// Close object class
pub const OBJECT_CLASS_CLOSE: u8 = 15;
/// LSP object class (RFC 8231)
pub const OBJECT_CLASS_LSP: u8 = 32;
/// SRP object class (RFC 8231)
pub const OBJECT_CLASS_SRP: u8 = 33;
/// Association object class (draft-ietf-pce-association-group)
pub const OBJECT_CLASS_ASSOCIATION: u8 = 40;

/// Close reason: no explicit reason (RFC 5440 7.17)
pub const CLOSE_REASON_NO: u8 = 1;
/// Close reason: DeadTimer expired
pub const CLOSE_REASON_DEADTIMER: u8 = 2;
/// Close reason: malformed PCEP message
pub const CLOSE_REASON_FORMAT: u8 = 3;
/// Close reason: too many unknown requests
pub const CLOSE_REASON_UNKNOWN_REQ: u8 = 4;
/// Close reason: too many unrecognized messages
pub const CLOSE_REASON_UNREC_MSG: u8 = 5;

/// Error-type: PCEP session establishment failure
pub const ERROR_TYPE_SESSION_FAILURE: u8 = 1;
/// Error-type: capability not supported
pub const ERROR_TYPE_CAPABILITY_NOT_SUPPORTED: u8 = 2;
/// Error-type: unknown object
pub const ERROR_TYPE_UNKNOWN_OBJECT: u8 = 3;
/// Error-type: not supported object
pub const ERROR_TYPE_NOT_SUPPORTED_OBJECT: u8 = 4;
/// Error-type: policy violation
pub const ERROR_TYPE_POLICY_VIOLATION: u8 = 5;
/// Error-type: mandatory object missing
pub const ERROR_TYPE_MANDATORY_OBJECT_MISSING: u8 = 6;
/// Error-type: reception of an invalid object
pub const ERROR_TYPE_INVALID_OBJECT: u8 = 10;
/// Error-type: invalid operation (RFC 8231)
pub const ERROR_TYPE_INVALID_OPERATION: u8 = 19;
/// Error-type: LSP state synchronization error (RFC 8231)
pub const ERROR_TYPE_LSP_STATE_SYNC: u8 = 20;
/// Error-type: bad parameter value (RFC 8281)
pub const ERROR_TYPE_BAD_PARAMETER_VALUE: u8 = 23;
/// Error-type: LSP instantiation error (RFC 8281)
pub const ERROR_TYPE_LSP_INSTANTIATE: u8 = 24;

/// Error-value for type 1: reception of an invalid Open message
pub const ERROR_VALUE_INVALID_OPEN: u8 = 1;
/// Error-value for type 1: OpenWait timer expired
pub const ERROR_VALUE_OPENWAIT_TIMED_OUT: u8 = 2;
/// Error-value for type 1: unacceptable Open, no negotiation
pub const ERROR_VALUE_UNACCEPTABLE_OPEN_NO_NEG: u8 = 3;
/// Error-value for type 1: unacceptable Open, negotiable
pub const ERROR_VALUE_UNACCEPTABLE_OPEN_NEG: u8 = 4;
/// Error-value for type 1: second Open still unacceptable
pub const ERROR_VALUE_SECOND_OPEN_UNACCEPTABLE: u8 = 5;
/// Error-value for type 1: received a PCErr
pub const ERROR_VALUE_RECEIVED_PCERR: u8 = 6;
/// Error-value for type 1: KeepWait timer expired
pub const ERROR_VALUE_KEEPWAIT_TIMED_OUT: u8 = 7;
/// Error-value for type 3: unrecognized object class
pub const ERROR_VALUE_UNREC_OBJECT_CLASS: u8 = 1;
/// Error-value for type 3: unrecognized object type
pub const ERROR_VALUE_UNREC_OBJECT_TYPE: u8 = 2;
/// Error-value for type 6: RP object missing
pub const ERROR_VALUE_RP_MISSING: u8 = 1;
/// Error-value for type 6: RRO missing for a reoptimization request
pub const ERROR_VALUE_RRO_MISSING_FOR_REOP: u8 = 2;
/// Error-value for type 6: EndPoints object missing
pub const ERROR_VALUE_EP_MISSING: u8 = 3;
/// Error-value for type 6: LSP object missing (RFC 8231)
pub const ERROR_VALUE_LSP_MISSING: u8 = 8;
/// Error-value for type 6: ERO missing (RFC 8231)
pub const ERROR_VALUE_ERO_MISSING: u8 = 9;
/// Error-value for type 6: SRP object missing (RFC 8231)
pub const ERROR_VALUE_SRP_MISSING: u8 = 10;
/// Error-value for type 6: LSP identifiers TLV missing (RFC 8231)
pub const ERROR_VALUE_LSP_ID_TLV_MISSING: u8 = 11;
/// Error-value for type 10: P flag not set correctly in an object
pub const ERROR_VALUE_P_FLAG_NOT_CORRECT: u8 = 1;
/// Error-value for type 10: symbolic path name TLV missing (RFC 8281)
pub const ERROR_VALUE_SYMBOLIC_PATH_NAME_TLV_MISSING: u8 = 8;
/// Error-value for type 19: update of a non-delegated LSP (RFC 8231)
pub const ERROR_VALUE_UPDATE_NON_DELEGATED_LSP: u8 = 1;
/// Error-value for type 20: the PCE cannot process the LSP report (RFC 8231)
pub const ERROR_VALUE_CANT_PROCESS_LSP_REPORT: u8 = 1;
/// Error-value for type 20: the PCC cannot complete state sync (RFC 8231)
pub const ERROR_VALUE_CANT_COMPLETE_STATE_SYNC: u8 = 5;
/// Error-value for type 23: symbolic path name in use (RFC 8281)
pub const ERROR_VALUE_SYMBOLIC_PATH_NAME_IN_USE: u8 = 1;
/// Error-value for type 24: unacceptable instantiation parameters (RFC 8281)
pub const ERROR_VALUE_UNACCEPTABLE_INSTANTIATE: u8 = 1;
/// Error-value for type 24: internal error (RFC 8281)
pub const ERROR_VALUE_INSTANTIATE_INTERNAL_ERROR: u8 = 2;
/// Error-value for type 24: signalling error (RFC 8281)
pub const ERROR_VALUE_INSTANTIATE_SIGNALLING_ERROR: u8 = 3;

/// Notification type: a pending request was cancelled
pub const NOTIFY_TYPE_PENDING_REQUEST_CANCELLED: u8 = 1;
/// Notification type: PCE overload state
pub const NOTIFY_TYPE_PCE_OVERLOADED: u8 = 2;
/// Notification value: the PCC cancels a set of pending requests
pub const NOTIFY_VALUE_PCC_CANCELLED_REQUEST: u8 = 1;
/// Notification value: the PCE cancels a set of pending requests
pub const NOTIFY_VALUE_PCE_CANCELLED_REQUEST: u8 = 2;
/// Notification value: the PCE is currently overloaded
pub const NOTIFY_VALUE_PCE_CURRENTLY_OVERLOADED: u8 = 1;
/// Notification value: the PCE is no longer overloaded
pub const NOTIFY_VALUE_PCE_NO_LONGER_OVERLOADED: u8 = 2;

/// Metric type: IGP metric
pub const METRIC_TYPE_IGP: u8 = 1;
/// Metric type: TE metric
pub const METRIC_TYPE_TE: u8 = 2;
/// Metric type: hop count
pub const METRIC_TYPE_HOP_COUNT: u8 = 3;

/// NoPath nature of issue: no path satisfying the constraints was found
pub const NOPATH_NI_NO_PATH_FOUND: u8 = 0;
/// NoPath nature of issue: the PCE chain was broken
pub const NOPATH_NI_PCE_CHAIN_BROKEN: u8 = 1;

/// LSP operational status: down
pub const LSP_OPERATIONAL_DOWN: u8 = 0;
/// LSP operational status: up
pub const LSP_OPERATIONAL_UP: u8 = 1;
/// LSP operational status: active
pub const LSP_OPERATIONAL_ACTIVE: u8 = 2;
/// LSP operational status: going down
pub const LSP_OPERATIONAL_GOING_DOWN: u8 = 3;
/// LSP operational status: going up
pub const LSP_OPERATIONAL_GOING_UP: u8 = 4;

/// Open object body (RFC 5440 7.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenObject {
    /// PCEP version, always 1
    pub version: u8,
    /// maximum period between two consecutive messages sent by the speaker
    pub keepalive: u8,
    /// seconds of silence before the session is declared dead
    pub dead_timer: u8,
    /// session identifier chosen by the speaker
    pub sid: u8,
}

/// RP object body (RFC 5440 7.4.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpObject {
    /// request priority, 3 bits, 0 = unspecified
    pub priority: u8,
    /// reoptimization of an existing path
    pub flag_reoptimization: bool,
    /// bidirectional path computation
    pub flag_bidirectional: bool,
    /// a loose path is acceptable
    pub flag_loose_path: bool,
    /// request identifier, unique per PCC/PCE pair
    pub request_id: u32,
}

/// NoPath object body (RFC 5440 7.5)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoPathObject {
    /// nature of issue, 0 = no path found, 1 = PCE chain broken
    pub nature_of_issue: u8,
    /// unsatisfied constraints are reported in following objects
    pub flag_constraints: bool,
}

/// EndPoints object body, IPv4, object type 1 (RFC 5440 7.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointsIpv4Object {
    /// source address
    pub src: Ipv4Addr,
    /// destination address
    pub dst: Ipv4Addr,
}

/// EndPoints object body, IPv6, object type 2 (RFC 5440 7.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointsIpv6Object {
    /// source address
    pub src: Ipv6Addr,
    /// destination address
    pub dst: Ipv6Addr,
}

/// Bandwidth object body (RFC 5440 7.7)
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthObject {
    /// bandwidth in bytes per second
    pub bandwidth: f32,
}

/// Metric object body (RFC 5440 7.8)
#[derive(Debug, Clone, PartialEq)]
pub struct MetricObject {
    /// metric type, 1 = IGP, 2 = TE, 3 = hop count
    pub metric_type: u8,
    /// bound flag, value is a maximum
    pub flag_b: bool,
    /// computed metric flag
    pub flag_c: bool,
    /// metric value
    pub value: f32,
}

/// LSPA object body (RFC 5440 7.11)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LspaObject {
    /// resource classes to exclude
    pub exclude_any: u32,
    /// resource classes, any must match
    pub include_any: u32,
    /// resource classes, all must match
    pub include_all: u32,
    /// setup priority, 0 highest
    pub setup_priority: u8,
    /// holding priority, 0 highest
    pub holding_priority: u8,
    /// local protection desired
    pub flag_local_protection: bool,
}

/// SVEC object body (RFC 5440 7.13.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SvecObject {
    /// requests must be link diverse
    pub flag_link_diverse: bool,
    /// requests must be node diverse
    pub flag_node_diverse: bool,
    /// requests must be SRLG diverse
    pub flag_srlg_diverse: bool,
    /// request identifiers the vector applies to
    pub request_ids: Vec<u32>,
}

/// Notification object body (RFC 5440 7.14)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyObject {
    /// notification type, 1 = pending request cancelled, 2 = PCE overloaded
    pub notification_type: u8,
    /// notification value, type specific
    pub notification_value: u8,
}

/// Error object body (RFC 5440 7.15)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorObject {
    /// error type
    pub error_type: u8,
    /// error value, type specific
    pub error_value: u8,
}

/// LoadBalancing object body (RFC 5440 7.16)
#[derive(Debug, Clone, PartialEq)]
pub struct LoadBalancingObject {
    /// maximum number of TE LSPs in the set
    pub max_lsp: u8,
    /// minimum bandwidth of each element
    pub min_bandwidth: f32,
}

/// Close object body (RFC 5440 7.17)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseObject {
    /// close reason, see the `CLOSE_REASON_` constants
    pub reason: u8,
}

/// LSP object body (RFC 8231 7.3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LspObject {
    /// PCEP-specific LSP identifier, 20 bits
    pub plsp_id: u32,
    /// operational status, 3 bits, see the `LSP_OPERATIONAL_` constants
    pub operational_status: u8,
    /// delegation flag
    pub flag_d: bool,
    /// synchronization flag
    pub flag_s: bool,
    /// remove flag
    pub flag_r: bool,
    /// administrative flag
    pub flag_a: bool,
    /// create flag, set on PCE-initiated LSPs (RFC 8281)
    pub flag_c: bool,
}

/// SRP object body (RFC 8231 7.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpObject {
    /// LSP removal requested (RFC 8281)
    pub flag_remove: bool,
    /// stateful request parameter identifier
    pub srp_id: u32,
}

/// Association object body, IPv4 source, object type 1
/// (draft-ietf-pce-association-group)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationIpv4Object {
    /// removal flag
    pub flag_removal: bool,
    /// association type
    pub association_type: u16,
    /// association identifier
    pub association_id: u16,
    /// association source
    pub src: Ipv4Addr,
}

/// Association object body, IPv6 source, object type 2
/// (draft-ietf-pce-association-group)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationIpv6Object {
    /// removal flag
    pub flag_removal: bool,
    /// association type
    pub association_type: u16,
    /// association identifier
    pub association_id: u16,
    /// association source
    pub src: Ipv6Addr,
}

/// Route object body, shared by ERO, RRO and IRO
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteObject {
    /// ordered hop list
    pub subobjects: Vec<RouteSubobject>,
}

/// Typed body of a PCEP object, one variant per implemented (class, type)
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBody {
    /// Open object
    Open(OpenObject),
    /// RP object
    Rp(RpObject),
    /// NoPath object
    NoPath(NoPathObject),
    /// EndPoints object, IPv4
    EndpointsIpv4(EndpointsIpv4Object),
    /// EndPoints object, IPv6
    EndpointsIpv6(EndpointsIpv6Object),
    /// Bandwidth object
    Bandwidth(BandwidthObject),
    /// Metric object
    Metric(MetricObject),
    /// Explicit route object
    Ero(RouteObject),
    /// Reported route object
    Rro(RouteObject),
    /// LSPA object
    Lspa(LspaObject),
    /// Include route object
    Iro(RouteObject),
    /// SVEC object
    Svec(SvecObject),
    /// Notification object
    Notify(NotifyObject),
    /// Error object
    Error(ErrorObject),
    /// LoadBalancing object
    LoadBalancing(LoadBalancingObject),
    /// Close object
    Close(CloseObject),
    /// LSP object
    Lsp(LspObject),
    /// SRP object
    Srp(SrpObject),
    /// Association object, IPv4
    AssociationIpv4(AssociationIpv4Object),
    /// Association object, IPv6
    AssociationIpv6(AssociationIpv6Object),
}

impl ObjectBody {
    /// Wire object class
    pub fn object_class(&self) -> u8 {
        match self {
            ObjectBody::Open(_) => OBJECT_CLASS_OPEN,
            ObjectBody::Rp(_) => OBJECT_CLASS_RP,
            ObjectBody::NoPath(_) => OBJECT_CLASS_NOPATH,
            ObjectBody::EndpointsIpv4(_) | ObjectBody::EndpointsIpv6(_) => OBJECT_CLASS_ENDPOINTS,
            ObjectBody::Bandwidth(_) => OBJECT_CLASS_BANDWIDTH,
            ObjectBody::Metric(_) => OBJECT_CLASS_METRIC,
            ObjectBody::Ero(_) => OBJECT_CLASS_ERO,
            ObjectBody::Rro(_) => OBJECT_CLASS_RRO,
            ObjectBody::Lspa(_) => OBJECT_CLASS_LSPA,
            ObjectBody::Iro(_) => OBJECT_CLASS_IRO,
            ObjectBody::Svec(_) => OBJECT_CLASS_SVEC,
            ObjectBody::Notify(_) => OBJECT_CLASS_NOTIFY,
            ObjectBody::Error(_) => OBJECT_CLASS_ERROR,
            ObjectBody::LoadBalancing(_) => OBJECT_CLASS_LOAD_BALANCING,
            ObjectBody::Close(_) => OBJECT_CLASS_CLOSE,
            ObjectBody::Lsp(_) => OBJECT_CLASS_LSP,
            ObjectBody::Srp(_) => OBJECT_CLASS_SRP,
            ObjectBody::AssociationIpv4(_) | ObjectBody::AssociationIpv6(_) => {
                OBJECT_CLASS_ASSOCIATION
            }
        }
    }

    /// Wire object type within the class
    pub fn object_type(&self) -> u8 {
        match self {
            ObjectBody::EndpointsIpv6(_) | ObjectBody::AssociationIpv6(_) => 2,
            _ => 1,
        }
    }
}

/// A PCEP object: common header flags, typed body and trailing TLVs.
///
/// The TLV list is only encoded for object classes that define TLVs; route
/// objects carry sub-objects instead and ignore it.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// processing-rule bit, the object must be taken into account
    pub flag_p: bool,
    /// ignore bit, set by a PCE on ignored optional objects
    pub flag_i: bool,
    /// typed body
    pub body: ObjectBody,
    /// trailing TLVs
    pub tlvs: Vec<Tlv>,
}

impl Object {
    /// Return a new object with cleared header flags and no TLVs
    pub fn new(body: ObjectBody) -> Self {
        Self {
            flag_p: false,
            flag_i: false,
            body,
            tlvs: Vec::new(),
        }
    }

    /// Return a new object carrying TLVs
    pub fn with_tlvs(body: ObjectBody, tlvs: Vec<Tlv>) -> Self {
        Self {
            flag_p: false,
            flag_i: false,
            body,
            tlvs,
        }
    }

    /// Wire object class
    pub fn object_class(&self) -> u8 {
        self.body.object_class()
    }
}

/// Append an encoded object, zero-padded to a multiple of 4 bytes
pub fn push_object(data: &mut Vec<u8>, object: &Object) {
    let start = data.len();
    data.push(object.body.object_class());
    let mut flags_byte = object.body.object_type() << 4;
    if object.flag_p {
        flags_byte |= 0x02;
    }
    if object.flag_i {
        flags_byte |= 0x01;
    }
    data.push(flags_byte);
    data.extend(0u16.to_be_bytes()); // length, patched below

    match &object.body {
        ObjectBody::Open(open) => {
            data.push(open.version << 5);
            data.push(open.keepalive);
            data.push(open.dead_timer);
            data.push(open.sid);
        }
        ObjectBody::Rp(rp) => {
            let mut flags: u32 = (rp.priority & 0x07) as u32;
            if rp.flag_reoptimization {
                flags |= 0x08;
            }
            if rp.flag_bidirectional {
                flags |= 0x10;
            }
            if rp.flag_loose_path {
                flags |= 0x20;
            }
            data.extend(flags.to_be_bytes());
            data.extend(rp.request_id.to_be_bytes());
        }
        ObjectBody::NoPath(nopath) => {
            data.push(nopath.nature_of_issue);
            let flags: u16 = match nopath.flag_constraints {
                true => 0x8000,
                false => 0,
            };
            data.extend(flags.to_be_bytes());
            data.push(0);
        }
        ObjectBody::EndpointsIpv4(ep) => {
            data.extend(ep.src.octets());
            data.extend(ep.dst.octets());
        }
        ObjectBody::EndpointsIpv6(ep) => {
            data.extend(ep.src.octets());
            data.extend(ep.dst.octets());
        }
        ObjectBody::Bandwidth(bw) => data.extend(bw.bandwidth.to_bits().to_be_bytes()),
        ObjectBody::Metric(metric) => {
            data.extend(0u16.to_be_bytes());
            let mut flags: u8 = 0;
            if metric.flag_b {
                flags |= 0x01;
            }
            if metric.flag_c {
                flags |= 0x02;
            }
            data.push(flags);
            data.push(metric.metric_type);
            data.extend(metric.value.to_bits().to_be_bytes());
        }
        ObjectBody::Ero(route) | ObjectBody::Rro(route) | ObjectBody::Iro(route) => {
            for subobj in &route.subobjects {
                subobj::push_subobject(data, subobj);
            }
        }
        ObjectBody::Lspa(lspa) => {
            data.extend(lspa.exclude_any.to_be_bytes());
            data.extend(lspa.include_any.to_be_bytes());
            data.extend(lspa.include_all.to_be_bytes());
            data.push(lspa.setup_priority);
            data.push(lspa.holding_priority);
            data.push(match lspa.flag_local_protection {
                true => 0x01,
                false => 0,
            });
            data.push(0);
        }
        ObjectBody::Svec(svec) => {
            data.push(0);
            data.push(0);
            data.push(0);
            let mut flags: u8 = 0;
            if svec.flag_link_diverse {
                flags |= 0x01;
            }
            if svec.flag_node_diverse {
                flags |= 0x02;
            }
            if svec.flag_srlg_diverse {
                flags |= 0x04;
            }
            data.push(flags);
            for request_id in &svec.request_ids {
                data.extend(request_id.to_be_bytes());
            }
        }
        ObjectBody::Notify(notify) => {
            data.push(0);
            data.push(0);
            data.push(notify.notification_type);
            data.push(notify.notification_value);
        }
        ObjectBody::Error(error) => {
            data.push(0);
            data.push(0);
            data.push(error.error_type);
            data.push(error.error_value);
        }
        ObjectBody::LoadBalancing(lb) => {
            data.extend(0u16.to_be_bytes());
            data.push(0);
            data.push(lb.max_lsp);
            data.extend(lb.min_bandwidth.to_bits().to_be_bytes());
        }
        ObjectBody::Close(close) => {
            data.extend(0u16.to_be_bytes());
            data.push(0);
            data.push(close.reason);
        }
        ObjectBody::Lsp(lsp) => {
            let mut word: u32 = (lsp.plsp_id & 0x000fffff) << 12;
            word |= ((lsp.operational_status & 0x07) as u32) << 4;
            if lsp.flag_d {
                word |= 0x001;
            }
            if lsp.flag_s {
                word |= 0x002;
            }
            if lsp.flag_r {
                word |= 0x004;
            }
            if lsp.flag_a {
                word |= 0x008;
            }
            if lsp.flag_c {
                word |= 0x080;
            }
            data.extend(word.to_be_bytes());
        }
        ObjectBody::Srp(srp) => {
            let flags: u32 = match srp.flag_remove {
                true => 0x01,
                false => 0,
            };
            data.extend(flags.to_be_bytes());
            data.extend(srp.srp_id.to_be_bytes());
        }
        ObjectBody::AssociationIpv4(assoc) => {
            data.extend(0u16.to_be_bytes());
            let flags: u16 = match assoc.flag_removal {
                true => 0x01,
                false => 0,
            };
            data.extend(flags.to_be_bytes());
            data.extend(assoc.association_type.to_be_bytes());
            data.extend(assoc.association_id.to_be_bytes());
            data.extend(assoc.src.octets());
        }
        ObjectBody::AssociationIpv6(assoc) => {
            data.extend(0u16.to_be_bytes());
            let flags: u16 = match assoc.flag_removal {
                true => 0x01,
                false => 0,
            };
            data.extend(flags.to_be_bytes());
            data.extend(assoc.association_type.to_be_bytes());
            data.extend(assoc.association_id.to_be_bytes());
            data.extend(assoc.src.octets());
        }
    }

    if !is_route_class(object.body.object_class()) {
        for t in &object.tlvs {
            tlv::push_tlv(data, t);
        }
    }

    while (data.len() - start) % 4 != 0 {
        data.push(0);
    }
    let length = (data.len() - start) as u16;
    data[start + 2..start + 4].copy_from_slice(&length.to_be_bytes());
}

fn is_route_class(class: u8) -> bool {
    matches!(
        class,
        OBJECT_CLASS_ERO | OBJECT_CLASS_RRO | OBJECT_CLASS_IRO
    )
}

fn read_ipv4(cursor: &mut ByteCursor) -> Result<Ipv4Addr, DecodeError> {
    let octets: [u8; 4] = cursor.read_bytes(4)?.try_into().unwrap();
    Ok(Ipv4Addr::from(octets))
}

fn read_ipv6(cursor: &mut ByteCursor) -> Result<Ipv6Addr, DecodeError> {
    let octets: [u8; 16] = cursor.read_bytes(16)?.try_into().unwrap();
    Ok(Ipv6Addr::from(octets))
}

/// Parse one object from the cursor
pub fn parse_object(cursor: &mut ByteCursor) -> Result<Object, DecodeError> {
    let class = cursor.read_u8()?;
    let flags_byte = cursor.read_u8()?;
    let length = cursor.read_u16()?;

    let object_type = flags_byte >> 4;
    let flag_p = (flags_byte & 0x02) != 0;
    let flag_i = (flags_byte & 0x01) != 0;

    if (length as usize) < OBJECT_HEADER_SIZE
        || (length as usize - OBJECT_HEADER_SIZE) > cursor.remaining()
    {
        return Err(DecodeError::BadObjectLength { class, length });
    }

    let mut body = ByteCursor::new(cursor.read_bytes(length as usize - OBJECT_HEADER_SIZE)?);

    let parsed = match class {
        OBJECT_CLASS_OPEN => {
            let version_byte = body.read_u8()?;
            ObjectBody::Open(OpenObject {
                version: version_byte >> 5,
                keepalive: body.read_u8()?,
                dead_timer: body.read_u8()?,
                sid: body.read_u8()?,
            })
        }
        OBJECT_CLASS_RP => {
            let flags = body.read_u32()?;
            ObjectBody::Rp(RpObject {
                priority: (flags & 0x07) as u8,
                flag_reoptimization: (flags & 0x08) != 0,
                flag_bidirectional: (flags & 0x10) != 0,
                flag_loose_path: (flags & 0x20) != 0,
                request_id: body.read_u32()?,
            })
        }
        OBJECT_CLASS_NOPATH => {
            let nature_of_issue = body.read_u8()?;
            let flags = body.read_u16()?;
            body.skip(1)?;
            ObjectBody::NoPath(NoPathObject {
                nature_of_issue,
                flag_constraints: (flags & 0x8000) != 0,
            })
        }
        OBJECT_CLASS_ENDPOINTS => match object_type {
            1 => ObjectBody::EndpointsIpv4(EndpointsIpv4Object {
                src: read_ipv4(&mut body)?,
                dst: read_ipv4(&mut body)?,
            }),
            2 => ObjectBody::EndpointsIpv6(EndpointsIpv6Object {
                src: read_ipv6(&mut body)?,
                dst: read_ipv6(&mut body)?,
            }),
            _ => {
                return Err(DecodeError::UnknownObjectType {
                    class,
                    object_type,
                })
            }
        },
        OBJECT_CLASS_BANDWIDTH => ObjectBody::Bandwidth(BandwidthObject {
            bandwidth: body.read_f32()?,
        }),
        OBJECT_CLASS_METRIC => {
            body.skip(2)?;
            let flags = body.read_u8()?;
            ObjectBody::Metric(MetricObject {
                flag_b: (flags & 0x01) != 0,
                flag_c: (flags & 0x02) != 0,
                metric_type: body.read_u8()?,
                value: body.read_f32()?,
            })
        }
        OBJECT_CLASS_ERO => ObjectBody::Ero(RouteObject {
            subobjects: subobj::parse_subobjects(&mut body, false)?,
        }),
        OBJECT_CLASS_RRO => ObjectBody::Rro(RouteObject {
            subobjects: subobj::parse_subobjects(&mut body, true)?,
        }),
        OBJECT_CLASS_IRO => ObjectBody::Iro(RouteObject {
            subobjects: subobj::parse_subobjects(&mut body, false)?,
        }),
        OBJECT_CLASS_LSPA => {
            let exclude_any = body.read_u32()?;
            let include_any = body.read_u32()?;
            let include_all = body.read_u32()?;
            let setup_priority = body.read_u8()?;
            let holding_priority = body.read_u8()?;
            let flags = body.read_u8()?;
            body.skip(1)?;
            ObjectBody::Lspa(LspaObject {
                exclude_any,
                include_any,
                include_all,
                setup_priority,
                holding_priority,
                flag_local_protection: (flags & 0x01) != 0,
            })
        }
        OBJECT_CLASS_SVEC => {
            body.skip(3)?;
            let flags = body.read_u8()?;
            let mut request_ids = Vec::new();
            while body.remaining() >= 4 {
                request_ids.push(body.read_u32()?);
            }
            ObjectBody::Svec(SvecObject {
                flag_link_diverse: (flags & 0x01) != 0,
                flag_node_diverse: (flags & 0x02) != 0,
                flag_srlg_diverse: (flags & 0x04) != 0,
                request_ids,
            })
        }
        OBJECT_CLASS_NOTIFY => {
            body.skip(2)?;
            ObjectBody::Notify(NotifyObject {
                notification_type: body.read_u8()?,
                notification_value: body.read_u8()?,
            })
        }
        OBJECT_CLASS_ERROR => {
            body.skip(2)?;
            ObjectBody::Error(ErrorObject {
                error_type: body.read_u8()?,
                error_value: body.read_u8()?,
            })
        }
        OBJECT_CLASS_LOAD_BALANCING => {
            body.skip(3)?;
            ObjectBody::LoadBalancing(LoadBalancingObject {
                max_lsp: body.read_u8()?,
                min_bandwidth: body.read_f32()?,
            })
        }
        OBJECT_CLASS_CLOSE => {
            body.skip(3)?;
            ObjectBody::Close(CloseObject {
                reason: body.read_u8()?,
            })
        }
        OBJECT_CLASS_LSP => {
            let word = body.read_u32()?;
            ObjectBody::Lsp(LspObject {
                plsp_id: word >> 12,
                operational_status: ((word >> 4) & 0x07) as u8,
                flag_d: (word & 0x001) != 0,
                flag_s: (word & 0x002) != 0,
                flag_r: (word & 0x004) != 0,
                flag_a: (word & 0x008) != 0,
                flag_c: (word & 0x080) != 0,
            })
        }
        OBJECT_CLASS_SRP => {
            let flags = body.read_u32()?;
            ObjectBody::Srp(SrpObject {
                flag_remove: (flags & 0x01) != 0,
                srp_id: body.read_u32()?,
            })
        }
        OBJECT_CLASS_ASSOCIATION => {
            body.skip(2)?;
            let flags = body.read_u16()?;
            let association_type = body.read_u16()?;
            let association_id = body.read_u16()?;
            match object_type {
                1 => ObjectBody::AssociationIpv4(AssociationIpv4Object {
                    flag_removal: (flags & 0x01) != 0,
                    association_type,
                    association_id,
                    src: read_ipv4(&mut body)?,
                }),
                2 => ObjectBody::AssociationIpv6(AssociationIpv6Object {
                    flag_removal: (flags & 0x01) != 0,
                    association_type,
                    association_id,
                    src: read_ipv6(&mut body)?,
                }),
                _ => {
                    return Err(DecodeError::UnknownObjectType {
                        class,
                        object_type,
                    })
                }
            }
        }
        _ => return Err(DecodeError::UnknownObjectClass(class)),
    };

    let tlvs = match is_route_class(class) {
        true => Vec::new(),
        false => tlv::parse_tlvs(&mut body)?,
    };

    Ok(Object {
        flag_p,
        flag_i,
        body: parsed,
        tlvs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::subobj::SrNai;
    use crate::message::subobj::SrSubobject;

    fn round_trip(object: Object) {
        let mut data = Vec::new();
        push_object(&mut data, &object);
        assert_eq!(data.len() % 4, 0);
        let declared = u16::from_be_bytes([data[2], data[3]]) as usize;
        assert_eq!(declared, data.len());

        let mut cursor = ByteCursor::new(&data);
        let decoded = parse_object(&mut cursor).unwrap();
        assert!(cursor.is_empty());
        assert_eq!(decoded, object);
    }

    #[test]
    pub fn test_open_round_trip() {
        crate::tests::init();
        round_trip(Object::with_tlvs(
            ObjectBody::Open(OpenObject {
                version: 1,
                keepalive: 30,
                dead_timer: 120,
                sid: 0,
            }),
            vec![Tlv::StatefulPceCapability { flags: 0x01 }],
        ));
    }

    #[test]
    pub fn test_rp_round_trip() {
        crate::tests::init();
        let mut object = Object::new(ObjectBody::Rp(RpObject {
            priority: 3,
            flag_reoptimization: false,
            flag_bidirectional: true,
            flag_loose_path: true,
            request_id: 7,
        }));
        object.flag_p = true;
        round_trip(object);
    }

    #[test]
    pub fn test_endpoints_round_trip() {
        crate::tests::init();
        round_trip(Object::new(ObjectBody::EndpointsIpv4(EndpointsIpv4Object {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
        })));
        round_trip(Object::new(ObjectBody::EndpointsIpv6(EndpointsIpv6Object {
            src: Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
            dst: Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2),
        })));
    }

    #[test]
    pub fn test_ero_round_trip() {
        crate::tests::init();
        round_trip(Object::new(ObjectBody::Ero(RouteObject {
            subobjects: vec![
                RouteSubobject::Ipv4 {
                    loose: true,
                    addr: Ipv4Addr::new(10, 0, 0, 5),
                    prefix_length: 32,
                    flag_local_protection: false,
                },
                RouteSubobject::Sr(SrSubobject {
                    loose: false,
                    flag_m: true,
                    flag_c: false,
                    flag_s: false,
                    flag_f: false,
                    sid: Some(0x003E8140),
                    nai: SrNai::Ipv4Node(Ipv4Addr::new(192, 0, 2, 1)),
                }),
                RouteSubobject::Asn {
                    loose: false,
                    asn: 64512,
                },
            ],
        })));
    }

    #[test]
    pub fn test_misc_objects_round_trip() {
        crate::tests::init();
        round_trip(Object::new(ObjectBody::Bandwidth(BandwidthObject {
            bandwidth: 125000.0,
        })));
        round_trip(Object::new(ObjectBody::Metric(MetricObject {
            metric_type: METRIC_TYPE_TE,
            flag_b: true,
            flag_c: false,
            value: 42.5,
        })));
        round_trip(Object::with_tlvs(
            ObjectBody::NoPath(NoPathObject {
                nature_of_issue: NOPATH_NI_NO_PATH_FOUND,
                flag_constraints: true,
            }),
            vec![Tlv::NoPathVector { flags: 0x02 }],
        ));
        round_trip(Object::new(ObjectBody::Lspa(LspaObject {
            exclude_any: 1,
            include_any: 2,
            include_all: 3,
            setup_priority: 4,
            holding_priority: 5,
            flag_local_protection: true,
        })));
        round_trip(Object::new(ObjectBody::Svec(SvecObject {
            flag_link_diverse: true,
            flag_node_diverse: false,
            flag_srlg_diverse: true,
            request_ids: vec![1, 2, 3],
        })));
        round_trip(Object::new(ObjectBody::Notify(NotifyObject {
            notification_type: NOTIFY_TYPE_PCE_OVERLOADED,
            notification_value: NOTIFY_VALUE_PCE_CURRENTLY_OVERLOADED,
        })));
        round_trip(Object::new(ObjectBody::Error(ErrorObject {
            error_type: ERROR_TYPE_UNKNOWN_OBJECT,
            error_value: ERROR_VALUE_UNREC_OBJECT_CLASS,
        })));
        round_trip(Object::new(ObjectBody::LoadBalancing(LoadBalancingObject {
            max_lsp: 4,
            min_bandwidth: 1000.0,
        })));
        round_trip(Object::new(ObjectBody::Close(CloseObject {
            reason: CLOSE_REASON_DEADTIMER,
        })));
    }

    #[test]
    pub fn test_stateful_objects_round_trip() {
        crate::tests::init();
        round_trip(Object::with_tlvs(
            ObjectBody::Lsp(LspObject {
                plsp_id: 0xabcde,
                operational_status: LSP_OPERATIONAL_ACTIVE,
                flag_d: true,
                flag_s: false,
                flag_r: false,
                flag_a: true,
                flag_c: true,
            }),
            vec![Tlv::SymbolicPathName(b"lsp-1".to_vec())],
        ));
        round_trip(Object::new(ObjectBody::Srp(SrpObject {
            flag_remove: true,
            srp_id: 99,
        })));
        round_trip(Object::new(ObjectBody::AssociationIpv4(
            AssociationIpv4Object {
                flag_removal: false,
                association_type: 1,
                association_id: 17,
                src: Ipv4Addr::new(10, 1, 1, 1),
            },
        )));
        round_trip(Object::new(ObjectBody::AssociationIpv6(
            AssociationIpv6Object {
                flag_removal: true,
                association_type: 1,
                association_id: 18,
                src: Ipv6Addr::LOCALHOST,
            },
        )));
    }

    #[test]
    pub fn test_unknown_class_rejected() {
        crate::tests::init();
        let data = [99u8, 0x10, 0, 8, 0, 0, 0, 0];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            parse_object(&mut cursor),
            Err(DecodeError::UnknownObjectClass(99))
        ));
    }

    #[test]
    pub fn test_bad_object_length_rejected() {
        crate::tests::init();
        let data = [1u8, 0x10, 0, 64, 0, 0];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            parse_object(&mut cursor),
            Err(DecodeError::BadObjectLength { class: 1, length: 64 })
        ));
    }
}
