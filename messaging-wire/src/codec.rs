//! Frame layout (§4.A): `[kindTag:1][headerLen:2][headerJSON:headerLen][content:remainder]`,
//! all integers big-endian. This is the only place in the workspace that
//! understands the byte layout; everyone else speaks [`crate::packet::Packet`].

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::packet::{LogHeader, NoticeHeader, Packet, RequestHeader, ResponseHeader};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
pub enum KindTag {
    Request = 0x01,
    Response = 0x02,
    Notice = 0x03,
    Log = 0x04,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame too short to contain a header ({0} bytes)")]
    ShortFrame(usize),
    #[error("truncated header: frame needs {expected} bytes, has {found}")]
    TruncatedHeader { expected: usize, found: usize },
    #[error("malformed header JSON: {0}")]
    BadHeaderJson(#[from] serde_json::Error),
    #[error("unknown packet kind tag {0:#04x}")]
    UnknownKind(u8),
    #[error("log content is not valid UTF-8: {0}")]
    BadLogContent(#[from] std::string::FromUtf8Error),
    #[error("encoded header would be {0} bytes, exceeding the 16-bit length limit")]
    HeaderTooLarge(usize),
}

/// Encodes a packet to its on-wire frame.
///
/// Fails only if the header JSON would overflow the 16-bit length field
/// (§4.A).
pub fn encode(packet: &Packet) -> Result<Bytes, CodecError> {
    let (tag, header_json, content): (KindTag, Vec<u8>, &[u8]) = match packet {
        Packet::Request { header, content } => {
            (KindTag::Request, serde_json::to_vec(header)?, content.as_ref())
        }
        Packet::Response { header, content } => {
            (KindTag::Response, serde_json::to_vec(header)?, content.as_ref())
        }
        Packet::Notice { header, content } => {
            (KindTag::Notice, serde_json::to_vec(header)?, content.as_ref())
        }
        Packet::Log { header, content } => {
            (KindTag::Log, serde_json::to_vec(header)?, content.as_bytes())
        }
    };

    if header_json.len() > u16::MAX as usize {
        return Err(CodecError::HeaderTooLarge(header_json.len()));
    }

    let mut buf = BytesMut::with_capacity(3 + header_json.len() + content.len());
    buf.put_u8(tag.into());
    buf.put_u16(header_json.len() as u16);
    buf.put_slice(&header_json);
    buf.put_slice(content);
    Ok(buf.freeze())
}

/// Decodes a frame back into a packet.
///
/// See [`CodecError`] for the ways this can fail; every failure leaves the
/// caller able to log-and-drop the offending bytes (§4.D.6).
pub fn decode(bytes: &[u8]) -> Result<Packet, CodecError> {
    if bytes.len() < 3 {
        return Err(CodecError::ShortFrame(bytes.len()));
    }

    let tag = KindTag::try_from(bytes[0]).map_err(|_| CodecError::UnknownKind(bytes[0]))?;
    let header_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    let needed = 3 + header_len;

    if bytes.len() < needed {
        return Err(CodecError::TruncatedHeader {
            expected: needed,
            found: bytes.len(),
        });
    }

    let header_json = &bytes[3..needed];
    let content = &bytes[needed..];

    Ok(match tag {
        KindTag::Request => Packet::Request {
            header: serde_json::from_slice::<RequestHeader>(header_json)?,
            content: Bytes::copy_from_slice(content),
        },
        KindTag::Response => Packet::Response {
            header: serde_json::from_slice::<ResponseHeader>(header_json)?,
            content: Bytes::copy_from_slice(content),
        },
        KindTag::Notice => Packet::Notice {
            header: serde_json::from_slice::<NoticeHeader>(header_json)?,
            content: Bytes::copy_from_slice(content),
        },
        KindTag::Log => Packet::Log {
            header: serde_json::from_slice::<LogHeader>(header_json)?,
            content: String::from_utf8(content.to_vec())?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{now_iso8601_millis, LogLevel, RespCode};

    fn sample_request() -> Packet {
        Packet::Request {
            header: RequestHeader {
                id: 42,
                from: "ModuleA".into(),
                to: "ModuleB".into(),
                route: "Ping".into(),
                req_time: now_iso8601_millis(),
            },
            content: Bytes::from_static(b"hello \xff\xfe bytes"),
        }
    }

    #[test]
    fn round_trips_a_request() {
        let pkt = sample_request();
        let bytes = encode(&pkt).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(pkt, decoded);
    }

    #[test]
    fn round_trips_content_byte_for_byte() {
        let pkt = Packet::Notice {
            header: NoticeHeader {
                id: 1,
                from: "A".into(),
                route: "state".into(),
                retain: true,
            },
            content: Bytes::from_static(b"\x00\x01\x02 not utf8 safe \xfa"),
        };
        let bytes = encode(&pkt).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(pkt, decoded);
    }

    #[test]
    fn round_trips_a_log_packet() {
        let pkt = Packet::Log {
            header: LogHeader {
                id: 7,
                from: "A".into(),
                level: LogLevel::Warning,
                log_time: now_iso8601_millis(),
            },
            content: "disk nearly full".into(),
        };
        let bytes = encode(&pkt).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(pkt, decoded);
    }

    #[test]
    fn rejects_short_frames() {
        assert!(matches!(decode(&[0x01, 0x00]), Err(CodecError::ShortFrame(2))));
    }

    #[test]
    fn rejects_truncated_headers() {
        let bytes = [0x01u8, 0x00, 0x10, b'{', b'}']; // claims 16 bytes of header, has 2
        assert!(matches!(
            decode(&bytes),
            Err(CodecError::TruncatedHeader { expected: 19, found: 5 })
        ));
    }

    #[test]
    fn rejects_unknown_kind_tag() {
        let bytes = [0xffu8, 0x00, 0x00];
        assert!(matches!(decode(&bytes), Err(CodecError::UnknownKind(0xff))));
    }

    #[test]
    fn rejects_bad_header_json() {
        let bytes = [0x01u8, 0x00, 0x02, b'{', b'x'];
        assert!(matches!(decode(&bytes), Err(CodecError::BadHeaderJson(_))));
    }

    #[test]
    fn respcode_is_numeric_and_wire_stable() {
        assert_eq!(u16::from(RespCode::Success), 200);
        assert_eq!(u16::from(RespCode::UnLinked), 0);
        assert_eq!(u16::from(RespCode::Bypass), 100);
        assert_eq!(u16::from(RespCode::Timeout), 408);
    }
}
