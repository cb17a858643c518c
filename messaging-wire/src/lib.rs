//! Wire framing, packet types and topic grammar shared by every engine and
//! by the core adapter. See `SPEC_FULL.md` §4.A/§4.B for the contract this
//! crate implements.

pub mod codec;
pub mod ids;
pub mod packet;
pub mod topic;

pub use codec::{decode, encode, CodecError, KindTag};
pub use ids::{IdGenerator, IdGenerators};
pub use packet::{
    now_iso8601_millis, LogHeader, LogLevel, ModuleId, NoticeHeader, Packet, RequestHeader,
    RespCode, ResponseHeader,
};
