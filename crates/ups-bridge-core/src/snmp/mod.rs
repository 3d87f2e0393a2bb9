//! SNMPv1/v2c responder: the fixed OID catalog, request decoding and value
//! projection/response encoding.

pub mod message;
pub mod oid;
pub mod responder;
