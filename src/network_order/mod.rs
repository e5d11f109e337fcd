//! All functions/traits to convert DNS structures to network order back & forth
use crate::context::{DecodeCtx, EncodeCtx};
use crate::error::DNSResult;

// copy structure data to the network-order buffer held by the context
pub trait ToNetworkOrder {
    fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize>;
}

// fill the structure from the network-order buffer held by the context
pub trait FromNetworkOrder {
    fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()>;
}

pub mod message;
pub mod name;
pub mod primitive;
pub mod record;
