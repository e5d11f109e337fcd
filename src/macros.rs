// auto-implement the wire-codec traits for enums carrying 16-bit codes
#[macro_export]
macro_rules! derive_enum {
    ($t:ty, u16) => {
        impl ToNetworkOrder for $t {
            fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
                ctx.pack_u16(*self as u16)
            }
        }

        impl FromNetworkOrder for $t {
            fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
                let value = ctx.unpack_u16()?;
                *self = <$t>::try_from(value)?;
                Ok(())
            }
        }
    };
}

// useful helpers for tests
#[macro_export]
macro_rules! test_from_network {
    ($slice:ident, $t:ty) => {{
        let s = $crate::util::get_sample_slice($slice);
        let mut ctx = $crate::context::DecodeCtx::new(s.as_slice());
        let mut v = <$t>::default();
        assert!(v.from_network_bytes(&mut ctx).is_ok());
        v
    }};
}

#[macro_export]
macro_rules! test_to_network {
    ($data:ident) => {{
        let mut ctx = $crate::context::EncodeCtx::new();
        let bytes_written = $data.to_network_bytes(&mut ctx).unwrap();

        (ctx.into_bytes(), bytes_written)
    }};
}
