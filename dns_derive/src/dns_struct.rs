// implement the wire-codec traits for a struct by sequencing its fields.
// Only plain structs with named fields qualify: each field must itself
// implement ToNetworkOrder/FromNetworkOrder, and the wire layout must be the
// simple concatenation of the fields in declaration order. Anything with
// length back-patching or type-driven dispatch is implemented by hand.
use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DataStruct, DeriveInput, Fields};

// verify the derive macro is applied to a struct with named fields
fn get_struct(ast: &DeriveInput) -> &DataStruct {
    if let Data::Struct(struct_token) = &ast.data {
        if !matches!(struct_token.fields, Fields::Named(_)) {
            panic!("<{}> has no named fields!", ast.ident);
        }
        struct_token
    } else {
        panic!("<{}> is not a struct!", ast.ident);
    }
}

// create the impls for the ToNetworkOrder & FromNetworkOrder traits
pub fn dns_struct(ast: &DeriveInput) -> TokenStream {
    // get struct data or panic
    let struct_token = get_struct(ast);

    // save structure name because we're gonna use it soon
    let structure_name = &ast.ident;

    // to_network_bytes() call for each field
    let to_method_calls = struct_token.fields.iter().map(|f| {
        let field_name = f.ident.as_ref().unwrap();

        quote! {
            length += ToNetworkOrder::to_network_bytes(&self.#field_name, ctx)?;
        }
    });

    // from_network_bytes() call for each field
    let from_method_calls = struct_token.fields.iter().map(|f| {
        let field_name = f.ident.as_ref().unwrap();

        quote! {
            FromNetworkOrder::from_network_bytes(&mut self.#field_name, ctx)?;
        }
    });

    let new_code = quote! {
        // the generated impls.
        impl ToNetworkOrder for #structure_name {
            fn to_network_bytes(&self, ctx: &mut EncodeCtx) -> DNSResult<usize> {
                let mut length = 0usize;
                #( #to_method_calls)*
                Ok(length)
            }
        }

        impl FromNetworkOrder for #structure_name {
            fn from_network_bytes(&mut self, ctx: &mut DecodeCtx<'_>) -> DNSResult<()> {
                #( #from_method_calls)*
                Ok(())
            }
        }
    };

    // Hand the output tokens back to the compiler
    TokenStream::from(new_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::get_derive_input;

    const E1: &str = "enum Foo { A = 1, B = 2 }";
    const S1: &str = "struct Point(u16, u16);";
    const S2: &str = "struct Point { x: u16, y: u16 }";

    #[test]
    #[should_panic]
    fn not_a_struct() {
        let input = get_derive_input(E1);
        let _ = get_struct(&input);
    }

    #[test]
    #[should_panic]
    fn not_named_fields() {
        let input = get_derive_input(S1);
        let _ = get_struct(&input);
    }

    #[test]
    fn named_fields() {
        let input = get_derive_input(S2);
        let s = get_struct(&input);
        assert_eq!(s.fields.iter().count(), 2);
    }
}
