// derive macros shared by all DNS wire structures
use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod dns_struct;
use dns_struct::dns_struct;

mod dns_enum;
use dns_enum::dns_enum;

#[proc_macro_derive(DnsStruct)]
pub fn dns_struct_macro(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree
    let ast = parse_macro_input!(input as DeriveInput);

    // inject code
    dns_struct(&ast)
}

#[proc_macro_derive(DnsEnum)]
pub fn dns_enum_macro(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree
    let ast = parse_macro_input!(input as DeriveInput);

    // inject code
    dns_enum(&ast)
}

#[cfg(test)]
pub(crate) fn get_derive_input(code: &str) -> DeriveInput {
    syn::parse_str::<DeriveInput>(code).unwrap()
}
