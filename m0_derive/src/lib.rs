extern crate proc_macro;

use itertools::Itertools;
use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

fn parse_index_field(data: syn::Data) -> syn::Field {
    let syn::Data::Struct(syn::DataStruct { fields, .. }) = data else {
        panic!("IndexNewType only supports structs")
    };

    let fields = match fields {
        syn::Fields::Unnamed(syn::FieldsUnnamed { unnamed, .. }) => unnamed,
        syn::Fields::Named(syn::FieldsNamed { named, .. }) => named,
        syn::Fields::Unit => panic!("IndexNewType needs exactly one field"),
    };

    fields
        .into_iter()
        .exactly_one()
        .unwrap_or_else(|_| panic!("IndexNewType needs exactly one field"))
}

fn field_type_name(ty: &syn::Type) -> String {
    let syn::Type::Path(syn::TypePath { path, .. }) = ty else {
        panic!("Field must be a plain integer type")
    };

    path.segments
        .iter()
        .exactly_one()
        .unwrap_or_else(|_| panic!("Field must be a plain integer type"))
        .ident
        .to_string()
}

fn default_display_format(field_type: &str) -> &'static str {
    match field_type {
        "u8" => r"{:02X}",
        "u16" | "u32" | "usize" => r"{:04X}",
        _ => panic!("Type {field_type} not handled"),
    }
}

/// The `#[display("...")]` attribute, if present, must hold a format string with one `{}`.
fn display_attribute(attrs: &[syn::Attribute]) -> Option<String> {
    attrs
        .iter()
        .filter(|attr| attr.path.is_ident("display"))
        .at_most_one()
        .unwrap_or_else(|_| panic!("At most one display attribute is allowed"))
        .map(|attr| {
            attr.parse_args::<syn::LitStr>()
                .unwrap_or_else(|err| panic!("Bad display attribute: {err}"))
                .value()
        })
}

/// Implements `Debug`, `Display` and `index()` for a single-field integer newtype.
#[proc_macro_derive(IndexNewType, attributes(display))]
pub fn derive_index_newtype(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident: struct_name_ident,
        attrs,
        data,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let field = parse_index_field(data);

    let field_access = field
        .ident
        .as_ref()
        .map_or_else(|| quote::quote!(self.0), |name| quote::quote!(self.#name));

    let display_format = display_attribute(&attrs)
        .unwrap_or_else(|| default_display_format(&field_type_name(&field.ty)).to_string());

    let debug_format = format!("{struct_name_ident}({{}})");

    quote::quote!(
        impl #struct_name_ident {
            pub const fn index(self) -> usize {
                #field_access as usize
            }
        }

        impl core::fmt::Debug for #struct_name_ident {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, #debug_format, self)
            }
        }

        impl core::fmt::Display for #struct_name_ident {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, #display_format, #field_access)
            }
        }
    )
    .into()
}
