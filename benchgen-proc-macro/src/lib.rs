//! `#[derive(Parametrize)]`: build a composite experiment name out of the fields of a struct.
//!
//! Every field annotated with `#[name]` contributes its `to_string()` to the name, in declaration
//! order. `#[name(<expr>)]` only contributes the field if `<expr>` evaluates to `true`; `self` is
//! in scope in the expression.

extern crate proc_macro;

use proc_macro::TokenStream;

use quote::quote;

use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields};

#[proc_macro_derive(Parametrize, attributes(name))]
pub fn derive_parametrize(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let ident = &ast.ident;

    let fields = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(ident, "Parametrize requires named fields")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(ident, "Parametrize can only be derived for structs")
                .to_compile_error()
                .into()
        }
    };

    let mut pushes = Vec::new();

    for field in fields.iter() {
        let field_name = match &field.ident {
            Some(field_name) => field_name,
            None => continue,
        };

        for attr in field.attrs.iter().filter(|attr| attr.path.is_ident("name")) {
            if attr.tokens.is_empty() {
                pushes.push(quote! {
                    parts.push(self.#field_name.to_string());
                });
            } else {
                let cond: Expr = match attr.parse_args() {
                    Ok(cond) => cond,
                    Err(err) => return err.to_compile_error().into(),
                };
                pushes.push(quote! {
                    if #cond {
                        parts.push(self.#field_name.to_string());
                    }
                });
            }
        }
    }

    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics crate::output::Parametrize for #ident #ty_generics #where_clause {
            fn name_parts(&self) -> Vec<String> {
                let mut parts = Vec::new();
                #(#pushes)*
                parts
            }
        }
    };

    expanded.into()
}
