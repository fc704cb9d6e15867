use proc_macro::TokenStream;
use quote::quote;
use syn::{DeriveInput, parse_macro_input};

pub fn derive_component(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let struct_name = &ast.ident;

    let mut page_size = None;
    let mut in_place_delete = false;

    for attr in ast.attrs.iter().filter(|a| a.path().is_ident("component")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("page_size") {
                let value = meta.value()?;
                let lit: syn::LitInt = value.parse()?;
                page_size = Some(lit);
                Ok(())
            } else if meta.path.is_ident("in_place_delete") {
                in_place_delete = true;
                Ok(())
            } else {
                Err(meta.error("unrecognized component attribute"))
            }
        });
        if let Err(err) = result {
            return err.to_compile_error().into();
        }
    }

    let page_size_item = page_size.map(|lit| {
        quote! { const PAGE_SIZE: usize = #lit; }
    });
    let in_place_delete_item = in_place_delete.then(|| {
        quote! { const IN_PLACE_DELETE: bool = true; }
    });

    TokenStream::from(quote! {
        impl ::rusty_storage::Component for #struct_name {
            #page_size_item
            #in_place_delete_item
        }
    })
}
