mod component;

use proc_macro::TokenStream;

/// Derives `rusty_storage::Component` for a struct, using the trait's default
/// `PAGE_SIZE` / `IN_PLACE_DELETE` associated constants.
///
/// Use `#[component(page_size = N)]` and/or `#[component(in_place_delete)]` to
/// override either default.
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component(item: TokenStream) -> TokenStream {
    component::derive_component(item)
}
