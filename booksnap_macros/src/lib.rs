mod document;

use proc_macro::TokenStream;

/// Derive macro for the `Document` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Document)]
/// #[document(collection = "libraryEntries")]
/// struct LibraryEntry {
///     #[document(id)]
///     pub book_id: String,
///     pub progress: u8,
/// }
/// ```
///
/// - `#[document(collection = "...")]` sets the leaf collection name used when
///   building document paths. If omitted, defaults to the camelCase struct
///   name + "s".
/// - `#[document(id)]` marks the field used as the document identifier.
///   If omitted, defaults to a field named `id`.
/// - `#[document(validate = "path")]` names a `fn(&Self) -> Result<(), String>`
///   run on both read and write.
#[proc_macro_derive(Document, attributes(document))]
pub fn derive_document(input: TokenStream) -> TokenStream {
    document::derive_document(input)
}
