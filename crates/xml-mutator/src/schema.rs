//! The seam where a real `saml-schema-protocol-2.0.xsd` validator would plug in. Shipping one
//! is out of scope; the trait exists so the analyzer has something concrete to call.

use crate::xml::Document;

pub trait SchemaValidator: Send + Sync {
    fn is_valid(&self, document: &Document) -> bool;
}

/// Reports every document invalid. Keeps `saml_valid` at zero until a real validator is wired
/// in, rather than letting it silently read as "always passes".
pub struct NullSchemaValidator;

impl SchemaValidator for NullSchemaValidator {
    fn is_valid(&self, _document: &Document) -> bool {
        false
    }
}
