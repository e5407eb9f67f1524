//! Generated documents and the seam to the template compiler.
//!
//! A template mixes template syntax, markup, and an embedded code language.
//! A [`DocumentGenerator`] turns the host text into a [`GeneratedDocument`]:
//! one [`GeneratedOutput`] per embedded language, each carrying the source
//! mappings that relate host spans to generated spans.
//!
//! [`TemplateGenerator`] is the built-in generator for the `{{ }}` / `{% %}` /
//! `{# #}` block syntax.

mod document;
mod generator;
mod kind;
mod lexer;

pub use document::GeneratedDocument;
pub use document::GeneratedOutput;
pub use document::GenerationDiagnostic;
pub use document::SourceMapping;
pub use document::TemplateBlock;
pub use generator::DocumentGenerator;
pub use generator::GenerationContext;
pub use generator::TemplateGenerator;
pub use kind::BlockKind;
pub use kind::LanguageKind;
