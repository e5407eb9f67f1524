use std::sync::Arc;

use tmls_codegen::DocumentGenerator;
use tmls_codegen::GeneratedDocument;
use tmls_codegen::GeneratedOutput;
use tmls_codegen::GenerationContext;
use tmls_codegen::LanguageKind;
use tmls_codegen::SourceMapping;
use tmls_project::DocumentKey;
use tmls_project::HostDocument;
use tmls_project::HostProject;
use tmls_project::ProjectConfiguration;
use tmls_project::SnapshotStore;
use tmls_source::InMemoryTextLoader;
use tmls_source::SourceText;
use tmls_source::Span;

pub const HOST_TEXT: &str = "0123456789ABCDEFGHIJ0123456789";

/// One code span: host `[10, 20)` to generated `[0, 10)`. The generated
/// text has a second, unmapped line.
#[derive(Debug)]
pub struct SingleSpanGenerator;

impl DocumentGenerator for SingleSpanGenerator {
    fn generate(&self, text: &SourceText, _context: &GenerationContext<'_>) -> GeneratedDocument {
        GeneratedDocument::new(text.length()).with_output(GeneratedOutput::new(
            LanguageKind::Code,
            "ABCDEFGHIJ\n// trailer\n",
            vec![SourceMapping::new(Span::new(10, 10), Span::new(0, 10))],
        ))
    }
}

pub fn store_with_document(
    generator: Arc<dyn DocumentGenerator>,
    text: &str,
) -> (Arc<SnapshotStore>, DocumentKey) {
    let store = Arc::new(SnapshotStore::new(generator));
    let project = HostProject::new("/P", ProjectConfiguration::default());
    store.add_project(&project).unwrap();
    let document = store
        .add_document(
            &project,
            &HostDocument::new("/P/a.tmpl"),
            InMemoryTextLoader::shared(text),
        )
        .unwrap();
    (store, document.key().clone())
}
