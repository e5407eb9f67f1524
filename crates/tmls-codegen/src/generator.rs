use std::fmt;
use std::fmt::Write as _;

use camino::Utf8Path;
use tmls_source::SourceText;
use tmls_source::Span;

use crate::lexer::Lexer;
use crate::BlockKind;
use crate::GeneratedDocument;
use crate::GeneratedOutput;
use crate::LanguageKind;
use crate::SourceMapping;
use crate::TemplateBlock;

/// Project-level inputs to generation.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub target_path: &'a Utf8Path,
    pub language_version: &'a str,
    pub root_namespace: Option<&'a str>,
}

/// The compiler seam: turns host text into generated documents.
///
/// Implementations must be deterministic. The same text and context always
/// produce an equal [`GeneratedDocument`], which is what makes racing
/// first computations on a snapshot harmless.
pub trait DocumentGenerator: Send + Sync + fmt::Debug {
    fn generate(&self, text: &SourceText, context: &GenerationContext<'_>) -> GeneratedDocument;
}

/// Generator for the `{{ }}` / `{% %}` / `{# #}` template syntax.
///
/// - Expression and statement contents become the code output, one line per
///   block. Expressions are wrapped in a `write(...)` call.
/// - The markup output is the host text with every block blanked out, so
///   markup offsets and lines are identical in both documents.
/// - Comments belong to neither embedded language.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    fn code_output(
        source: &str,
        blocks: &[TemplateBlock],
        context: &GenerationContext<'_>,
    ) -> GeneratedOutput {
        let mut text = String::new();
        let mut mappings = Vec::new();

        let _ = writeln!(
            text,
            "// {} (language {})",
            context.target_path, context.language_version
        );
        if let Some(namespace) = context.root_namespace {
            let _ = writeln!(text, "namespace {namespace};");
        }

        for block in blocks {
            let (prefix, suffix) = match block.kind {
                BlockKind::Expression => ("write(", ");\n"),
                BlockKind::Statement => ("", "\n"),
                BlockKind::Comment => continue,
            };
            let Some(content) = source.get(block.content.as_range()) else {
                continue;
            };

            text.push_str(prefix);
            if !content.is_empty() {
                mappings.push(SourceMapping::new(
                    block.content,
                    Span::from_parts(text.len(), content.len()),
                ));
            }
            text.push_str(content);
            text.push_str(suffix);
        }

        GeneratedOutput::new(LanguageKind::Code, text, mappings)
    }

    fn markup_output(source: &str, blocks: &[TemplateBlock]) -> GeneratedOutput {
        let mut text = String::with_capacity(source.len());
        let mut mappings = Vec::new();
        let mut cursor = 0;

        for block in blocks {
            let start = block.span.start() as usize;
            let end = block.span.end() as usize;

            if start > cursor {
                let run = Span::from_bounds(cursor, start);
                mappings.push(SourceMapping::new(run, run));
                text.push_str(&source[cursor..start]);
            }
            for c in source[start..end].chars() {
                match c {
                    '\n' | '\r' => text.push(c),
                    _ => text.extend(std::iter::repeat_n(' ', c.len_utf8())),
                }
            }
            cursor = end;
        }

        if cursor < source.len() {
            let run = Span::from_bounds(cursor, source.len());
            mappings.push(SourceMapping::new(run, run));
            text.push_str(&source[cursor..]);
        }

        GeneratedOutput::new(LanguageKind::Markup, text, mappings)
    }
}

impl DocumentGenerator for TemplateGenerator {
    fn generate(&self, text: &SourceText, context: &GenerationContext<'_>) -> GeneratedDocument {
        let source = text.as_str();
        let (blocks, diagnostics) = Lexer::new(source).tokenize();

        tracing::trace!(
            path = %context.target_path,
            blocks = blocks.len(),
            diagnostics = diagnostics.len(),
            "generated document"
        );

        let code = Self::code_output(source, &blocks, context);
        let markup = Self::markup_output(source, &blocks);

        GeneratedDocument::new(text.length())
            .with_output(code)
            .with_output(markup)
            .with_blocks(blocks)
            .with_diagnostics(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use tmls_source::Offset;

    use super::*;

    fn generate(source: &str) -> GeneratedDocument {
        let context = GenerationContext {
            target_path: Utf8Path::new("page.tmpl"),
            language_version: "latest",
            root_namespace: None,
        };
        TemplateGenerator.generate(&SourceText::new(source), &context)
    }

    const HEADER: &str = "// page.tmpl (language latest)\n";

    #[test]
    fn test_code_output_wraps_expressions() {
        let document = generate("<p>{{ user.name }}</p>");
        let code = document.output(LanguageKind::Code).unwrap();

        assert_eq!(code.text().as_str(), format!("{HEADER}write( user.name );\n"));
        assert_eq!(code.mappings().len(), 1);
        assert_eq!(code.mappings()[0].host, Span::from_bounds(5, 16));
        assert_eq!(
            code.mappings()[0].generated.start() as usize,
            HEADER.len() + "write(".len()
        );
    }

    #[test]
    fn test_markup_output_blanks_blocks() {
        let document = generate("<p>{{ x }}</p>\n{% if y %}\n<b>");
        let markup = document.output(LanguageKind::Markup).unwrap();

        assert_eq!(markup.text().as_str(), "<p>       </p>\n          \n<b>");
        assert_eq!(markup.text().length(), document.host_length());
    }

    #[test]
    fn test_classify_regions() {
        let source = "<p>{{ name }}</p>{# c #}";
        let document = generate(source);

        assert_eq!(document.classify(Offset::new(1)).0, LanguageKind::Markup);
        assert_eq!(document.classify(Offset::new(3)).0, LanguageKind::Template);
        assert_eq!(document.classify(Offset::new(7)).0, LanguageKind::Code);
        assert_eq!(document.classify(Offset::new(11)).0, LanguageKind::Template);
        assert_eq!(document.classify(Offset::new(14)).0, LanguageKind::Markup);
        assert_eq!(document.classify(Offset::new(20)).0, LanguageKind::Template);
    }

    #[test]
    fn test_code_offsets_round_trip() {
        let source = "a{{ left }}b{% for x in xs %}c";
        let document = generate(source);

        for block in document.blocks() {
            for host in block.content.start()..block.content.end() {
                let host = Offset::new(host);
                let (kind, generated) = document.classify(host);
                assert_eq!(kind, LanguageKind::Code);
                assert_eq!(document.map_to_host_offset(kind, generated), Some(host));
            }
        }
    }

    #[test]
    fn test_root_namespace_line() {
        let context = GenerationContext {
            target_path: Utf8Path::new("page.tmpl"),
            language_version: "2",
            root_namespace: Some("Site"),
        };
        let document = TemplateGenerator.generate(&SourceText::new("{% x %}"), &context);
        let code = document.output(LanguageKind::Code).unwrap();

        assert_eq!(
            code.text().as_str(),
            "// page.tmpl (language 2)\nnamespace Site;\n x \n"
        );
    }

    #[test]
    fn test_deterministic() {
        let source = "{{ a }}{% b %}";
        assert_eq!(generate(source), generate(source));
    }
}
