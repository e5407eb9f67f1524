use tmls_source::Span;

use crate::BlockKind;
use crate::GenerationDiagnostic;
use crate::TemplateBlock;

const BLOCK_KINDS: [BlockKind; 3] = [
    BlockKind::Expression,
    BlockKind::Statement,
    BlockKind::Comment,
];

/// Splits host text into template blocks.
///
/// Everything outside a block is markup. An opener without a matching closer
/// is reported and then scanned as plain text.
pub(crate) struct Lexer<'a> {
    source: &'a str,
    current: usize,
    blocks: Vec<TemplateBlock>,
    diagnostics: Vec<GenerationDiagnostic>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            source,
            current: 0,
            blocks: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<TemplateBlock>, Vec<GenerationDiagnostic>) {
        while let Some((start, kind)) = self.next_opener() {
            let (open, close) = kind.delimiters();
            let content_start = start + open.len();

            match self.source[content_start..].find(close) {
                Some(relative_end) => {
                    let content_end = content_start + relative_end;
                    let block_end = content_end + close.len();
                    self.blocks.push(TemplateBlock {
                        kind,
                        span: Span::from_bounds(start, block_end),
                        content: Span::from_bounds(content_start, content_end),
                    });
                    self.current = block_end;
                }
                None => {
                    self.diagnostics.push(GenerationDiagnostic {
                        span: Span::from_bounds(start, content_start),
                        message: format!("unterminated '{open}' block, expected '{close}'"),
                    });
                    self.current = content_start;
                }
            }
        }

        (self.blocks, self.diagnostics)
    }

    fn next_opener(&self) -> Option<(usize, BlockKind)> {
        let rest = self.source.get(self.current..)?;
        let mut search_from = 0;

        while let Some(relative) = rest[search_from..].find('{') {
            let at = search_from + relative;
            let found = BLOCK_KINDS
                .into_iter()
                .find(|kind| rest[at..].starts_with(kind.delimiters().0));
            if let Some(kind) = found {
                return Some((self.current + at, kind));
            }
            search_from = at + 1;
        }

        None
    }
}
