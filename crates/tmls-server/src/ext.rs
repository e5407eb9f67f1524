use std::str::FromStr;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;
use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;
use tmls_ide::Range;
use tmls_source::LineCol;
use tmls_source::PositionEncoding;
use tower_lsp_server::ls_types;

/// Characters escaped when a file path becomes a `file://` URI.
const PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

pub(crate) trait PositionExt {
    fn to_line_col(&self) -> LineCol;
}

impl PositionExt for ls_types::Position {
    fn to_line_col(&self) -> LineCol {
        LineCol::new(self.line, self.character)
    }
}

pub(crate) trait LineColExt {
    fn to_lsp(&self) -> ls_types::Position;
}

impl LineColExt for LineCol {
    fn to_lsp(&self) -> ls_types::Position {
        ls_types::Position::new(self.line(), self.column())
    }
}

pub(crate) trait RangeExt {
    fn to_lsp(&self) -> ls_types::Range;
}

impl RangeExt for Range {
    fn to_lsp(&self) -> ls_types::Range {
        ls_types::Range::new(self.start.to_lsp(), self.end.to_lsp())
    }
}

pub(crate) trait LspRangeExt {
    fn to_range(&self) -> Range;
}

impl LspRangeExt for ls_types::Range {
    fn to_range(&self) -> Range {
        Range::new(self.start.to_line_col(), self.end.to_line_col())
    }
}

pub(crate) trait PositionEncodingExt {
    fn to_lsp(&self) -> ls_types::PositionEncodingKind;
}

impl PositionEncodingExt for PositionEncoding {
    fn to_lsp(&self) -> ls_types::PositionEncodingKind {
        match self {
            PositionEncoding::Utf8 => ls_types::PositionEncodingKind::new("utf-8"),
            PositionEncoding::Utf16 => ls_types::PositionEncodingKind::new("utf-16"),
            PositionEncoding::Utf32 => ls_types::PositionEncodingKind::new("utf-32"),
        }
    }
}

pub(crate) trait PositionEncodingKindExt {
    fn to_position_encoding(&self) -> Option<PositionEncoding>;
}

impl PositionEncodingKindExt for ls_types::PositionEncodingKind {
    fn to_position_encoding(&self) -> Option<PositionEncoding> {
        match self.as_str() {
            "utf-8" => Some(PositionEncoding::Utf8),
            "utf-16" => Some(PositionEncoding::Utf16),
            "utf-32" => Some(PositionEncoding::Utf32),
            _ => None,
        }
    }
}

/// Negotiate the best encoding with the client based on their capabilities.
/// Prefers UTF-8 > UTF-32 > UTF-16, since offsets are stored as UTF-8.
pub(crate) fn negotiate_position_encoding(params: &ls_types::InitializeParams) -> PositionEncoding {
    let client_encodings: &[ls_types::PositionEncodingKind] = params
        .capabilities
        .general
        .as_ref()
        .and_then(|general| general.position_encodings.as_ref())
        .map_or(&[], |encodings| encodings.as_slice());

    for preferred in [
        PositionEncoding::Utf8,
        PositionEncoding::Utf32,
        PositionEncoding::Utf16,
    ] {
        if client_encodings
            .iter()
            .any(|kind| kind.to_position_encoding() == Some(preferred))
        {
            return preferred;
        }
    }

    PositionEncoding::Utf16
}

pub(crate) trait UriExt {
    fn from_path(path: &Utf8Path) -> Option<Self>
    where
        Self: Sized;

    /// Only `file:` URIs convert.
    fn to_utf8_path_buf(&self) -> Option<Utf8PathBuf>;
}

impl UriExt for ls_types::Uri {
    fn from_path(path: &Utf8Path) -> Option<Self> {
        if !path.is_absolute() {
            return None;
        }
        let encoded = utf8_percent_encode(path.as_str(), PATH);
        ls_types::Uri::from_str(&format!("file://{encoded}")).ok()
    }

    fn to_utf8_path_buf(&self) -> Option<Utf8PathBuf> {
        let Some(rest) = self.as_str().strip_prefix("file://") else {
            tracing::trace!("URI conversion to path failed for: {} (non-file scheme)", self.as_str());
            return None;
        };
        let rest = rest.split(['?', '#']).next().unwrap_or(rest);
        let path = match rest.find('/') {
            Some(0) => rest,
            Some(index) if &rest[..index] == "localhost" => &rest[index..],
            _ => return None,
        };

        let decoded = percent_decode_str(path)
            .decode_utf8()
            .inspect_err(|_| {
                tracing::trace!("URI conversion to path failed for: {} (non-UTF-8 path)", self.as_str());
            })
            .ok()?;

        #[cfg(windows)]
        let decoded = {
            // `/C:/...` becomes `C:/...`
            decoded.strip_prefix('/').unwrap_or(&decoded).to_string()
        };

        Some(Utf8PathBuf::from(decoded.as_ref() as &str))
    }
}
