use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;

use crate::Feature;
use crate::Range;
use crate::RemapToHost;
use crate::ResponseMapper;

#[derive(Debug, Clone, Copy)]
pub struct DefinitionFeature;

impl Feature for DefinitionFeature {
    const NAME: &'static str = "definition";
    type Params = ();
    type Response = Vec<Location>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: Utf8PathBuf,
    pub range: Range,
}

/// Locations inside the generated document move back to the host document.
/// Those that fall outside every mapped span are dropped. Locations in other
/// files pass through untouched.
impl RemapToHost for Vec<Location> {
    fn remap_to_host(self, mapper: &ResponseMapper<'_>) -> Self {
        self.into_iter()
            .filter_map(|location| {
                if !mapper.is_generated_path(&location.path) {
                    return Some(location);
                }
                let Some(range) = mapper.map_range(location.range) else {
                    tracing::warn!(
                        kind = %mapper.language_kind(),
                        range = ?location.range,
                        "dropping definition that does not map back to the host document"
                    );
                    return None;
                };
                Some(Location {
                    path: mapper.host_path().to_path_buf(),
                    range,
                })
            })
            .collect()
    }
}
