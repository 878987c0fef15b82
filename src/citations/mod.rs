// Source references parsed out of model replies


use std::sync::LazyLock;

use fancy_regex::Regex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

static CITATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(Quelle: ([^,]+), Seite (\d+)\)").expect("citation pattern is valid")
});

/// A `(document, page)` reference from a reply
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Citation {
    pub document: String,
    pub page: u32,
}

/// Collect every `(Quelle: <document>, Seite <page>)` in `text`, first occurrence wins
#[inline]
pub fn extract_citations(text: &str) -> Vec<Citation> {
    let citations: Vec<Citation> = CITATION_PATTERN
        .captures_iter(text)
        .flatten()
        .filter_map(|captures| {
            let document = captures.get(1)?.as_str().trim();
            let page = captures.get(2)?.as_str().parse().ok()?;
            Some(Citation {
                document: document.to_string(),
                page,
            })
        })
        .unique()
        .collect();

    debug!("Extracted {} citations", citations.len());
    citations
}
