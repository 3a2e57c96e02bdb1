use std::collections::HashMap;

use regex::Regex;

use crate::error::Result;

/// Replace every run of non-word characters with a single `-`.
pub fn make_id_like(name: &str) -> Result<String> {
    Ok(Regex::new(r"\W+")?.replace_all(name, "-").into_owned())
}

/// Hands out `{prefix}-{slug}-{n}` identifiers, counting per `(prefix, slug)`.
/// One registry lives for one build.
#[derive(Debug, Default)]
pub struct IdRegistry {
    seen: HashMap<(String, String), usize>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_unique_id(&mut self, prefix: &str, name: &str) -> Result<String> {
        let slug = make_id_like(name)?;
        let counter = self
            .seen
            .entry((prefix.to_string(), slug.clone()))
            .or_insert(0);
        *counter += 1;
        Ok(format!("{prefix}-{slug}-{counter}"))
    }
}
