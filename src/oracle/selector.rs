//! Uniform random pick from the catalog.

use rand::seq::SliceRandom;

use super::catalog::{Catalog, Language};

/// Pick one answer for `lang`, uniformly and with replacement.
pub fn select(catalog: &Catalog, lang: Language) -> &'static str {
    catalog
        .responses(lang)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_else(|| unreachable!("catalog is non-empty by construction"))
}
