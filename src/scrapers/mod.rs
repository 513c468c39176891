//! Storefront scraping: finding screenshot URLs for an app in one country.
//!
//! # Submodules
//!
//! | Module | Role |
//! |--------|------|
//! | [`storefront`] | Storefront page URLs and app slugs |
//! | [`srcset`] | `srcset` descriptor parsing, candidate ranking, URL normalization |
//! | [`stages`] | The ordered extraction heuristics run over a rendered page |
//! | [`resolver`] | API-first resolution with scrape fallback and result merging |
//!
//! Scrape failures never propagate: a stage that errors is skipped, and a page
//! that cannot be rendered yields no screenshots for that country.

pub mod resolver;
pub mod srcset;
pub mod stages;
pub mod storefront;
