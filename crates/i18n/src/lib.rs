pub mod i18n;
mod i18n_catalog;

pub use i18n::*;
