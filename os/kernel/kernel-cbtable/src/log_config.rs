//! # Per-device log configuration
//!
//! Verbosity is configured per device instance instead of through global
//! flags. The crate still logs through the [`log`] facade; [`LogConfig`] only
//! decides which records are handed to it.

use bitfield_struct::bitfield;
use log::{Level, LevelFilter};

/// Log categories a device may emit.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct LogCategories {
    /// Bit 0 — Lifecycle and table parsing.
    pub init: bool,

    /// Bit 1 — Mapping and unmapping of physical ranges.
    pub pnp: bool,

    /// Bit 2 — Read and write requests.
    pub io: bool,

    /// Bits 3–7 — Reserved.
    #[bits(5, default = 0)]
    _reserved_3_7: u8,
}

impl LogCategories {
    #[must_use]
    pub const fn all() -> Self {
        Self::new().with_init(true).with_pnp(true).with_io(true)
    }

    #[must_use]
    pub const fn contains(self, category: Category) -> bool {
        match category {
            Category::Init => self.init(),
            Category::Pnp => self.pnp(),
            Category::Io => self.io(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Category {
    Init,
    Pnp,
    Io,
}

impl Category {
    /// The `log` target records of this category are emitted under.
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::Init => "cbtable::init",
            Self::Pnp => "cbtable::pnp",
            Self::Io => "cbtable::io",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub max_level: LevelFilter,
    pub categories: LogCategories,
}

impl LogConfig {
    #[must_use]
    pub const fn new(max_level: LevelFilter, categories: LogCategories) -> Self {
        Self {
            max_level,
            categories,
        }
    }

    /// Emits nothing at all.
    #[must_use]
    pub const fn quiet() -> Self {
        Self::new(LevelFilter::Off, LogCategories::new())
    }

    #[inline]
    #[must_use]
    pub fn enabled(&self, category: Category, level: Level) -> bool {
        level <= self.max_level && self.categories.contains(category)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LevelFilter::Info, LogCategories::all())
    }
}

/// Logs through [`log`] if `$cfg` lets `$cat` at `$lvl` through.
macro_rules! cb_log {
    ($cfg:expr, $cat:expr, $lvl:expr, $($arg:tt)+) => {{
        let cfg: &$crate::LogConfig = $cfg;
        let cat: $crate::Category = $cat;
        let lvl: ::log::Level = $lvl;
        if cfg.enabled(cat, lvl) {
            ::log::log!(target: cat.target(), lvl, $($arg)+);
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_passes_info_for_every_category() {
        let cfg = LogConfig::default();
        for cat in [Category::Init, Category::Pnp, Category::Io] {
            assert!(cfg.enabled(cat, Level::Info));
            assert!(cfg.enabled(cat, Level::Error));
            assert!(!cfg.enabled(cat, Level::Debug));
        }
    }

    #[test]
    fn disabled_category_is_filtered_regardless_of_level() {
        let cfg = LogConfig::new(
            LevelFilter::Trace,
            LogCategories::all().with_pnp(false),
        );
        assert!(cfg.enabled(Category::Init, Level::Trace));
        assert!(!cfg.enabled(Category::Pnp, Level::Error));
        assert!(cfg.enabled(Category::Io, Level::Warn));
    }

    #[test]
    fn quiet_emits_nothing() {
        let cfg = LogConfig::quiet();
        assert!(!cfg.enabled(Category::Init, Level::Error));
        assert_eq!(cfg.categories.into_bits(), 0);
    }

    #[test]
    fn category_bits_layout() {
        assert_eq!(LogCategories::all().into_bits(), 0b111);
        assert_eq!(LogCategories::new().with_io(true).into_bits(), 0b100);
    }
}
