//! # One-shot region selector
//!
//! A write picks the region the *next* read returns; every read resets the
//! choice to the console log. Selections do not queue up: the last write
//! before a read wins.

use crate::RequestError;
use core::fmt;

/// The regions a read can return, with their on-the-wire selector values.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum RegionKind {
    #[default]
    Console = 0,
    Timestamps = 1,
    Root = 2,
    Tcpa = 3,
}

impl RegionKind {
    pub const ALL: [Self; 4] = [Self::Console, Self::Timestamps, Self::Root, Self::Tcpa];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Timestamps => "timestamps",
            Self::Root => "root",
            Self::Tcpa => "tcpa",
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for RegionKind {
    type Error = RequestError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Console),
            1 => Ok(Self::Timestamps),
            2 => Ok(Self::Root),
            3 => Ok(Self::Tcpa),
            _ => Err(RequestError::InvalidParameter),
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Default)]
pub struct RegionSelector {
    pending: RegionKind,
}

impl RegionSelector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: RegionKind::Console,
        }
    }

    /// Sets the region for the next read.
    ///
    /// # Errors
    /// [`RequestError::InvalidParameter`] if `value` is not a [`RegionKind`];
    /// the pending selection is left untouched.
    pub fn select(&mut self, value: u32) -> Result<RegionKind, RequestError> {
        self.pending = RegionKind::try_from(value)?;
        Ok(self.pending)
    }

    /// Returns the pending region and resets to [`RegionKind::Console`].
    pub fn consume(&mut self) -> RegionKind {
        core::mem::take(&mut self.pending)
    }

    #[must_use]
    pub const fn pending(&self) -> RegionKind {
        self.pending
    }
}
