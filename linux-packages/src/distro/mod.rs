// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Linux distributions with known mirror layouts. */

pub mod centos;

use {
    crate::error::{PackagesError, Result},
    std::{fmt::Display, str::FromStr},
};

/// A supported Linux distribution.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Distribution {
    CentOs,
}

impl Distribution {
    /// Every supported distribution.
    pub fn all() -> &'static [Distribution] {
        &[Self::CentOs]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CentOs => "centos",
        }
    }
}

impl Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = PackagesError;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .find(|d| d.as_str() == s)
            .copied()
            .ok_or_else(|| PackagesError::UnsupportedDistribution(s.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse() -> Result<()> {
        assert_eq!("centos".parse::<Distribution>()?, Distribution::CentOs);
        assert!(matches!(
            "gentoo".parse::<Distribution>(),
            Err(PackagesError::UnsupportedDistribution(_))
        ));

        Ok(())
    }
}
