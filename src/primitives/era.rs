use std::fmt;

use serde::Serialize;

/// Ledger eras, indexed the way the node's hard-fork combinator numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Era {
    Byron,
    Shelley,
    Allegra,
    Mary,
    Alonzo,
    Babbage,
    Conway,
}

impl Era {
    pub fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(Era::Byron),
            1 => Some(Era::Shelley),
            2 => Some(Era::Allegra),
            3 => Some(Era::Mary),
            4 => Some(Era::Alonzo),
            5 => Some(Era::Babbage),
            6 => Some(Era::Conway),
            _ => None,
        }
    }

    /// Era index used by the local state query and tx submission protocols
    pub fn index(self) -> u16 {
        match self {
            Era::Byron => 0,
            Era::Shelley => 1,
            Era::Allegra => 2,
            Era::Mary => 3,
            Era::Alonzo => 4,
            Era::Babbage => 5,
            Era::Conway => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Era::Byron => "Byron",
            Era::Shelley => "Shelley",
            Era::Allegra => "Allegra",
            Era::Mary => "Mary",
            Era::Alonzo => "Alonzo",
            Era::Babbage => "Babbage",
            Era::Conway => "Conway",
        }
    }
}

impl fmt::Display for Era {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<pallas::ledger::traverse::Era> for Era {
    fn from(era: pallas::ledger::traverse::Era) -> Self {
        use pallas::ledger::traverse::Era as P;

        match era {
            P::Byron => Era::Byron,
            P::Shelley => Era::Shelley,
            P::Allegra => Era::Allegra,
            P::Mary => Era::Mary,
            P::Alonzo => Era::Alonzo,
            P::Babbage => Era::Babbage,
            P::Conway => Era::Conway,
        }
    }
}

impl From<Era> for pallas::ledger::traverse::Era {
    fn from(era: Era) -> Self {
        use pallas::ledger::traverse::Era as P;

        match era {
            Era::Byron => P::Byron,
            Era::Shelley => P::Shelley,
            Era::Allegra => P::Allegra,
            Era::Mary => P::Mary,
            Era::Alonzo => P::Alonzo,
            Era::Babbage => P::Babbage,
            Era::Conway => P::Conway,
        }
    }
}
