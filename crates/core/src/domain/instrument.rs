use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange-traded funds tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instrument {
    Spy,
    Sso,
    Upro,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Spy, Instrument::Sso, Instrument::Upro];

    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::Spy => "SPY",
            Instrument::Sso => "SSO",
            Instrument::Upro => "UPRO",
        }
    }

    /// Lower-case symbol, used to build artifact file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Instrument::Spy => "spy",
            Instrument::Sso => "sso",
            Instrument::Upro => "upro",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Instrument {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SPY" => Ok(Instrument::Spy),
            "SSO" => Ok(Instrument::Sso),
            "UPRO" => Ok(Instrument::Upro),
            other => anyhow::bail!("unknown instrument: {other:?} (expected SPY, SSO or UPRO)"),
        }
    }
}
