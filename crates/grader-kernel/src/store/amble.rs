use std::fmt;
use std::str::FromStr;

/// Key of a preamble/postamble entry: `"all"` or a zero-based suite index
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AmbleKey {
    All,
    Suite(usize),
}

impl fmt::Display for AmbleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbleKey::All => f.write_str("all"),
            AmbleKey::Suite(index) => write!(f, "{index}"),
        }
    }
}

impl FromStr for AmbleKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(AmbleKey::All);
        }
        s.parse()
            .map(AmbleKey::Suite)
            .map_err(|_| format!("expected \"all\" or a suite index, got {s:?}"))
    }
}

impl serde::Serialize for AmbleKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for AmbleKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
