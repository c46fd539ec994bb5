use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// What the migration does with a legacy inline payload.
///
/// `Upload` is the default. `Discard` destroys the image and must be chosen
/// explicitly by the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Upload the decoded image and replace the content with the hosted URL.
    #[default]
    Upload,
    /// Replace the content without uploading. Irreversible.
    Discard,
}

impl Strategy {
    pub fn is_destructive(&self) -> bool {
        matches!(self, Strategy::Discard)
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upload" => Ok(Strategy::Upload),
            "discard" => Ok(Strategy::Discard),
            _ => Err(anyhow::anyhow!(
                "Invalid strategy: {} (expected 'upload' or 'discard')",
                s
            )),
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Strategy::Upload => write!(f, "upload"),
            Strategy::Discard => write!(f, "discard"),
        }
    }
}
