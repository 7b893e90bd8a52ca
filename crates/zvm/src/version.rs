use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ZvmError};

/// Maximum byte length of a textual version identifier, per §3.
pub const VERSION_ID_MAX_LEN: usize = 32;

/// A version of a tool: either a concrete semantic version, or the
/// distinguished `master` (nightly/tip) release.
///
/// Ordering is bytewise on the canonical textual form, matching the "bytewise"
/// comparison rule in §3; `master` sorts after every concrete version since it
/// tracks the tip of development.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionId {
    Semver(Version),
    Master,
}

impl VersionId {
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() > VERSION_ID_MAX_LEN {
            return Err(ZvmError::UsageError(format!(
                "version identifier too long: {s}"
            )));
        }
        if s == "master" {
            return Ok(VersionId::Master);
        }
        Ok(VersionId::Semver(Version::parse(s)?))
    }

    pub fn is_master(&self) -> bool {
        matches!(self, VersionId::Master)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionId::Semver(v) => write!(f, "{v}"),
            VersionId::Master => f.write_str("master"),
        }
    }
}

impl FromStr for VersionId {
    type Err = ZvmError;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionId {
    type Error = ZvmError;
    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<VersionId> for String {
    fn from(v: VersionId) -> Self {
        v.to_string()
    }
}

impl PartialEq for VersionId {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl PartialOrd for VersionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionId::Master, VersionId::Master) => Ordering::Equal,
            (VersionId::Master, VersionId::Semver(_)) => Ordering::Greater,
            (VersionId::Semver(_), VersionId::Master) => Ordering::Less,
            (VersionId::Semver(a), VersionId::Semver(b)) => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl std::hash::Hash for VersionId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state)
    }
}
