use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Display name a member picked at join time. Unique within a room while
/// the member stays joined; carries no identity beyond that.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct MemberName(pub String);

impl MemberName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for MemberName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-level identity of one client connection, assigned when the
/// socket is accepted. Distinct from [`MemberName`]: a connection exists
/// before it joins anything and keeps its id across room moves.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
