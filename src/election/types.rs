use crate::membership::ChangeNotification;

pub const ELECTION_NAMESPACE: &str = "/election";
pub const CANDIDATE_PREFIX: &str = "c_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Leader => f.write_str("leader"),
            Role::Follower => f.write_str("follower"),
        }
    }
}

/// Local view of the election. Only the re-election pass mutates it.
#[derive(Debug, Default)]
pub(crate) struct ElectionState {
    /// Candidate record name, e.g. `c_0000000004`.
    pub local_name: Option<String>,
    pub predecessor: Option<String>,
    pub role: Option<Role>,
    /// Armed on the predecessor while following.
    pub pending: Option<ChangeNotification>,
}

impl ElectionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
