use crate::filter::Filter;

/// Whether an exchange should be recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Action {
    /// No policy has expressed an opinion yet.
    #[default]
    Unknown,
    Allow,
    Deny,
}

impl Action {
    /// The verdict of a single policy's filters for `uri`.
    ///
    /// * no filters: `Allow`
    /// * any filter matches and allows: `Allow`
    /// * otherwise `Deny`, whether a deny filter matched or nothing matched
    pub fn from_filters(filters: &[Filter], uri: &str) -> Action {
        if filters.is_empty() || filters.iter().any(|f| f.allowed(uri)) {
            Action::Allow
        } else {
            Action::Deny
        }
    }

    /// Fold another policy's verdict into the running one.
    ///
    /// `Allow` is sticky, `Deny` only replaces `Unknown`. The result does not
    /// depend on the order verdicts are folded in.
    pub fn combine(self, other: Action) -> Action {
        match (self, other) {
            (Action::Allow, _) | (_, Action::Allow) => Action::Allow,
            (Action::Deny, _) | (_, Action::Deny) => Action::Deny,
            _ => Action::Unknown,
        }
    }

    pub fn is_deny(self) -> bool {
        self == Action::Deny
    }
}
