use serde::{Deserialize, Serialize};

/// The semantic analysis phases, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    ResolveReferences,
    ResolveTypes,
    CheckInferred,
    CheckTypes,
    CheckReturns,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::ResolveReferences,
        Phase::ResolveTypes,
        Phase::CheckInferred,
        Phase::CheckTypes,
        Phase::CheckReturns,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::ResolveReferences => "resolve-references",
            Phase::ResolveTypes => "resolve-types",
            Phase::CheckInferred => "check-inferred",
            Phase::CheckTypes => "check-types",
            Phase::CheckReturns => "check-returns",
        }
    }

    pub fn from_name(name: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| phase.name() == name)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_name(phase.name()), Some(phase));
        }
        assert_eq!(Phase::from_name("codegen"), None);
    }

    #[test]
    fn order_follows_pipeline() {
        assert!(Phase::ResolveReferences < Phase::CheckReturns);
        let mut sorted = Phase::ALL;
        sorted.sort();
        assert_eq!(sorted, Phase::ALL);
    }
}
