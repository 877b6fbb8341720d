//! Decisions and rule effects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The effect a rule produces when it applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Permit => "Permit",
            Effect::Deny => "Deny",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "Permit" => Some(Effect::Permit),
            "Deny" => Some(Effect::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which definite decisions an Indeterminate element could have produced.
/// Combining algorithms refine on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndeterminateKind {
    /// Could only have evaluated to Permit.
    Permit,
    /// Could only have evaluated to Deny.
    Deny,
    /// Could have evaluated to either.
    DenyOrPermit,
}

impl From<Effect> for IndeterminateKind {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::Permit => IndeterminateKind::Permit,
            Effect::Deny => IndeterminateKind::Deny,
        }
    }
}

/// The four-valued authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate(IndeterminateKind),
}

impl Decision {
    /// The literal string that appears in a Response `<Decision>` element.
    /// The three Indeterminate flavours collapse to one literal on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Permit => "Permit",
            Decision::Deny => "Deny",
            Decision::NotApplicable => "NotApplicable",
            Decision::Indeterminate(_) => "Indeterminate",
        }
    }

    pub fn is_indeterminate(self) -> bool {
        matches!(self, Decision::Indeterminate(_))
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_wire_literals() {
        assert_eq!(Decision::Permit.as_str(), "Permit");
        assert_eq!(Decision::Deny.as_str(), "Deny");
        assert_eq!(Decision::NotApplicable.as_str(), "NotApplicable");
        assert_eq!(
            Decision::Indeterminate(IndeterminateKind::DenyOrPermit).as_str(),
            "Indeterminate"
        );
    }

    #[test]
    fn test_effect_to_indeterminate_kind() {
        assert_eq!(
            IndeterminateKind::from(Effect::Permit),
            IndeterminateKind::Permit
        );
        assert_eq!(
            IndeterminateKind::from(Effect::Deny),
            IndeterminateKind::Deny
        );
    }

    #[test]
    fn test_effect_parse() {
        assert_eq!(Effect::from_str_name("Permit"), Some(Effect::Permit));
        assert_eq!(Effect::from_str_name("Deny"), Some(Effect::Deny));
        assert_eq!(Effect::from_str_name("permit"), None);
    }
}
