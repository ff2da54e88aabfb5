//! Configuration errors. These are not recoverable; each maps to a distinct exit status.

use failure::Fail;

use crate::spec::{Component, Target, Testbed};

#[derive(Debug, Clone, PartialEq, Fail)]
pub enum ConfigError {
    #[fail(display = "Component `{}` not yet supported", _0)]
    UnsupportedComponent(String),

    #[fail(display = "Target {} is not yet supported on testbed {}", target, testbed)]
    UnsupportedTarget { target: Target, testbed: Testbed },

    #[fail(display = "No feature selected for component {}", component)]
    MissingFeature { component: Component },

    #[fail(display = "Feature --{} of component {} not yet supported", flag, component)]
    UnsupportedFeature {
        component: Component,
        flag: &'static str,
    },

    #[fail(
        display = "Only one feature may be selected for component {}, got --{} and --{}",
        component, first, second
    )]
    AmbiguousFeature {
        component: Component,
        first: &'static str,
        second: &'static str,
    },
}

impl ConfigError {
    /// The status the process exits with when this error occurs.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::UnsupportedComponent(_) => 2,
            ConfigError::UnsupportedTarget { .. } => 3,
            ConfigError::MissingFeature { .. }
            | ConfigError::UnsupportedFeature { .. }
            | ConfigError::AmbiguousFeature { .. } => 5,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let component = ConfigError::UnsupportedComponent("deparser".into());
        let target = ConfigError::UnsupportedTarget {
            target: Target::P4Nfp,
            testbed: Testbed::Pos,
        };
        let feature = ConfigError::MissingFeature {
            component: Component::Mat,
        };

        assert_eq!(component.exit_code(), 2);
        assert_eq!(target.exit_code(), 3);
        assert_eq!(feature.exit_code(), 5);
        assert_eq!(
            target.to_string(),
            "Target p4_nfp is not yet supported on testbed pos"
        );
    }
}
