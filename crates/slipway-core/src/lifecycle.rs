use crate::CoreError;
use slipway_schema::Address;
use slipway_store::{ResourceRecord, ResourceState};

/// State the engine observes for a resolved resource with an optional record.
pub fn observed_state(record: Option<&ResourceRecord>) -> ResourceState {
    record.map_or(ResourceState::Resolved, |r| r.state)
}

pub fn validate_transition(
    address: &Address,
    from: ResourceState,
    to: ResourceState,
) -> Result<(), CoreError> {
    use ResourceState::{Created, CreateFailed, Declared, DestroyFailed, Destroyed, Resolved};

    let valid = matches!(
        (from, to),
        (Declared, Resolved)
            | (
                Resolved | Created | CreateFailed | DestroyFailed,
                Created | CreateFailed
            )
            | (Created | CreateFailed | DestroyFailed, Destroyed | DestroyFailed)
            | (Destroyed, Resolved)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            address: address.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipway_schema::ResourceKind;
    use ResourceState::{Created, CreateFailed, Declared, DestroyFailed, Destroyed, Resolved};

    fn check(from: ResourceState, to: ResourceState) -> Result<(), CoreError> {
        validate_transition(&Address::new(ResourceKind::Network, "net"), from, to)
    }

    #[test]
    fn valid_transitions() {
        assert!(check(Declared, Resolved).is_ok());
        assert!(check(Resolved, Created).is_ok());
        assert!(check(Resolved, CreateFailed).is_ok());
        assert!(check(Created, Created).is_ok()); // idempotent re-apply
        assert!(check(CreateFailed, Created).is_ok());
        assert!(check(Created, Destroyed).is_ok());
        assert!(check(CreateFailed, Destroyed).is_ok());
        assert!(check(Created, DestroyFailed).is_ok());
        assert!(check(DestroyFailed, Destroyed).is_ok());
        assert!(check(Destroyed, Resolved).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(check(Declared, Created).is_err());
        assert!(check(Resolved, Destroyed).is_err());
        assert!(check(Destroyed, Created).is_err());
        assert!(check(Created, Declared).is_err());
        assert!(check(CreateFailed, Resolved).is_err());
    }

    #[test]
    fn invalid_transition_names_resource() {
        let err = check(Resolved, Destroyed).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("network.net"));
        assert!(msg.contains("resolved -> destroyed"));
    }

    #[test]
    fn observed_state_defaults_to_resolved() {
        assert_eq!(observed_state(None), Resolved);
    }
}
