//! Checks that a module exports the entry points a caller requires.

use dynlink_types::{Address, EntryPoint, Interface};
use tracing::debug;

use crate::{registry::Resolver, Error};

/// Check `required` against `exports`.
///
/// Every required entry point must be exported with the same name, parameter
/// types, result types and mutability. Unsatisfied names are reported in the
/// order they appear in `required`.
pub fn validate(exports: &[EntryPoint], required: &[EntryPoint]) -> Result<(), Error> {
    let missing: Vec<String> = required
        .iter()
        .filter(|req| !exports.iter().any(|export| export.matches(req)))
        .map(|req| req.name.clone())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    for req in required.iter().filter(|req| missing.contains(&req.name)) {
        match exports.iter().find(|export| export.name == req.name) {
            Some(export) => debug!(required = %req, exported = %export, "signature mismatch"),
            None => debug!(required = %req, "entry point not exported"),
        }
    }
    Err(Error::InterfaceValidation { missing })
}

/// Resolve `address` and check it against `interface`.
pub fn validate_module(
    registry: &dyn Resolver,
    address: &Address,
    interface: &Interface,
) -> Result<(), Error> {
    let module = registry.resolve(address)?;
    validate(&module.exports, &interface.entry_points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModuleRegistry;
    use dynlink_types::ValueType;

    fn exports() -> Vec<EntryPoint> {
        vec![
            EntryPoint::read_only("pong", vec![ValueType::Int], vec![ValueType::Int]),
            EntryPoint::read_write("set", vec![ValueType::Int], vec![]),
        ]
    }

    #[test]
    fn conforming_module_passes() {
        assert!(validate(&exports(), &exports()).is_ok());
        assert!(validate(&exports(), &exports()[..1]).is_ok());
        assert!(validate(&exports(), &[]).is_ok());
    }

    #[test]
    fn reports_missing_in_required_order() {
        let required = vec![
            EntryPoint::read_only("f2", vec![], vec![]),
            exports()[0].clone(),
            EntryPoint::read_only("f1", vec![], vec![]),
        ];
        for _ in 0..3 {
            let err = validate(&exports(), &required).unwrap_err();
            match &err {
                Error::InterfaceValidation { missing } => assert_eq!(missing, &["f2", "f1"]),
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(
                err.to_string(),
                "The following functions are not implemented: f2, f1"
            );
        }
    }

    #[test]
    fn signature_mismatch_counts_as_missing() {
        let required = vec![
            EntryPoint::read_only("pong", vec![ValueType::Str], vec![ValueType::Int]),
            EntryPoint::read_only("set", vec![ValueType::Int], vec![]),
        ];
        let err = validate(&exports(), &required).unwrap_err();
        assert!(
            matches!(err, Error::InterfaceValidation { missing } if missing == ["pong", "set"])
        );
    }

    #[test]
    fn unknown_module() {
        let registry = ModuleRegistry::default();
        let err = validate_module(
            &registry,
            &Address::module(9, 9),
            &Interface::new("any", exports()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ModuleNotFound(_)));
    }

    #[test]
    fn registered_module() {
        let mut registry = ModuleRegistry::default();
        let address = registry.instantiate(1, "callee", exports());
        assert!(validate_module(&registry, &address, &Interface::new("callee", exports())).is_ok());
    }
}
