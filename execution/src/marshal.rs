//! Argument and result marshaling across the module boundary.
//!
//! Values cross as a length-prefixed sequence in the canonical `commonware_codec`
//! encoding. Decoding enforces the same bounds the wire types do, and every
//! decoded sequence is checked against the declared entry point before it is
//! handed to the other side.

use commonware_codec::{Decode, Encode, RangeCfg};
use dynlink_types::{EntryPoint, Value, MAX_ARGS};

use crate::Error;

pub fn encode_values(values: &[Value]) -> Vec<u8> {
    values.to_vec().encode().to_vec()
}

/// Decode a value sequence, rejecting trailing bytes.
pub fn decode_values(bytes: &[u8]) -> Result<Vec<Value>, Error> {
    Ok(Vec::<Value>::decode_cfg(
        bytes,
        &(RangeCfg::from(0..=MAX_ARGS), ()),
    )?)
}

/// Reject arguments that do not conform to `entry_point`.
pub fn check_args(entry_point: &EntryPoint, args: &[Value]) -> Result<(), Error> {
    if entry_point.accepts(args) {
        return Ok(());
    }
    Err(Error::interface([entry_point.name.as_str()]))
}

/// Reject results that do not conform to `entry_point`.
pub fn check_results(entry_point: &EntryPoint, results: &[Value]) -> Result<(), Error> {
    if entry_point.returns(results) {
        return Ok(());
    }
    Err(Error::interface([entry_point.name.as_str()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynlink_types::ValueType;

    fn pong_with_tuple() -> EntryPoint {
        EntryPoint::read_only(
            "pong_with_tuple",
            vec![ValueType::Tuple(vec![ValueType::Str, ValueType::Int])],
            vec![ValueType::Tuple(vec![ValueType::Str, ValueType::Int])],
        )
    }

    #[test]
    fn nested_values_survive_the_boundary() {
        let args = vec![Value::Tuple(vec![Value::str("hello"), Value::Int(41)])];
        let decoded = decode_values(&encode_values(&args)).unwrap();
        assert_eq!(decoded, args);
        assert!(check_args(&pong_with_tuple(), &decoded).is_ok());
    }

    #[test]
    fn empty_sequence() {
        assert!(decode_values(&encode_values(&[])).unwrap().is_empty());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = encode_values(&[Value::Int(1)]);
        bytes.push(0);
        assert!(matches!(decode_values(&bytes), Err(Error::Marshal(_))));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = encode_values(&[Value::str("hello world")]);
        for len in 0..bytes.len() {
            assert!(decode_values(&bytes[..len]).is_err(), "len={len}");
        }
    }

    #[test]
    fn too_many_values_are_rejected() {
        let args = vec![Value::Int(0); MAX_ARGS + 1];
        assert!(matches!(
            decode_values(&encode_values(&args)),
            Err(Error::Marshal(_))
        ));
    }

    #[test]
    fn mismatched_shapes_name_the_entry_point() {
        let ep = pong_with_tuple();
        let err = check_args(&ep, &[Value::Int(1)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The following functions are not implemented: pong_with_tuple"
        );
        assert!(check_results(&ep, &[]).is_err());
        assert!(check_results(
            &ep,
            &[Value::Tuple(vec![Value::str("hello world"), Value::Int(42)])]
        )
        .is_ok());
    }
}
