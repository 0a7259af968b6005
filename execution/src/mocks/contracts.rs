//! Sample modules exercising the dynamic link host.

use commonware_codec::{DecodeExt, Encode};
use dynlink_types::{Address, EntryPoint, Interface, Value, ValueType};

use crate::{
    marshal::{decode_values, encode_values},
    runtime::{Contract, Env, Fault, Host, UNREACHABLE},
    Error,
};

const VALUE: &[u8] = b"value";
const CALLEE: &[u8] = b"callee";

fn int_arg(args: &[Value], idx: usize, entry_point: &str) -> Result<i64, Fault> {
    args.get(idx)
        .and_then(Value::as_int)
        .ok_or_else(|| Fault::Host(Error::interface([entry_point])))
}

fn str_arg<'v>(args: &'v [Value], idx: usize, entry_point: &str) -> Result<&'v str, Fault> {
    args.get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| Fault::Host(Error::interface([entry_point])))
}

fn parse_address(value: &str) -> Result<Address, Fault> {
    Address::from_hex(value).ok_or_else(|| Fault::Trap(format!("invalid address: {value}")))
}

fn load_int(host: &mut dyn Host, key: &[u8]) -> Result<i64, Fault> {
    match host.read(key)? {
        Some(bytes) => Ok(i64::decode(bytes.as_slice()).map_err(Error::from)?),
        None => Ok(0),
    }
}

fn store_int(host: &mut dyn Host, key: &[u8], value: i64) -> Result<(), Fault> {
    host.write(key, value.encode().to_vec())?;
    Ok(())
}

fn load_str(host: &mut dyn Host, key: &[u8]) -> Result<Option<String>, Fault> {
    match host.read(key)? {
        Some(bytes) => Ok(Some(
            String::from_utf8(bytes).map_err(|err| Fault::Trap(err.to_string()))?,
        )),
        None => Ok(None),
    }
}

fn store_str(host: &mut dyn Host, key: &[u8], value: &str) -> Result<(), Fault> {
    host.write(key, value.as_bytes().to_vec())?;
    Ok(())
}

fn load_address(host: &mut dyn Host, key: &[u8]) -> Result<Address, Fault> {
    let hex = load_str(host, key)?
        .ok_or_else(|| Fault::Trap("module not instantiated".to_string()))?;
    parse_address(&hex)
}

fn load_value(host: &mut dyn Host, key: &[u8]) -> Result<Option<Value>, Fault> {
    match host.read(key)? {
        Some(bytes) => Ok(decode_values(&bytes)?.into_iter().next()),
        None => Ok(None),
    }
}

fn store_value(host: &mut dyn Host, key: &[u8], value: &Value) -> Result<(), Fault> {
    host.write(key, encode_values(std::slice::from_ref(value)))?;
    Ok(())
}

fn record(fields: Vec<(&str, Value)>) -> Value {
    Value::Record(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

fn record_type(fields: &[(&str, ValueType)]) -> ValueType {
    ValueType::Record(
        fields
            .iter()
            .map(|(name, ty)| (name.to_string(), ty.clone()))
            .collect(),
    )
}

fn field_str<'v>(record: &'v Value, name: &str) -> Result<&'v str, Fault> {
    record
        .field(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Fault::Trap(format!("missing field {name}")))
}

fn field_int(record: &Value, name: &str) -> Result<i64, Fault> {
    record
        .field(name)
        .and_then(Value::as_int)
        .ok_or_else(|| Fault::Trap(format!("missing field {name}")))
}

/// Party on whose behalf the active frame runs: the calling module, or the
/// sender for a root frame.
fn acting(host: &mut dyn Host) -> Result<Address, Fault> {
    host.env()?
        .caller
        .ok_or_else(|| Fault::Trap("unauthorized".to_string()))
}

fn env_type() -> ValueType {
    record_type(&[
        ("contract", ValueType::Str),
        ("caller", ValueType::Str),
        ("sender", ValueType::Str),
        ("attached_value", ValueType::Int),
        ("read_only", ValueType::Int),
        ("depth", ValueType::Int),
    ])
}

fn env_record(env: &Env) -> Value {
    let address = |address: &Option<Address>| {
        Value::str(address.as_ref().map(Address::to_hex).unwrap_or_default())
    };
    record(vec![
        ("contract", Value::str(env.contract.to_hex())),
        ("caller", address(&env.caller)),
        ("sender", address(&env.sender)),
        (
            "attached_value",
            Value::Int(i64::try_from(env.attached_value).unwrap_or(i64::MAX)),
        ),
        ("read_only", Value::Int(i64::from(env.read_only))),
        ("depth", Value::Int(i64::try_from(env.depth).unwrap_or(i64::MAX))),
    ])
}

fn emit_fields(host: &mut dyn Host, prefix: &str, record: &Value) -> Result<(), Fault> {
    let Value::Record(fields) = record else {
        return Err(Fault::Trap("expected a record".to_string()));
    };
    for (name, value) in fields {
        host.emit(&format!("{prefix}{name}"), &value.to_string())?;
    }
    Ok(())
}

fn single_int(results: &[Value], entry_point: &str) -> Result<i64, Fault> {
    int_arg(results, 0, entry_point)
}

fn render(results: &[Value]) -> String {
    results.first().map(ToString::to_string).unwrap_or_default()
}

fn unknown(entry_point: &str) -> Fault {
    Fault::Host(Error::interface([entry_point]))
}

/// Holds one integer.
pub struct Number;

impl Number {
    pub fn instantiate() -> EntryPoint {
        EntryPoint::read_write("instantiate", vec![ValueType::Int], vec![])
    }

    pub fn value() -> EntryPoint {
        EntryPoint::read_only("value", vec![], vec![ValueType::Int])
    }

    pub fn set_value() -> EntryPoint {
        EntryPoint::read_write("set_value", vec![ValueType::Int], vec![])
    }

    pub fn mul() -> EntryPoint {
        EntryPoint::read_write("mul", vec![ValueType::Int], vec![ValueType::Int])
    }

    /// Declared read-only but writes anyway.
    pub fn sneaky_write() -> EntryPoint {
        EntryPoint::read_only("sneaky_write", vec![], vec![])
    }

    /// Emits `n` entries, ignoring any failure.
    pub fn burn() -> EntryPoint {
        EntryPoint::read_write("burn", vec![ValueType::Int], vec![])
    }
}

impl Contract for Number {
    fn exports(&self) -> Vec<EntryPoint> {
        vec![
            Self::instantiate(),
            Self::value(),
            Self::set_value(),
            Self::mul(),
            Self::sneaky_write(),
            Self::burn(),
        ]
    }

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault> {
        match entry_point {
            "instantiate" | "set_value" => {
                store_int(host, VALUE, int_arg(&args, 0, entry_point)?)?;
                Ok(vec![])
            }
            "value" => Ok(vec![Value::Int(load_int(host, VALUE)?)]),
            "mul" => {
                let factor = int_arg(&args, 0, entry_point)?;
                let value = load_int(host, VALUE)?.saturating_mul(factor);
                store_int(host, VALUE, value)?;
                Ok(vec![Value::Int(value)])
            }
            "sneaky_write" => {
                store_int(host, VALUE, -1)?;
                Ok(vec![])
            }
            "burn" => {
                for i in 0..int_arg(&args, 0, entry_point)? {
                    let _ = host.emit("burn", &i.to_string());
                }
                Ok(vec![])
            }
            other => Err(unknown(other)),
        }
    }
}

/// Drives a [Number] through dynamic calls.
pub struct CallNumber;

impl CallNumber {
    pub fn instantiate() -> EntryPoint {
        EntryPoint::read_write("instantiate", vec![ValueType::Str], vec![])
    }

    pub fn mul() -> EntryPoint {
        EntryPoint::read_write("mul", vec![ValueType::Int], vec![])
    }

    /// Reads the callee through a read-only dynamic call.
    pub fn number() -> EntryPoint {
        EntryPoint::read_only("number", vec![], vec![ValueType::Int])
    }

    /// Reads the callee through a dynamic call inheriting the caller's mode.
    pub fn number_dyn() -> EntryPoint {
        EntryPoint::read_only("number_dyn", vec![], vec![ValueType::Int])
    }

    /// Read-only entry point that calls a read-write one.
    pub fn set_via_query() -> EntryPoint {
        EntryPoint::read_only("set_via_query", vec![ValueType::Int], vec![])
    }

    /// Read-only entry point whose callee writes while declared read-only.
    pub fn sneaky_via_call() -> EntryPoint {
        EntryPoint::read_only("sneaky_via_call", vec![], vec![])
    }
}

impl Contract for CallNumber {
    fn exports(&self) -> Vec<EntryPoint> {
        vec![
            Self::instantiate(),
            Self::mul(),
            Self::number(),
            Self::number_dyn(),
            Self::set_via_query(),
            Self::sneaky_via_call(),
        ]
    }

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault> {
        if entry_point == "instantiate" {
            let callee = parse_address(str_arg(&args, 0, entry_point)?)?;
            host.write(CALLEE, callee.to_hex().into_bytes())?;
            return Ok(vec![]);
        }

        let callee = load_address(host, CALLEE)?;
        match entry_point {
            "mul" => {
                let factor = int_arg(&args, 0, entry_point)?;
                let current = single_int(&host.call(&callee, &Number::value(), vec![])?, "value")?;
                host.call(
                    &callee,
                    &Number::set_value(),
                    vec![Value::Int(current.saturating_mul(factor))],
                )?;

                let by_dynamic = single_int(&host.call(&callee, &Number::value(), vec![])?, "value")?;
                host.emit("value_by_dynamic", &by_dynamic.to_string())?;
                let by_query = single_int(&host.query(&callee, &Number::value(), vec![])?, "value")?;
                host.emit("value_by_query", &by_query.to_string())?;
                Ok(vec![])
            }
            "number" => Ok(host.query(&callee, &Number::value(), vec![])?),
            "number_dyn" => Ok(host.call(&callee, &Number::value(), vec![])?),
            "set_via_query" => {
                host.call(&callee, &Number::set_value(), args)?;
                Ok(vec![])
            }
            "sneaky_via_call" => {
                host.call(&callee, &Number::sneaky_write(), vec![])?;
                Ok(vec![])
            }
            other => Err(unknown(other)),
        }
    }
}

/// Answers pings with structured values.
pub struct Callee;

fn message_and_number() -> ValueType {
    ValueType::Record(vec![
        ("message".to_string(), ValueType::Str),
        ("number".to_string(), ValueType::Int),
    ])
}

fn str_and_int() -> ValueType {
    ValueType::Tuple(vec![ValueType::Str, ValueType::Int])
}

impl Callee {
    pub fn pong() -> EntryPoint {
        EntryPoint::read_only("pong", vec![ValueType::Int], vec![ValueType::Int])
    }

    pub fn pong_with_struct() -> EntryPoint {
        EntryPoint::read_only(
            "pong_with_struct",
            vec![message_and_number()],
            vec![message_and_number()],
        )
    }

    pub fn pong_with_tuple() -> EntryPoint {
        EntryPoint::read_only("pong_with_tuple", vec![str_and_int()], vec![str_and_int()])
    }

    pub fn pong_with_tuple_takes_2_args() -> EntryPoint {
        EntryPoint::read_only(
            "pong_with_tuple_takes_2_args",
            vec![ValueType::Str, ValueType::Int],
            vec![str_and_int()],
        )
    }

    pub fn pong_env() -> EntryPoint {
        EntryPoint::read_only("pong_env", vec![], vec![ValueType::Str])
    }

    pub fn reentrancy() -> EntryPoint {
        EntryPoint::read_write("reentrancy", vec![ValueType::Str], vec![])
    }

    pub fn do_panic() -> EntryPoint {
        EntryPoint::read_write("do_panic", vec![], vec![])
    }

    /// Returns everything the frame can observe about itself.
    pub fn env_report() -> EntryPoint {
        EntryPoint::read_only("env_report", vec![], vec![env_type()])
    }

    pub fn interface() -> Interface {
        Interface::new(
            "callee",
            vec![
                Self::pong(),
                Self::pong_with_struct(),
                Self::pong_with_tuple(),
                Self::pong_with_tuple_takes_2_args(),
                Self::pong_env(),
                Self::reentrancy(),
                Self::do_panic(),
                Self::env_report(),
            ],
        )
    }
}

impl Contract for Callee {
    fn exports(&self) -> Vec<EntryPoint> {
        Self::interface().entry_points
    }

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault> {
        match entry_point {
            "pong" => {
                let ping = int_arg(&args, 0, entry_point)?;
                host.emit("pong", &ping.to_string())?;
                Ok(vec![Value::Int(ping.saturating_add(1))])
            }
            "pong_with_struct" => {
                let arg = args.first().ok_or_else(|| unknown(entry_point))?;
                let message = arg.field("message").and_then(Value::as_str);
                let number = arg.field("number").and_then(Value::as_int);
                let (Some(message), Some(number)) = (message, number) else {
                    return Err(unknown(entry_point));
                };
                Ok(vec![Value::Record(vec![
                    ("message".to_string(), Value::str(format!("{message} world"))),
                    ("number".to_string(), Value::Int(number + 1)),
                ])])
            }
            "pong_with_tuple" => {
                let items = args
                    .first()
                    .and_then(Value::as_tuple)
                    .ok_or_else(|| unknown(entry_point))?;
                let text = str_arg(items, 0, entry_point)?;
                let number = int_arg(items, 1, entry_point)?;
                Ok(vec![Value::Tuple(vec![
                    Value::str(format!("{text} world")),
                    Value::Int(number + 1),
                ])])
            }
            "pong_with_tuple_takes_2_args" => {
                let text = str_arg(&args, 0, entry_point)?;
                let number = int_arg(&args, 1, entry_point)?;
                Ok(vec![Value::Tuple(vec![
                    Value::str(format!("{text} world")),
                    Value::Int(number + 1),
                ])])
            }
            "pong_env" => Ok(vec![Value::str(host.env()?.contract.to_hex())]),
            "reentrancy" => {
                let caller = parse_address(str_arg(&args, 0, entry_point)?)?;
                host.write(b"attempted", vec![1])?;
                host.call(&caller, &Caller::should_never_be_called(), vec![])?;
                Ok(vec![])
            }
            "do_panic" => {
                host.write(b"panicked", vec![1])?;
                Err(Fault::Trap(UNREACHABLE.to_string()))
            }
            "env_report" => Ok(vec![env_record(&host.env()?)]),
            other => Err(unknown(other)),
        }
    }
}

/// Calls a [Callee] in every way the host supports.
pub struct Caller;

impl Caller {
    pub fn instantiate() -> EntryPoint {
        EntryPoint::read_write("instantiate", vec![ValueType::Str], vec![])
    }

    pub fn ping() -> EntryPoint {
        EntryPoint::read_write("ping", vec![ValueType::Int], vec![])
    }

    pub fn try_re_entrancy() -> EntryPoint {
        EntryPoint::read_write("try_re_entrancy", vec![], vec![])
    }

    pub fn should_never_be_called() -> EntryPoint {
        EntryPoint::read_write("should_never_be_called", vec![], vec![])
    }

    pub fn do_panic() -> EntryPoint {
        EntryPoint::read_write("do_panic", vec![], vec![])
    }

    /// Calls the aborting callee and carries on.
    pub fn try_panic() -> EntryPoint {
        EntryPoint::read_write("try_panic", vec![], vec![])
    }

    /// Re-enters itself through the callee and carries on.
    pub fn recover_re_entrancy() -> EntryPoint {
        EntryPoint::read_write("recover_re_entrancy", vec![], vec![])
    }

    /// Calls itself directly and returns the rendered error.
    pub fn try_self_call() -> EntryPoint {
        EntryPoint::read_write("try_self_call", vec![], vec![ValueType::Str])
    }

    /// Emits its own environment and the callee's.
    pub fn report_env() -> EntryPoint {
        EntryPoint::read_write("report_env", vec![], vec![])
    }

    pub fn validate_interface() -> EntryPoint {
        EntryPoint::read_only("validate_interface", vec![], vec![])
    }

    pub fn validate_interface_err() -> EntryPoint {
        EntryPoint::read_only("validate_interface_err", vec![], vec![])
    }

    /// Interface the callee does not fully implement.
    pub fn bogus_interface() -> Interface {
        Interface::new(
            "bogus",
            vec![
                Callee::pong(),
                EntryPoint::read_only("not_exist1", vec![], vec![]),
                EntryPoint::read_write("pong_env", vec![], vec![ValueType::Str]),
                EntryPoint::read_only("not_exist2", vec![ValueType::Int], vec![]),
            ],
        )
    }
}

impl Contract for Caller {
    fn exports(&self) -> Vec<EntryPoint> {
        vec![
            Self::instantiate(),
            Self::ping(),
            Self::try_re_entrancy(),
            Self::should_never_be_called(),
            Self::do_panic(),
            Self::try_panic(),
            Self::recover_re_entrancy(),
            Self::try_self_call(),
            Self::report_env(),
            Self::validate_interface(),
            Self::validate_interface_err(),
        ]
    }

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault> {
        if entry_point == "instantiate" {
            let callee = parse_address(str_arg(&args, 0, entry_point)?)?;
            host.write(CALLEE, callee.to_hex().into_bytes())?;
            return Ok(vec![]);
        }

        let callee = load_address(host, CALLEE)?;
        match entry_point {
            "ping" => {
                let ping = int_arg(&args, 0, entry_point)?;
                let pong = single_int(&host.call(&callee, &Callee::pong(), vec![Value::Int(ping)])?, "pong")?;
                host.emit("returned_pong", &pong.to_string())?;

                let record = Value::Record(vec![
                    ("message".to_string(), Value::str("hello")),
                    ("number".to_string(), Value::Int(ping)),
                ]);
                let results = host.call(&callee, &Callee::pong_with_struct(), vec![record])?;
                let returned = results.first().ok_or_else(|| unknown("pong_with_struct"))?;
                let message = returned.field("message").and_then(Value::as_str).unwrap_or_default();
                let number = returned.field("number").and_then(Value::as_int).unwrap_or_default();
                host.emit("returned_pong_with_struct", &format!("{message} {number}"))?;

                let tuple = Value::Tuple(vec![Value::str("hello"), Value::Int(41)]);
                let results = host.call(&callee, &Callee::pong_with_tuple(), vec![tuple])?;
                host.emit("returned_pong_with_tuple", &render(&results))?;

                let results = host.call(
                    &callee,
                    &Callee::pong_with_tuple_takes_2_args(),
                    vec![Value::str("hello"), Value::Int(41)],
                )?;
                host.emit("returned_pong_with_tuple_takes_2_args", &render(&results))?;

                let results = host.call(&callee, &Callee::pong_env(), vec![])?;
                host.emit("returned_contract_address", str_arg(&results, 0, "pong_env")?)?;

                let pings = load_int(host, b"pings")?;
                store_int(host, b"pings", pings + 1)?;
                Ok(vec![])
            }
            "try_re_entrancy" => {
                let me = host.env()?.contract;
                host.call(&callee, &Callee::reentrancy(), vec![Value::str(me.to_hex())])?;
                Ok(vec![])
            }
            "should_never_be_called" => {
                host.write(b"reentered", vec![1])?;
                Ok(vec![])
            }
            "do_panic" => {
                host.write(b"before_panic", vec![1])?;
                host.call(&callee, &Callee::do_panic(), vec![])?;
                Ok(vec![])
            }
            "try_panic" => {
                host.write(b"before_panic", vec![1])?;
                let depth_before = host.env()?.depth;
                host.emit("before", "call")?;
                let err = match host.call(&callee, &Callee::do_panic(), vec![]) {
                    Ok(_) => String::new(),
                    Err(err) => err.to_string(),
                };
                let depth_after = host.env()?.depth;
                host.emit("error", &err)?;
                host.emit("depth_before", &depth_before.to_string())?;
                host.emit("depth_after", &depth_after.to_string())?;
                Ok(vec![])
            }
            "recover_re_entrancy" => {
                let me = host.env()?.contract;
                let depth_before = host.env()?.depth;
                let err = match host.call(&callee, &Callee::reentrancy(), vec![Value::str(me.to_hex())]) {
                    Ok(_) => String::new(),
                    Err(err) => err.to_string(),
                };
                let depth_after = host.env()?.depth;
                host.write(b"recovered", vec![1])?;
                host.emit("error", &err)?;
                host.emit("depth_before", &depth_before.to_string())?;
                host.emit("depth_after", &depth_after.to_string())?;
                Ok(vec![])
            }
            "try_self_call" => {
                let me = host.env()?.contract;
                let err = match host.call(&me, &Self::should_never_be_called(), vec![]) {
                    Ok(_) => String::new(),
                    Err(err) => err.to_string(),
                };
                Ok(vec![Value::str(err)])
            }
            "report_env" => {
                let own = env_record(&host.env()?);
                let results = host.call(&callee, &Callee::env_report(), vec![])?;
                let nested = results.first().ok_or_else(|| unknown("env_report"))?;
                emit_fields(host, "", &own)?;
                emit_fields(host, "callee_", nested)?;
                Ok(vec![])
            }
            "validate_interface" => {
                host.validate_interface(&callee, &Callee::interface())?;
                Ok(vec![])
            }
            "validate_interface_err" => {
                host.validate_interface(&callee, &Self::bogus_interface())?;
                Ok(vec![])
            }
            other => Err(unknown(other)),
        }
    }
}

/// Forwards a call along a chain of relays.
pub struct Relay;

impl Relay {
    /// Takes the remaining hops as comma-separated hex addresses and returns the
    /// depth of the last relay reached.
    pub fn forward() -> EntryPoint {
        EntryPoint::read_only("forward", vec![ValueType::Str], vec![ValueType::Int])
    }
}

impl Contract for Relay {
    fn exports(&self) -> Vec<EntryPoint> {
        vec![Self::forward()]
    }

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault> {
        if entry_point != "forward" {
            return Err(unknown(entry_point));
        }
        let hops = str_arg(&args, 0, entry_point)?;
        let (next, rest) = hops.split_once(',').unwrap_or((hops, ""));
        if next.is_empty() {
            let depth = host.env()?.depth as i64;
            return Ok(vec![Value::Int(depth)]);
        }
        let next = parse_address(next)?;
        Ok(host.call(&next, &Self::forward(), vec![Value::str(rest)])?)
    }
}

/// Non-fungible tokens with at most one approved spender per token.
pub struct Nft;

const MINTER: &[u8] = b"minter";

fn token_key(prefix: &str, token_id: &str) -> Vec<u8> {
    format!("{prefix}/{token_id}").into_bytes()
}

fn unauthorized() -> Fault {
    Fault::Trap("unauthorized".to_string())
}

impl Nft {
    pub fn instantiate() -> EntryPoint {
        EntryPoint::read_write("instantiate", vec![ValueType::Str], vec![])
    }

    pub fn mint() -> EntryPoint {
        EntryPoint::read_write("mint", vec![ValueType::Str, ValueType::Str], vec![])
    }

    pub fn approve() -> EntryPoint {
        EntryPoint::read_write("approve", vec![ValueType::Str, ValueType::Str], vec![])
    }

    pub fn transfer_nft() -> EntryPoint {
        EntryPoint::read_write("transfer_nft", vec![ValueType::Str, ValueType::Str], vec![])
    }

    pub fn owner_of() -> EntryPoint {
        EntryPoint::read_only(
            "owner_of",
            vec![ValueType::Str],
            vec![record_type(&[
                ("owner", ValueType::Str),
                ("approved", ValueType::Str),
            ])],
        )
    }
}

impl Contract for Nft {
    fn exports(&self) -> Vec<EntryPoint> {
        vec![
            Self::instantiate(),
            Self::mint(),
            Self::approve(),
            Self::transfer_nft(),
            Self::owner_of(),
        ]
    }

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault> {
        match entry_point {
            "instantiate" => {
                let minter = parse_address(str_arg(&args, 0, entry_point)?)?;
                store_str(host, MINTER, &minter.to_hex())?;
                Ok(vec![])
            }
            "mint" => {
                let token_id = str_arg(&args, 0, entry_point)?;
                let owner = parse_address(str_arg(&args, 1, entry_point)?)?;
                let minter = load_address(host, MINTER)?;
                if acting(host)? != minter {
                    return Err(unauthorized());
                }
                if load_str(host, &token_key("owner", token_id))?.is_some() {
                    return Err(Fault::Trap(format!("token {token_id} already minted")));
                }
                store_str(host, &token_key("owner", token_id), &owner.to_hex())?;
                host.emit("action", "mint")?;
                host.emit("minter", &minter.to_hex())?;
                host.emit("owner", &owner.to_hex())?;
                host.emit("token_id", token_id)?;
                Ok(vec![])
            }
            "approve" => {
                let spender = parse_address(str_arg(&args, 0, entry_point)?)?;
                let token_id = str_arg(&args, 1, entry_point)?;
                let owner = load_str(host, &token_key("owner", token_id))?
                    .ok_or_else(|| Fault::Trap(format!("token {token_id} not found")))?;
                if acting(host)?.to_hex() != owner {
                    return Err(unauthorized());
                }
                store_str(host, &token_key("approved", token_id), &spender.to_hex())?;
                host.emit("action", "approve")?;
                host.emit("spender", &spender.to_hex())?;
                host.emit("token_id", token_id)?;
                Ok(vec![])
            }
            "transfer_nft" => {
                let recipient = parse_address(str_arg(&args, 0, entry_point)?)?;
                let token_id = str_arg(&args, 1, entry_point)?;
                let owner = load_str(host, &token_key("owner", token_id))?
                    .ok_or_else(|| Fault::Trap(format!("token {token_id} not found")))?;
                let approved = load_str(host, &token_key("approved", token_id))?;
                let sender = acting(host)?.to_hex();
                if sender != owner && approved.as_deref() != Some(sender.as_str()) {
                    return Err(unauthorized());
                }
                store_str(host, &token_key("owner", token_id), &recipient.to_hex())?;
                host.remove(&token_key("approved", token_id))?;
                host.emit("action", "transfer_nft")?;
                host.emit("sender", &sender)?;
                host.emit("recipient", &recipient.to_hex())?;
                host.emit("token_id", token_id)?;
                Ok(vec![])
            }
            "owner_of" => {
                let token_id = str_arg(&args, 0, entry_point)?;
                let owner = load_str(host, &token_key("owner", token_id))?
                    .ok_or_else(|| Fault::Trap(format!("token {token_id} not found")))?;
                let approved = load_str(host, &token_key("approved", token_id))?.unwrap_or_default();
                Ok(vec![record(vec![
                    ("owner", Value::str(owner)),
                    ("approved", Value::str(approved)),
                ])])
            }
            other => Err(unknown(other)),
        }
    }
}

/// Sells one [Nft] token at a time to the highest bidder.
///
/// The auction takes custody of the token when it starts and hands it to the
/// highest bidder (or back to the seller) when it ends. Bids are the value
/// attached to the `place_bid` transaction; no funds move.
pub struct Auction;

const ITEM: &[u8] = b"item";
const HIGHEST: &[u8] = b"highest";
const HISTORY_LEN: &[u8] = b"history_len";

fn history_key(idx: i64) -> Vec<u8> {
    format!("history/{idx}").into_bytes()
}

fn item_type() -> ValueType {
    record_type(&[
        ("seller", ValueType::Str),
        ("nft_address", ValueType::Str),
        ("token_id", ValueType::Str),
        ("start_bid", ValueType::Int),
    ])
}

fn bid_type() -> ValueType {
    record_type(&[("highest_bid", ValueType::Int), ("bidder", ValueType::Str)])
}

fn history_type() -> ValueType {
    record_type(&[
        ("seller", ValueType::Str),
        ("nft_address", ValueType::Str),
        ("token_id", ValueType::Str),
        ("highest_bid", ValueType::Int),
        ("bidder", ValueType::Str),
    ])
}

fn no_auction() -> Fault {
    Fault::Trap("no auction in progress".to_string())
}

impl Auction {
    pub fn instantiate() -> EntryPoint {
        EntryPoint::read_write("instantiate", vec![], vec![])
    }

    pub fn start_auction() -> EntryPoint {
        EntryPoint::read_write(
            "start_auction",
            vec![ValueType::Str, ValueType::Str, ValueType::Int],
            vec![],
        )
    }

    pub fn place_bid() -> EntryPoint {
        EntryPoint::read_write("place_bid", vec![], vec![])
    }

    pub fn end_auction() -> EntryPoint {
        EntryPoint::read_write("end_auction", vec![], vec![])
    }

    pub fn get_auction_item() -> EntryPoint {
        EntryPoint::read_only("get_auction_item", vec![], vec![item_type()])
    }

    pub fn get_highest_bid() -> EntryPoint {
        EntryPoint::read_only("get_highest_bid", vec![], vec![bid_type()])
    }

    pub fn get_auction_history() -> EntryPoint {
        EntryPoint::read_only("get_auction_history", vec![ValueType::Int], vec![history_type()])
    }
}

impl Contract for Auction {
    fn exports(&self) -> Vec<EntryPoint> {
        vec![
            Self::instantiate(),
            Self::start_auction(),
            Self::place_bid(),
            Self::end_auction(),
            Self::get_auction_item(),
            Self::get_highest_bid(),
            Self::get_auction_history(),
        ]
    }

    fn call(
        &self,
        host: &mut dyn Host,
        entry_point: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, Fault> {
        match entry_point {
            "instantiate" => {
                store_int(host, HISTORY_LEN, 0)?;
                Ok(vec![])
            }
            "start_auction" => {
                let nft = parse_address(str_arg(&args, 0, entry_point)?)?;
                let token_id = str_arg(&args, 1, entry_point)?;
                let start_bid = int_arg(&args, 2, entry_point)?;
                if load_value(host, ITEM)?.is_some() {
                    return Err(Fault::Trap("auction already in progress".to_string()));
                }
                let seller = acting(host)?;
                let me = host.env()?.contract;

                let owner = host.query(&nft, &Nft::owner_of(), vec![Value::str(token_id)])?;
                let owner = owner.first().ok_or_else(|| unknown("owner_of"))?;
                if field_str(owner, "owner")? != seller.to_hex() {
                    return Err(unauthorized());
                }
                host.call(
                    &nft,
                    &Nft::transfer_nft(),
                    vec![Value::str(me.to_hex()), Value::str(token_id)],
                )?;

                let item = record(vec![
                    ("seller", Value::str(seller.to_hex())),
                    ("nft_address", Value::str(nft.to_hex())),
                    ("token_id", Value::str(token_id)),
                    ("start_bid", Value::Int(start_bid)),
                ]);
                store_value(host, ITEM, &item)?;
                let highest = record(vec![
                    ("highest_bid", Value::Int(0)),
                    ("bidder", Value::str("")),
                ]);
                store_value(host, HIGHEST, &highest)?;

                host.emit("method", "start_auction")?;
                host.emit("seller", &seller.to_hex())?;
                host.emit("nft_address", &nft.to_hex())?;
                host.emit("token_id", token_id)?;
                host.emit("start_bid", &start_bid.to_string())?;
                Ok(vec![])
            }
            "place_bid" => {
                let item = load_value(host, ITEM)?.ok_or_else(no_auction)?;
                let highest = load_value(host, HIGHEST)?.ok_or_else(no_auction)?;
                let bid = i64::try_from(host.env()?.attached_value).unwrap_or(i64::MAX);
                if bid < field_int(&item, "start_bid")? || bid <= field_int(&highest, "highest_bid")? {
                    return Err(Fault::Trap(format!("bid {bid} too low")));
                }
                let bidder = acting(host)?;
                let highest = record(vec![
                    ("highest_bid", Value::Int(bid)),
                    ("bidder", Value::str(bidder.to_hex())),
                ]);
                store_value(host, HIGHEST, &highest)?;

                host.emit("method", "place_bid")?;
                host.emit("bid", &bid.to_string())?;
                host.emit("bidder", &bidder.to_hex())?;
                Ok(vec![])
            }
            "end_auction" => {
                let item = load_value(host, ITEM)?.ok_or_else(no_auction)?;
                let highest = load_value(host, HIGHEST)?.ok_or_else(no_auction)?;
                let seller = field_str(&item, "seller")?;
                let nft = parse_address(field_str(&item, "nft_address")?)?;
                let token_id = field_str(&item, "token_id")?;
                let highest_bid = field_int(&highest, "highest_bid")?;
                let bidder = field_str(&highest, "bidder")?;

                // Unsold tokens go back to the seller.
                let recipient = if bidder.is_empty() { seller } else { bidder };
                host.call(
                    &nft,
                    &Nft::transfer_nft(),
                    vec![Value::str(recipient), Value::str(token_id)],
                )?;

                let idx = load_int(host, HISTORY_LEN)?;
                let entry = record(vec![
                    ("seller", Value::str(seller)),
                    ("nft_address", Value::str(nft.to_hex())),
                    ("token_id", Value::str(token_id)),
                    ("highest_bid", Value::Int(highest_bid)),
                    ("bidder", Value::str(bidder)),
                ]);
                store_value(host, &history_key(idx), &entry)?;
                store_int(host, HISTORY_LEN, idx + 1)?;
                host.remove(ITEM)?;
                host.remove(HIGHEST)?;

                host.emit("method", "end_auction")?;
                host.emit("highest_bid", &highest_bid.to_string())?;
                host.emit("bidder", bidder)?;
                Ok(vec![])
            }
            "get_auction_item" => Ok(vec![load_value(host, ITEM)?.ok_or_else(no_auction)?]),
            "get_highest_bid" => Ok(vec![load_value(host, HIGHEST)?.ok_or_else(no_auction)?]),
            "get_auction_history" => {
                let idx = int_arg(&args, 0, entry_point)?;
                let entry = load_value(host, &history_key(idx))?
                    .ok_or_else(|| Fault::Trap(format!("no auction at {idx}")))?;
                Ok(vec![entry])
            }
            other => Err(unknown(other)),
        }
    }
}

/// Looks up a sample module by name.
pub fn by_name(name: &str) -> Option<Box<dyn Contract>> {
    match name {
        "number" => Some(Box::new(Number)),
        "call_number" => Some(Box::new(CallNumber)),
        "callee" => Some(Box::new(Callee)),
        "caller" => Some(Box::new(Caller)),
        "relay" => Some(Box::new(Relay)),
        "nft" => Some(Box::new(Nft)),
        "auction" => Some(Box::new(Auction)),
        _ => None,
    }
}
