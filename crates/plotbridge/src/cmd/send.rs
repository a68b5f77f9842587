use std::str::FromStr;

use plotbridge_bridge::Producer;
use plotbridge_protocol::{parse_shape, to_ne_bytes, Element, ElementType, Header};
use tracing::warn;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{bridge_error, CliError, CliResult, SUCCESS};
use crate::output::{print_return, OutputFormat};

/// A parsed `--var` or `--scalar` binding, ready for the wire.
#[derive(Debug, PartialEq)]
struct Binding {
    header: Header,
    payload: Vec<u8>,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    // Parse everything before touching the socket.
    let mut bindings = Vec::with_capacity(args.vars.len() + args.scalars.len());
    for spec in &args.vars {
        bindings.push(parse_var(spec)?);
    }
    for spec in &args.scalars {
        bindings.push(parse_scalar(spec)?);
    }
    let send_backs = args
        .send_backs
        .iter()
        .map(|spec| parse_send_back(spec))
        .collect::<CliResult<Vec<_>>>()?;

    let mut producer = Producer::connect_with_retry(&args.path, wait_timeout)
        .map_err(|err| bridge_error("connect failed", err))?;

    producer
        .send_command(&args.command)
        .map_err(|err| bridge_error("send failed", err))?;
    for binding in &bindings {
        producer
            .send_raw(&binding.header, &binding.payload)
            .map_err(|err| bridge_error("send failed", err))?;
    }
    for (symbol, ty, shape) in &send_backs {
        producer
            .request_return(symbol, *ty, shape)
            .map_err(|err| bridge_error("send failed", err))?;
    }
    producer
        .finalize()
        .map_err(|err| bridge_error("send failed", err))?;

    for _ in 0..send_backs.len() {
        let value = producer
            .recv_return(wait_timeout)
            .map_err(|err| bridge_error("receive failed", err))?;
        let decoded = producer
            .declared_return(&value.symbol)
            .map(|declared| value.decode(declared))
            .transpose()
            .unwrap_or_else(|err| {
                warn!(symbol = %value.symbol, error = %err, "return value does not match declaration");
                None
            });
        print_return(&value, decoded.as_ref(), format);
    }

    if args.exit {
        producer
            .exit()
            .map_err(|err| bridge_error("send failed", err))?;
    }

    Ok(SUCCESS)
}

fn split_spec<'a>(flag: &str, spec: &'a str) -> CliResult<(&'a str, ElementType, &'a str)> {
    let mut parts = spec.splitn(3, ':');
    let (Some(name), Some(code), Some(rest)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CliError::usage(format!(
            "{flag} expects NAME:CODE:..., got {spec:?}"
        )));
    };
    if name.is_empty() {
        return Err(CliError::usage(format!("{flag} needs a symbol name: {spec:?}")));
    }
    let ty = ElementType::from_str(code)
        .map_err(|err| CliError::usage(format!("{flag} {spec:?}: {err}")))?;
    Ok((name, ty, rest))
}

fn parse_var(spec: &str) -> CliResult<Binding> {
    let (name, ty, rest) = split_spec("--var", spec)?;
    if ty.is_textual() {
        return Ok(text_binding(name, rest));
    }
    let values: Vec<&str> = rest.split(',').map(str::trim).collect();
    let payload = encode_values(ty, &values)
        .map_err(|bad| CliError::usage(format!("--var {spec:?}: {bad:?} is not a valid {ty}")))?;
    Ok(Binding {
        header: Header::new(name, ty, vec![values.len()]),
        payload,
    })
}

fn parse_scalar(spec: &str) -> CliResult<Binding> {
    let (name, ty, rest) = split_spec("--scalar", spec)?;
    if ty.is_textual() {
        return Ok(text_binding(name, rest));
    }
    let payload = encode_values(ty, &[rest.trim()])
        .map_err(|bad| CliError::usage(format!("--scalar {spec:?}: {bad:?} is not a valid {ty}")))?;
    Ok(Binding {
        header: Header::new(name, ty, Vec::new()),
        payload,
    })
}

fn parse_send_back(spec: &str) -> CliResult<(String, ElementType, Vec<usize>)> {
    let (name, ty, rest) = split_spec("--send-back", spec)?;
    let rest = rest.trim();
    let shape_text = if rest.starts_with('(') {
        rest.to_string()
    } else {
        format!("({rest})")
    };
    let shape = parse_shape(&shape_text)
        .map_err(|err| CliError::usage(format!("--send-back {spec:?}: {err}")))?;
    Ok((name.to_string(), ty, shape))
}

fn text_binding(name: &str, text: &str) -> Binding {
    Binding {
        header: Header::text(name, text.len()),
        payload: text.as_bytes().to_vec(),
    }
}

/// Native-order bytes of `values` parsed as `ty`. On failure returns the
/// offending value.
fn encode_values<'a>(ty: ElementType, values: &[&'a str]) -> Result<Vec<u8>, &'a str> {
    fn parse_all<'a, T: Element + FromStr>(values: &[&'a str]) -> Result<Vec<u8>, &'a str> {
        let parsed = values
            .iter()
            .map(|v| v.parse::<T>().map_err(|_| *v))
            .collect::<Result<Vec<T>, _>>()?;
        Ok(to_ne_bytes(&parsed))
    }

    match ty {
        ElementType::Int16 => parse_all::<i16>(values),
        ElementType::UInt16 => parse_all::<u16>(values),
        ElementType::Int32 => parse_all::<i32>(values),
        ElementType::UInt32 => parse_all::<u32>(values),
        ElementType::Int64 => parse_all::<i64>(values),
        ElementType::UInt64 => parse_all::<u64>(values),
        ElementType::Float32 => parse_all::<f32>(values),
        ElementType::Float64 => parse_all::<f64>(values),
        ElementType::SignedByte => parse_all::<i8>(values),
        ElementType::Char | ElementType::UnsignedByte => parse_all::<u8>(values),
    }
}

#[cfg(test)]
mod tests {
    use plotbridge_protocol::Mode;

    use super::*;

    #[test]
    fn var_is_a_1d_array() {
        let binding = parse_var("x:i:1, 2,3").unwrap();
        assert_eq!(binding.header.to_string(), "data|x|i|3|(3)|use");
        assert_eq!(binding.payload, to_ne_bytes(&[1i32, 2, 3]));
    }

    #[test]
    fn text_var_keeps_commas() {
        let binding = parse_var("title:c:sine, cosine").unwrap();
        assert_eq!(binding.header.to_string(), "data|title|c|12|(12)|use");
        assert_eq!(binding.payload, b"sine, cosine");
    }

    #[test]
    fn scalar_has_empty_shape() {
        let binding = parse_scalar("k:d:0.25").unwrap();
        assert_eq!(binding.header.to_string(), "data|k|d|1|()|use");
        assert_eq!(binding.payload, 0.25f64.to_ne_bytes());
    }

    #[test]
    fn send_back_shapes() {
        assert_eq!(
            parse_send_back("y:f:(2,3)").unwrap(),
            ("y".to_string(), ElementType::Float32, vec![2, 3])
        );
        assert_eq!(
            parse_send_back("n:i:()").unwrap(),
            ("n".to_string(), ElementType::Int32, Vec::new())
        );
        assert_eq!(
            parse_send_back("v:q:4").unwrap(),
            ("v".to_string(), ElementType::Int64, vec![4])
        );
    }

    #[test]
    fn bad_specs_are_usage_errors() {
        for spec in ["x", "x:i", ":i:1", "x:z:1"] {
            let err = parse_var(spec).unwrap_err();
            assert_eq!(err.code, crate::exit::USAGE, "spec {spec:?}");
        }
        let err = parse_scalar("x:H:-1").unwrap_err();
        assert!(err.message.contains("\"-1\""));
    }

    #[test]
    fn headers_bind_rather_than_return() {
        assert_eq!(parse_var("x:h:1").unwrap().header.mode, Mode::Bind);
    }
}
