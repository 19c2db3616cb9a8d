//! VALUES paramset access: get, set, values, describe.

use std::collections::BTreeMap;

use homematic_core::{Ccu, ParameterDescription, Value};
use tabled::Tabled;

use crate::cli::{AddressArgs, GetArgs, GlobalOpts, OutputFormat, SetArgs, ValueType};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Parameter")]
    parameter: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct DescriptionRow {
    #[tabled(rename = "Parameter")]
    id: String,
    #[tabled(rename = "Type")]
    param_type: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Default")]
    default: String,
    #[tabled(rename = "Ops")]
    operations: String,
}

fn optional(value: Option<&Value>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

impl From<&(String, ParameterDescription)> for DescriptionRow {
    fn from((id, p): &(String, ParameterDescription)) -> Self {
        let ops = [
            (p.operations.read, 'R'),
            (p.operations.write, 'W'),
            (p.operations.event, 'E'),
        ]
        .iter()
        .map(|&(set, flag)| if set { flag } else { '-' })
        .collect();
        Self {
            id: id.clone(),
            param_type: p.param_type.clone(),
            unit: p.unit.clone(),
            min: optional(p.min.as_ref()),
            max: optional(p.max.as_ref()),
            default: optional(p.default.as_ref()),
            operations: ops,
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn get(ccu: &Ccu, args: &GetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = ccu.device(&args.address).await?;
    let value = device.value(&args.parameter).await?;

    let out = output::render_single(
        &global.output,
        &value,
        ToString::to_string,
        ToString::to_string,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set(ccu: &Ccu, args: &SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let value = parse_value(&args.value, args.value_type)?;
    let device = ccu.device(&args.address).await?;
    device.set_value(&args.parameter, value.clone()).await?;

    tracing::info!(address = %args.address, parameter = %args.parameter, %value, "value written");
    if !global.quiet {
        eprintln!("{} {} = {value}", args.address, args.parameter);
    }
    Ok(())
}

pub async fn values(ccu: &Ccu, args: &AddressArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = ccu.device(&args.address).await?;
    if !device.has_values() {
        return Err(CliError::Validation {
            field: "address".into(),
            reason: format!("'{}' has no VALUES paramset", args.address),
        });
    }
    let values = device.values().await?;

    let entries: Vec<(String, Value)> = values.into_iter().collect();
    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => output::render_list(
            &global.output,
            &entries,
            |(k, v)| ValueRow {
                parameter: k.clone(),
                value: v.to_string(),
            },
            |(k, v)| format!("{k}={v}"),
        )?,
        _ => {
            let map: BTreeMap<_, _> = entries.into_iter().collect();
            output::render_single(&global.output, &map, |_| String::new(), |_| String::new())?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn describe(ccu: &Ccu, args: &AddressArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = ccu.device(&args.address).await?;
    let descriptions = device.values_description().await?;

    let mut entries: Vec<(String, ParameterDescription)> = descriptions
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    entries.sort_by_key(|(id, p)| (p.tab_order, id.clone()));

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => output::render_list(
            &global.output,
            &entries,
            |e| DescriptionRow::from(e),
            |(id, _)| id.clone(),
        )?,
        _ => output::render_single(
            &global.output,
            descriptions,
            |_| String::new(),
            |_| String::new(),
        )?,
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Value parsing ───────────────────────────────────────────────────

/// Encode a command-line value as the requested wire type.
pub fn parse_value(raw: &str, value_type: ValueType) -> Result<Value, CliError> {
    let invalid = |expected: &str| CliError::Validation {
        field: "value".into(),
        reason: format!("'{raw}' is not a valid {expected}"),
    };
    match value_type {
        ValueType::String => Ok(Value::String(raw.to_owned())),
        ValueType::Int => raw
            .trim()
            .parse::<i32>()
            .map(Value::Int)
            .map_err(|_| invalid("integer")),
        ValueType::Double => raw
            .trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| invalid("number")),
        ValueType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(Value::Bool(true)),
            "0" | "false" | "off" | "no" => Ok(Value::Bool(false)),
            _ => Err(invalid("boolean")),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn values_are_encoded_by_type() {
        assert_eq!(parse_value("on", ValueType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(parse_value(" 0 ", ValueType::Bool).unwrap(), Value::Bool(false));
        assert_eq!(parse_value("42", ValueType::Int).unwrap(), Value::Int(42));
        assert_eq!(parse_value("0.5", ValueType::Double).unwrap(), Value::Double(0.5));
        assert_eq!(
            parse_value(" x ", ValueType::String).unwrap(),
            Value::String(" x ".into())
        );
    }

    #[test]
    fn malformed_values_are_usage_errors() {
        let err = parse_value("maybe", ValueType::Bool).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
        assert!(parse_value("1.5", ValueType::Int).is_err());
    }

    #[test]
    fn description_row_shows_operations() {
        let mut p = ParameterDescription {
            param_type: "BOOL".into(),
            ..ParameterDescription::default()
        };
        p.operations.read = true;
        p.operations.event = true;
        let row = DescriptionRow::from(&("STATE".to_owned(), p));
        assert_eq!(row.operations, "R-E");
        assert_eq!(row.min, "");
    }
}
