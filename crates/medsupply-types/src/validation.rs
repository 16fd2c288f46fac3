//! Validation helpers shared by the request DTOs

use std::borrow::Cow;

use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::api::FieldError;
use crate::money::MAX_UNIT_PRICE;

/// Amount must be zero or more
pub fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative")
            .with_message(Cow::Borrowed("Must not be negative")));
    }
    Ok(())
}

/// Unit price must lie in `0..=MAX_UNIT_PRICE`
pub fn unit_price(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    if *value > MAX_UNIT_PRICE {
        return Err(ValidationError::new("unit_price")
            .with_message(Cow::Borrowed("Price must not exceed 1000000")));
    }
    Ok(())
}

/// Amount must be strictly greater than zero
pub fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(
            ValidationError::new("positive").with_message(Cow::Borrowed("Must be greater than 0"))
        );
    }
    Ok(())
}

/// Build a single field error in the same shape the derive produces
pub fn field_error(field: &str, message: impl Into<String>) -> FieldError {
    FieldError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Flatten nested validator output into `field.path` / message pairs.
///
/// Field names are reported in camelCase to match the JSON bodies, list
/// members as `items[0].price`. The output is sorted by path so responses
/// are stable.
pub fn flatten(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = join(prefix, &camel_case(field));
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    out.push(FieldError {
                        field: path.clone(),
                        message: message_for(error),
                    });
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(members) => {
                for (index, inner) in members {
                    collect(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

fn join(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn message_for(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => match error.code.as_ref() {
            "length" => "Invalid length".to_string(),
            "range" => "Out of range".to_string(),
            "email" => "Invalid email address".to_string(),
            "required" => "Required".to_string(),
            code => format!("Invalid value ({code})"),
        },
    }
}

/// `gps_address` -> `gpsAddress`; camelCase input is returned unchanged
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
