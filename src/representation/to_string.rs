//! Pre-rendered textual forms of a value.
//!
//! Numbers get several renderings (decimal, hex, grouped) so clients can
//! switch display without another round trip.

use serde::Serialize;

use crate::model::Value;

/// One rendering of a value under a named format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedValue {
    pub format: &'static str,
    pub value: String,
}

/// All textual renderings of a value, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToStringRepresentation {
    pub formats: Vec<FormattedValue>,
}

impl ToStringRepresentation {
    /// Render `value`. Null has no textual form.
    pub fn from_value(value: &Value) -> Option<Self> {
        let formats = match value {
            Value::Null => return None,
            Value::I8(v) => byte_formats(format!("{v:02x}"), v.to_string()),
            Value::U8(v) => byte_formats(format!("{v:02x}"), v.to_string()),
            Value::I16(v) => integer_formats(v.to_string(), format!("{v:x}"), format!("{v:04x}")),
            Value::U16(v) => integer_formats(v.to_string(), format!("{v:x}"), format!("{v:04x}")),
            Value::I32(v) => integer_formats(v.to_string(), format!("{v:x}"), format!("{v:08x}")),
            Value::U32(v) => integer_formats(v.to_string(), format!("{v:x}"), format!("{v:08x}")),
            Value::I64(v) => integer_formats(v.to_string(), format!("{v:x}"), format!("{v:016x}")),
            Value::U64(v) => integer_formats(v.to_string(), format!("{v:x}"), format!("{v:016x}")),
            Value::F32(v) => real_formats(f64::from(*v), v.to_string()),
            Value::F64(v) => real_formats(*v, v.to_string()),
            Value::Pointer(p) => vec![
                formatted("0x{0:x}", format!("0x{:x}", p.value)),
                formatted("{0}", p.value.to_string()),
            ],
            other => vec![formatted("{0}", other.display_string())],
        };

        Some(Self { formats })
    }

    /// The default rendering.
    pub fn primary(&self) -> Option<&str> {
        self.formats.first().map(|f| f.value.as_str())
    }
}

fn formatted(format: &'static str, value: String) -> FormattedValue {
    FormattedValue { format, value }
}

fn byte_formats(hex: String, decimal: String) -> Vec<FormattedValue> {
    vec![
        formatted("0x{0:x2}", format!("0x{hex}")),
        formatted("{0}", decimal),
    ]
}

fn integer_formats(decimal: String, hex: String, padded_hex: String) -> Vec<FormattedValue> {
    let grouped = group_digits(&decimal);
    vec![
        formatted("{0}", decimal),
        formatted("0x{0:x}", format!("0x{hex}")),
        formatted("0x{0:x*}", format!("0x{padded_hex}")),
        formatted("{0:N0}", grouped),
    ]
}

fn real_formats(value: f64, decimal: String) -> Vec<FormattedValue> {
    let number = if value.is_finite() {
        group_fixed(value)
    } else {
        decimal.clone()
    };
    let currency = if !value.is_finite() {
        decimal.clone()
    } else if value.is_sign_negative() && number.starts_with('-') {
        format!("-¤{}", &number[1..])
    } else {
        format!("¤{number}")
    };

    vec![
        formatted("{0}", decimal),
        formatted("{0:N}", number),
        formatted("{0:C}", currency),
    ]
}

/// Insert thousands separators into a decimal integer string.
fn group_digits(decimal: &str) -> String {
    let (sign, digits) = match decimal.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", decimal),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}")
}

/// Two-decimal fixed-point rendering with thousands separators.
fn group_fixed(value: f64) -> String {
    let fixed = format!("{value:.2}");
    match fixed.split_once('.') {
        Some((whole, frac)) => format!("{}.{frac}", group_digits(whole)),
        None => group_digits(&fixed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(value: Value) -> Vec<(&'static str, String)> {
        ToStringRepresentation::from_value(&value)
            .expect("formats")
            .formats
            .into_iter()
            .map(|f| (f.format, f.value))
            .collect()
    }

    #[test]
    fn bytes_render_hex_then_decimal() {
        assert_eq!(
            rendered(Value::U8(10)),
            vec![("0x{0:x2}", "0x0a".to_string()), ("{0}", "10".to_string())]
        );
        assert_eq!(rendered(Value::I8(-1))[0].1, "0xff");
    }

    #[test]
    fn integers_render_four_forms() {
        assert_eq!(
            rendered(Value::I32(1234567)),
            vec![
                ("{0}", "1234567".to_string()),
                ("0x{0:x}", "0x12d687".to_string()),
                ("0x{0:x*}", "0x0012d687".to_string()),
                ("{0:N0}", "1,234,567".to_string()),
            ]
        );
    }

    #[test]
    fn negative_integers_group_after_sign() {
        let forms = rendered(Value::I64(-1234));
        assert_eq!(forms[3].1, "-1,234");
    }

    #[test]
    fn reals_render_number_and_currency() {
        assert_eq!(
            rendered(Value::F64(1234.5)),
            vec![
                ("{0}", "1234.5".to_string()),
                ("{0:N}", "1,234.50".to_string()),
                ("{0:C}", "¤1,234.50".to_string()),
            ]
        );
        assert_eq!(rendered(Value::F64(-2.0))[2].1, "-¤2.00");
    }

    #[test]
    fn null_has_no_text() {
        assert!(ToStringRepresentation::from_value(&Value::Null).is_none());
    }
}
