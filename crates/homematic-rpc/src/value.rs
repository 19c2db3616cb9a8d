// ── Value codec ───────────────────────────────────────────────────────
//
// The six value shapes of the XML-RPC dialect spoken by the controller,
// plus their `<value>` encoding and decoding.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use quick_xml::escape::escape;
use serde::Serialize;

use crate::error::Error;
use crate::xml::Element;

/// A typed XML-RPC value.
///
/// Closed over exactly the shapes the wire format can carry. Struct members
/// are kept in a `BTreeMap`, so encoding is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i32),
    Bool(bool),
    Double(f64),
    Array(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// Build a struct value from `(name, value)` pairs.
    pub fn structure<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Member lookup on a struct value; `None` for every other shape.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_struct().and_then(|s| s.get(key))
    }

    /// Short name of the shape, as used in the wire tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "boolean",
            Self::Double(_) => "double",
            Self::Array(_) => "array",
            Self::Struct(_) => "struct",
        }
    }

    /// Fails with `UnsupportedValue` if any nested double is NaN or
    /// infinite; XML-RPC has no spelling for those.
    pub fn check_encodable(&self) -> Result<(), Error> {
        match self {
            Self::Double(d) if !d.is_finite() => {
                Err(Error::UnsupportedValue(format!("non-finite double {d}")))
            }
            Self::Array(items) => items.iter().try_for_each(Self::check_encodable),
            Self::Struct(members) => members.values().try_for_each(Self::check_encodable),
            _ => Ok(()),
        }
    }

    // ── Lenient casts ────────────────────────────────────────────────
    //
    // The controller is loose with types: numeric strings where ints are
    // expected, ints where strings are expected. These casts absorb that.

    /// Scalar rendered as text; arrays and structs yield an empty string.
    pub fn to_string_lossy(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Array(_) | Self::Struct(_) => String::new(),
        }
    }

    /// Scalar coerced to an integer where the conversion is meaningful.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_i32_lossy(&self) -> Option<i32> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i32::from(*b)),
            Self::Double(d) if d.is_finite() => Some(d.trunc() as i32),
            Self::String(s) => {
                let s = s.trim();
                s.parse::<i32>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|d| d.is_finite()).map(|d| d.trunc() as i32))
            }
            _ => None,
        }
    }

    // ── Wire encoding ────────────────────────────────────────────────

    /// Append this value as a `<value>` element.
    pub(crate) fn write_xml(&self, out: &mut String) {
        out.push_str("<value>");
        match self {
            Self::String(s) => {
                let _ = write!(out, "<string>{}</string>", escape(s.as_str()));
            }
            Self::Int(i) => {
                let _ = write!(out, "<int>{i}</int>");
            }
            Self::Bool(b) => {
                let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
            }
            Self::Double(d) => {
                let _ = write!(out, "<double>{d}</double>");
            }
            Self::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    item.write_xml(out);
                }
                out.push_str("</data></array>");
            }
            Self::Struct(members) => {
                out.push_str("<struct>");
                for (name, value) in members {
                    let _ = write!(out, "<member><name>{}</name>", escape(name.as_str()));
                    value.write_xml(out);
                    out.push_str("</member>");
                }
                out.push_str("</struct>");
            }
        }
        out.push_str("</value>");
    }

    /// Standalone `<value>` encoding of this value.
    ///
    /// Non-finite doubles are written as Rust formats them (`NaN`, `inf`);
    /// use [`Value::check_encodable`] to reject them first.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    /// Decode a standalone `<value>` document.
    pub fn from_xml(bytes: &[u8]) -> Result<Self, Error> {
        let root = crate::xml::parse(bytes)?;
        if root.name != "value" {
            return Err(Error::UnexpectedRoot {
                expected: "value",
                found: root.name,
            });
        }
        decode(&root)
    }
}

// ── Wire decoding ────────────────────────────────────────────────────

/// Decode a `<value>` element.
pub(crate) fn decode(element: &Element) -> Result<Value, Error> {
    let Some(typed) = element.children.first() else {
        return Ok(Value::String(element.text.trim().to_owned()));
    };
    let text = typed.text.trim();

    match typed.name.as_str() {
        "string" => Ok(Value::String(typed.text.clone())),
        "int" | "i4" => text.parse().map(Value::Int).map_err(|_| Error::InvalidNumber {
            kind: "int",
            text: text.to_owned(),
        }),
        "boolean" => parse_bool(text).map(Value::Bool),
        "double" => text.parse().map(Value::Double).map_err(|_| Error::InvalidNumber {
            kind: "double",
            text: text.to_owned(),
        }),
        "array" => typed
            .find_all(&["data", "value"])
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        "struct" => {
            let mut members = BTreeMap::new();
            for member in typed.children_named("member") {
                let name = member.child("name").ok_or(Error::MissingStructName)?;
                let value = member.child("value").ok_or(Error::MissingStructValue)?;
                members.insert(name.text.trim().to_owned(), decode(value)?);
            }
            Ok(Value::Struct(members))
        }
        other => Err(Error::InvalidValueType(other.to_owned())),
    }
}

fn parse_bool(text: &str) -> Result<bool, Error> {
    match text {
        "1" => Ok(true),
        "0" => Ok(false),
        t if t.eq_ignore_ascii_case("true") => Ok(true),
        t if t.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::InvalidNumber {
            kind: "boolean",
            text: text.to_owned(),
        }),
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(members: BTreeMap<String, Value>) -> Self {
        Self::Struct(members)
    }
}

macro_rules! try_from_wide_int {
    ($($t:ty),*) => {$(
        impl TryFrom<$t> for Value {
            type Error = Error;

            fn try_from(v: $t) -> Result<Self, Self::Error> {
                i32::try_from(v)
                    .map(Self::Int)
                    .map_err(|_| Error::UnsupportedValue(format!("integer {v} exceeds 32 bits")))
            }
        }
    )*};
}

try_from_wide_int!(i64, u32, u64, usize);

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Struct(members) => {
                f.write_str("{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn round_trip(value: &Value) -> Value {
        Value::from_xml(value.to_xml().as_bytes()).unwrap()
    }

    #[test]
    fn scalars_encode_to_their_tags() {
        assert_eq!(Value::from("a<b").to_xml(), "<value><string>a&lt;b</string></value>");
        assert_eq!(Value::from(true).to_xml(), "<value><boolean>1</boolean></value>");
        assert_eq!(Value::from(false).to_xml(), "<value><boolean>0</boolean></value>");
        assert_eq!(Value::from(-7).to_xml(), "<value><int>-7</int></value>");
        assert_eq!(Value::from(1.5).to_xml(), "<value><double>1.5</double></value>");
    }

    #[test]
    fn nested_values_survive_round_trip() {
        let value = Value::structure([
            ("ADDRESS", Value::from("LEQ0000001:1")),
            ("FLAGS", Value::from(9)),
            ("LEVEL", Value::from(0.25)),
            ("STICKY", Value::from(false)),
            (
                "CHILDREN",
                Value::from(vec![
                    Value::from("LEQ0000001:0"),
                    Value::structure([("inner", Value::from(vec![Value::from(1)]))]),
                ]),
            ),
            ("EMPTY", Value::Array(Vec::new())),
        ]);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn bare_text_decodes_as_trimmed_string() {
        let value = Value::from_xml(b"<value>  hello \n</value>").unwrap();
        assert_eq!(value, Value::from("hello"));
    }

    #[test]
    fn i4_and_textual_booleans_are_accepted() {
        assert_eq!(Value::from_xml(b"<value><i4> 42 </i4></value>").unwrap(), Value::Int(42));
        assert_eq!(
            Value::from_xml(b"<value><boolean>true</boolean></value>").unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn unknown_tag_is_rejected_with_its_name() {
        let err = Value::from_xml(b"<value><dateTime.iso8601>x</dateTime.iso8601></value>")
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value type dateTime.iso8601");
    }

    #[test]
    fn struct_members_require_name_and_value() {
        let no_name = b"<value><struct><member><value>1</value></member></struct></value>";
        assert!(matches!(Value::from_xml(no_name), Err(Error::MissingStructName)));

        let no_value = b"<value><struct><member><name>a</name></member></struct></value>";
        assert!(matches!(Value::from_xml(no_value), Err(Error::MissingStructValue)));
    }

    #[test]
    fn malformed_numbers_fail() {
        assert!(matches!(
            Value::from_xml(b"<value><int>abc</int></value>"),
            Err(Error::InvalidNumber { kind: "int", .. })
        ));
        assert!(matches!(
            Value::from_xml(b"<value><boolean>2</boolean></value>"),
            Err(Error::InvalidNumber { kind: "boolean", .. })
        ));
    }

    #[test]
    fn non_finite_doubles_are_not_encodable() {
        assert!(Value::Double(1.5).check_encodable().is_ok());
        assert!(matches!(
            Value::Double(f64::NAN).check_encodable(),
            Err(Error::UnsupportedValue(_))
        ));
        let nested = Value::structure([(
            "list",
            Value::Array(vec![Value::Int(1), Value::Double(f64::INFINITY)]),
        )]);
        assert!(matches!(nested.check_encodable(), Err(Error::UnsupportedValue(_))));
    }

    #[test]
    fn wide_integers_are_range_checked() {
        assert_eq!(Value::try_from(12_i64).unwrap(), Value::Int(12));
        assert!(matches!(
            Value::try_from(u64::MAX),
            Err(Error::UnsupportedValue(_))
        ));
    }

    #[test]
    fn lenient_casts_follow_controller_typing() {
        assert_eq!(Value::from("17").to_i32_lossy(), Some(17));
        assert_eq!(Value::from(" 2.9 ").to_i32_lossy(), Some(2));
        assert_eq!(Value::from(true).to_i32_lossy(), Some(1));
        assert_eq!(Value::from("x").to_i32_lossy(), None);
        assert_eq!(Value::from(3).to_string_lossy(), "3");
        assert_eq!(Value::Array(vec![]).to_string_lossy(), "");
    }

    #[test]
    fn serializes_untagged_to_json() {
        let value = Value::structure([("a", Value::from(1)), ("b", Value::from("x"))]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":1,"b":"x"}"#);
    }
}
