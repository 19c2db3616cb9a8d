// ── Envelope codec ────────────────────────────────────────────────────
//
// `<methodCall>` and `<methodResponse>` framing around the value codec.
// A `<params>` block is only written when there is at least one param;
// the controller treats an empty block differently from an absent one.

use std::fmt;

use crate::error::Error;
use crate::value::{self, Value};
use crate::xml::{self, Element};

const XML_DECL: &str = r#"<?xml version="1.0"?>"#;

// ── Fault ────────────────────────────────────────────────────────────

/// A failed call, carried in place of the result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The `{faultCode, faultString}` struct used on the wire.
    pub fn to_value(&self) -> Value {
        Value::structure([
            ("faultCode", Value::Int(self.code)),
            ("faultString", Value::String(self.message.clone())),
        ])
    }

    fn from_value(value: &Value) -> Result<Self, Error> {
        let members = value.as_struct().ok_or(Error::InvalidFault)?;
        Ok(Self {
            code: members
                .get("faultCode")
                .and_then(Value::to_i32_lossy)
                .unwrap_or_default(),
            message: members
                .get("faultString")
                .map(Value::to_string_lossy)
                .unwrap_or_default(),
        })
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (fault {})", self.message, self.code)
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        Self::Fault {
            code: fault.code,
            message: fault.message,
        }
    }
}

// ── Request ──────────────────────────────────────────────────────────

/// A `<methodCall>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECL);
        out.push_str("<methodCall><methodName>");
        out.push_str(&quick_xml::escape::escape(self.method.as_str()));
        out.push_str("</methodName>");
        write_params(&mut out, &self.params);
        out.push_str("</methodCall>");
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let root = root_element(bytes, "methodCall")?;
        let params = decode_params(&root)?;
        let method = root
            .child("methodName")
            .ok_or(Error::MissingMethodName)?
            .text
            .trim()
            .to_owned();
        Ok(Self { method, params })
    }
}

// ── Response ─────────────────────────────────────────────────────────

/// A `<methodResponse>`. A present fault takes precedence over params.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub params: Vec<Value>,
    pub fault: Option<Fault>,
}

impl Response {
    pub fn success(params: Vec<Value>) -> Self {
        Self {
            params,
            fault: None,
        }
    }

    pub fn fault(fault: Fault) -> Self {
        Self {
            params: Vec::new(),
            fault: Some(fault),
        }
    }

    pub fn first_param(&self) -> Option<&Value> {
        self.params.first()
    }

    /// Params on success, `Error::Fault` otherwise.
    pub fn into_result(self) -> Result<Vec<Value>, Error> {
        match self.fault {
            Some(fault) => Err(fault.into()),
            None => Ok(self.params),
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECL);
        out.push_str("<methodResponse>");
        write_params(&mut out, &self.params);
        if let Some(fault) = &self.fault {
            out.push_str("<fault>");
            fault.to_value().write_xml(&mut out);
            out.push_str("</fault>");
        }
        out.push_str("</methodResponse>");
        out
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let root = root_element(bytes, "methodResponse")?;
        let params = decode_params(&root)?;
        let fault = match root.find_all(&["fault", "value"]).first() {
            Some(element) => Some(Fault::from_value(&value::decode(element)?)?),
            None => None,
        };
        Ok(Self { params, fault })
    }
}

// ── Shared framing ───────────────────────────────────────────────────

fn write_params(out: &mut String, params: &[Value]) {
    if params.is_empty() {
        return;
    }
    out.push_str("<params>");
    for param in params {
        out.push_str("<param>");
        param.write_xml(out);
        out.push_str("</param>");
    }
    out.push_str("</params>");
}

fn decode_params(root: &Element) -> Result<Vec<Value>, Error> {
    root.find_all(&["params", "param", "value"])
        .into_iter()
        .map(value::decode)
        .collect()
}

fn root_element(bytes: &[u8], expected: &'static str) -> Result<Element, Error> {
    let root = xml::parse(bytes)?;
    if root.name == expected {
        Ok(root)
    } else {
        Err(Error::UnexpectedRoot {
            expected,
            found: root.name,
        })
    }
}
