//! Addressed, typed messages

use std::fmt;

use crate::core::error::{Result, TickwireError};

/// Argument types that have a wire encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Int32,
    Float32,
    Float64,
    Bool,
    String,
}

/// One message argument
///
/// `Long`, `Blob`, and a `Str` containing a NUL byte can be built in memory
/// but have no wire encoding; the encoder drops them and reports the count.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    Long(i64),
    Blob(Vec<u8>),
}

impl Argument {
    /// Wire type, or `None` when the argument cannot be encoded
    pub fn arg_type(&self) -> Option<ArgType> {
        match self {
            Argument::Int(_) => Some(ArgType::Int32),
            Argument::Float(_) => Some(ArgType::Float32),
            Argument::Double(_) => Some(ArgType::Float64),
            Argument::Bool(_) => Some(ArgType::Bool),
            Argument::Str(_) => Some(ArgType::String),
            Argument::Long(_) | Argument::Blob(_) => None,
        }
    }

    /// Numeric value as a double
    ///
    /// Integers and both float widths are accepted interchangeably;
    /// anything else is not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Argument::Int(v) => Some(*v as f64),
            Argument::Long(v) => Some(*v as f64),
            Argument::Float(v) => Some(*v as f64),
            Argument::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Int(_) => "int32",
            Argument::Float(_) => "float32",
            Argument::Double(_) => "float64",
            Argument::Bool(_) => "bool",
            Argument::Str(_) => "string",
            Argument::Long(_) => "int64",
            Argument::Blob(_) => "blob",
        }
    }
}

impl From<i32> for Argument {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<f32> for Argument {
    fn from(v: f32) -> Self {
        Argument::Float(v)
    }
}

impl From<f64> for Argument {
    fn from(v: f64) -> Self {
        Argument::Double(v)
    }
}

impl From<bool> for Argument {
    fn from(v: bool) -> Self {
        Argument::Bool(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Argument::Str(v.to_string())
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Argument::Str(v)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Int(v) => write!(f, "{}", v),
            Argument::Float(v) => write!(f, "{}", v),
            Argument::Double(v) => write!(f, "{}", v),
            Argument::Bool(v) => write!(f, "{}", v),
            Argument::Str(v) => write!(f, "{:?}", v),
            Argument::Long(v) => write!(f, "{}", v),
            Argument::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// An address plus an ordered argument list
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    address: String,
    pub args: Vec<Argument>,
}

impl WireMessage {
    /// Create a message with no arguments
    ///
    /// The address must be non-empty and start with `/`.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        validate_address(&address)?;
        Ok(Self {
            address,
            args: Vec::new(),
        })
    }

    pub fn with_args(address: impl Into<String>, args: Vec<Argument>) -> Result<Self> {
        let mut message = Self::new(address)?;
        message.args = args;
        Ok(message)
    }

    pub fn push(&mut self, arg: impl Into<Argument>) {
        self.args.push(arg.into());
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for WireMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_address(address: &str) -> Result<()> {
    if !address.starts_with('/') {
        return Err(TickwireError::InvalidMessage(format!(
            "address {:?} must start with '/'",
            address
        )));
    }
    if address.contains('\0') {
        return Err(TickwireError::InvalidMessage(
            "address must not contain NUL".into(),
        ));
    }
    Ok(())
}
