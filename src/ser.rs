//! Serialize and deserialize data into JSON format.

use std::fmt::{self, Display, Formatter};

/// Loading error.
#[derive(Clone, Debug)]
pub struct LoadError(pub String);

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The object can be serialized and deserialized into JSON.
pub trait JsonSer: Sized {
    fn save(&self) -> json::JsonValue;

    fn load(obj: &json::JsonValue) -> Result<Self, crate::Error>;
}

/// Extracts values from a JSON object and binds them to local variables with the same names.
/// `key (as_str)` requires the key to be present, `key? (as_u64)` produces an `Option`.
macro_rules! json_get {
    ($obj:ident -> $var:ident ? ($fn:ident) $(, $($rest:tt)+)?) => {
        let $var = if $obj[stringify!($var)].is_null() {
            None
        } else {
            Some($obj[stringify!($var)].$fn().ok_or_else(|| $crate::ser::LoadError(format!(
                "Failed to parse '{}': key '{}' is not {}", $obj, stringify!($var), stringify!($fn))))?)
        };
        $( $crate::ser::json_get!($obj -> $($rest)+); )?
    };
    ($obj:ident -> $var:ident ($fn:ident) $(, $($rest:tt)+)?) => {
        let $var = $obj[stringify!($var)].$fn().ok_or_else(|| $crate::ser::LoadError(format!(
            "Failed to parse '{}': missing or incorrect key '{}' ({})", $obj, stringify!($var), stringify!($fn))))?;
        $( $crate::ser::json_get!($obj -> $($rest)+); )?
    };
}
pub(crate) use json_get;
