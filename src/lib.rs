//! formbind - bind loosely-typed input onto typed records
//!
//! Form fields, query strings, JSON and XML bodies, and plain key/value maps
//! are normalized into one flat map, then bound field by field onto a record
//! through a binding table built once per record type. Values are coerced to
//! each field's declared type, and required fields are checked.
//!
//! ```
//! use std::collections::HashMap;
//!
//! #[derive(Default)]
//! struct Login {
//!     user: String,
//!     password: String,
//! }
//!
//! formbind::form!(Login {
//!     user: String [required],
//!     password: String [required],
//! });
//!
//! let input = HashMap::from([
//!     ("user".to_string(), "bob".to_string()),
//!     ("password".to_string(), "b0b".to_string()),
//! ]);
//! let mut login = Login::default();
//! formbind::decode(&mut login, input).unwrap();
//! assert_eq!(login.user, "bob");
//! ```

pub mod coerce;
pub mod decoder;
pub mod error;
pub mod input;
pub mod record;
pub mod request;
pub mod shape;
pub mod value;

pub use coerce::Coerce;
pub use decoder::{decode, decoder_for, Binding, Decoder};
pub use error::{BindError, DecodeError, FieldErrors, FixSuggestion, ParseError};
pub use input::Input;
pub use record::{Record, ShapeError, ShapeFile};
pub use request::{new_form_request, RequestView};
pub use shape::{Field, Form, Shape};
pub use value::{FlatMap, Kind, Value};
