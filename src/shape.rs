//! Target record shapes
//!
//! A [`Shape`] is the explicit description of a destination type: one
//! [`Field`] per bindable member, each with a declared kind, an optional
//! binding-name override, an optional required marker, and the setter that
//! writes a coerced value into a record instance.
//!
//! Shapes are usually declared once per type through [`Form`], either by
//! hand with the builder or with the [`form!`](crate::form) macro.

use std::fmt;

use tracing::debug;

use crate::coerce::{parse_bool, Coerce};
use crate::error::BindError;
use crate::value::{Kind, Value};

pub(crate) type Assign<T> = Box<dyn Fn(&mut T, &Value) -> Result<(), BindError> + Send + Sync>;

/// A type that can be decoded from loosely-typed input.
pub trait Form: Sized + Send + Sync + 'static {
    fn shape() -> Shape<Self>;
}

/// One bindable member of a record type.
pub struct Field<T> {
    name: String,
    kind: Kind,
    rename: Option<String>,
    required: Option<String>,
    assign: Assign<T>,
}

impl<T: 'static> Field<T> {
    /// Field of a statically known type `V`.
    ///
    /// `set` only runs when coercion produced a value.
    pub fn new<V, F>(name: impl Into<String>, set: F) -> Self
    where
        V: Coerce + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: V::KIND,
            rename: None,
            required: None,
            assign: Box::new(move |target, value| {
                if let Some(v) = V::coerce(value)? {
                    set(target, v);
                }
                Ok(())
            }),
        }
    }

    /// Field whose kind is only known at runtime.
    ///
    /// # Panics
    ///
    /// If `kind` is not one of the scalar kinds.
    pub fn dynamic<F>(name: impl Into<String>, kind: Kind, set: F) -> Self
    where
        F: Fn(&mut T, Value) + Send + Sync + 'static,
    {
        assert!(kind.is_scalar(), "field kind must be a scalar, got {kind}");
        Self {
            name: name.into(),
            kind,
            rename: None,
            required: None,
            assign: Box::new(move |target, value| {
                if let Some(v) = kind.coerce(value)? {
                    set(target, v);
                }
                Ok(())
            }),
        }
    }
}

impl<T> Field<T> {
    /// Bind under `name` instead of the field name. Empty means no override.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    /// Take the override from a JSON-style tag (`"login,omitempty"`).
    pub fn tag(self, tag: &str) -> Self {
        let name = tag.split(',').next().unwrap_or_default();
        self.rename(name)
    }

    pub fn required(self) -> Self {
        self.required_marker("true")
    }

    /// Raw required-marker text. Anything that is not a boolean literal
    /// reads as "not required".
    pub fn required_marker(mut self, text: impl Into<String>) -> Self {
        self.required = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Canonical lookup key: the lowercased override, or the lowercased name.
    pub fn key(&self) -> String {
        match self.rename.as_deref() {
            Some(r) if !r.is_empty() => r.to_lowercase(),
            _ => self.name.to_lowercase(),
        }
    }

    pub fn is_required(&self) -> bool {
        let Some(marker) = self.required.as_deref() else {
            return false;
        };
        parse_bool(marker).unwrap_or_else(|| {
            debug!(field = %self.name, marker, "unparsable required marker, treating as optional");
            false
        })
    }

    pub(crate) fn into_assign(self) -> Assign<T> {
        self.assign
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("rename", &self.rename)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Ordered field list of a record type.
pub struct Shape<T> {
    fields: Vec<Field<T>>,
}

impl<T> Default for Shape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Shape<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add a field (builder style)
    pub fn field(mut self, field: Field<T>) -> Self {
        self.fields.push(field);
        self
    }

    pub fn push(&mut self, field: Field<T>) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field<T>> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn into_fields(self) -> Vec<Field<T>> {
        self.fields
    }
}

impl<T> fmt::Debug for Shape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields.iter()).finish()
    }
}

/// Implement [`Form`] for a struct by listing its bindable fields.
///
/// Each field may carry `[required]` and/or `[rename = "key"]` options.
///
/// ```
/// #[derive(Default)]
/// struct Login {
///     user: String,
///     password: String,
///     remember: bool,
/// }
///
/// formbind::form!(Login {
///     user: String [required, rename = "login"],
///     password: String [required],
///     remember: bool,
/// });
/// ```
#[macro_export]
macro_rules! form {
    (@opt $f:ident, required) => {
        $f.required()
    };
    (@opt $f:ident, rename, $val:literal) => {
        $f.rename($val)
    };
    ($ty:ty { $( $field:ident : $fty:ty $( [ $( $opt:ident $( = $val:literal )? ),* $(,)? ] )? ),* $(,)? }) => {
        impl $crate::Form for $ty {
            fn shape() -> $crate::Shape<Self> {
                $crate::Shape::new()
                $(
                    .field({
                        let f = $crate::Field::new(
                            stringify!($field),
                            |target: &mut $ty, v: $fty| target.$field = v,
                        );
                        $( $( let f = $crate::form!(@opt f, $opt $(, $val)?); )* )?
                        f
                    })
                )*
            }
        }
    };
}
