//! Binding table and decode engine
//!
//! A [`Decoder`] is built once per record shape and reused for every decode
//! of that shape. It holds no per-call state, so one decoder can serve
//! concurrent decodes into distinct records.
//!
//! Decode flow:
//! ```text
//! Input ──normalize──▶ FlatMap ──lowercase key──▶ binder ──coerce──▶ record field
//!                                         │
//!                              unknown keys skipped
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use crate::error::{DecodeError, FieldErrors};
use crate::input::Input;
use crate::shape::{Assign, Form, Shape};
use crate::value::{FlatMap, Kind};

struct Binder<T> {
    name: String,
    kind: Kind,
    required: bool,
    assign: Assign<T>,
}

/// Row of [`Decoder::bindings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding<'a> {
    pub key: &'a str,
    pub name: &'a str,
    pub kind: Kind,
    pub required: bool,
}

/// Binding table for one record type: canonical key → field binder.
pub struct Decoder<T> {
    binders: HashMap<String, Binder<T>>,
}

impl<T> Decoder<T> {
    /// Build the table from a shape. Never fails.
    ///
    /// If two fields share a canonical key, the later one wins.
    pub fn new(shape: Shape<T>) -> Self {
        let mut binders = HashMap::with_capacity(shape.len());
        for field in shape.into_fields() {
            let key = field.key();
            let binder = Binder {
                name: field.name().to_string(),
                kind: field.kind(),
                required: field.is_required(),
                assign: field.into_assign(),
            };
            if let Some(prev) = binders.insert(key.clone(), binder) {
                warn!(key = %key, replaced = %prev.name, "duplicate binding key, later field wins");
            }
        }
        Self { binders }
    }

    /// Normalize `input` and bind it onto `target`.
    pub fn decode<'a>(&self, target: &mut T, input: impl Into<Input<'a>>) -> Result<(), DecodeError> {
        let data = input.into().normalize()?;
        self.decode_map(target, &data)
    }

    /// Bind an already-normalized map onto `target`.
    ///
    /// Every known key is applied even if an earlier one failed. Coercion
    /// failures take priority over missing required fields.
    pub fn decode_map(&self, target: &mut T, data: &FlatMap) -> Result<(), DecodeError> {
        let mut missing: BTreeSet<&str> = self
            .binders
            .iter()
            .filter(|(_, b)| b.required)
            .map(|(k, _)| k.as_str())
            .collect();
        let mut errors = FieldErrors::new();

        for (raw_key, value) in data {
            let key = raw_key.to_lowercase();
            let Some(binder) = self.binders.get(&key) else {
                trace!(key = %raw_key, "no binding for input key, skipping");
                continue;
            };

            if let Err(err) = (binder.assign)(target, value) {
                errors.insert(key.clone(), err);
            }

            // Null or blank never satisfies a required field
            if !value.is_null_or_empty() {
                missing.remove(key.as_str());
            }
        }

        if !errors.is_empty() {
            debug!(errors = errors.len(), "decode failed with field errors");
            return Err(DecodeError::Fields(errors));
        }

        if !missing.is_empty() {
            debug!(missing = missing.len(), "decode failed with missing required fields");
            return Err(DecodeError::MissingRequired(
                missing.into_iter().map(String::from).collect(),
            ));
        }

        debug!(keys = data.len(), "decoded");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.binders.contains_key(key)
    }

    /// Canonical keys of required fields, sorted.
    pub fn required_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .binders
            .iter()
            .filter(|(_, b)| b.required)
            .map(|(k, _)| k.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// All bindings, sorted by key.
    pub fn bindings(&self) -> Vec<Binding<'_>> {
        let mut rows: Vec<Binding<'_>> = self
            .binders
            .iter()
            .map(|(key, b)| Binding {
                key,
                name: &b.name,
                kind: b.kind,
                required: b.required,
            })
            .collect();
        rows.sort_unstable_by(|a, b| a.key.cmp(b.key));
        rows
    }
}

impl<T> fmt::Debug for Decoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("bindings", &self.bindings())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────
// Per-type decoder cache
// ─────────────────────────────────────────────────────────────

static DECODERS: Lazy<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = Lazy::new(DashMap::new);

/// Shared decoder for `T`, built on first use.
pub fn decoder_for<T: Form>() -> Arc<Decoder<T>> {
    let cached = Arc::clone(
        DECODERS
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                debug!(form = std::any::type_name::<T>(), "building binding table");
                Arc::new(Decoder::new(T::shape())) as Arc<dyn Any + Send + Sync>
            })
            .value(),
    );
    // Entries are keyed by TypeId, so the downcast only fails if that invariant breaks
    cached
        .downcast::<Decoder<T>>()
        .unwrap_or_else(|_| Arc::new(Decoder::new(T::shape())))
}

/// Decode `input` into `target` using the cached table for `T`.
pub fn decode<'a, T: Form>(target: &mut T, input: impl Into<Input<'a>>) -> Result<(), DecodeError> {
    decoder_for::<T>().decode(target, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindError;
    use crate::shape::Field;
    use crate::value::Value;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Account {
        user: String,
        password: String,
        age: i8,
        active: bool,
    }

    fn shape() -> Shape<Account> {
        Shape::new()
            .field(Field::new("User", |a: &mut Account, v: String| a.user = v).required())
            .field(Field::new("Password", |a: &mut Account, v: String| a.password = v).required())
            .field(Field::new("Age", |a: &mut Account, v: i8| a.age = v))
            .field(Field::new("Active", |a: &mut Account, v: bool| a.active = v).tag("is_active"))
    }

    fn map(pairs: &[(&str, Value)]) -> FlatMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn table_keys_are_lowercased() {
        let decoder = Decoder::new(shape());
        assert_eq!(decoder.len(), 4);
        assert!(decoder.contains("user"));
        assert!(decoder.contains("is_active"));
        assert!(!decoder.contains("User"));
        assert!(!decoder.contains("active"));
        assert_eq!(decoder.required_keys(), ["password", "user"]);
    }

    #[test]
    fn bindings_are_sorted() {
        let decoder = Decoder::new(shape());
        let keys: Vec<_> = decoder.bindings().iter().map(|b| b.key).collect();
        assert_eq!(keys, ["age", "is_active", "password", "user"]);
        let age = &decoder.bindings()[0];
        assert_eq!(age.name, "Age");
        assert_eq!(age.kind, Kind::Int8);
        assert!(!age.required);
    }

    #[test]
    fn decodes_with_case_insensitive_keys() {
        let decoder = Decoder::new(shape());
        let mut acct = Account::default();
        let data = map(&[
            ("USER", Value::from("bob")),
            ("PassWord", Value::from("b0b")),
            ("age", Value::from("42")),
            ("Is_Active", Value::from("on")),
        ]);

        decoder.decode_map(&mut acct, &data).unwrap();
        assert_eq!(
            acct,
            Account {
                user: "bob".into(),
                password: "b0b".into(),
                age: 42,
                active: true,
            }
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let decoder = Decoder::new(shape());
        let mut acct = Account::default();
        let data = map(&[
            ("user", Value::from("bob")),
            ("password", Value::from("b0b")),
            ("nickname", Value::Null),
            ("extra", Value::List(vec![])),
        ]);

        decoder.decode_map(&mut acct, &data).unwrap();
        assert_eq!(acct.user, "bob");
    }

    #[test]
    fn missing_required_fields_are_named_in_order() {
        let decoder = Decoder::new(shape());
        let mut acct = Account::default();

        let err = decoder.decode_map(&mut acct, &FlatMap::new()).unwrap_err();
        assert_eq!(err.missing_fields(), ["password", "user"]);
        assert_eq!(err.to_string(), "Please fill required fields: password, user");
    }

    #[test]
    fn blank_required_value_counts_as_missing() {
        let decoder = Decoder::new(shape());
        let mut acct = Account::default();
        let data = map(&[("user", Value::from("bob")), ("password", Value::from("   "))]);

        let err = decoder.decode_map(&mut acct, &data).unwrap_err();
        assert_eq!(err.missing_fields(), ["password"]);
        // the blank value was still bound
        assert_eq!(acct.password, "   ");
    }

    #[test]
    fn field_errors_take_priority_and_do_not_short_circuit() {
        let decoder = Decoder::new(shape());
        let mut acct = Account::default();
        let data = map(&[
            ("user", Value::Map(BTreeMap::new())),
            ("age", Value::from("9")),
        ]);

        let err = decoder.decode_map(&mut acct, &data).unwrap_err();
        let errs = err.field_errors().expect("field errors");
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs.get("user"),
            Some(&BindError::UnsupportedValueKind { kind: Kind::Map })
        );
        assert!(err.missing_fields().is_empty());
        assert_eq!(acct.age, 9);
    }

    #[test]
    fn null_for_required_field_is_a_field_error() {
        let decoder = Decoder::new(shape());
        let mut acct = Account::default();
        let data = map(&[
            ("user", Value::Null),
            ("password", Value::from("x")),
        ]);

        let err = decoder.decode_map(&mut acct, &data).unwrap_err();
        assert!(err.field_errors().unwrap().get("user").is_some());
    }

    #[test]
    fn duplicate_keys_keep_later_field() {
        let shape = Shape::new()
            .field(Field::new("Name", |a: &mut Account, v: String| a.user = v))
            .field(Field::new("Other", |a: &mut Account, v: String| a.password = v).rename("NAME"));
        let decoder = Decoder::new(shape);
        assert_eq!(decoder.len(), 1);

        let mut acct = Account::default();
        decoder
            .decode_map(&mut acct, &map(&[("name", Value::from("z"))]))
            .unwrap();
        assert_eq!(acct.password, "z");
        assert!(acct.user.is_empty());
    }

    #[test]
    fn decoding_twice_gives_equal_records() {
        let decoder = Decoder::new(shape());
        let data = map(&[
            ("user", Value::from("bob")),
            ("password", Value::from("b0b")),
            ("age", Value::Float64(12.7)),
        ]);

        let mut a = Account::default();
        let mut b = Account::default();
        decoder.decode_map(&mut a, &data).unwrap();
        decoder.decode_map(&mut b, &data).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.age, 12);
    }

    impl Form for Account {
        fn shape() -> Shape<Self> {
            shape()
        }
    }

    #[test]
    fn cached_decoder_is_shared() {
        let first = decoder_for::<Account>();
        let second = decoder_for::<Account>();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn top_level_decode_uses_form_shape() {
        let mut acct = Account::default();
        let data = map(&[("user", Value::from("amy")), ("password", Value::from("pw"))]);
        decode(&mut acct, data).unwrap();
        assert_eq!(acct.user, "amy");
        assert_eq!(acct.password, "pw");
    }
}
