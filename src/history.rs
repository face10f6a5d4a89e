//! Partial-update merge and field-level change history.
//!
//! Each resource type declares its mergeable fields once as a list of [`MergeField`]s.
//! [`merge`] copies every non-default incoming field onto the current record and, for
//! types that track history, records labelled fields whose rendered value changed.

use crate::resource::Resource;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TRUE_TOKEN: &str = "oui";
pub const FALSE_TOKEN: &str = "non";
/// Shown for a related record that has no display name.
pub const UNNAMED: &str = "...";
pub const UNKNOWN_TYPE_PREFIX: &str = "Type inconnu : ";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub field: String,
    #[serde(rename = "oldValue")]
    pub old_value: String,
    #[serde(rename = "newValue")]
    pub new_value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn is_zero(&self) -> bool {
        match self {
            Scalar::Bool(b) => !b,
            Scalar::Int(n) => *n == 0,
            Scalar::Float(f) => *f == 0.0,
            Scalar::Text(s) => s.is_empty(),
        }
    }

    fn render(&self) -> String {
        match self {
            Scalar::Bool(true) => TRUE_TOKEN.to_string(),
            Scalar::Bool(false) => FALSE_TOKEN.to_string(),
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// Diffable view of one field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(Scalar),
    /// Optional scalar; `None` is the default.
    Nullable(Option<Scalar>),
    /// Related record: `None` when unset, `Some(None)` when it has no display name.
    ToOne(Option<Option<String>>),
    /// Related records' display names.
    ToMany(Vec<Option<String>>),
    /// A field the engine cannot render.
    Opaque { type_name: &'static str, is_default: bool },
}

impl FieldValue {
    pub fn is_default(&self) -> bool {
        match self {
            FieldValue::Scalar(s) => s.is_zero(),
            FieldValue::Nullable(v) => v.is_none(),
            FieldValue::ToOne(v) => v.is_none(),
            FieldValue::ToMany(v) => v.is_empty(),
            FieldValue::Opaque { is_default, .. } => *is_default,
        }
    }

    pub fn render(&self) -> String {
        match self {
            FieldValue::Scalar(s) => s.render(),
            FieldValue::Nullable(v) => v.as_ref().map(Scalar::render).unwrap_or_default(),
            FieldValue::ToOne(None) => String::new(),
            FieldValue::ToOne(Some(name)) => name.clone().unwrap_or_else(|| UNNAMED.to_string()),
            FieldValue::ToMany(names) => names
                .iter()
                .map(|n| n.as_deref().unwrap_or(UNNAMED))
                .collect::<Vec<_>>()
                .join(","),
            FieldValue::Opaque { type_name, .. } => format!("{}{}", UNKNOWN_TYPE_PREFIX, type_name),
        }
    }
}

/// Display name of a related record.
pub trait Named {
    fn display_name(&self) -> Option<String>;
}

pub trait IntoFieldValue {
    fn field_value(&self) -> FieldValue;
}

/// Scalars usable directly or behind `Option`.
pub trait ToScalar {
    fn to_scalar(&self) -> Scalar;
}

macro_rules! scalar_impls {
    ($variant:ident, $conv:expr; $($t:ty),*) => {
        $(
            impl ToScalar for $t {
                fn to_scalar(&self) -> Scalar {
                    Scalar::$variant($conv(self))
                }
            }

            impl IntoFieldValue for $t {
                fn field_value(&self) -> FieldValue {
                    FieldValue::Scalar(self.to_scalar())
                }
            }

            impl IntoFieldValue for Option<$t> {
                fn field_value(&self) -> FieldValue {
                    FieldValue::Nullable(self.as_ref().map(ToScalar::to_scalar))
                }
            }
        )*
    };
}

scalar_impls!(Bool, |v: &bool| *v; bool);
scalar_impls!(Int, |v: &_| i64::from(*v); i8, i16, i32, i64, u8, u16, u32);
scalar_impls!(Int, |v: &_| i64::try_from(*v).unwrap_or(i64::MAX); u64, usize, isize);
scalar_impls!(Float, |v: &_| f64::from(*v); f32, f64);
scalar_impls!(Text, |v: &String| v.clone(); String);

macro_rules! nullable_only_impls {
    ($($t:ty),*) => {
        $(
            impl ToScalar for $t {
                fn to_scalar(&self) -> Scalar {
                    Scalar::Text(self.to_string())
                }
            }

            impl IntoFieldValue for Option<$t> {
                fn field_value(&self) -> FieldValue {
                    FieldValue::Nullable(self.as_ref().map(ToScalar::to_scalar))
                }
            }
        )*
    };
}

// Dates and uuids have no meaningful zero value, so they only merge as optional fields.
nullable_only_impls!(NaiveDate, NaiveDateTime, DateTime<Utc>, Uuid);

impl<T: Named> IntoFieldValue for Vec<T> {
    fn field_value(&self) -> FieldValue {
        FieldValue::ToMany(self.iter().map(Named::display_name).collect())
    }
}

impl<T: Named> IntoFieldValue for Option<Box<T>> {
    fn field_value(&self) -> FieldValue {
        FieldValue::ToOne(self.as_ref().map(|t| t.display_name()))
    }
}

/// One mergeable field of `R`: how to read it and how to copy it from the incoming record.
pub struct MergeField<R> {
    pub name: &'static str,
    /// History label; unlabelled fields are merged but never recorded.
    pub label: Option<&'static str>,
    pub get: fn(&R) -> FieldValue,
    pub set: fn(&mut R, &R),
}

impl<R> MergeField<R> {
    pub fn new(name: &'static str, get: fn(&R) -> FieldValue, set: fn(&mut R, &R)) -> Self {
        MergeField {
            name,
            label: None,
            get,
            set,
        }
    }

    pub fn labelled(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }
}

impl<R> Clone for MergeField<R> {
    fn clone(&self) -> Self {
        MergeField {
            name: self.name,
            label: self.label,
            get: self.get,
            set: self.set,
        }
    }
}

/// Build a [`MergeField`] for a struct field whose type implements [`IntoFieldValue`] and `Clone`.
///
/// ```ignore
/// merge_field!(Note, title, "Titre")
/// ```
#[macro_export]
macro_rules! merge_field {
    ($ty:ty, $field:ident) => {
        $crate::history::MergeField::<$ty>::new(
            stringify!($field),
            |r: &$ty| $crate::history::IntoFieldValue::field_value(&r.$field),
            |dst: &mut $ty, src: &$ty| dst.$field = src.$field.clone(),
        )
    };
    ($ty:ty, $field:ident, $label:expr) => {
        $crate::merge_field!($ty, $field).labelled($label)
    };
}

/// Copy every non-default field of `incoming` onto `current`, in declared order.
///
/// Returns the change list (empty unless `R::TRACKS_HISTORY`); tracking types also
/// receive it through `set_history`.
pub fn merge<R: Resource>(current: &mut R, incoming: &R, fields: &[MergeField<R>]) -> Vec<ChangeRecord> {
    let mut changes = Vec::new();
    for field in fields {
        let new = (field.get)(incoming);
        if new.is_default() {
            continue;
        }
        if R::TRACKS_HISTORY {
            if let Some(label) = field.label {
                let old_value = (field.get)(current).render();
                let new_value = new.render();
                if old_value != new_value {
                    changes.push(ChangeRecord {
                        field: label.to_string(),
                        old_value,
                        new_value,
                    });
                }
            }
        }
        (field.set)(current, incoming);
    }
    if R::TRACKS_HISTORY {
        current.set_history(changes.clone());
    }
    changes
}
