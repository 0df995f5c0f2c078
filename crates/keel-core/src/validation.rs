//! Field-level validation rules
//!
//! Input types implement [`Validate`] by declaring their rules in order:
//!
//! ```
//! use keel_core::validation::{Validate, Validator};
//!
//! struct Signup {
//!     email: String,
//!     name: String,
//! }
//!
//! impl Validate for Signup {
//!     fn rules(&self, v: &mut Validator) {
//!         v.field("email", &self.email).required().email();
//!         v.field("name", &self.name).required().min_len(2).max_len(64);
//!     }
//! }
//! ```
//!
//! Each field reports at most one error, the first rule it fails. Rules other
//! than `required` skip absent values (`None`, empty strings, empty lists).

use std::fmt::Display;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{FieldError, HttpError};

/// Semantic validation for a bound input
pub trait Validate {
    /// Declare field rules in evaluation order
    fn rules(&self, v: &mut Validator);

    /// Cross-field check, run only once every field rule passed
    ///
    /// # Errors
    ///
    /// Returns the error to send back to the client
    fn check(&self) -> Result<(), HttpError> {
        Ok(())
    }
}

/// Run field rules then the cross-field check
///
/// # Errors
///
/// Returns a `VALIDATION_ERROR` carrying one entry per failing field, or the
/// error produced by [`Validate::check`]
pub fn validate<T: Validate + ?Sized>(value: &T) -> Result<(), HttpError> {
    let mut validator = Validator::default();
    value.rules(&mut validator);
    validator.finish()?;
    value.check()
}

/// Inputs without rules
impl Validate for () {
    fn rules(&self, _: &mut Validator) {}
}

impl<T: Validate> Validate for Option<T> {
    fn rules(&self, v: &mut Validator) {
        if let Some(inner) = self {
            inner.rules(v);
        }
    }
}

/// Collects field errors while rules run
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
    prefix: Vec<String>,
}

impl Validator {
    /// Start a rule chain for one field
    pub fn field<'a, V: ?Sized>(&'a mut self, name: &str, value: &'a V) -> Field<'a, V> {
        let path = self.path(name);
        Field {
            validator: self,
            path,
            value,
            failed: false,
        }
    }

    /// Validate a nested structure under `name`
    pub fn nested<T: Validate + ?Sized>(&mut self, name: &str, value: &T) {
        self.prefix.push(name.to_owned());
        value.rules(self);
        self.prefix.pop();
    }

    /// Validate every element of a list under `name[index]`
    pub fn each<T: Validate>(&mut self, name: &str, items: &[T]) {
        for (index, item) in items.iter().enumerate() {
            self.prefix.push(format!("{name}[{index}]"));
            item.rules(self);
            self.prefix.pop();
        }
    }

    /// Record a failure produced outside the built-in rules
    pub fn add(&mut self, name: &str, message: impl Into<String>) {
        let path = self.path(name);
        self.errors.push(FieldError::new(path, message));
    }

    /// Errors collected so far
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Finish validation
    ///
    /// # Errors
    ///
    /// Returns a `VALIDATION_ERROR` when at least one field failed
    pub fn finish(self) -> Result<(), HttpError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(HttpError::validation(self.errors))
        }
    }

    fn path(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{}.{name}", self.prefix.join("."))
        }
    }
}

/// Rule chain for a single field
///
/// Stops evaluating after the first failing rule.
pub struct Field<'a, V: ?Sized> {
    validator: &'a mut Validator,
    path: String,
    value: &'a V,
    failed: bool,
}

impl<V: ?Sized> Field<'_, V> {
    fn rule(mut self, passes: impl FnOnce(&V) -> bool, message: impl FnOnce() -> String) -> Self {
        if !self.failed && !passes(self.value) {
            self.failed = true;
            self.validator
                .errors
                .push(FieldError::new(std::mem::take(&mut self.path), message()));
        }
        self
    }

    /// Value must be present
    pub fn required(self) -> Self
    where
        V: Presence,
    {
        self.rule(Presence::is_present, || "required".to_owned())
    }

    /// Custom predicate
    pub fn satisfies(self, predicate: impl FnOnce(&V) -> bool, message: &str) -> Self {
        self.rule(predicate, || message.to_owned())
    }

    /// Minimum length in characters or items
    pub fn min_len(self, min: usize) -> Self
    where
        V: Length,
    {
        self.rule(
            |v| v.length().is_none_or(|len| len >= min),
            || format!("must be at least {min} {}", V::UNIT),
        )
    }

    /// Maximum length in characters or items
    pub fn max_len(self, max: usize) -> Self
    where
        V: Length,
    {
        self.rule(
            |v| v.length().is_none_or(|len| len <= max),
            || format!("must be at most {max} {}", V::UNIT),
        )
    }

    /// Minimum numeric value
    pub fn min(self, min: f64) -> Self
    where
        V: Numeric,
    {
        self.rule(|v| v.number().is_none_or(|n| n >= min), || format!("must be at least {min}"))
    }

    /// Maximum numeric value
    pub fn max(self, max: f64) -> Self
    where
        V: Numeric,
    {
        self.rule(|v| v.number().is_none_or(|n| n <= max), || format!("must be at most {max}"))
    }

    /// Value must be one of the listed options
    pub fn one_of<T: AsRef<str> + Display>(self, options: &[T]) -> Self
    where
        V: Text,
    {
        self.rule(
            |v| v.text().is_none_or(|s| options.iter().any(|o| o.as_ref() == s)),
            || {
                let options: Vec<String> = options.iter().map(ToString::to_string).collect();
                format!("must be one of: {}", options.join(", "))
            },
        )
    }

    /// Value must look like an email address
    pub fn email(self) -> Self
    where
        V: Text,
    {
        self.matches(email_regex(), "must be a valid email address")
    }

    /// Value must be an E.164-style phone number
    pub fn phone(self) -> Self
    where
        V: Text,
    {
        self.matches(phone_regex(), "must be a valid phone number")
    }

    /// Value must parse as a UUID
    pub fn uuid(self) -> Self
    where
        V: Text,
    {
        self.rule(
            |v| v.text().is_none_or(|s| uuid::Uuid::parse_str(s).is_ok()),
            || "must be a valid UUID".to_owned(),
        )
    }

    /// Value must match a regular expression
    pub fn matches(self, pattern: &Regex, message: &str) -> Self
    where
        V: Text,
    {
        self.rule(|v| v.text().is_none_or(|s| pattern.is_match(s)), || message.to_owned())
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("must be valid regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[1-9][0-9]{7,14}$").expect("must be valid regex"))
}

/// Values that can be checked for presence
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for str {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

/// Values with a length; `None` means absent
pub trait Length {
    /// Unit used in messages
    const UNIT: &'static str;

    fn length(&self) -> Option<usize>;
}

impl Length for str {
    const UNIT: &'static str = "characters";

    fn length(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.chars().count())
    }
}

impl Length for String {
    const UNIT: &'static str = "characters";

    fn length(&self) -> Option<usize> {
        self.as_str().length()
    }
}

impl<T> Length for Vec<T> {
    const UNIT: &'static str = "items";

    fn length(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.len())
    }
}

impl<T: Length> Length for Option<T> {
    const UNIT: &'static str = T::UNIT;

    fn length(&self) -> Option<usize> {
        self.as_ref().and_then(Length::length)
    }
}

/// String-like values; `None` means absent
pub trait Text {
    fn text(&self) -> Option<&str>;
}

impl Text for str {
    fn text(&self) -> Option<&str> {
        (!self.is_empty()).then_some(self)
    }
}

impl Text for String {
    fn text(&self) -> Option<&str> {
        self.as_str().text()
    }
}

impl<T: Text> Text for Option<T> {
    fn text(&self) -> Option<&str> {
        self.as_ref().and_then(Text::text)
    }
}

/// Numeric values; `None` means absent
pub trait Numeric {
    fn number(&self) -> Option<f64>;
}

macro_rules! numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
                fn number(&self) -> Option<f64> {
                    Some(*self as f64)
                }
            }

            impl Presence for $ty {
                fn is_present(&self) -> bool {
                    *self != (0 as $ty)
                }
            }
        )*
    };
}

numeric!(i16, i32, i64, u16, u32, u64, usize, f32, f64);

impl<T: Numeric> Numeric for Option<T> {
    fn number(&self) -> Option<f64> {
        self.as_ref().and_then(Numeric::number)
    }
}
