//! Checkout Form Validator
//!
//! Per-field validation state for the customer details form. Validation
//! is a pure function over (field, value, context) so it can be tested
//! without any UI; the form tracks which fields are dirty and assembles
//! the submission payload.
//!
//! Dirty lifecycle: a field becomes dirty on its first change and stays
//! dirty until a validation pass clears it, so a failing field is
//! re-checked on every keystroke while a passing one is left alone until
//! touched again.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z' -]{1,99}$").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()-]{7,20}$").unwrap());
static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z][0-9A-Za-z .,#'/-]{1,99}$").unwrap());
static PLACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z .'-]{1,99}$").unwrap());

static ZIP_US: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap());
static ZIP_CA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]\d[A-Za-z] ?\d[A-Za-z]\d$").unwrap());
static ZIP_GB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{1,2}\d[A-Za-z0-9]? ?\d[A-Za-z]{2}$").unwrap());
static ZIP_AU: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());
static ZIP_ANY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 -]{2,9}$").unwrap());

/// The fields of the checkout form
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckoutField {
    FirstName,
    LastName,
    Email,
    Phone,
    StreetAddress,
    AddressLine2,
    City,
    State,
    ZipCode,
    Country,
    Password,
    ConfirmPassword,
}

impl CheckoutField {
    pub const ALL: [CheckoutField; 12] = [
        CheckoutField::FirstName,
        CheckoutField::LastName,
        CheckoutField::Email,
        CheckoutField::Phone,
        CheckoutField::StreetAddress,
        CheckoutField::AddressLine2,
        CheckoutField::City,
        CheckoutField::State,
        CheckoutField::ZipCode,
        CheckoutField::Country,
        CheckoutField::Password,
        CheckoutField::ConfirmPassword,
    ];

    /// Wire name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutField::FirstName => "firstName",
            CheckoutField::LastName => "lastName",
            CheckoutField::Email => "email",
            CheckoutField::Phone => "phone",
            CheckoutField::StreetAddress => "streetAddress",
            CheckoutField::AddressLine2 => "addressLine2",
            CheckoutField::City => "city",
            CheckoutField::State => "state",
            CheckoutField::ZipCode => "zipCode",
            CheckoutField::Country => "country",
            CheckoutField::Password => "password",
            CheckoutField::ConfirmPassword => "confirmPassword",
        }
    }

    /// Label used in customer-facing messages
    pub fn label(&self) -> &'static str {
        match self {
            CheckoutField::FirstName => "First name",
            CheckoutField::LastName => "Last name",
            CheckoutField::Email => "Email",
            CheckoutField::Phone => "Phone number",
            CheckoutField::StreetAddress => "Street address",
            CheckoutField::AddressLine2 => "Address line 2",
            CheckoutField::City => "City",
            CheckoutField::State => "State",
            CheckoutField::ZipCode => "Postal code",
            CheckoutField::Country => "Country",
            CheckoutField::Password => "Password",
            CheckoutField::ConfirmPassword => "Password confirmation",
        }
    }
}

impl std::fmt::Display for CheckoutField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of a single form field
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldState {
    /// Current raw value
    pub value: String,

    /// Changed and not yet passing validation
    pub dirty: bool,

    /// Current validation error, if any
    pub error: Option<String>,
}

/// Cross-field inputs validation needs
#[derive(Clone, Copy, Debug)]
pub struct ValidationContext<'a> {
    /// Guest checkout (identity, contact and credential fields apply)
    pub guest: bool,

    /// Current country value, drives the postal code pattern
    pub country: &'a str,

    /// Current password value, for the confirmation check
    pub password: &'a str,
}

/// Validate one field value. `None` means the value passes.
pub fn validate(field: CheckoutField, value: &str, ctx: &ValidationContext<'_>) -> Option<String> {
    match field {
        CheckoutField::FirstName | CheckoutField::LastName => {
            if !ctx.guest {
                return None;
            }
            let v = value.trim();
            if v.is_empty() {
                return Some(required(field));
            }
            if !NAME_RE.is_match(v) {
                return Some("Use 2-100 letters; apostrophes and hyphens are allowed".into());
            }
            None
        }
        CheckoutField::Email => {
            if !ctx.guest {
                return None;
            }
            let v = value.trim();
            if v.is_empty() {
                return Some(required(field));
            }
            if !EMAIL_RE.is_match(v) {
                return Some("Enter a valid email address".into());
            }
            None
        }
        CheckoutField::Phone => {
            if !ctx.guest {
                return None;
            }
            let v = value.trim();
            if v.is_empty() {
                return Some(required(field));
            }
            if !PHONE_RE.is_match(v) {
                return Some("Enter a valid phone number".into());
            }
            None
        }
        CheckoutField::StreetAddress => {
            let v = value.trim();
            if v.is_empty() {
                return Some(required(field));
            }
            if !ADDRESS_RE.is_match(v) {
                return Some("Contains unsupported characters".into());
            }
            None
        }
        CheckoutField::AddressLine2 => {
            let v = value.trim();
            if v.is_empty() {
                return None;
            }
            if !ADDRESS_RE.is_match(v) {
                return Some("Contains unsupported characters".into());
            }
            None
        }
        CheckoutField::City | CheckoutField::State | CheckoutField::Country => {
            let v = value.trim();
            if v.is_empty() {
                return Some(required(field));
            }
            if !PLACE_RE.is_match(v) {
                return Some("Contains unsupported characters".into());
            }
            None
        }
        CheckoutField::ZipCode => {
            let v = value.trim();
            if v.is_empty() {
                return Some(required(field));
            }
            if !zip_pattern(ctx.country).is_match(v) {
                return Some("Enter a valid postal code".into());
            }
            None
        }
        CheckoutField::Password => {
            if !ctx.guest {
                return None;
            }
            if value.is_empty() {
                return Some(required(field));
            }
            password_complexity(value)
        }
        CheckoutField::ConfirmPassword => {
            if !ctx.guest {
                return None;
            }
            if value.is_empty() {
                return Some(required(field));
            }
            if value != ctx.password {
                return Some("Passwords do not match".into());
            }
            None
        }
    }
}

fn required(field: CheckoutField) -> String {
    format!("{} is required", field.label())
}

/// Postal code pattern for a country value
fn zip_pattern(country: &str) -> &'static Regex {
    match country.trim().to_uppercase().as_str() {
        "US" | "USA" | "UNITED STATES" => &ZIP_US,
        "CA" | "CANADA" => &ZIP_CA,
        "GB" | "UK" | "UNITED KINGDOM" => &ZIP_GB,
        "AU" | "AUSTRALIA" => &ZIP_AU,
        _ => &ZIP_ANY,
    }
}

/// 8-20 characters with at least one letter, one digit and one symbol
///
/// Checked by scanning character classes; the regex crate has no
/// lookahead.
fn password_complexity(value: &str) -> Option<String> {
    let length = value.chars().count();
    let has_letter = value.chars().any(char::is_alphabetic);
    let has_digit = value.chars().any(|c| c.is_ascii_digit());
    let has_symbol = value.chars().any(|c| !c.is_alphanumeric());

    if !(8..=20).contains(&length) || !has_letter || !has_digit || !has_symbol {
        return Some(
            "Password must be 8-20 characters and include a letter, a number, and a symbol"
                .into(),
        );
    }
    None
}

/// A failed field with its message
#[derive(Clone, Debug, Serialize)]
pub struct FieldError {
    pub field: CheckoutField,
    pub message: String,
}

/// All validation failures from a payload attempt
#[derive(Clone, Debug, Default, Serialize)]
pub struct FormErrors {
    pub fields: Vec<FieldError>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// One-line summary ("email: Enter a valid email address; ...")
    pub fn summary(&self) -> String {
        self.fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Identity and contact details, guest checkout only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// Shipping address details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPayload {
    pub street_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// Account credentials, guest checkout only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsPayload {
    pub password: String,
}

/// The validated customer details for submission
///
/// Identity and credentials are present for guests only; a signed-in
/// customer's account already holds them and they are never sent again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityPayload>,

    pub address: AddressPayload,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<CredentialsPayload>,
}

/// The checkout form: field states plus the checkout mode
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutForm {
    fields: HashMap<CheckoutField, FieldState>,
    guest: bool,
}

impl CheckoutForm {
    pub fn new(guest: bool) -> Self {
        let fields = CheckoutField::ALL
            .into_iter()
            .map(|field| (field, FieldState::default()))
            .collect();
        Self { fields, guest }
    }

    pub fn guest(&self) -> bool {
        self.guest
    }

    /// Current raw value of a field
    pub fn value(&self, field: CheckoutField) -> &str {
        self.fields
            .get(&field)
            .map(|s| s.value.as_str())
            .unwrap_or("")
    }

    /// Current validation error of a field
    pub fn error(&self, field: CheckoutField) -> Option<&str> {
        self.fields.get(&field).and_then(|s| s.error.as_deref())
    }

    /// Whether a field is flagged for re-validation
    pub fn is_dirty(&self, field: CheckoutField) -> bool {
        self.fields.get(&field).is_some_and(|s| s.dirty)
    }

    /// Update a field value
    ///
    /// Marks the field dirty on change; dirty fields are re-validated on
    /// every update and cleaned once they pass.
    pub fn set_field(&mut self, field: CheckoutField, value: impl Into<String>) {
        let value = value.into();
        let (guest, country, password) = self.snapshot();

        let state = self.fields.entry(field).or_default();
        if state.value != value {
            state.value = value;
            state.dirty = true;
        }

        if state.dirty {
            let ctx = ValidationContext {
                guest,
                country: &country,
                password: &password,
            };
            state.error = validate(field, &state.value, &ctx);
            if state.error.is_none() {
                state.dirty = false;
            }
        }
    }

    /// Validate everything and assemble the submission payload
    ///
    /// Marks every field dirty first so all errors surface at once. Never
    /// yields a payload alongside errors.
    pub fn payload(&mut self) -> std::result::Result<CheckoutPayload, FormErrors> {
        let (guest, country, password) = self.snapshot();
        let ctx = ValidationContext {
            guest,
            country: &country,
            password: &password,
        };

        let mut errors = FormErrors::default();
        for field in CheckoutField::ALL {
            let state = self.fields.entry(field).or_default();
            state.dirty = true;
            state.error = validate(field, &state.value, &ctx);
            match &state.error {
                Some(message) => errors.fields.push(FieldError {
                    field,
                    message: message.clone(),
                }),
                None => state.dirty = false,
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(self.build_payload())
    }

    fn snapshot(&self) -> (bool, String, String) {
        (
            self.guest,
            self.value(CheckoutField::Country).to_string(),
            self.value(CheckoutField::Password).to_string(),
        )
    }

    fn build_payload(&self) -> CheckoutPayload {
        let line2 = self.value(CheckoutField::AddressLine2).trim();
        let address = AddressPayload {
            street_address: self.value(CheckoutField::StreetAddress).trim().to_string(),
            address_line2: (!line2.is_empty()).then(|| line2.to_string()),
            city: self.value(CheckoutField::City).trim().to_string(),
            state: self.value(CheckoutField::State).trim().to_string(),
            zip_code: self.value(CheckoutField::ZipCode).trim().to_string(),
            country: self.value(CheckoutField::Country).trim().to_string(),
        };

        if self.guest {
            CheckoutPayload {
                identity: Some(IdentityPayload {
                    first_name: self.value(CheckoutField::FirstName).trim().to_string(),
                    last_name: self.value(CheckoutField::LastName).trim().to_string(),
                    email: self.value(CheckoutField::Email).trim().to_string(),
                    phone: self.value(CheckoutField::Phone).trim().to_string(),
                }),
                address,
                credentials: Some(CredentialsPayload {
                    password: self.value(CheckoutField::Password).to_string(),
                }),
            }
        } else {
            CheckoutPayload {
                identity: None,
                address,
                credentials: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest_ctx<'a>() -> ValidationContext<'a> {
        ValidationContext {
            guest: true,
            country: "US",
            password: "",
        }
    }

    fn fill_address(form: &mut CheckoutForm) {
        form.set_field(CheckoutField::StreetAddress, "123 Main St");
        form.set_field(CheckoutField::City, "Austin");
        form.set_field(CheckoutField::State, "TX");
        form.set_field(CheckoutField::ZipCode, "78701");
        form.set_field(CheckoutField::Country, "US");
    }

    fn fill_guest(form: &mut CheckoutForm) {
        form.set_field(CheckoutField::FirstName, "Ada");
        form.set_field(CheckoutField::LastName, "O'Brien");
        form.set_field(CheckoutField::Email, "ada@example.com");
        form.set_field(CheckoutField::Phone, "+1 (512) 555-0142");
        fill_address(form);
        form.set_field(CheckoutField::Password, "s3cret!pass");
        form.set_field(CheckoutField::ConfirmPassword, "s3cret!pass");
    }

    #[test]
    fn test_name_rules() {
        let ctx = guest_ctx();
        assert!(validate(CheckoutField::FirstName, "Ada", &ctx).is_none());
        assert!(validate(CheckoutField::LastName, "O'Brien-Smith", &ctx).is_none());
        assert!(validate(CheckoutField::FirstName, "A", &ctx).is_some());
        assert!(validate(CheckoutField::FirstName, "Ada3", &ctx).is_some());
        assert!(validate(CheckoutField::FirstName, "", &ctx).is_some());
    }

    #[test]
    fn test_identity_skipped_for_signed_in_customers() {
        let ctx = ValidationContext {
            guest: false,
            country: "US",
            password: "",
        };
        assert!(validate(CheckoutField::FirstName, "", &ctx).is_none());
        assert!(validate(CheckoutField::Email, "not-an-email", &ctx).is_none());
        assert!(validate(CheckoutField::Password, "", &ctx).is_none());
        // Address still applies.
        assert!(validate(CheckoutField::City, "", &ctx).is_some());
    }

    #[test]
    fn test_zip_pattern_follows_country() {
        let us = guest_ctx();
        assert!(validate(CheckoutField::ZipCode, "78701", &us).is_none());
        assert!(validate(CheckoutField::ZipCode, "78701-1234", &us).is_none());
        assert!(validate(CheckoutField::ZipCode, "ABC123", &us).is_some());

        let ca = ValidationContext {
            guest: true,
            country: "CA",
            password: "",
        };
        assert!(validate(CheckoutField::ZipCode, "K1A 0B1", &ca).is_none());
        assert!(validate(CheckoutField::ZipCode, "78701", &ca).is_some());
    }

    #[test]
    fn test_password_complexity() {
        let ctx = guest_ctx();
        assert!(validate(CheckoutField::Password, "s3cret!pass", &ctx).is_none());
        // Too short, no digit, no symbol, too long.
        assert!(validate(CheckoutField::Password, "a1!", &ctx).is_some());
        assert!(validate(CheckoutField::Password, "password!!", &ctx).is_some());
        assert!(validate(CheckoutField::Password, "password123", &ctx).is_some());
        assert!(
            validate(CheckoutField::Password, "a1!aaaaaaaaaaaaaaaaaaaaaa", &ctx).is_some()
        );
    }

    #[test]
    fn test_confirm_password_must_match() {
        let ctx = ValidationContext {
            guest: true,
            country: "US",
            password: "s3cret!pass",
        };
        assert!(validate(CheckoutField::ConfirmPassword, "s3cret!pass", &ctx).is_none());
        assert!(validate(CheckoutField::ConfirmPassword, "other!pass1", &ctx).is_some());
    }

    #[test]
    fn test_dirty_lifecycle() {
        let mut form = CheckoutForm::new(true);

        form.set_field(CheckoutField::Email, "not-an-email");
        assert!(form.is_dirty(CheckoutField::Email));
        assert!(form.error(CheckoutField::Email).is_some());

        // Still failing: stays dirty, message updates on every change.
        form.set_field(CheckoutField::Email, "still@wrong");
        assert!(form.is_dirty(CheckoutField::Email));

        // Passing clears both the error and the dirty flag.
        form.set_field(CheckoutField::Email, "ada@example.com");
        assert!(!form.is_dirty(CheckoutField::Email));
        assert!(form.error(CheckoutField::Email).is_none());
    }

    #[test]
    fn test_payload_surfaces_all_errors() {
        let mut form = CheckoutForm::new(true);
        form.set_field(CheckoutField::FirstName, "Ada");

        let errors = form.payload().unwrap_err();
        assert!(errors.fields.len() > 5);
        assert!(form.is_dirty(CheckoutField::Email));
        assert!(errors.summary().contains("email"));
    }

    #[test]
    fn test_guest_payload_includes_identity_and_credentials() {
        let mut form = CheckoutForm::new(true);
        fill_guest(&mut form);

        let payload = form.payload().unwrap();
        assert_eq!(payload.identity.as_ref().unwrap().first_name, "Ada");
        assert_eq!(
            payload.credentials.as_ref().unwrap().password,
            "s3cret!pass"
        );
        assert_eq!(payload.address.zip_code, "78701");
        assert_eq!(payload.address.address_line2, None);
    }

    #[test]
    fn test_signed_in_payload_strips_personal_sections() {
        let mut form = CheckoutForm::new(false);
        fill_address(&mut form);
        // Whatever was typed into identity fields never leaves the form.
        form.set_field(CheckoutField::Email, "should-not-appear");

        let payload = form.payload().unwrap();
        assert!(payload.identity.is_none());
        assert!(payload.credentials.is_none());
        assert_eq!(payload.address.city, "Austin");

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("identity").is_none());
        assert!(json.get("credentials").is_none());
    }

    #[test]
    fn test_address_line2_is_optional() {
        let mut form = CheckoutForm::new(false);
        fill_address(&mut form);
        assert!(form.payload().is_ok());

        form.set_field(CheckoutField::AddressLine2, "Apt 4B");
        let payload = form.payload().unwrap();
        assert_eq!(payload.address.address_line2.as_deref(), Some("Apt 4B"));
    }
}
