//! Form validation.
//!
//! Forms hold raw text as typed by the user. `validate()` either produces the
//! typed API input or a [`ValidationErrors`] map keyed by field name, so a
//! view can put each message next to its input. Nothing here talks to the
//! API; the server re-validates everything.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use market_core::{CategoryId, Email, Price};

use crate::api::{AddressInput, CategoryInput, ProductInput};
use crate::auth::Credentials;

/// Field-keyed validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("invalid form: {}", summarize(.0))]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

fn summarize(errors: &BTreeMap<&'static str, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`. The first message per field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

fn required(errors: &mut ValidationErrors, field: &'static str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "This field is required.");
    }
    trimmed.to_string()
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Login
// =============================================================================

/// Sign-in form.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

impl LoginForm {
    /// # Errors
    ///
    /// Returns field errors for `email` and `password`.
    pub fn validate(&self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = Email::parse(&self.email)
            .map_err(|e| errors.add("email", capitalize(&e.to_string())))
            .ok();
        if self.password.is_empty() {
            errors.add("password", "Password is required.");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(Credentials {
                email,
                password: SecretString::from(self.password.as_str()),
            }),
            _ => Err(errors),
        }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        format!("{}{}.", first.to_uppercase(), chars.as_str())
    })
}

// =============================================================================
// Address
// =============================================================================

/// Shipping address form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressForm {
    pub recipient_name: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressForm {
    const MIN_PHONE_DIGITS: usize = 7;
    const MAX_PHONE_DIGITS: usize = 15;

    /// # Errors
    ///
    /// Returns field errors for missing fields, a malformed postal code or an
    /// implausible phone number.
    pub fn validate(&self) -> Result<AddressInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let recipient_name = required(&mut errors, "recipient_name", &self.recipient_name);
        let street = required(&mut errors, "street", &self.street);
        let city = required(&mut errors, "city", &self.city);
        let country = required(&mut errors, "country", &self.country);

        let postal_code = required(&mut errors, "postal_code", &self.postal_code);
        let postal_ok = (3..=10).contains(&postal_code.len())
            && postal_code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-');
        if !postal_code.is_empty() && !postal_ok {
            errors.add("postal_code", "Enter a valid postal code.");
        }

        let phone = required(&mut errors, "phone", &self.phone);
        if !phone.is_empty() && !Self::plausible_phone(&phone) {
            errors.add("phone", "Enter a valid phone number.");
        }

        errors.into_result(|| AddressInput {
            recipient_name,
            street,
            city,
            state: optional(self.state.as_deref()),
            postal_code: postal_code.to_uppercase(),
            country,
            phone,
            is_default: self.is_default,
        })
    }

    /// Digits with an optional leading `+` and spaces, dashes, dots or
    /// parentheses as separators.
    fn plausible_phone(phone: &str) -> bool {
        let body = phone.strip_prefix('+').unwrap_or(phone);
        let separators_ok = body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.' | '(' | ')'));
        let digits = body.chars().filter(char::is_ascii_digit).count();
        separators_ok && (Self::MIN_PHONE_DIGITS..=Self::MAX_PHONE_DIGITS).contains(&digits)
    }
}

// =============================================================================
// Admin catalog forms
// =============================================================================

/// Product editor form (admin).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: String,
    pub stock: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl ProductForm {
    /// # Errors
    ///
    /// Returns field errors for a missing name, a non-positive or
    /// non-numeric price, or a stock count that is not a whole number.
    pub fn validate(&self) -> Result<ProductInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = required(&mut errors, "name", &self.name);

        let price = match Decimal::from_str(self.price.trim()) {
            Ok(amount) if amount > Decimal::ZERO => Price::new(amount),
            Ok(_) => {
                errors.add("price", "Price must be greater than zero.");
                Price::ZERO
            }
            Err(_) => {
                errors.add("price", "Enter a price like 12.50.");
                Price::ZERO
            }
        };

        let stock = self.stock.trim().parse::<u32>().unwrap_or_else(|_| {
            errors.add("stock", "Stock must be a whole number of 0 or more.");
            0
        });

        errors.into_result(|| ProductInput {
            name,
            description: optional(self.description.as_deref()),
            price,
            stock,
            image_url: optional(self.image_url.as_deref()),
            category_id: self.category_id,
        })
    }
}

/// Category editor form (admin).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CategoryForm {
    /// # Errors
    ///
    /// Returns a field error when the name is blank.
    pub fn validate(&self) -> Result<CategoryInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = required(&mut errors, "name", &self.name);
        errors.into_result(|| CategoryInput {
            name,
            description: optional(self.description.as_deref()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn address() -> AddressForm {
        AddressForm {
            recipient_name: " Ada Lovelace ".to_string(),
            street: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: Some("  ".to_string()),
            postal_code: "ec1a 1bb".to_string(),
            country: "GB".to_string(),
            phone: "+44 20 7946 0958".to_string(),
            is_default: true,
        }
    }

    #[test]
    fn test_login_valid() {
        let form = LoginForm {
            email: " shopper@Example.com ".to_string(),
            password: "hunter22".to_string(),
            remember_me: true,
        };
        let credentials = form.validate().unwrap();
        assert_eq!(credentials.email.as_str(), "shopper@example.com");
        assert_eq!(credentials.password.expose_secret(), "hunter22");
    }

    #[test]
    fn test_login_reports_both_fields() {
        let errors = LoginForm {
            email: "nope".to_string(),
            password: String::new(),
            remember_me: false,
        }
        .validate()
        .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("email"), Some("Email must look like name@domain."));
        assert_eq!(errors.get("password"), Some("Password is required."));
    }

    #[test]
    fn test_address_valid_is_normalized() {
        let input = address().validate().unwrap();
        assert_eq!(input.recipient_name, "Ada Lovelace");
        assert_eq!(input.state, None);
        assert_eq!(input.postal_code, "EC1A 1BB");
        assert!(input.is_default);
    }

    #[test]
    fn test_address_required_fields() {
        let errors = AddressForm::default().validate().unwrap_err();
        for field in ["recipient_name", "street", "city", "postal_code", "country", "phone"] {
            assert_eq!(errors.get(field), Some("This field is required."), "{field}");
        }
    }

    #[test]
    fn test_address_rejects_bad_phone_and_postal_code() {
        let form = AddressForm {
            phone: "call me".to_string(),
            postal_code: "!!".to_string(),
            ..address()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("phone"), Some("Enter a valid phone number."));
        assert_eq!(errors.get("postal_code"), Some("Enter a valid postal code."));

        let short = AddressForm {
            phone: "12345".to_string(),
            ..address()
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_product_form() {
        let input = ProductForm {
            name: "Dried Mango".to_string(),
            description: Some(String::new()),
            price: "8.99".to_string(),
            stock: "40".to_string(),
            image_url: None,
            category_id: Some(CategoryId::new(2)),
        }
        .validate()
        .unwrap();
        assert_eq!(input.price, Price::from_cents(899));
        assert_eq!(input.stock, 40);
        assert_eq!(input.description, None);
    }

    #[test]
    fn test_product_form_errors() {
        let errors = ProductForm {
            name: " ".to_string(),
            price: "0".to_string(),
            stock: "-3".to_string(),
            ..ProductForm::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("name"), Some("This field is required."));
        assert_eq!(errors.get("price"), Some("Price must be greater than zero."));
        assert!(errors.get("stock").is_some());

        let errors = ProductForm {
            name: "Tea".to_string(),
            price: "cheap".to_string(),
            stock: "1".to_string(),
            ..ProductForm::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("price"), Some("Enter a price like 12.50."));
    }

    #[test]
    fn test_category_form() {
        assert!(CategoryForm::default().validate().is_err());
        let input = CategoryForm {
            name: "Snacks".to_string(),
            description: None,
        }
        .validate()
        .unwrap();
        assert_eq!(input.name, "Snacks");
    }

    #[test]
    fn test_error_display_lists_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "required");
        errors.add("name", "ignored");
        errors.add("city", "required");
        assert_eq!(errors.to_string(), "invalid form: city: required, name: required");
    }
}
