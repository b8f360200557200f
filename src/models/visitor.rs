//! Visitor model (one seat reservation for one service)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Placeholder written into every personal field of an anonymous walk-in visitor
pub const ANONYMOUS_SENTINEL: &str = "anonymous";

/// Visitor record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    /// Registration id handed to the visitor
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub street: String,
    pub zip: String,
    pub city: String,
    pub phone: String,
    pub email: String,
    /// Free-form key/value data supplied at registration
    #[schema(value_type = Object)]
    pub additional_data: serde_json::Value,
    pub is_anonymized: bool,
    pub service_id: i32,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn is_object(value: &serde_json::Value) -> Result<(), ValidationError> {
    if value.is_object() {
        Ok(())
    } else {
        Err(ValidationError::new("not_an_object"))
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Personal data supplied with a registration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonalData {
    #[validate(custom(function = "not_blank", message = "Name is required"))]
    pub name: String,
    #[validate(custom(function = "not_blank", message = "Surname is required"))]
    pub surname: String,
    #[validate(custom(function = "not_blank", message = "Street is required"))]
    pub street: String,
    #[validate(custom(function = "not_blank", message = "Zip is required"))]
    pub zip: String,
    #[validate(custom(function = "not_blank", message = "City is required"))]
    pub city: String,
    #[validate(custom(function = "not_blank", message = "Phone is required"))]
    pub phone: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[serde(default = "empty_object")]
    #[validate(custom(function = "is_object", message = "additionalData must be an object"))]
    #[schema(value_type = Object)]
    pub additional_data: serde_json::Value,
}

impl PersonalData {
    /// Placeholder identity for walk-in seats
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS_SENTINEL.to_string(),
            surname: ANONYMOUS_SENTINEL.to_string(),
            street: ANONYMOUS_SENTINEL.to_string(),
            zip: ANONYMOUS_SENTINEL.to_string(),
            city: ANONYMOUS_SENTINEL.to_string(),
            phone: ANONYMOUS_SENTINEL.to_string(),
            email: Some(ANONYMOUS_SENTINEL.to_string()),
            additional_data: empty_object(),
        }
    }
}

/// Visitor row about to be inserted
#[derive(Debug, Clone)]
pub struct NewVisitor {
    pub id: Uuid,
    pub service_id: i32,
    pub personal: PersonalData,
}

impl NewVisitor {
    pub fn new(service_id: i32, personal: PersonalData) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            personal,
        }
    }

    pub fn into_visitor(self) -> Visitor {
        Visitor {
            id: self.id,
            name: self.personal.name,
            surname: self.personal.surname,
            street: self.personal.street,
            zip: self.personal.zip,
            city: self.personal.city,
            phone: self.personal.phone,
            email: self.personal.email.unwrap_or_default(),
            additional_data: self.personal.additional_data,
            is_anonymized: false,
            service_id: self.service_id,
        }
    }
}

/// Replacement values written over a visitor's personal data
#[derive(Debug, Clone, PartialEq)]
pub struct ScrubbedIdentity {
    pub name: String,
}

/// Registration request
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVisitor {
    #[serde(flatten)]
    pub personal: PersonalData,
    /// Services to book, validated in this order
    pub service_ids: Vec<i32>,
}

/// Registration result: one visitor per requested service
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub visitors: Vec<Visitor>,
}

/// Query parameters for listing visitors
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct VisitorQuery {
    /// Restrict to one service
    pub service_id: Option<i32>,
}
