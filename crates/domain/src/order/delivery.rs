//! Delivery details supplied at checkout.

use common::CityId;
use serde::{Deserialize, Serialize};
use storage::Delivery;

use super::OrderError;

const ADDRESS_MAX: usize = 500;
const PHONE_MAX: usize = 20;
const SHORT_FIELD_MAX: usize = 50;
const NOTES_MAX: usize = 1000;

/// Unvalidated delivery input, as received from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    #[serde(rename = "delivery_address")]
    pub address: String,
    #[serde(rename = "delivery_city_id")]
    pub city_id: CityId,
    pub contact_phone: String,
    #[serde(rename = "delivery_entry", default)]
    pub entry: Option<String>,
    #[serde(rename = "delivery_floor", default)]
    pub floor: Option<String>,
    #[serde(rename = "delivery_apartment", default)]
    pub apartment: Option<String>,
    #[serde(rename = "delivery_intercom", default)]
    pub intercom: Option<String>,
    #[serde(rename = "delivery_notes", default)]
    pub notes: Option<String>,
}

impl DeliveryDetails {
    /// Minimal valid details.
    pub fn new(
        address: impl Into<String>,
        city_id: CityId,
        contact_phone: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            city_id,
            contact_phone: contact_phone.into(),
            entry: None,
            floor: None,
            apartment: None,
            intercom: None,
            notes: None,
        }
    }

    /// Trims every field, turns blank optional fields into `None` and checks
    /// required fields and length limits. Lengths count characters.
    ///
    /// Whether the city exists is checked by the order workflow.
    pub fn validate(self) -> Result<Delivery, OrderError> {
        Ok(Delivery {
            address: required("delivery_address", self.address, ADDRESS_MAX)?,
            entry: optional("delivery_entry", self.entry, SHORT_FIELD_MAX)?,
            floor: optional("delivery_floor", self.floor, SHORT_FIELD_MAX)?,
            apartment: optional("delivery_apartment", self.apartment, SHORT_FIELD_MAX)?,
            intercom: optional("delivery_intercom", self.intercom, SHORT_FIELD_MAX)?,
            city_id: self.city_id,
            contact_phone: required("contact_phone", self.contact_phone, PHONE_MAX)?,
            notes: optional("delivery_notes", self.notes, NOTES_MAX)?,
        })
    }
}

fn required(field: &'static str, value: String, max: usize) -> Result<String, OrderError> {
    optional(field, Some(value), max)?.ok_or_else(|| OrderError::InvalidDelivery {
        field,
        reason: "is required".to_string(),
    })
}

fn optional(
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, OrderError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max {
        return Err(OrderError::InvalidDelivery {
            field,
            reason: format!("must be at most {max} characters"),
        });
    }
    Ok(Some(trimmed.to_string()))
}
