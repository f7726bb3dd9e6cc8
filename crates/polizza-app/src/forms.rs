// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::Date;

use crate::{
    ClaimStatus, CustomerId, FormKind, InvoiceStatus, PolicyId, PolicyStatus, ProductId,
    ProductType,
};

/// Client-side pre-submit validation failure, keyed by the offending field
/// so the form can render it inline next to the input -- the same display
/// path server-side 422 errors take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldError {}

pub type FormResult = Result<(), FieldError>;

/// Field-keyed validation messages, the shape HTTP 422 responses carry.
/// Recoverable: forms downcast this and render each message inline next to
/// its field, exactly like a [`FieldError`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn first_message(&self, field: &str) -> Option<&str> {
        self.errors
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        if first {
            f.write_str("validation failed")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFormInput {
    pub policy_number: String,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub status: PolicyStatus,
    pub effective_date: Date,
    pub expiry_date: Option<Date>,
    pub premium_cents: i64,
    pub insured_amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFormInput {
    pub policy_id: PolicyId,
    pub status: ClaimStatus,
    pub incident_date: Date,
    pub filed_date: Date,
    pub claimed_cents: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceFormInput {
    pub policy_id: PolicyId,
    pub status: InvoiceStatus,
    pub issued_date: Date,
    pub due_date: Date,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFormInput {
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub scopes: Vec<String>,
    pub min_days: Option<i32>,
    pub max_days: Option<i32>,
    pub premium_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormPayload {
    Policy(PolicyFormInput),
    Claim(ClaimFormInput),
    Invoice(InvoiceFormInput),
    Product(ProductFormInput),
}

const BASELINE_DATE: Date = Date::MIN;

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Policy(_) => FormKind::Policy,
            Self::Claim(_) => FormKind::Claim,
            Self::Invoice(_) => FormKind::Invoice,
            Self::Product(_) => FormKind::Product,
        }
    }

    pub fn blank_for(kind: FormKind) -> Self {
        match kind {
            FormKind::Policy => Self::Policy(PolicyFormInput {
                policy_number: String::new(),
                customer_id: CustomerId::new(0),
                product_id: ProductId::new(0),
                status: PolicyStatus::Draft,
                effective_date: BASELINE_DATE,
                expiry_date: None,
                premium_cents: 0,
                insured_amount_cents: 0,
            }),
            FormKind::Claim => Self::Claim(ClaimFormInput {
                policy_id: PolicyId::new(0),
                status: ClaimStatus::Open,
                incident_date: BASELINE_DATE,
                filed_date: BASELINE_DATE,
                claimed_cents: 0,
                description: String::new(),
            }),
            FormKind::Invoice => Self::Invoice(InvoiceFormInput {
                policy_id: PolicyId::new(0),
                status: InvoiceStatus::Issued,
                issued_date: BASELINE_DATE,
                due_date: BASELINE_DATE,
                amount_cents: 0,
            }),
            FormKind::Product => Self::Product(ProductFormInput {
                name: String::new(),
                code: String::new(),
                product_type: ProductType::Medical,
                scopes: Vec::new(),
                min_days: None,
                max_days: None,
                premium_cents: 0,
            }),
        }
    }

    pub fn validate(&self) -> FormResult {
        match self {
            Self::Policy(policy) => policy.validate(),
            Self::Claim(claim) => claim.validate(),
            Self::Invoice(invoice) => invoice.validate(),
            Self::Product(product) => product.validate(),
        }
    }
}

impl PolicyFormInput {
    pub fn validate(&self) -> FormResult {
        if self.policy_number.trim().is_empty() {
            return Err(FieldError::new("policy_number", "policy number is required"));
        }
        if self.customer_id.get() <= 0 {
            return Err(FieldError::new("customer_id", "customer is required"));
        }
        if self.product_id.get() <= 0 {
            return Err(FieldError::new("product_id", "product is required"));
        }
        if let Some(expiry) = self.expiry_date
            && expiry < self.effective_date
        {
            return Err(FieldError::new(
                "expiry_date",
                "expiry date must be on/after effective date",
            ));
        }
        if self.premium_cents < 0 {
            return Err(FieldError::new("premium_cents", "premium cannot be negative"));
        }
        if self.insured_amount_cents <= 0 {
            return Err(FieldError::new(
                "insured_amount_cents",
                "insured amount must be positive",
            ));
        }
        Ok(())
    }
}

impl ClaimFormInput {
    pub fn validate(&self) -> FormResult {
        if self.policy_id.get() <= 0 {
            return Err(FieldError::new("policy_id", "policy is required"));
        }
        if self.filed_date < self.incident_date {
            return Err(FieldError::new(
                "filed_date",
                "filed date must be on/after incident date",
            ));
        }
        if self.claimed_cents <= 0 {
            return Err(FieldError::new(
                "claimed_cents",
                "claimed amount must be positive",
            ));
        }
        if self.description.trim().is_empty() {
            return Err(FieldError::new("description", "description is required"));
        }
        Ok(())
    }
}

impl InvoiceFormInput {
    pub fn validate(&self) -> FormResult {
        if self.policy_id.get() <= 0 {
            return Err(FieldError::new("policy_id", "policy is required"));
        }
        if self.due_date < self.issued_date {
            return Err(FieldError::new(
                "due_date",
                "due date must be on/after issued date",
            ));
        }
        if self.amount_cents <= 0 {
            return Err(FieldError::new("amount_cents", "amount must be positive"));
        }
        Ok(())
    }
}

impl ProductFormInput {
    pub fn validate(&self) -> FormResult {
        if self.name.trim().is_empty() {
            return Err(FieldError::new("name", "product name is required"));
        }
        if self.code.trim().is_empty() {
            return Err(FieldError::new("code", "product code is required"));
        }
        if self.scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(FieldError::new("scopes", "at least one scope is required"));
        }
        for days in [self.min_days, self.max_days].into_iter().flatten() {
            if days < 0 {
                return Err(FieldError::new("min_days", "term days cannot be negative"));
            }
        }
        if let (Some(min_days), Some(max_days)) = (self.min_days, self.max_days)
            && max_days < min_days
        {
            return Err(FieldError::new(
                "max_days",
                "max days must be on/after min days",
            ));
        }
        if self.premium_cents < 0 {
            return Err(FieldError::new("premium_cents", "premium cannot be negative"));
        }
        Ok(())
    }
}
