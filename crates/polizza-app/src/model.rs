// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::ids::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Draft,
    Active,
    Lapsed,
    Cancelled,
    Expired,
}

impl PolicyStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Lapsed => "lapsed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "lapsed" => Some(Self::Lapsed),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Open,
    UnderReview,
    Approved,
    Rejected,
    Paid,
}

impl ClaimStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "under_review" => Some(Self::UnderReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Issued,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Void => "void",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "issued" => Some(Self::Issued),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            "void" => Some(Self::Void),
            _ => None,
        }
    }
}

/// Product line of business. The table views expose this as the `type`
/// filter, where the UI sentinel `all` means "no filter at all".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Medical,
    Life,
    Accident,
    Property,
}

impl ProductType {
    pub const ALL: [Self; 4] = [Self::Medical, Self::Life, Self::Accident, Self::Property];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Life => "life",
            Self::Accident => "accident",
            Self::Property => "property",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "medical" => Some(Self::Medical),
            "life" => Some(Self::Life),
            "accident" => Some(Self::Accident),
            "property" => Some(Self::Property),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Policies,
    Claims,
    Invoices,
    Products,
    Settings,
}

impl TabKind {
    pub const ALL: [Self; 5] = [
        Self::Policies,
        Self::Claims,
        Self::Invoices,
        Self::Products,
        Self::Settings,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Policies => "policies",
            Self::Claims => "claims",
            Self::Invoices => "invoices",
            Self::Products => "products",
            Self::Settings => "settings",
        }
    }

    /// Path segment of the backend search endpoint for this tab.
    pub const fn entity_path(self) -> Option<&'static str> {
        match self {
            Self::Policies => Some("policies"),
            Self::Claims => Some("claims"),
            Self::Invoices => Some("invoices"),
            Self::Products => Some("products"),
            Self::Settings => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Policy,
    Claim,
    Invoice,
    Product,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Edit,
    Form(FormKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    /// Coverage scopes sold under this product (for example
    /// "hospitalization", "outpatient", "death_benefit").
    pub scopes: Vec<String>,
    /// Shortest and longest insurable term, normalized by the backend to
    /// days per unit term. Sorting on these columns uses the physical
    /// `min_days_by_unit_term` / `max_days_by_unit_term` fields.
    pub min_days: Option<i32>,
    pub max_days: Option<i32>,
    pub premium_cents: i64,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub policy_number: String,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub product_id: ProductId,
    pub product_name: String,
    pub status: PolicyStatus,
    pub effective_date: Date,
    pub expiry_date: Option<Date>,
    pub premium_cents: i64,
    pub insured_amount_cents: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub claim_number: String,
    pub policy_id: PolicyId,
    pub policy_number: String,
    pub status: ClaimStatus,
    pub incident_date: Date,
    pub filed_date: Date,
    pub claimed_cents: i64,
    pub approved_cents: Option<i64>,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub policy_id: PolicyId,
    pub policy_number: String,
    pub status: InvoiceStatus,
    pub issued_date: Date,
    pub due_date: Date,
    pub amount_cents: i64,
    pub paid_date: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
