// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use polizza_api::Client;
use polizza_app::{
    Claim, ClaimId, FormPayload, Invoice, InvoiceId, PageQuery, Policy, PolicyId, Product,
    ProductId, SearchBody, SortDirection, SortEntry, TabKind, ValidationErrors,
};
use polizza_testkit::{DemoDataset, demo_dataset};
use polizza_tui::{AppRuntime, PageInfo, TabPage, TabRows};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// Production runtime: every UI request becomes one backend HTTP call.
pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for ApiRuntime {
    fn search_tab(&mut self, tab: TabKind, page: &PageQuery, body: &SearchBody) -> Result<TabPage> {
        let tab_page = match tab {
            TabKind::Policies => {
                let result = self.client.search_policies(page, body)?;
                TabPage {
                    rows: TabRows::Policies(result.data),
                    info: page_info(result.meta),
                }
            }
            TabKind::Claims => {
                let result = self.client.search_claims(page, body)?;
                TabPage {
                    rows: TabRows::Claims(result.data),
                    info: page_info(result.meta),
                }
            }
            TabKind::Invoices => {
                let result = self.client.search_invoices(page, body)?;
                TabPage {
                    rows: TabRows::Invoices(result.data),
                    info: page_info(result.meta),
                }
            }
            TabKind::Products => {
                let result = self.client.search_products(page, body)?;
                TabPage {
                    rows: TabRows::Products(result.data),
                    info: page_info(result.meta),
                }
            }
            TabKind::Settings => bail!("settings tab has no search endpoint"),
        };
        Ok(tab_page)
    }

    fn submit_create(&mut self, payload: &FormPayload) -> Result<()> {
        match payload {
            FormPayload::Policy(input) => {
                self.client.create_policy(input)?;
            }
            FormPayload::Claim(input) => {
                self.client.create_claim(input)?;
            }
            FormPayload::Invoice(input) => {
                self.client.create_invoice(input)?;
            }
            FormPayload::Product(input) => {
                self.client.create_product(input)?;
            }
        }
        Ok(())
    }

    fn submit_update(&mut self, tab: TabKind, row_id: i64, payload: &FormPayload) -> Result<()> {
        match (tab, payload) {
            (TabKind::Policies, FormPayload::Policy(input)) => {
                self.client.update_policy(PolicyId::new(row_id), input)?;
            }
            (TabKind::Claims, FormPayload::Claim(input)) => {
                self.client.update_claim(ClaimId::new(row_id), input)?;
            }
            (TabKind::Invoices, FormPayload::Invoice(input)) => {
                self.client.update_invoice(InvoiceId::new(row_id), input)?;
            }
            (TabKind::Products, FormPayload::Product(input)) => {
                self.client.update_product(ProductId::new(row_id), input)?;
            }
            (tab, _) => bail!("payload does not match the {} tab", tab.label()),
        }
        Ok(())
    }
}

fn page_info(meta: polizza_api::PageMeta) -> PageInfo {
    PageInfo {
        current_page: meta.current_page,
        per_page: meta.per_page,
        total: meta.total,
    }
}

/// Offline runtime for `--demo`: a seeded in-memory dataset served through
/// the same search semantics the backend implements.
pub struct DemoRuntime {
    data: DemoDataset,
}

impl DemoRuntime {
    pub fn new(seed: u64) -> Self {
        Self {
            data: demo_dataset(seed),
        }
    }
}

impl AppRuntime for DemoRuntime {
    fn search_tab(&mut self, tab: TabKind, page: &PageQuery, body: &SearchBody) -> Result<TabPage> {
        match tab {
            TabKind::Policies => {
                let mut rows: Vec<Policy> = self
                    .data
                    .policies
                    .iter()
                    .filter(|row| policy_matches(row, body))
                    .cloned()
                    .collect();
                sort_rows(&mut rows, &body.sort, cmp_policy_field);
                let (rows, info) = paginate(rows, page);
                Ok(TabPage {
                    rows: TabRows::Policies(rows),
                    info,
                })
            }
            TabKind::Claims => {
                let mut rows: Vec<Claim> = self
                    .data
                    .claims
                    .iter()
                    .filter(|row| claim_matches(row, body))
                    .cloned()
                    .collect();
                sort_rows(&mut rows, &body.sort, cmp_claim_field);
                let (rows, info) = paginate(rows, page);
                Ok(TabPage {
                    rows: TabRows::Claims(rows),
                    info,
                })
            }
            TabKind::Invoices => {
                let mut rows: Vec<Invoice> = self
                    .data
                    .invoices
                    .iter()
                    .filter(|row| invoice_matches(row, body))
                    .cloned()
                    .collect();
                sort_rows(&mut rows, &body.sort, cmp_invoice_field);
                let (rows, info) = paginate(rows, page);
                Ok(TabPage {
                    rows: TabRows::Invoices(rows),
                    info,
                })
            }
            TabKind::Products => {
                let mut rows: Vec<Product> = self
                    .data
                    .products
                    .iter()
                    .filter(|row| product_matches(row, body))
                    .cloned()
                    .collect();
                sort_rows(&mut rows, &body.sort, cmp_product_field);
                let (rows, info) = paginate(rows, page);
                Ok(TabPage {
                    rows: TabRows::Products(rows),
                    info,
                })
            }
            TabKind::Settings => bail!("settings tab has no search endpoint"),
        }
    }

    fn submit_create(&mut self, payload: &FormPayload) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        match payload {
            FormPayload::Policy(input) => {
                let Some(customer) = self
                    .data
                    .customers
                    .iter()
                    .find(|customer| customer.id == input.customer_id)
                else {
                    return Err(validation_error("customer_id", "unknown customer").into());
                };
                let Some(product) = self
                    .data
                    .products
                    .iter()
                    .find(|product| product.id == input.product_id)
                else {
                    return Err(validation_error("product_id", "unknown product").into());
                };
                let id = next_id(self.data.policies.iter().map(|row| row.id.get()));
                self.data.policies.push(Policy {
                    id: PolicyId::new(id),
                    policy_number: input.policy_number.clone(),
                    customer_id: customer.id,
                    customer_name: customer.name.clone(),
                    product_id: product.id,
                    product_name: product.name.clone(),
                    status: input.status,
                    effective_date: input.effective_date,
                    expiry_date: input.expiry_date,
                    premium_cents: input.premium_cents,
                    insured_amount_cents: input.insured_amount_cents,
                    created_at: now,
                    updated_at: now,
                });
            }
            FormPayload::Claim(input) => {
                let Some(policy) = self
                    .data
                    .policies
                    .iter()
                    .find(|policy| policy.id == input.policy_id)
                else {
                    return Err(validation_error("policy_id", "unknown policy").into());
                };
                let id = next_id(self.data.claims.iter().map(|row| row.id.get()));
                self.data.claims.push(Claim {
                    id: ClaimId::new(id),
                    claim_number: format!("CLM-{id:04}"),
                    policy_id: policy.id,
                    policy_number: policy.policy_number.clone(),
                    status: input.status,
                    incident_date: input.incident_date,
                    filed_date: input.filed_date,
                    claimed_cents: input.claimed_cents,
                    approved_cents: None,
                    description: input.description.clone(),
                    created_at: now,
                    updated_at: now,
                });
            }
            FormPayload::Invoice(input) => {
                let Some(policy) = self
                    .data
                    .policies
                    .iter()
                    .find(|policy| policy.id == input.policy_id)
                else {
                    return Err(validation_error("policy_id", "unknown policy").into());
                };
                let id = next_id(self.data.invoices.iter().map(|row| row.id.get()));
                self.data.invoices.push(Invoice {
                    id: InvoiceId::new(id),
                    invoice_number: format!("INV-{id:05}"),
                    policy_id: policy.id,
                    policy_number: policy.policy_number.clone(),
                    status: input.status,
                    issued_date: input.issued_date,
                    due_date: input.due_date,
                    amount_cents: input.amount_cents,
                    paid_date: None,
                    created_at: now,
                    updated_at: now,
                });
            }
            FormPayload::Product(input) => {
                if self
                    .data
                    .products
                    .iter()
                    .any(|product| product.code == input.code)
                {
                    return Err(validation_error("code", "has already been taken").into());
                }
                let id = next_id(self.data.products.iter().map(|row| row.id.get()));
                self.data.products.push(Product {
                    id: ProductId::new(id),
                    name: input.name.clone(),
                    code: input.code.clone(),
                    product_type: input.product_type,
                    scopes: input.scopes.clone(),
                    min_days: input.min_days,
                    max_days: input.max_days,
                    premium_cents: input.premium_cents,
                    active: true,
                    created_at: now,
                    updated_at: now,
                });
            }
        }
        Ok(())
    }

    fn submit_update(&mut self, tab: TabKind, row_id: i64, payload: &FormPayload) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        match (tab, payload) {
            (TabKind::Policies, FormPayload::Policy(input)) => {
                let Some(row) = self
                    .data
                    .policies
                    .iter_mut()
                    .find(|row| row.id.get() == row_id)
                else {
                    bail!("policy {row_id} not found");
                };
                row.status = input.status;
                row.premium_cents = input.premium_cents;
                row.insured_amount_cents = input.insured_amount_cents;
                row.expiry_date = input.expiry_date;
                row.updated_at = now;
            }
            (TabKind::Claims, FormPayload::Claim(input)) => {
                let Some(row) = self
                    .data
                    .claims
                    .iter_mut()
                    .find(|row| row.id.get() == row_id)
                else {
                    bail!("claim {row_id} not found");
                };
                row.status = input.status;
                row.claimed_cents = input.claimed_cents;
                row.description = input.description.clone();
                row.updated_at = now;
            }
            (TabKind::Invoices, FormPayload::Invoice(input)) => {
                let Some(row) = self
                    .data
                    .invoices
                    .iter_mut()
                    .find(|row| row.id.get() == row_id)
                else {
                    bail!("invoice {row_id} not found");
                };
                row.status = input.status;
                row.amount_cents = input.amount_cents;
                row.updated_at = now;
            }
            (TabKind::Products, FormPayload::Product(input)) => {
                let Some(row) = self
                    .data
                    .products
                    .iter_mut()
                    .find(|row| row.id.get() == row_id)
                else {
                    bail!("product {row_id} not found");
                };
                row.product_type = input.product_type;
                row.scopes = input.scopes.clone();
                row.min_days = input.min_days;
                row.max_days = input.max_days;
                row.premium_cents = input.premium_cents;
                row.updated_at = now;
            }
            (tab, _) => bail!("payload does not match the {} tab", tab.label()),
        }
        Ok(())
    }
}

fn validation_error(field: &str, message: &str) -> ValidationErrors {
    ValidationErrors {
        errors: BTreeMap::from([(field.to_owned(), vec![message.to_owned()])]),
    }
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

fn paginate<T>(rows: Vec<T>, page: &PageQuery) -> (Vec<T>, PageInfo) {
    let total = rows.len() as i64;
    let limit = page.limit.max(0);
    let start = (page.page - 1).max(0) * limit;
    let slice: Vec<T> = rows
        .into_iter()
        .skip(start.max(0) as usize)
        .take(limit as usize)
        .collect();
    (
        slice,
        PageInfo {
            current_page: page.page,
            per_page: page.limit,
            total,
        },
    )
}

fn sort_rows<T>(rows: &mut [T], entries: &[SortEntry], cmp: fn(&T, &T, &str) -> Ordering) {
    if entries.is_empty() {
        return;
    }
    rows.sort_by(|left, right| {
        for entry in entries {
            let ordering = match entry.direction {
                SortDirection::Asc => cmp(left, right, &entry.field),
                SortDirection::Desc => cmp(right, left, &entry.field),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn contains_search(haystacks: &[&str], body: &SearchBody) -> bool {
    let needle = body.search.value.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystacks
        .iter()
        .any(|hay| hay.to_ascii_lowercase().contains(&needle))
}

fn filter_value<'a>(body: &'a SearchBody, field: &str) -> Option<&'a str> {
    body.filters
        .iter()
        .find(|filter| filter.field == field)
        .and_then(|filter| filter.value.as_str())
}

fn policy_matches(row: &Policy, body: &SearchBody) -> bool {
    if !contains_search(
        &[&row.policy_number, &row.customer_name, &row.product_name],
        body,
    ) {
        return false;
    }
    filter_value(body, "status").is_none_or(|status| row.status.as_str() == status)
}

fn claim_matches(row: &Claim, body: &SearchBody) -> bool {
    if !contains_search(
        &[&row.claim_number, &row.policy_number, &row.description],
        body,
    ) {
        return false;
    }
    filter_value(body, "status").is_none_or(|status| row.status.as_str() == status)
}

fn invoice_matches(row: &Invoice, body: &SearchBody) -> bool {
    if !contains_search(&[&row.invoice_number, &row.policy_number], body) {
        return false;
    }
    filter_value(body, "status").is_none_or(|status| row.status.as_str() == status)
}

fn product_matches(row: &Product, body: &SearchBody) -> bool {
    if !contains_search(&[&row.name, &row.code], body) {
        return false;
    }
    filter_value(body, "type").is_none_or(|value| row.product_type.as_str() == value)
}

fn cmp_policy_field(left: &Policy, right: &Policy, field: &str) -> Ordering {
    match field {
        "policy_number" => left.policy_number.cmp(&right.policy_number),
        "customer_name" => left.customer_name.cmp(&right.customer_name),
        "product_name" => left.product_name.cmp(&right.product_name),
        "status" => left.status.as_str().cmp(right.status.as_str()),
        "effective_date" => left.effective_date.cmp(&right.effective_date),
        "expiry_date" => left.expiry_date.cmp(&right.expiry_date),
        "premium_cents" => left.premium_cents.cmp(&right.premium_cents),
        "insured_amount_cents" => left.insured_amount_cents.cmp(&right.insured_amount_cents),
        _ => left.id.cmp(&right.id),
    }
}

fn cmp_claim_field(left: &Claim, right: &Claim, field: &str) -> Ordering {
    match field {
        "claim_number" => left.claim_number.cmp(&right.claim_number),
        "policy_number" => left.policy_number.cmp(&right.policy_number),
        "status" => left.status.as_str().cmp(right.status.as_str()),
        "incident_date" => left.incident_date.cmp(&right.incident_date),
        "filed_date" => left.filed_date.cmp(&right.filed_date),
        "claimed_cents" => left.claimed_cents.cmp(&right.claimed_cents),
        "approved_cents" => left.approved_cents.cmp(&right.approved_cents),
        _ => left.id.cmp(&right.id),
    }
}

fn cmp_invoice_field(left: &Invoice, right: &Invoice, field: &str) -> Ordering {
    match field {
        "invoice_number" => left.invoice_number.cmp(&right.invoice_number),
        "policy_number" => left.policy_number.cmp(&right.policy_number),
        "status" => left.status.as_str().cmp(right.status.as_str()),
        "issued_date" => left.issued_date.cmp(&right.issued_date),
        "due_date" => left.due_date.cmp(&right.due_date),
        "amount_cents" => left.amount_cents.cmp(&right.amount_cents),
        "paid_date" => left.paid_date.cmp(&right.paid_date),
        _ => left.id.cmp(&right.id),
    }
}

fn cmp_product_field(left: &Product, right: &Product, field: &str) -> Ordering {
    match field {
        "name" => left.name.cmp(&right.name),
        "code" => left.code.cmp(&right.code),
        "type" => left.product_type.as_str().cmp(right.product_type.as_str()),
        // The backend sorts term bounds on their normalized columns.
        "min_days" | "min_days_by_unit_term" => left.min_days.cmp(&right.min_days),
        "max_days" | "max_days_by_unit_term" => left.max_days.cmp(&right.max_days),
        "premium_cents" => left.premium_cents.cmp(&right.premium_cents),
        _ => left.id.cmp(&right.id),
    }
}
