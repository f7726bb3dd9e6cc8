// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use polizza_app::{
    Claim, ClaimId, ClaimStatus, Customer, CustomerId, Invoice, InvoiceId, InvoiceStatus, Policy,
    PolicyId, PolicyStatus, Product, ProductId, ProductType,
};
use std::path::PathBuf;
use time::{Date, Duration, Month, OffsetDateTime, Time};

const COMPANY_ADJECTIVES: [&str; 12] = [
    "Northern", "Summit", "Lakeside", "Pioneer", "Frontier", "Harbor", "Canyon", "Evergreen",
    "Metro", "Cascade", "Granite", "Beacon",
];
const COMPANY_NOUNS: [&str; 10] = [
    "Freight", "Logistics", "Foods", "Builders", "Textiles", "Marine", "Farms", "Motors",
    "Holdings", "Outfitters",
];
const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];
const STREET_NAMES: [&str; 12] = [
    "Cedar", "Maple", "Oak", "Pine", "Willow", "Elm", "Birch", "Juniper", "Sunset", "Ridge",
    "Valley", "Lakeview",
];
const CITIES: [&str; 10] = [
    "Austin",
    "Seattle",
    "Denver",
    "Madison",
    "Raleigh",
    "Pittsburgh",
    "Portland",
    "Boise",
    "Phoenix",
    "Nashville",
];

const CLAIM_CAUSES: [&str; 10] = [
    "Water damage in basement",
    "Hail damage to roof",
    "Rear-end collision",
    "Hospitalization after fall",
    "Kitchen fire",
    "Stolen equipment",
    "Windstorm fence damage",
    "Slip and fall liability",
    "Burst pipe",
    "Lightning strike to panel",
];

const PRODUCT_CATALOG: [(&str, &str, ProductType, &[&str]); 8] = [
    (
        "Hospital Cash",
        "HC1",
        ProductType::Medical,
        &["hospitalization", "surgery"],
    ),
    (
        "Outpatient Plus",
        "OP2",
        ProductType::Medical,
        &["outpatient", "pharmacy"],
    ),
    (
        "Term Life 20",
        "TL20",
        ProductType::Life,
        &["death_benefit"],
    ),
    (
        "Whole Life",
        "WL1",
        ProductType::Life,
        &["death_benefit", "surrender_value"],
    ),
    (
        "Travel 30",
        "TRV30",
        ProductType::Accident,
        &["medical_expense", "trip_cancellation"],
    ),
    (
        "Commuter Guard",
        "CG1",
        ProductType::Accident,
        &["disability", "death_benefit"],
    ),
    (
        "Home Shield",
        "HS1",
        ProductType::Property,
        &["fire", "flood", "theft"],
    ),
    (
        "Cargo Shield",
        "CS1",
        ProductType::Property,
        &["transit", "storage"],
    ),
];

struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for back-office fixtures. Same seed, same records.
pub struct ClaimsFaker {
    rng: DeterministicRng,
    next_customer_id: i64,
    next_product_id: i64,
    next_policy_id: i64,
    next_claim_id: i64,
    next_invoice_id: i64,
}

impl ClaimsFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(if seed == 0 { 1 } else { seed }),
            next_customer_id: 1,
            next_product_id: 1,
            next_policy_id: 1,
            next_claim_id: 1,
            next_invoice_id: 1,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    fn pick<'a>(&mut self, pool: &[&'a str]) -> &'a str {
        pool[self.rng.int_n(pool.len())]
    }

    pub fn customer(&mut self) -> Customer {
        let id = self.next_customer_id;
        self.next_customer_id += 1;

        let name = if self.rng.bool() {
            format!(
                "{} {}",
                self.pick(&COMPANY_ADJECTIVES),
                self.pick(&COMPANY_NOUNS),
            )
        } else {
            format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES))
        };
        let slug = name.to_ascii_lowercase().replace(' ', ".");
        let created = self.timestamp_in_year(2024);

        Customer {
            id: CustomerId::new(id),
            email: format!("{slug}@example.com"),
            phone: format!("555-{:04}", self.rng.int_n(10_000)),
            address: format!(
                "{} {} St, {}",
                100 + self.rng.int_n(900),
                self.pick(&STREET_NAMES),
                self.pick(&CITIES),
            ),
            name,
            created_at: created,
            updated_at: created,
        }
    }

    pub fn product(&mut self) -> Product {
        let id = self.next_product_id;
        self.next_product_id += 1;

        let (name, code, product_type, scopes) =
            PRODUCT_CATALOG[(id as usize - 1) % PRODUCT_CATALOG.len()];
        let min_days = [None, Some(1), Some(7), Some(30)][self.rng.int_n(4)];
        let max_days = min_days.map(|min| min * (2 + self.rng.int_n(11) as i32));
        let created = self.timestamp_in_year(2023);

        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            code: code.to_owned(),
            product_type,
            scopes: scopes.iter().map(|scope| (*scope).to_owned()).collect(),
            min_days,
            max_days,
            premium_cents: (500 + self.rng.int_n(9_500)) as i64,
            active: true,
            created_at: created,
            updated_at: created,
        }
    }

    pub fn policy(&mut self, customer: &Customer, product: &Product) -> Policy {
        let id = self.next_policy_id;
        self.next_policy_id += 1;

        let effective = self.date_in_year(2025);
        let status = [
            PolicyStatus::Draft,
            PolicyStatus::Active,
            PolicyStatus::Active,
            PolicyStatus::Active,
            PolicyStatus::Lapsed,
            PolicyStatus::Cancelled,
            PolicyStatus::Expired,
        ][self.rng.int_n(7)];
        let created = midnight_utc(effective);

        Policy {
            id: PolicyId::new(id),
            policy_number: format!("POL-{:04}", 1000 + id),
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            product_id: product.id,
            product_name: product.name.clone(),
            status,
            effective_date: effective,
            expiry_date: Some(add_days(effective, 365)),
            premium_cents: product.premium_cents * (1 + self.rng.int_n(12) as i64),
            insured_amount_cents: (1 + self.rng.int_n(100) as i64) * 1_000_000,
            created_at: created,
            updated_at: created,
        }
    }

    pub fn claim(&mut self, policy: &Policy) -> Claim {
        let id = self.next_claim_id;
        self.next_claim_id += 1;

        let incident = add_days(policy.effective_date, 10 + self.rng.int_n(300) as i64);
        let filed = add_days(incident, self.rng.int_n(14) as i64);
        let status = [
            ClaimStatus::Open,
            ClaimStatus::Open,
            ClaimStatus::UnderReview,
            ClaimStatus::Approved,
            ClaimStatus::Rejected,
            ClaimStatus::Paid,
        ][self.rng.int_n(6)];
        let claimed = (100 + self.rng.int_n(5_000) as i64) * 100;
        let approved = match status {
            ClaimStatus::Approved | ClaimStatus::Paid => {
                Some(claimed - (self.rng.int_n(40) as i64) * 100)
            }
            _ => None,
        };
        let created = midnight_utc(filed);

        Claim {
            id: ClaimId::new(id),
            claim_number: format!("CLM-{:04}", id),
            policy_id: policy.id,
            policy_number: policy.policy_number.clone(),
            status,
            incident_date: incident,
            filed_date: filed,
            claimed_cents: claimed,
            approved_cents: approved,
            description: self.pick(&CLAIM_CAUSES).to_owned(),
            created_at: created,
            updated_at: created,
        }
    }

    pub fn invoice(&mut self, policy: &Policy) -> Invoice {
        let id = self.next_invoice_id;
        self.next_invoice_id += 1;

        let issued = add_days(policy.effective_date, 30 * self.rng.int_n(12) as i64);
        let due = add_days(issued, 30);
        let status = [
            InvoiceStatus::Issued,
            InvoiceStatus::Paid,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Void,
        ][self.rng.int_n(5)];
        let paid_date = match status {
            InvoiceStatus::Paid => Some(add_days(issued, self.rng.int_n(30) as i64)),
            _ => None,
        };
        let created = midnight_utc(issued);

        Invoice {
            id: InvoiceId::new(id),
            invoice_number: format!("INV-{:05}", id),
            policy_id: policy.id,
            policy_number: policy.policy_number.clone(),
            status,
            issued_date: issued,
            due_date: due,
            amount_cents: policy.premium_cents,
            paid_date,
            created_at: created,
            updated_at: created,
        }
    }

    pub fn date_in_year(&mut self, year: i32) -> Date {
        let start = Date::from_calendar_date(year, Month::January, 1).expect("valid year start");
        add_days(start, self.rng.int_n(365) as i64)
    }

    fn timestamp_in_year(&mut self, year: i32) -> OffsetDateTime {
        midnight_utc(self.date_in_year(year))
    }
}

/// Fully linked demo data set: every claim and invoice points at one of the
/// generated policies.
#[derive(Debug, Clone)]
pub struct DemoDataset {
    pub customers: Vec<Customer>,
    pub products: Vec<Product>,
    pub policies: Vec<Policy>,
    pub claims: Vec<Claim>,
    pub invoices: Vec<Invoice>,
}

pub fn demo_dataset(seed: u64) -> DemoDataset {
    let mut faker = ClaimsFaker::new(seed);

    let customers: Vec<Customer> = (0..12).map(|_| faker.customer()).collect();
    let products: Vec<Product> = (0..PRODUCT_CATALOG.len()).map(|_| faker.product()).collect();

    let mut policies = Vec::new();
    for index in 0..30 {
        let customer = customers[index % customers.len()].clone();
        let product = products[faker.int_n(products.len())].clone();
        policies.push(faker.policy(&customer, &product));
    }

    let mut claims = Vec::new();
    let mut invoices = Vec::new();
    for policy in &policies {
        for _ in 0..faker.int_n(3) {
            claims.push(faker.claim(policy));
        }
        invoices.push(faker.invoice(policy));
    }

    DemoDataset {
        customers,
        products,
        policies,
        claims,
        invoices,
    }
}

pub fn temp_data_dir() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().to_path_buf();
    Ok((dir, path))
}

fn midnight_utc(date: Date) -> OffsetDateTime {
    let midnight = Time::from_hms(0, 0, 0).expect("valid midnight");
    date.with_time(midnight).assume_utc()
}

fn add_days(date: Date, days: i64) -> Date {
    date.saturating_add(Duration::days(days))
}
