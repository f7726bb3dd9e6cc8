// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use polizza_app::{
    Claim, ClaimFormInput, ClaimId, Invoice, InvoiceFormInput, InvoiceId, PageQuery, Policy,
    PolicyFormInput, PolicyId, Product, ProductFormInput, ProductId, SearchBody,
};
pub use polizza_app::ValidationErrors;
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One page of a search response, in the shape every list endpoint returns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl PageMeta {
    pub fn total_pages(&self) -> i64 {
        if self.per_page <= 0 {
            return 0;
        }
        (self.total + self.per_page - 1) / self.per_page
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        let parsed = url::Url::parse(&base_url)
            .with_context(|| format!("api.base_url {base_url:?} is not a valid URL"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("api.base_url must use http or https, got {:?}", parsed.scheme());
        }
        if let Some(token) = token
            && token.trim().is_empty()
        {
            bail!("api.token must not be blank when set");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            token: token.map(str::to_owned),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `POST <base>/<entity>/search?page=..&limit=..` with the normalized
    /// sort/filter body. No sequencing or cancellation: callers issue
    /// requests one at a time.
    pub fn search<T: DeserializeOwned>(
        &self,
        entity: &str,
        page: &PageQuery,
        body: &SearchBody,
    ) -> Result<Page<T>> {
        let response = self
            .authorized(
                self.http
                    .post(format!("{}/{entity}/search", self.base_url)),
            )
            .query(&[("page", page.page), ("limit", page.limit)])
            .json(body)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let response = check_response(response)?;
        response
            .json()
            .with_context(|| format!("decode {entity} search response"))
    }

    pub fn search_policies(&self, page: &PageQuery, body: &SearchBody) -> Result<Page<Policy>> {
        self.search("policies", page, body)
    }

    pub fn search_claims(&self, page: &PageQuery, body: &SearchBody) -> Result<Page<Claim>> {
        self.search("claims", page, body)
    }

    pub fn search_invoices(&self, page: &PageQuery, body: &SearchBody) -> Result<Page<Invoice>> {
        self.search("invoices", page, body)
    }

    pub fn search_products(&self, page: &PageQuery, body: &SearchBody) -> Result<Page<Product>> {
        self.search("products", page, body)
    }

    pub fn create_policy(&self, input: &PolicyFormInput) -> Result<Policy> {
        self.create("policies", input)
    }

    pub fn update_policy(&self, id: PolicyId, input: &PolicyFormInput) -> Result<Policy> {
        self.update("policies", id.get(), input)
    }

    pub fn create_claim(&self, input: &ClaimFormInput) -> Result<Claim> {
        self.create("claims", input)
    }

    pub fn update_claim(&self, id: ClaimId, input: &ClaimFormInput) -> Result<Claim> {
        self.update("claims", id.get(), input)
    }

    pub fn create_invoice(&self, input: &InvoiceFormInput) -> Result<Invoice> {
        self.create("invoices", input)
    }

    pub fn update_invoice(&self, id: InvoiceId, input: &InvoiceFormInput) -> Result<Invoice> {
        self.update("invoices", id.get(), input)
    }

    pub fn create_product(&self, input: &ProductFormInput) -> Result<Product> {
        self.create("products", input)
    }

    pub fn update_product(&self, id: ProductId, input: &ProductFormInput) -> Result<Product> {
        self.update("products", id.get(), input)
    }

    fn create<T: DeserializeOwned>(&self, entity: &str, input: &impl Serialize) -> Result<T> {
        let response = self
            .authorized(self.http.post(format!("{}/{entity}", self.base_url)))
            .json(input)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        let response = check_response(response)?;
        response
            .json()
            .with_context(|| format!("decode {entity} create response"))
    }

    fn update<T: DeserializeOwned>(
        &self,
        entity: &str,
        id: i64,
        input: &impl Serialize,
    ) -> Result<T> {
        let response = self
            .authorized(self.http.put(format!("{}/{entity}/{id}", self.base_url)))
            .json(input)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        let response = check_response(response)?;
        response
            .json()
            .with_context(|| format!("decode {entity} update response"))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    if status == StatusCode::UNPROCESSABLE_ENTITY
        && let Ok(errors) = serde_json::from_str::<ValidationErrors>(&body)
    {
        return Err(errors.into());
    }
    Err(clean_error_response(status, &body))
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check [api].base_url and that the backend is up ({} )",
        base_url,
        error
    )
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.message
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if body.len() < 100 && !body.contains('{') && !body.contains('<') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}
