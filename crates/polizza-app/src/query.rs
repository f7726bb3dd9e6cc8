// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "like")]
    Like,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub field: String,
    pub operator: FilterOperator,
    pub value: Value,
}

/// Query-string half of a search request. Serialized verbatim as the
/// `page`/`limit` parameters of every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

/// Pagination event as emitted by a table widget: zero-based page index
/// plus the selected row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEvent {
    pub page: i64,
    pub rows: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub limit: i64,
    pub rows_per_page_options: Vec<i64>,
}

pub const DEFAULT_ROWS_PER_PAGE: i64 = 10;
pub const ROWS_PER_PAGE_OPTIONS: [i64; 3] = [10, 20, 50];

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_ROWS_PER_PAGE,
            rows_per_page_options: ROWS_PER_PAGE_OPTIONS.to_vec(),
        }
    }
}

impl PageParams {
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }

    /// Widgets report zero-based pages; the backend is one-based. This is a
    /// direct mapping, not a validation boundary.
    pub fn update_page(&mut self, event: &PageEvent) {
        self.page = event.page + 1;
        self.limit = event.rows;
    }

    /// Back to page 1 after a search or filter change invalidates the
    /// current page. Leaves `limit` untouched.
    pub fn reset_page(&mut self) {
        self.page = 1;
    }
}

/// Sort event as emitted by a table widget. Multi-column widgets populate
/// `multi_sort_meta`; single-column widgets populate `sort_field` and
/// `sort_order` (`1` ascending, `-1` descending).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortEvent {
    pub multi_sort_meta: Option<Vec<ColumnSort>>,
    pub sort_field: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSort {
    pub field: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchText {
    pub value: String,
}

/// The exact JSON body every `POST <entity>/search` endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBody {
    pub search: SearchText,
    pub sort: Vec<SortEntry>,
    pub filters: Vec<FilterEntry>,
}

/// Sentinel filter value meaning "no `type` filter at all".
pub const TYPE_FILTER_ALL: &str = "all";

const TYPE_FIELD: &str = "type";

/// Logical term-bound columns are sorted on their normalized physical
/// counterparts.
pub fn physical_sort_field(field: &str) -> &str {
    match field {
        "max_days" => "max_days_by_unit_term",
        "min_days" => "min_days_by_unit_term",
        _ => field,
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SortFilterParams {
    pub search: String,
    pub sort: Vec<SortEntry>,
    pub filters: Vec<FilterEntry>,
}

/// Invoice-tab view preferences, persisted per user between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceTabPrefs {
    pub limit: i64,
    pub sort_filters: SortFilterParams,
}

impl Default for InvoiceTabPrefs {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ROWS_PER_PAGE,
            sort_filters: SortFilterParams::default(),
        }
    }
}

impl SortFilterParams {
    pub fn search_body(&self) -> SearchBody {
        SearchBody {
            search: SearchText {
                value: self.search.clone(),
            },
            sort: self.sort.clone(),
            filters: self.filters.clone(),
        }
    }

    pub fn update_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    pub fn update_sort(&mut self, event: &SortEvent) {
        if let Some(meta) = &event.multi_sort_meta {
            self.sort = meta
                .iter()
                .map(|column| SortEntry {
                    field: column.field.clone(),
                    direction: direction_for_order(column.order),
                })
                .collect();
            return;
        }

        match event.sort_field.as_deref() {
            Some(field) if !field.is_empty() => {
                self.sort = vec![SortEntry {
                    field: physical_sort_field(field).to_owned(),
                    direction: direction_for_order(event.sort_order.unwrap_or(1)),
                }];
            }
            // Absent or empty field is the "clear sort" path.
            _ => self.sort.clear(),
        }
    }

    pub fn update_type_filter(&mut self, value: &str) {
        if value == TYPE_FILTER_ALL {
            self.filters.retain(|filter| filter.field != TYPE_FIELD);
            return;
        }
        self.upsert_filter(TYPE_FIELD, FilterOperator::Eq, value);
    }

    pub fn update_filter(&mut self, field: &str, value: impl Into<Value>) {
        self.upsert_filter(field, FilterOperator::Eq, value);
    }

    /// Replace the existing entry for `field` if present, append otherwise.
    /// At most one filter per field.
    pub fn upsert_filter(&mut self, field: &str, operator: FilterOperator, value: impl Into<Value>) {
        let value = value.into();
        if let Some(existing) = self.filters.iter_mut().find(|filter| filter.field == field) {
            existing.operator = operator;
            existing.value = value;
            return;
        }
        self.filters.push(FilterEntry {
            field: field.to_owned(),
            operator,
            value,
        });
    }

    pub fn reset_sort_filters(&mut self) {
        self.search.clear();
        self.sort.clear();
        self.filters.clear();
    }
}

fn direction_for_order(order: i64) -> SortDirection {
    if order == 1 {
        SortDirection::Asc
    } else {
        SortDirection::Desc
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ColumnSort, FilterOperator, PageEvent, PageParams, SortDirection, SortEntry, SortEvent,
        SortFilterParams,
    };
    use serde_json::json;

    #[test]
    fn page_query_mirrors_params() {
        let params = PageParams {
            page: 4,
            limit: 50,
            ..PageParams::default()
        };
        let query = params.page_query();
        assert_eq!(query.page, 4);
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn update_page_converts_zero_based_event() {
        let mut params = PageParams::default();
        params.update_page(&PageEvent { page: 2, rows: 20 });
        assert_eq!(params.page, 3);
        assert_eq!(params.limit, 20);
    }

    #[test]
    fn reset_page_keeps_limit() {
        let mut params = PageParams::default();
        params.update_page(&PageEvent { page: 6, rows: 50 });
        params.reset_page();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, 50);
    }

    #[test]
    fn multi_sort_maps_in_order() {
        let mut params = SortFilterParams::default();
        params.update_sort(&SortEvent {
            multi_sort_meta: Some(vec![
                ColumnSort {
                    field: "name".to_owned(),
                    order: 1,
                },
                ColumnSort {
                    field: "date".to_owned(),
                    order: -1,
                },
            ]),
            ..SortEvent::default()
        });
        assert_eq!(
            params.sort,
            vec![
                SortEntry {
                    field: "name".to_owned(),
                    direction: SortDirection::Asc,
                },
                SortEntry {
                    field: "date".to_owned(),
                    direction: SortDirection::Desc,
                },
            ],
        );
    }

    #[test]
    fn single_sort_applies_term_field_aliasing() {
        let mut params = SortFilterParams::default();
        params.update_sort(&SortEvent {
            sort_field: Some("max_days".to_owned()),
            sort_order: Some(-1),
            ..SortEvent::default()
        });
        assert_eq!(
            params.sort,
            vec![SortEntry {
                field: "max_days_by_unit_term".to_owned(),
                direction: SortDirection::Desc,
            }],
        );

        params.update_sort(&SortEvent {
            sort_field: Some("min_days".to_owned()),
            sort_order: Some(1),
            ..SortEvent::default()
        });
        assert_eq!(params.sort[0].field, "min_days_by_unit_term");
        assert_eq!(params.sort[0].direction, SortDirection::Asc);
    }

    #[test]
    fn empty_event_clears_sort() {
        let mut params = SortFilterParams::default();
        params.update_sort(&SortEvent {
            sort_field: Some("name".to_owned()),
            sort_order: Some(1),
            ..SortEvent::default()
        });
        assert_eq!(params.sort.len(), 1);

        params.update_sort(&SortEvent::default());
        assert!(params.sort.is_empty());
    }

    #[test]
    fn falsy_sort_field_clears_sort() {
        let mut params = SortFilterParams::default();
        params.update_sort(&SortEvent {
            sort_field: Some("premium_cents".to_owned()),
            sort_order: Some(1),
            ..SortEvent::default()
        });
        params.update_sort(&SortEvent {
            sort_field: Some(String::new()),
            sort_order: Some(1),
            ..SortEvent::default()
        });
        assert!(params.sort.is_empty());
    }

    #[test]
    fn type_filter_all_removes_entry() {
        let mut params = SortFilterParams::default();
        params.update_type_filter("medical");
        assert_eq!(params.filters.len(), 1);

        params.update_type_filter("all");
        assert!(!params.filters.iter().any(|filter| filter.field == "type"));
    }

    #[test]
    fn filter_upsert_replaces_by_field() {
        let mut params = SortFilterParams::default();
        params.update_filter("status", "active");
        params.update_filter("status", "inactive");

        let status_filters: Vec<_> = params
            .filters
            .iter()
            .filter(|filter| filter.field == "status")
            .collect();
        assert_eq!(status_filters.len(), 1);
        assert_eq!(status_filters[0].value, json!("inactive"));
        assert_eq!(status_filters[0].operator, FilterOperator::Eq);
    }

    #[test]
    fn upsert_keeps_unrelated_filters() {
        let mut params = SortFilterParams::default();
        params.update_filter("status", "active");
        params.update_type_filter("life");
        params.upsert_filter("premium_cents", FilterOperator::Gte, 10_000);

        assert_eq!(params.filters.len(), 3);
        params.update_type_filter("all");
        assert_eq!(params.filters.len(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut params = SortFilterParams::default();
        params.update_search("storm damage");
        params.update_type_filter("property");
        params.update_sort(&SortEvent {
            sort_field: Some("filed_date".to_owned()),
            sort_order: Some(-1),
            ..SortEvent::default()
        });

        params.reset_sort_filters();
        assert!(params.search.is_empty());
        assert!(params.sort.is_empty());
        assert!(params.filters.is_empty());
    }

    #[test]
    fn search_body_serializes_to_backend_shape() {
        let mut params = SortFilterParams::default();
        params.update_search("flood");
        params.update_sort(&SortEvent {
            multi_sort_meta: Some(vec![ColumnSort {
                field: "filed_date".to_owned(),
                order: -1,
            }]),
            ..SortEvent::default()
        });
        params.update_type_filter("property");

        let body = serde_json::to_value(params.search_body()).expect("serialize search body");
        assert_eq!(
            body,
            json!({
                "search": {"value": "flood"},
                "sort": [{"field": "filed_date", "direction": "desc"}],
                "filters": [{"field": "type", "operator": "=", "value": "property"}],
            }),
        );
    }

    #[test]
    fn fresh_params_produce_empty_body() {
        let body =
            serde_json::to_value(SortFilterParams::default().search_body()).expect("serialize");
        assert_eq!(
            body,
            json!({"search": {"value": ""}, "sort": [], "filters": []}),
        );
    }
}
