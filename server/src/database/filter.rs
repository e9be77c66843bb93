//! Allow-listed query filters
//!
//! Query-string parameters are mapped onto equality predicates and an
//! ORDER BY clause. Only names declared in a `FilterSpec` ever reach SQL;
//! values are always bound.

use crate::config::MAX_PER_PAGE;
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashMap;

pub const SORT_FIELD_PARAM: &str = "_sort_field";
pub const SORT_TYPE_PARAM: &str = "_sort_type";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Case-sensitive: only `asc` and `desc` are recognised.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    Boolean,
}

/// Per-entity allow-list
#[derive(Debug)]
pub struct FilterSpec {
    /// (parameter, column, kind)
    pub equality: &'static [(&'static str, &'static str, ColumnKind)],
    /// (parameter, order expression)
    pub sortable: &'static [(&'static str, &'static str)],
    pub default_sort: (&'static str, SortDirection),
    /// Appended after the requested ordering
    pub tie_breaker: &'static str,
}

impl FilterSpec {
    fn sort_expr(&self, param: &str) -> Option<&'static str> {
        self.sortable
            .iter()
            .find(|(name, _)| *name == param)
            .map(|(_, expr)| *expr)
    }
}

pub const BOOK_FILTER: FilterSpec = FilterSpec {
    equality: &[
        ("id", "b.id", ColumnKind::Integer),
        ("title", "b.title", ColumnKind::Text),
        ("total", "b.total", ColumnKind::Integer),
        ("read", "b.read", ColumnKind::Integer),
    ],
    sortable: &[
        ("updated_at", "b.updated_at"),
        ("created_at", "b.created_at"),
        ("started_at", "b.started_at"),
        ("title", "b.title"),
        ("read", "b.read"),
        ("total", "b.total"),
    ],
    default_sort: ("updated_at", SortDirection::Desc),
    tie_breaker: "b.id DESC",
};

pub const NOTE_FILTER: FilterSpec = FilterSpec {
    equality: &[
        ("page", "n.page", ColumnKind::Integer),
        ("hidden", "n.hidden", ColumnKind::Boolean),
    ],
    sortable: &[
        ("page", "n.page"),
        ("created_at", "n.created_at"),
        ("updated_at", "n.updated_at"),
        ("id", "n.id"),
    ],
    default_sort: ("page", SortDirection::Desc),
    tie_breaker: "n.created_at DESC, n.id DESC",
};

/// The global note index. `page` is the pagination parameter there, so it
/// is not an equality filter.
pub const NOTE_INDEX_FILTER: FilterSpec = FilterSpec {
    equality: &[
        ("book_id", "n.book_id", ColumnKind::Integer),
        ("hidden", "n.hidden", ColumnKind::Boolean),
    ],
    sortable: &[
        ("created_at", "n.created_at"),
        ("updated_at", "n.updated_at"),
        ("page", "n.page"),
        ("id", "n.id"),
    ],
    default_sort: ("created_at", SortDirection::Desc),
    tie_breaker: "n.id DESC",
};

pub const POST_FILTER: FilterSpec = FilterSpec {
    equality: &[
        ("title", "n.title", ColumnKind::Text),
        ("hidden", "n.hidden", ColumnKind::Boolean),
    ],
    sortable: &[
        ("created_at", "n.created_at"),
        ("updated_at", "n.updated_at"),
        ("id", "n.id"),
    ],
    default_sort: ("created_at", SortDirection::Desc),
    tie_breaker: "n.id DESC",
};

pub const TAG_FILTER: FilterSpec = FilterSpec {
    equality: &[("name", "t.name", ColumnKind::Text)],
    sortable: &[
        ("targets_count", "targets_count"),
        ("name", "t.name"),
        ("id", "t.id"),
    ],
    default_sort: ("targets_count", SortDirection::Desc),
    tie_breaker: "t.id ASC",
};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
    Boolean(bool),
}

impl FilterValue {
    fn parse(kind: ColumnKind, raw: &str) -> Option<Self> {
        match kind {
            ColumnKind::Integer => raw.trim().parse().ok().map(FilterValue::Integer),
            ColumnKind::Text => Some(FilterValue::Text(raw.to_string())),
            ColumnKind::Boolean => crate::validation::parse_bool(raw).map(FilterValue::Boolean),
        }
    }
}

/// Filter resolved from request parameters
#[derive(Debug, Clone)]
pub struct QueryFilter {
    conditions: Vec<(&'static str, FilterValue)>,
    sort_expr: &'static str,
    direction: SortDirection,
    tie_breaker: &'static str,
}

impl QueryFilter {
    /// Unknown parameters and values that do not parse are ignored.
    pub fn from_params(spec: &'static FilterSpec, params: &HashMap<String, String>) -> Self {
        let conditions = spec
            .equality
            .iter()
            .filter_map(|(param, column, kind)| {
                let raw = params.get(*param)?;
                FilterValue::parse(*kind, raw).map(|value| (*column, value))
            })
            .collect();

        let (default_field, default_direction) = spec.default_sort;
        let sort_expr = params
            .get(SORT_FIELD_PARAM)
            .and_then(|field| spec.sort_expr(field))
            .or_else(|| spec.sort_expr(default_field))
            .unwrap_or(spec.tie_breaker);
        let direction = params
            .get(SORT_TYPE_PARAM)
            .and_then(|raw| SortDirection::parse(raw))
            .unwrap_or(default_direction);

        Self {
            conditions,
            sort_expr,
            direction,
            tie_breaker: spec.tie_breaker,
        }
    }

    /// Default ordering, no predicates.
    pub fn defaults(spec: &'static FilterSpec) -> Self {
        Self::from_params(spec, &HashMap::new())
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn sort_expr(&self) -> &'static str {
        self.sort_expr
    }
}

/// Applies a `QueryFilter` to a query under construction.
pub trait FilterExt {
    /// Push equality predicates; the WHERE clause must already be open.
    fn apply_filter(&mut self, filter: &QueryFilter) -> &mut Self;
    fn apply_sort(&mut self, filter: &QueryFilter) -> &mut Self;
}

impl<'args> FilterExt for QueryBuilder<'args, Sqlite> {
    fn apply_filter(&mut self, filter: &QueryFilter) -> &mut Self {
        for (column, value) in &filter.conditions {
            self.push(format!(" AND {column} = "));
            match value {
                FilterValue::Integer(v) => self.push_bind(*v),
                FilterValue::Text(v) => self.push_bind(v.clone()),
                FilterValue::Boolean(v) => self.push_bind(*v),
            };
        }
        self
    }

    fn apply_sort(&mut self, filter: &QueryFilter) -> &mut Self {
        self.push(format!(
            " ORDER BY {} {}, {}",
            filter.sort_expr,
            filter.direction.as_sql(),
            filter.tie_breaker
        ));
        self
    }
}

/// Page window for paginated listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn from_params(params: &HashMap<String, String>, default_per_page: u32) -> Self {
        let page = params
            .get("page")
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let per_page = params
            .get("per_page")
            .and_then(|p| p.trim().parse::<u32>().ok())
            .unwrap_or(default_per_page)
            .clamp(1, MAX_PER_PAGE);

        Self { page, per_page }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn last_page(&self, total: i64) -> i64 {
        ((total + self.limit() - 1) / self.limit()).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_note_sort_is_page_desc() {
        let filter = QueryFilter::defaults(&NOTE_FILTER);
        assert_eq!(filter.sort_expr(), "n.page");
        assert_eq!(filter.direction(), SortDirection::Desc);
    }

    #[test]
    fn test_unknown_sort_field_and_type_fall_back() {
        let filter = QueryFilter::from_params(
            &NOTE_FILTER,
            &params(&[("_sort_field", "content; DROP TABLE notes"), ("_sort_type", "ASC")]),
        );
        assert_eq!(filter.sort_expr(), "n.page");
        assert_eq!(filter.direction(), SortDirection::Desc);

        let filter = QueryFilter::from_params(
            &NOTE_FILTER,
            &params(&[("_sort_field", "created_at"), ("_sort_type", "asc")]),
        );
        assert_eq!(filter.sort_expr(), "n.created_at");
        assert_eq!(filter.direction(), SortDirection::Asc);
    }

    #[test]
    fn test_only_allow_listed_equality_reaches_sql() {
        let filter = QueryFilter::from_params(
            &BOOK_FILTER,
            &params(&[("title", "Dune"), ("cover", "x"), ("total", "not a number")]),
        );

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM books b WHERE 1 = 1");
        qb.apply_filter(&filter).apply_sort(&filter);

        assert_eq!(
            qb.sql(),
            "SELECT * FROM books b WHERE 1 = 1 AND b.title = ? ORDER BY b.updated_at DESC, b.id DESC"
        );
    }

    #[test]
    fn test_note_index_ignores_pagination_params() {
        let filter = QueryFilter::from_params(
            &NOTE_INDEX_FILTER,
            &params(&[("page", "3"), ("per_page", "10")]),
        );
        assert_eq!(filter.sort_expr(), "n.created_at");
        assert_eq!(filter.direction(), SortDirection::Desc);

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM notes n WHERE 1 = 1");
        qb.apply_filter(&filter);
        assert_eq!(qb.sql(), "SELECT * FROM notes n WHERE 1 = 1");
    }

    #[test]
    fn test_pagination_bounds() {
        let p = Pagination::from_params(&params(&[("page", "0"), ("per_page", "1000")]), 15);
        assert_eq!(p, Pagination { page: 1, per_page: MAX_PER_PAGE });

        let p = Pagination::from_params(&params(&[("page", "3")]), 15);
        assert_eq!(p.offset(), 30);
        assert_eq!(p.last_page(31), 3);
        assert_eq!(p.last_page(0), 1);
    }
}
