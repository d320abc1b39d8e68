//! Row queries against the backend's data API.
//!
//! A [`Query`] names a table, the columns to return (including embedded
//! relations such as `vehicle:vehicles(make, model)`), equality filters, an
//! optional ordering and an optional row limit. It renders to the query
//! parameters the data API expects and is also evaluated directly by the
//! in-process backend.

use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query parameters in data API syntax. Whitespace inside the column list
    /// is dropped.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), compact_columns(&self.columns))];
        params.extend(self.filter_params());
        if let Some(order) = &self.order {
            let dir = match order.direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            params.push(("order".into(), format!("{}.{dir}", order.column)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".into(), limit.to_string()));
        }
        params
    }

    /// Only the filter part, as used by updates.
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", literal(&f.value))))
            .collect()
    }
}

/// Renders a filter value the way the data API reads it (strings unquoted).
pub fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".into(),
        other => other.to_string(),
    }
}

fn compact_columns(columns: &str) -> String {
    columns.chars().filter(|c| !c.is_whitespace()).collect()
}

/// One entry of a column list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Column {
    All,
    Named(String),
    Embed {
        alias: String,
        table: String,
        columns: String,
    },
}

/// Splits a column list at top-level commas and classifies each entry.
pub fn parse_columns(columns: &str) -> Vec<Column> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for ch in columns.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                push_column(&mut out, &current);
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    push_column(&mut out, &current);
    out
}

fn push_column(out: &mut Vec<Column>, raw: &str) {
    let raw = raw.trim();
    if raw.is_empty() {
        return;
    }
    if raw == "*" {
        out.push(Column::All);
        return;
    }

    let Some(open) = raw.find('(') else {
        out.push(Column::Named(raw.to_string()));
        return;
    };

    let head = &raw[..open];
    let inner = raw[open + 1..].trim_end_matches(')').trim().to_string();
    let (alias, table) = match head.split_once(':') {
        Some((alias, table)) => (alias.trim().to_string(), table.trim().to_string()),
        None => (head.trim().to_string(), head.trim().to_string()),
    };
    out.push(Column::Embed {
        alias,
        table,
        columns: inner,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_select_filter_order_limit() {
        let query = Query::from("appointments")
            .select("*, vehicle:vehicles(make, model)")
            .eq("client_id", "c-1")
            .order("scheduled_at", Direction::Ascending)
            .limit(2);

        assert_eq!(
            query.to_params(),
            vec![
                ("select".to_string(), "*,vehicle:vehicles(make,model)".to_string()),
                ("client_id".to_string(), "eq.c-1".to_string()),
                ("order".to_string(), "scheduled_at.asc".to_string()),
                ("limit".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn bool_and_number_literals() {
        let query = Query::from("service_catalog").eq("active", true).eq("year", 2024);
        assert_eq!(
            query.filter_params(),
            vec![
                ("active".to_string(), "eq.true".to_string()),
                ("year".to_string(), "eq.2024".to_string()),
            ]
        );
    }

    #[test]
    fn parses_embeds_at_top_level_only() {
        let cols = parse_columns(
            "*, vehicle:vehicles(make, model, license_plate), service:service_catalog(*)",
        );
        assert_eq!(
            cols,
            vec![
                Column::All,
                Column::Embed {
                    alias: "vehicle".into(),
                    table: "vehicles".into(),
                    columns: "make, model, license_plate".into(),
                },
                Column::Embed {
                    alias: "service".into(),
                    table: "service_catalog".into(),
                    columns: "*".into(),
                },
            ]
        );
    }

    #[test]
    fn plain_columns() {
        assert_eq!(
            parse_columns("id, brand_id,name"),
            vec![
                Column::Named("id".into()),
                Column::Named("brand_id".into()),
                Column::Named("name".into()),
            ]
        );
    }
}
