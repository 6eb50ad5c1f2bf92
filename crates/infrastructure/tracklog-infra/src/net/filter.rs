use chrono::{DateTime, SecondsFormat, Utc};

/// Row filter in PostgREST query syntax (`column=op.value`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { column: String, value: String },
    Lt { column: String, value: String },
    /// `or=(column.is.null,column.gt.value)`: open-ended rows always match.
    NullOrGt { column: String, value: String },
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Filter {
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Self::Eq {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn lt(column: &str, at: DateTime<Utc>) -> Self {
        Self::Lt {
            column: column.to_string(),
            value: timestamp(at),
        }
    }

    pub fn null_or_gt(column: &str, at: DateTime<Utc>) -> Self {
        Self::NullOrGt {
            column: column.to_string(),
            value: timestamp(at),
        }
    }

    pub fn to_query_pair(&self) -> (String, String) {
        match self {
            Self::Eq { column, value } => (column.clone(), format!("eq.{value}")),
            Self::Lt { column, value } => (column.clone(), format!("lt.{value}")),
            Self::NullOrGt { column, value } => (
                "or".to_string(),
                format!("({column}.is.null,{column}.gt.{value})"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_filters_render_postgrest_syntax() {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(
            Filter::null_or_gt("ended_at", start).to_query_pair(),
            (
                "or".to_string(),
                "(ended_at.is.null,ended_at.gt.2024-03-10T00:00:00Z)".to_string()
            )
        );
        assert_eq!(
            Filter::lt("started_at", start).to_query_pair(),
            ("started_at".to_string(), "lt.2024-03-10T00:00:00Z".to_string())
        );
        assert_eq!(
            Filter::eq("archived", false).to_query_pair(),
            ("archived".to_string(), "eq.false".to_string())
        );
    }
}
