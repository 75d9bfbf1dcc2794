use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::sql_types::{BigInt, Binary, Double, Text};
use diesel::sqlite::{Sqlite, SqliteType};
use diesel_dynamic_schema::dynamic_value::Any;
use serde_json::{Number, Value};

/// A single cell of an ad-hoc result set, typed by SQLite's storage class.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl FromSql<Any, Sqlite> for QueryValue {
    fn from_sql(value: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
        match value.value_type() {
            Some(SqliteType::Long | SqliteType::Integer | SqliteType::SmallInt) => {
                <i64 as FromSql<BigInt, Sqlite>>::from_sql(value).map(QueryValue::Integer)
            }
            Some(SqliteType::Double | SqliteType::Float) => {
                <f64 as FromSql<Double, Sqlite>>::from_sql(value).map(QueryValue::Real)
            }
            Some(SqliteType::Text) => {
                <String as FromSql<Text, Sqlite>>::from_sql(value).map(QueryValue::Text)
            }
            Some(SqliteType::Binary) => {
                <Vec<u8> as FromSql<Binary, Sqlite>>::from_sql(value).map(QueryValue::Blob)
            }
            #[allow(unreachable_patterns)]
            Some(_) => Err("unsupported SQLite storage class".into()),
            None => Ok(QueryValue::Null),
        }
    }

    fn from_nullable_sql(
        value: Option<<Sqlite as Backend>::RawValue<'_>>,
    ) -> deserialize::Result<Self> {
        match value {
            Some(value) => Self::from_sql(value),
            None => Ok(QueryValue::Null),
        }
    }
}

impl From<QueryValue> for Value {
    fn from(value: QueryValue) -> Self {
        match value {
            QueryValue::Null => Value::Null,
            QueryValue::Integer(i) => Value::from(i),
            QueryValue::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            QueryValue::Text(s) => Value::String(s),
            QueryValue::Blob(bytes) => Value::from(bytes),
        }
    }
}

/// True if anything but whitespace, comments or further `;` follows the
/// first statement terminator. Quotes and comments are skipped so a `;`
/// inside them does not count.
pub fn has_trailing_statement(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut terminated = false;

    while let Some(c) = chars.next() {
        match c {
            '-' if chars.peek() == Some(&'-') => {
                chars.by_ref().find(|&c| c == '\n');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                chars.by_ref().find(|&c| {
                    let closed = prev == '*' && c == '/';
                    prev = c;
                    closed
                });
            }
            ';' => terminated = true,
            c if c.is_whitespace() => {}
            _ if terminated => return true,
            '\'' | '"' | '`' => {
                chars.by_ref().find(|&next| next == c);
            }
            '[' => {
                chars.by_ref().find(|&next| next == ']');
            }
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_statements() {
        assert!(!has_trailing_statement("SELECT 1"));
        assert!(!has_trailing_statement("SELECT 1;"));
        assert!(!has_trailing_statement("SELECT 1 ;; \n "));
        assert!(!has_trailing_statement("SELECT 1; -- done"));
        assert!(!has_trailing_statement("SELECT 1; /* done */"));
        assert!(!has_trailing_statement("SELECT 'a;b', \"c;d\", [e;f] FROM t"));
        assert!(!has_trailing_statement("SELECT 'it''s; fine'"));
        assert!(!has_trailing_statement("SELECT 1 -- ; SELECT 2"));
    }

    #[test]
    fn second_statement_is_detected() {
        assert!(has_trailing_statement("SELECT 1 AS a; SELECT 2 AS b"));
        assert!(has_trailing_statement("SELECT 1;\nSELECT 2;"));
        assert!(has_trailing_statement("SELECT 1; /* x */ SELECT 2"));
        assert!(has_trailing_statement("SELECT ';'; SELECT 2"));
    }

    #[test]
    fn cells_become_json() {
        assert_eq!(Value::from(QueryValue::Null), Value::Null);
        assert_eq!(Value::from(QueryValue::Integer(-62)), Value::from(-62));
        assert_eq!(Value::from(QueryValue::Real(21.5)), Value::from(21.5));
        assert_eq!(
            Value::from(QueryValue::Text("esp32-a".into())),
            Value::from("esp32-a")
        );
        assert_eq!(Value::from(QueryValue::Real(f64::NAN)), Value::Null);
    }
}
