//! Record shapes produced by a [`DataSource`](crate::source::DataSource) and the two
//! functions that turn them into table data: [`extract_columns`] derives the column
//! list from a sample record, [`decode_row`] renders any record against that list.

use std::fmt;

use tracing::trace;

use crate::domain::TVError;

/// Cell used when a column has no counterpart in the record.
pub const NIL_CELL: &str = "<nil>";
/// Cell used for every column when the record shape can not be decoded.
pub const UNSUPPORTED_CELL: &str = "<unsupported>";
pub const NULL_CELL: &str = "∅";

/// Display ready cells of one record, aligned to the column order.
pub type Row = Vec<String>;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(NULL_CELL),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(&s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A field of a struct shaped record.
///
/// `tag` is a comma separated metadata string, e.g. `name=age, type=INT32`. Its
/// `name=` entry overrides the field identifier as the column name.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub ident: String,
    pub tag: Option<String>,
    pub value: Value,
}

impl StructField {
    pub fn new(ident: impl Into<String>, value: Value) -> Self {
        Self {
            ident: ident.into(),
            tag: None,
            value,
        }
    }

    pub fn tagged(ident: impl Into<String>, tag: impl Into<String>, value: Value) -> Self {
        Self {
            ident: ident.into(),
            tag: Some(tag.into()),
            value,
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag
            .as_deref()?
            .split(',')
            .map(str::trim)
            .find_map(|part| part.strip_prefix("name="))
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.tag_name().unwrap_or(&self.ident)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Field name to value, kept in first-seen insertion order.
    Map(Vec<(String, Value)>),
    Struct(Vec<StructField>),
    /// Anything else, described by its type name.
    Other(String),
}

impl Record {
    fn shape(&self) -> &str {
        match self {
            Record::Map(_) => "map",
            Record::Struct(_) => "struct",
            Record::Other(name) => name,
        }
    }
}

/// Derives the ordered column list from one sample record.
///
/// Map keys keep their insertion order, struct fields their declaration order.
/// Repeated names only produce the first column.
pub fn extract_columns(sample: &Record, width: usize) -> Result<Vec<Column>, TVError> {
    let names: Vec<&str> = match sample {
        Record::Map(entries) => entries.iter().map(|(key, _)| key.as_str()).collect(),
        Record::Struct(fields) => fields.iter().map(StructField::display_name).collect(),
        Record::Other(_) => Vec::new(),
    };

    let mut columns: Vec<Column> = Vec::with_capacity(names.len());
    for name in names {
        if !columns.iter().any(|c| c.name == name) {
            columns.push(Column {
                name: name.to_string(),
                width,
            });
        }
    }

    trace!("Extracted {} columns from {} record", columns.len(), sample.shape());
    if columns.is_empty() {
        return Err(TVError::SchemaUndetermined);
    }
    Ok(columns)
}

/// Renders a record against the column list. Never fails: missing fields become
/// [`NIL_CELL`] and undecodable records a row of [`UNSUPPORTED_CELL`].
pub fn decode_row(record: &Record, columns: &[Column]) -> Row {
    match record {
        Record::Map(entries) => columns
            .iter()
            .map(|column| {
                entries
                    .iter()
                    .find(|(key, _)| *key == column.name)
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| NIL_CELL.to_string())
            })
            .collect(),
        Record::Struct(fields) => columns
            .iter()
            .map(|column| {
                fields
                    .iter()
                    .find(|field| field.display_name() == column.name)
                    .or_else(|| fields.iter().find(|field| field.ident == column.name))
                    .map(|field| field.value.to_string())
                    .unwrap_or_else(|| NIL_CELL.to_string())
            })
            .collect(),
        Record::Other(_) => vec![UNSUPPORTED_CELL.to_string(); columns.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Record {
        Record::Struct(vec![
            StructField::tagged(
                "Name",
                "name=name, type=BYTE_ARRAY, convertedtype=UTF8",
                Value::Text("Student 1".into()),
            ),
            StructField::tagged("Age", "name=age, type=INT32", Value::Int(18)),
            StructField::new("Active", Value::Bool(true)),
            StructField::tagged("Gpa", "type=DOUBLE", Value::Float(3.5)),
        ])
    }

    fn names(columns: &[Column]) -> Vec<&str> {
        columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn map_columns_keep_insertion_order() {
        let record = Record::Map(vec![
            ("zeta".into(), Value::Int(1)),
            ("alpha".into(), Value::Int(2)),
            ("mid".into(), Value::Null),
        ]);
        let columns = extract_columns(&record, 20).unwrap();
        assert_eq!(names(&columns), vec!["zeta", "alpha", "mid"]);
        assert!(columns.iter().all(|c| c.width == 20));

        // Deterministic for the same sample
        assert_eq!(extract_columns(&record, 20).unwrap(), columns);
    }

    #[test]
    fn struct_columns_prefer_tag_names() {
        let columns = extract_columns(&student(), 12).unwrap();
        assert_eq!(names(&columns), vec!["name", "age", "Active", "Gpa"]);
    }

    #[test]
    fn tag_name_tolerates_spacing() {
        let field = StructField::tagged("Weight", " type=FLOAT,  name= weight ", Value::Float(1.0));
        assert_eq!(field.tag_name(), Some("weight"));
        let field = StructField::tagged("Weight", "name=", Value::Float(1.0));
        assert_eq!(field.display_name(), "Weight");
    }

    #[test]
    fn undeterminable_schemas_fail() {
        assert!(matches!(
            extract_columns(&Record::Other("i64".into()), 20),
            Err(TVError::SchemaUndetermined)
        ));
        assert!(matches!(
            extract_columns(&Record::Map(Vec::new()), 20),
            Err(TVError::SchemaUndetermined)
        ));
        assert!(matches!(
            extract_columns(&Record::Struct(Vec::new()), 20),
            Err(TVError::SchemaUndetermined)
        ));
    }

    #[test]
    fn decoding_a_complete_record_has_no_placeholders() {
        let record = student();
        let columns = extract_columns(&record, 20).unwrap();
        let row = decode_row(&record, &columns);
        assert_eq!(row, vec!["Student 1", "18", "true", "3.5"]);
        assert!(!row.iter().any(|c| c == NIL_CELL || c == UNSUPPORTED_CELL));
    }

    #[test]
    fn missing_fields_render_nil() {
        let columns = extract_columns(
            &Record::Map(vec![("id".into(), Value::Int(0)), ("name".into(), Value::Null)]),
            20,
        )
        .unwrap();
        let row = decode_row(&Record::Map(vec![("id".into(), Value::Int(7))]), &columns);
        assert_eq!(row, vec!["7", NIL_CELL]);

        let row = decode_row(&Record::Struct(vec![StructField::new("other", Value::Int(1))]), &columns);
        assert_eq!(row, vec![NIL_CELL, NIL_CELL]);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let columns = vec![
            Column { name: "name".into(), width: 20 },
            Column { name: "id".into(), width: 20 },
        ];
        let record = Record::Map(vec![
            ("age".into(), Value::Int(19)),
            ("id".into(), Value::Int(1001)),
            ("name".into(), Value::Text("Student 2".into())),
        ]);
        assert_eq!(decode_row(&record, &columns), vec!["Student 2", "1001"]);
    }

    #[test]
    fn decoder_is_total() {
        let columns = extract_columns(&student(), 20).unwrap();
        for record in [
            student(),
            Record::Map(Vec::new()),
            Record::Struct(Vec::new()),
            Record::Other("chan int".into()),
        ] {
            assert_eq!(decode_row(&record, &columns).len(), columns.len());
        }
        assert_eq!(
            decode_row(&Record::Other("chan int".into()), &columns),
            vec![UNSUPPORTED_CELL; 4]
        );
        assert!(decode_row(&student(), &[]).is_empty());
    }

    #[test]
    fn struct_fields_match_identifier_as_fallback() {
        let columns = vec![Column { name: "Age".into(), width: 20 }];
        assert_eq!(decode_row(&student(), &columns), vec!["18"]);
    }

    #[test]
    fn values_render_canonically() {
        assert_eq!(Value::Null.to_string(), NULL_CELL);
        assert_eq!(Value::Text("a\nb\r\nc".into()).to_string(), "a ↵ b ↵ c");
        assert_eq!(
            Value::List(vec![Value::Text("Course 1".into()), Value::Int(3)]).to_string(),
            "[Course 1, 3]"
        );
        assert_eq!(Value::Float(50.5).to_string(), "50.5");
    }
}
