//! Lookup service response: group key -> rows, kept in wire order.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Fixed column set of every result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Endpoint,
    DateRetrieved,
    FullName,
    Npi,
    FirstName,
    LastName,
    Gender,
    Taxonomy,
    GroupName,
    Address1,
    Address2,
    City,
    State,
    Zip,
    Phone,
    Fax,
    Email,
    Latitude,
    Longitude,
    LastPracUpdate,
    LastPracRoleUpdate,
    LastLocationUpdate,
    AccuracyScore,
}

impl Column {
    pub const ALL: [Column; 23] = [
        Column::Endpoint,
        Column::DateRetrieved,
        Column::FullName,
        Column::Npi,
        Column::FirstName,
        Column::LastName,
        Column::Gender,
        Column::Taxonomy,
        Column::GroupName,
        Column::Address1,
        Column::Address2,
        Column::City,
        Column::State,
        Column::Zip,
        Column::Phone,
        Column::Fax,
        Column::Email,
        Column::Latitude,
        Column::Longitude,
        Column::LastPracUpdate,
        Column::LastPracRoleUpdate,
        Column::LastLocationUpdate,
        Column::AccuracyScore,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Endpoint => "Endpoint",
            Column::DateRetrieved => "Date Retrieved",
            Column::FullName => "Full Name",
            Column::Npi => "NPI",
            Column::FirstName => "First Name",
            Column::LastName => "Last Name",
            Column::Gender => "Gender",
            Column::Taxonomy => "Taxonomy",
            Column::GroupName => "Group Name",
            Column::Address1 => "Address 1",
            Column::Address2 => "Address 2",
            Column::City => "City",
            Column::State => "State",
            Column::Zip => "Zip",
            Column::Phone => "Phone",
            Column::Fax => "Fax",
            Column::Email => "Email",
            Column::Latitude => "Latitude",
            Column::Longitude => "Longitude",
            Column::LastPracUpdate => "Last Prac Update",
            Column::LastPracRoleUpdate => "Last Prac Role Update",
            Column::LastLocationUpdate => "Last Location Update",
            Column::AccuracyScore => "Accuracy Score",
        }
    }

    /// Key of the field inside a response row.
    pub fn key(self) -> &'static str {
        match self {
            Column::Endpoint => "Endpoint",
            Column::DateRetrieved => "DateRetrieved",
            Column::FullName => "FullName",
            Column::Npi => "NPI",
            Column::FirstName => "FirstName",
            Column::LastName => "LastName",
            Column::Gender => "Gender",
            Column::Taxonomy => "Taxonomy",
            Column::GroupName => "GroupName",
            Column::Address1 => "ADD1",
            Column::Address2 => "ADD2",
            Column::City => "City",
            Column::State => "State",
            Column::Zip => "Zip",
            Column::Phone => "Phone",
            Column::Fax => "Fax",
            Column::Email => "Email",
            Column::Latitude => "lat",
            Column::Longitude => "lng",
            Column::LastPracUpdate => "LastPracUpdate",
            Column::LastPracRoleUpdate => "LastPracRoleUpdate",
            Column::LastLocationUpdate => "LastLocationUpdate",
            Column::AccuracyScore => "AccuracyScore",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = String;

    /// Accepts the header ("Full Name"), the row key ("FullName") or either
    /// without spaces/underscores, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn squash(s: &str) -> String {
            s.chars()
                .filter(|c| !c.is_whitespace() && *c != '_')
                .flat_map(char::to_lowercase)
                .collect()
        }
        let wanted = squash(s);
        Column::ALL
            .into_iter()
            .find(|c| squash(c.header()) == wanted || squash(c.key()) == wanted)
            .ok_or_else(|| format!("unknown column {s:?}"))
    }
}

/// One row returned by the lookup service. Kept as the raw JSON object so the
/// downloaded artifact matches what the service sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRow(Map<String, Value>);

impl ResultRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.0.get(Column::Endpoint.key()).and_then(Value::as_str)
    }

    pub fn cell(&self, column: Column) -> Option<&Value> {
        self.0.get(column.key()).filter(|v| !v.is_null())
    }

    pub fn cell_text(&self, column: Column) -> String {
        match self.cell(column) {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Ordering used by table sorting: missing cells first, then numbers
/// numerically when both sides are numeric, otherwise text.
pub fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => text(a).cmp(&text(b)),
        },
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultGroup {
    pub key: String,
    pub rows: Vec<ResultRow>,
}

/// Mapping group key -> rows, iterated in the order the service sent them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    groups: Vec<ResultGroup>,
}

impl QueryResponse {
    pub fn from_groups(groups: impl IntoIterator<Item = (String, Vec<ResultRow>)>) -> Self {
        let mut response = Self::default();
        for (key, rows) in groups {
            response.insert(key, rows);
        }
        response
    }

    /// Inserts a group; a repeated key replaces the earlier rows in place.
    pub fn insert(&mut self, key: String, rows: Vec<ResultRow>) {
        match self.groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.rows = rows,
            None => self.groups.push(ResultGroup { key, rows }),
        }
    }

    pub fn groups(&self) -> &[ResultGroup] {
        &self.groups
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&[ResultRow]> {
        self.groups
            .iter()
            .find(|g| g.key == key)
            .map(|g| g.rows.as_slice())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }
}

impl Serialize for QueryResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.key, &group.rows)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QueryResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupsVisitor;

        impl<'de> Visitor<'de> for GroupsVisitor {
            type Value = QueryResponse;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping group keys to arrays of rows")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut response = QueryResponse::default();
                while let Some((key, rows)) = access.next_entry::<String, Vec<ResultRow>>()? {
                    response.insert(key, rows);
                }
                Ok(response)
            }
        }

        deserializer.deserialize_map(GroupsVisitor)
    }
}
