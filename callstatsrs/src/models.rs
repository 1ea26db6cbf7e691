//! Section query request types.
//!
//! These mirror what the dashboard UI stores for a section: the time bucket,
//! an optional date range, dimension filters, projection, grouping and the
//! advanced boolean filter built in the filter editor.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Bucket size of the pre-aggregated statistics tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeGranularity {
    #[serde(rename = "15min")]
    Min15,
    #[serde(rename = "30min")]
    Min30,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "monthly")]
    Monthly,
    #[serde(rename = "yearly")]
    Yearly,
}

impl TimeGranularity {
    pub const ALL: [TimeGranularity; 6] = [
        TimeGranularity::Min15,
        TimeGranularity::Min30,
        TimeGranularity::Hourly,
        TimeGranularity::Daily,
        TimeGranularity::Monthly,
        TimeGranularity::Yearly,
    ];

    /// Parse a UI interval token. Matching ignores case and surrounding whitespace.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(token))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGranularity::Min15 => "15min",
            TimeGranularity::Min30 => "30min",
            TimeGranularity::Hourly => "hourly",
            TimeGranularity::Daily => "daily",
            TimeGranularity::Monthly => "monthly",
            TimeGranularity::Yearly => "yearly",
        }
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a condition or group joins whatever precedes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

impl Serialize for LogicalOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogicalOperator {
    // The editor sends null for the first condition of a list.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw.as_str().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("or") => LogicalOperator::Or,
            _ => LogicalOperator::And,
        })
    }
}

/// Operators offered by the filter editor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionOperator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    NotLike,
    /// `LIKE%`: value is a prefix.
    StartsWith,
    /// `%LIKE`: value is a suffix.
    EndsWith,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
    /// `=true` on a 0/1 column.
    IsTrue,
    /// `=false` on a 0/1 column.
    IsFalse,
    /// Anything the editor sent that is not listed above.
    Unrecognized(String),
}

/// Value a condition operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    Scalar,
    Range,
    None,
}

impl ConditionOperator {
    pub fn parse(token: &str) -> Self {
        let normalized = token.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "=" | "==" => ConditionOperator::Eq,
            "!=" | "<>" => ConditionOperator::Neq,
            ">" => ConditionOperator::Gt,
            "<" => ConditionOperator::Lt,
            ">=" => ConditionOperator::Gte,
            "<=" => ConditionOperator::Lte,
            "LIKE" => ConditionOperator::Like,
            "NOT LIKE" => ConditionOperator::NotLike,
            "LIKE%" => ConditionOperator::StartsWith,
            "%LIKE" => ConditionOperator::EndsWith,
            "BETWEEN" => ConditionOperator::Between,
            "NOT BETWEEN" => ConditionOperator::NotBetween,
            "IS NULL" => ConditionOperator::IsNull,
            "IS NOT NULL" => ConditionOperator::IsNotNull,
            "=TRUE" => ConditionOperator::IsTrue,
            "=FALSE" => ConditionOperator::IsFalse,
            _ => ConditionOperator::Unrecognized(token.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ConditionOperator::Eq => "=",
            ConditionOperator::Neq => "!=",
            ConditionOperator::Gt => ">",
            ConditionOperator::Lt => "<",
            ConditionOperator::Gte => ">=",
            ConditionOperator::Lte => "<=",
            ConditionOperator::Like => "LIKE",
            ConditionOperator::NotLike => "NOT LIKE",
            ConditionOperator::StartsWith => "LIKE%",
            ConditionOperator::EndsWith => "%LIKE",
            ConditionOperator::Between => "BETWEEN",
            ConditionOperator::NotBetween => "NOT BETWEEN",
            ConditionOperator::IsNull => "IS NULL",
            ConditionOperator::IsNotNull => "IS NOT NULL",
            ConditionOperator::IsTrue => "=true",
            ConditionOperator::IsFalse => "=false",
            ConditionOperator::Unrecognized(raw) => raw.as_str(),
        }
    }

    pub fn value_shape(&self) -> Option<ValueShape> {
        match self {
            ConditionOperator::Eq
            | ConditionOperator::Neq
            | ConditionOperator::Gt
            | ConditionOperator::Lt
            | ConditionOperator::Gte
            | ConditionOperator::Lte
            | ConditionOperator::Like
            | ConditionOperator::NotLike
            | ConditionOperator::StartsWith
            | ConditionOperator::EndsWith => Some(ValueShape::Scalar),
            ConditionOperator::Between | ConditionOperator::NotBetween => Some(ValueShape::Range),
            ConditionOperator::IsNull
            | ConditionOperator::IsNotNull
            | ConditionOperator::IsTrue
            | ConditionOperator::IsFalse => Some(ValueShape::None),
            ConditionOperator::Unrecognized(_) => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.value_shape().is_some()
    }

    /// Non-string tokens are kept as unrecognized so the condition is skipped
    /// rather than failing the request.
    fn from_json(raw: &Value) -> Self {
        match raw {
            Value::String(token) => ConditionOperator::parse(token),
            other => ConditionOperator::Unrecognized(other.to_string()),
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConditionOperator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConditionOperator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(ConditionOperator::from_json(&raw))
    }
}

/// One leaf test of the advanced filter.
///
/// Deserialization never fails on a half-filled condition: null or missing
/// parts come through empty and the condition is skipped at compile time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawCondition")]
pub struct Condition {
    pub field: String,
    pub operator: Option<ConditionOperator>,
    /// Scalar, `[low, high]` for BETWEEN, or null.
    pub value: Value,
    pub logical_operator: LogicalOperator,
    pub is_not: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCondition {
    #[serde(default)]
    field: Value,
    #[serde(default)]
    operator: Value,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    logical_operator: LogicalOperator,
    #[serde(default)]
    is_not: Value,
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        Self {
            field: raw.field.as_str().unwrap_or_default().to_string(),
            operator: match raw.operator {
                Value::Null => None,
                other => Some(ConditionOperator::from_json(&other)),
            },
            value: raw.value,
            logical_operator: raw.logical_operator,
            is_not: raw.is_not.as_bool().unwrap_or(false),
        }
    }
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: &str, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: Some(ConditionOperator::parse(operator)),
            value,
            logical_operator: LogicalOperator::And,
            is_not: false,
        }
    }

    /// Join this condition to its predecessor with OR.
    pub fn or(mut self) -> Self {
        self.logical_operator = LogicalOperator::Or;
        self
    }

    pub fn negated(mut self) -> Self {
        self.is_not = true;
        self
    }

    /// A condition needs a field and a recognized operator to be compiled.
    pub fn is_complete(&self) -> bool {
        !self.field.trim().is_empty()
            && self
                .operator
                .as_ref()
                .is_some_and(ConditionOperator::is_recognized)
    }
}

/// A node of the advanced filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    Condition(Condition),
    Group(ConditionGroup),
}

/// Parenthesized set of nodes joined to its predecessor by `logical_operator`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    pub logical_operator: LogicalOperator,
    pub children: Vec<FilterNode>,
}

impl ConditionGroup {
    pub fn new(logical_operator: LogicalOperator, children: Vec<FilterNode>) -> Self {
        Self {
            logical_operator,
            children,
        }
    }

    pub fn of_conditions(logical_operator: LogicalOperator, conditions: Vec<Condition>) -> Self {
        Self::new(
            logical_operator,
            conditions.into_iter().map(FilterNode::Condition).collect(),
        )
    }
}

/// Root of the advanced filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterTree {
    pub children: Vec<FilterNode>,
}

impl FilterTree {
    /// Build a tree in editor order: conditions first, then groups.
    pub fn new(conditions: Vec<Condition>, groups: Vec<ConditionGroup>) -> Self {
        let children = conditions
            .into_iter()
            .map(FilterNode::Condition)
            .chain(groups.into_iter().map(FilterNode::Group))
            .collect();
        Self { children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Accepts both the editor shape (`conditions` + `groups`) and the native
/// shape (`children`).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNodeList {
    #[serde(default)]
    logical_operator: LogicalOperator,
    #[serde(default)]
    conditions: Option<Vec<Condition>>,
    #[serde(default)]
    groups: Option<Vec<ConditionGroup>>,
    #[serde(default)]
    children: Option<Vec<FilterNode>>,
}

impl RawNodeList {
    fn into_children<E: de::Error>(self) -> Result<Vec<FilterNode>, E> {
        match (self.children, self.conditions, self.groups) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(E::custom(
                "filter lists use either 'children' or 'conditions'/'groups', not both",
            )),
            (Some(children), None, None) => Ok(children),
            (None, conditions, groups) => Ok(FilterTree::new(
                conditions.unwrap_or_default(),
                groups.unwrap_or_default(),
            )
            .children),
        }
    }
}

impl<'de> Deserialize<'de> for ConditionGroup {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawNodeList::deserialize(deserializer)?;
        let logical_operator = raw.logical_operator;
        Ok(ConditionGroup {
            logical_operator,
            children: raw.into_children::<D::Error>()?,
        })
    }
}

impl<'de> Deserialize<'de> for FilterTree {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawNodeList::deserialize(deserializer)?;
        Ok(FilterTree {
            children: raw.into_children::<D::Error>()?,
        })
    }
}

/// Advanced filter as stored on a section: a structured tree, or pre-built
/// WHERE text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AdvancedFilter {
    Raw(String),
    Tree(FilterTree),
}

impl<'de> Deserialize<'de> for AdvancedFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(AdvancedFilter::Raw(text)),
            tree @ Value::Object(_) => FilterTree::deserialize(tree)
                .map(AdvancedFilter::Tree)
                .map_err(|e| de::Error::custom(format!("invalid advanced filter tree: {e}"))),
            other => Err(de::Error::custom(format!(
                "advanced filter must be WHERE text or a filter tree, got {other}"
            ))),
        }
    }
}

/// Categorical restrictions. An empty list means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionFilters {
    pub queues: Vec<String>,
    pub channels: Vec<String>,
}

impl DimensionFilters {
    /// Non-empty restrictions as `(column, values)`, in a fixed order.
    pub fn restrictions(&self) -> impl Iterator<Item = (&'static str, &[String])> {
        [("queue", self.queues.as_slice()), ("channel", self.channels.as_slice())]
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

/// Stored query configuration of one dashboard section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionQuery {
    #[serde(default)]
    pub time_interval: Option<String>,
    #[serde(default, with = "calendar")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default, with = "calendar")]
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub filters: DimensionFilters,
    #[serde(default)]
    pub group_by: Option<String>,
    #[serde(default)]
    pub advanced_filters: Option<AdvancedFilter>,
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
}

fn default_columns() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for SectionQuery {
    fn default() -> Self {
        Self {
            time_interval: None,
            start_date: None,
            end_date: None,
            filters: DimensionFilters::default(),
            group_by: None,
            advanced_filters: None,
            columns: default_columns(),
        }
    }
}

impl SectionQuery {
    pub fn new(granularity: TimeGranularity) -> Self {
        Self {
            time_interval: Some(granularity.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn with_date_range(
        mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_queues<I, S>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.queues = queues.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter_tree(mut self, tree: FilterTree) -> Self {
        self.advanced_filters = Some(AdvancedFilter::Tree(tree));
        self
    }

    pub fn with_raw_filter(mut self, text: impl Into<String>) -> Self {
        self.advanced_filters = Some(AdvancedFilter::Raw(text.into()));
        self
    }

    pub fn with_group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by = Some(field.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn date_range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// Parse the calendar values the dashboard sends: RFC 3339 timestamps (taken
/// as UTC), `YYYY-MM-DD HH:MM[:SS]`, or a bare `YYYY-MM-DD` (midnight).
pub fn parse_calendar_value(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    const FORMATS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

mod calendar {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => super::parse_calendar_value(s)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid calendar value {s:?}"))),
        }
    }
}
