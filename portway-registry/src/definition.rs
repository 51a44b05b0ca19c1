//! `EndpointDefinition` as a tagged union (`spec.md` §3, design note 9.1):
//! the loader parses the untyped descriptor JSON into the variant named by
//! its `kind` field; everything downstream dispatches on the tag instead of
//! juggling a pile of `Option<T>` fields on one struct.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Merge,
}

impl HttpMethod {
    /// `spec.md` §6: `MERGE` is aliased to `PATCH`.
    pub fn normalize(self) -> HttpMethod {
        match self {
            HttpMethod::Merge => HttpMethod::Patch,
            other => other,
        }
    }

    pub fn from_http(method: &str) -> Option<HttpMethod> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "MERGE" => Some(HttpMethod::Merge),
            _ => None,
        }
    }
}

/// Fields shared by every endpoint kind, flattened into each variant so
/// callers can match on `EndpointDefinition` without an extra level of
/// indirection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointMeta {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub allowed_methods: Vec<HttpMethod>,
    #[serde(default)]
    pub is_private: bool,
    /// Unknown descriptor fields are preserved but ignored, for forward
    /// compatibility (`spec.md` §6).
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl EndpointMeta {
    pub fn full_path(&self) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}/{}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn allows_method(&self, method: HttpMethod) -> bool {
        let method = method.normalize();
        // GET is implicitly allowed for readable endpoint kinds per
        // `spec.md` §4.I step 6; callers that can't serve GET simply never
        // reach a state where this matters.
        method == HttpMethod::Get
            || self
                .allowed_methods
                .iter()
                .any(|m| m.normalize() == method)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ObjectType {
    Table,
    View,
    StoredProcedure,
    TableValuedFunction,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnValidationRule {
    pub regex: String,
    pub message: String,
}

/// One entry of `AllowedColumns`: either `alias:db_column` or a bare
/// `column` (alias == column).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ColumnMapping {
    pub alias: String,
    pub db_column: String,
}

impl ColumnMapping {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((alias, db_column)) => ColumnMapping {
                alias: alias.trim().to_owned(),
                db_column: db_column.trim().to_owned(),
            },
            None => ColumnMapping {
                alias: raw.trim().to_owned(),
                db_column: raw.trim().to_owned(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ParamSource {
    Path,
    Query,
    Header,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TvfParameter {
    pub name: String,
    pub source: ParamSource,
    /// 1-based position for `Source::Path`; the query/header key otherwise.
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub key: Option<String>,
    pub sql_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqlEndpoint {
    #[serde(flatten)]
    pub meta: EndpointMeta,
    pub schema: String,
    pub object_name: String,
    pub object_type: ObjectType,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub allowed_columns_raw: Vec<String>,
    #[serde(default)]
    pub required_columns: Vec<String>,
    #[serde(default)]
    pub column_validation: BTreeMap<String, ColumnValidationRule>,
    #[serde(default)]
    pub parameters: Vec<TvfParameter>,
    /// When set, mutations call this stored procedure instead of an
    /// INSERT/UPDATE/DELETE against `object_name` directly.
    #[serde(default)]
    pub procedure: Option<String>,
    #[serde(default = "default_row_limit")]
    pub max_rows: u32,
}

fn default_row_limit() -> u32 {
    1000
}

impl SqlEndpoint {
    pub fn allowed_columns(&self) -> Vec<ColumnMapping> {
        self.allowed_columns_raw
            .iter()
            .map(|s| ColumnMapping::parse(s))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyEndpoint {
    #[serde(flatten)]
    pub meta: EndpointMeta,
    pub target_url_template: String,
    #[serde(default)]
    pub method_translation: BTreeMap<String, String>,
    #[serde(default)]
    pub header_append: BTreeMap<String, Vec<HeaderEntry>>,
    #[serde(default)]
    pub header_conflict_policy: HeaderConflictPolicy,
    /// Alias -> db-column mapping reused from the SQL model so a proxy
    /// endpoint may still declare OData column aliases for `$select`
    /// translation (`spec.md` §4.F).
    #[serde(default)]
    pub allowed_columns_raw: Vec<String>,
}

impl ProxyEndpoint {
    pub fn allowed_columns(&self) -> Vec<ColumnMapping> {
        self.allowed_columns_raw
            .iter()
            .map(|s| ColumnMapping::parse(s))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderConflictPolicy {
    #[default]
    Skip,
    Overwrite,
    LogAndAdd,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompositeStep {
    pub name: String,
    pub endpoint: String,
    pub method: String,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default)]
    pub array_property: Option<String>,
    #[serde(default)]
    pub source_property: Option<String>,
    #[serde(default)]
    pub template_body: Option<Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub continue_on_error: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompositeEndpoint {
    #[serde(flatten)]
    pub meta: EndpointMeta,
    pub steps: Vec<CompositeStep>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileEndpoint {
    #[serde(flatten)]
    pub meta: EndpointMeta,
    pub storage_root: String,
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    pub max_bytes: u64,
    #[serde(default)]
    pub memory_only: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticEndpoint {
    #[serde(flatten)]
    pub meta: EndpointMeta,
    pub content_type: String,
    pub path: String,
    #[serde(default)]
    pub enable_filtering: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind")]
pub enum EndpointDefinition {
    #[serde(rename = "sql", alias = "SQL")]
    Sql(SqlEndpoint),
    #[serde(rename = "proxy", alias = "Proxy")]
    Proxy(ProxyEndpoint),
    #[serde(rename = "composite", alias = "Composite")]
    Composite(CompositeEndpoint),
    #[serde(rename = "file", alias = "File")]
    File(FileEndpoint),
    #[serde(rename = "static", alias = "Static")]
    Static(StaticEndpoint),
}

impl EndpointDefinition {
    pub fn meta(&self) -> &EndpointMeta {
        match self {
            EndpointDefinition::Sql(e) => &e.meta,
            EndpointDefinition::Proxy(e) => &e.meta,
            EndpointDefinition::Composite(e) => &e.meta,
            EndpointDefinition::File(e) => &e.meta,
            EndpointDefinition::Static(e) => &e.meta,
        }
    }

    pub fn full_path(&self) -> String {
        self.meta().full_path()
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn is_private(&self) -> bool {
        self.meta().is_private
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_aliased_to_patch() {
        assert_eq!(HttpMethod::Merge.normalize(), HttpMethod::Patch);
    }

    #[test]
    fn column_mapping_parses_alias_and_bare_forms() {
        let aliased = ColumnMapping::parse("Code:ItemCode");
        assert_eq!(aliased.alias, "Code");
        assert_eq!(aliased.db_column, "ItemCode");

        let bare = ColumnMapping::parse("Description");
        assert_eq!(bare.alias, "Description");
        assert_eq!(bare.db_column, "Description");
    }

    #[test]
    fn full_path_combines_namespace_and_name() {
        let meta = EndpointMeta {
            name: "Staff".to_owned(),
            namespace: Some("HR".to_owned()),
            allowed_methods: vec![],
            is_private: false,
            extra: Map::new(),
        };
        assert_eq!(meta.full_path(), "HR/Staff");
    }
}
