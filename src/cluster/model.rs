use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_MAX_VERSIONS;
use crate::constants::DEFAULT_NAMESPACE;
use crate::StoreError;

/// `namespace:qualifier`. A bare qualifier lives in the `default` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    namespace: String,
    qualifier: String,
}

impl TableName {
    pub fn new(
        namespace: &str,
        qualifier: &str,
    ) -> Result<Self, StoreError> {
        let full = format!("{namespace}:{qualifier}");
        Self::validate_part(namespace).map_err(|reason| {
            StoreError::InvalidTableName {
                name: full.clone(),
                reason,
            }
        })?;
        Self::validate_part(qualifier)
            .map_err(|reason| StoreError::InvalidTableName { name: full, reason })?;
        Ok(Self {
            namespace: namespace.to_string(),
            qualifier: qualifier.to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    /// Always `namespace:qualifier`, including for the default namespace.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.namespace, self.qualifier)
    }

    /// Namespaces and qualifiers use `[A-Za-z0-9_.-]`, must be non-empty and
    /// must not start with a dot.
    pub(crate) fn validate_part(part: &str) -> Result<(), &'static str> {
        if part.is_empty() {
            return Err("name part must not be empty");
        }
        if part.starts_with('.') {
            return Err("name part must not start with '.'");
        }
        if !part.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            return Err("only [A-Za-z0-9_.-] are allowed");
        }
        Ok(())
    }
}

impl FromStr for TableName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((_, q)) if q.contains(':') => Err(StoreError::InvalidTableName {
                name: s.to_string(),
                reason: "at most one ':' separator is allowed",
            }),
            Some((ns, q)) => TableName::new(ns, q),
            None => TableName::new(DEFAULT_NAMESPACE, s),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.namespace == DEFAULT_NAMESPACE {
            write!(f, "{}", self.qualifier)
        } else {
            write!(f, "{}:{}", self.namespace, self.qualifier)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFamilyDescriptor {
    pub name: String,
    pub max_versions: u32,
}

impl ColumnFamilyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_versions: DEFAULT_MAX_VERSIONS,
        }
    }

    pub fn with_max_versions(
        mut self,
        max_versions: u32,
    ) -> Self {
        self.max_versions = max_versions.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: TableName,
    pub families: Vec<ColumnFamilyDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: TableName) -> Self {
        Self {
            name,
            families: Vec::new(),
        }
    }

    pub fn with_family(
        mut self,
        family: ColumnFamilyDescriptor,
    ) -> Self {
        self.families.push(family);
        self
    }

    /// Same families, each keeping `max_versions` (store default if `None`).
    pub fn with_families<I, S>(
        mut self,
        families: I,
        max_versions: Option<u32>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for family in families {
            let mut cf = ColumnFamilyDescriptor::new(family);
            if let Some(v) = max_versions {
                cf = cf.with_max_versions(v);
            }
            self.families.push(cf);
        }
        self
    }

    pub fn family(
        &self,
        name: &[u8],
    ) -> Option<&ColumnFamilyDescriptor> {
        self.families.iter().find(|f| f.name.as_bytes() == name)
    }
}

/// One stored version of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub row: Vec<u8>,
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub timestamp: u64,
    pub value: Vec<u8>,
}

/// Cells of one row, ordered by family, qualifier, then newest version first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    pub row: Vec<u8>,
    pub cells: Vec<Cell>,
}

impl RowResult {
    /// Newest value of `family:qualifier`.
    pub fn value(
        &self,
        family: &[u8],
        qualifier: &[u8],
    ) -> Option<&[u8]> {
        self.cells
            .iter()
            .find(|c| c.family == family && c.qualifier == qualifier)
            .map(|c| c.value.as_slice())
    }

    /// Every stored version of `family:qualifier`, newest first.
    pub fn versions(
        &self,
        family: &[u8],
        qualifier: &[u8],
    ) -> Vec<&Cell> {
        self.cells.iter().filter(|c| c.family == family && c.qualifier == qualifier).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
