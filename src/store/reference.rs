//! Reference mass-balance catalog
//!
//! A small number of glaciers carry in-situ mass-balance measurements. The
//! catalog links inventory identifiers to measurement identifiers and serves
//! the per-glacier tables:
//!
//! ```text
//! {root}/links.csv                         RGI50_ID,RGI60_ID,...,WGMS_ID
//! {root}/mbdata/mbdata_WGMS-{id:05}.csv     YEAR,ANNUAL_BALANCE,...
//! {root}/mb_profiles/profile_WGMS-{id:05}.csv  YEAR,<altitude>,<altitude>,...
//! ```

use crate::entity::EntityId;
use crate::error::WorkflowError;
use crate::tabular::split_record;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub const ANNUAL_BALANCE: &str = "ANNUAL_BALANCE";

/// Baseline period written by the climate tasks into `climate_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateInfo {
    pub baseline_hydro_yr_0: i32,
    pub baseline_hydro_yr_1: i32,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Table of yearly values, rows keyed by year
#[derive(Debug, Clone, PartialEq)]
pub struct YearTable {
    pub columns: Vec<String>,
    pub rows: BTreeMap<i32, Vec<Option<f64>>>,
}

impl YearTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<BTreeMap<i32, Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|(y, row)| (*y, row[idx])).collect())
    }

    /// Restrict to `[y0, y1]`; single-row tables are kept as they are.
    pub fn period(mut self, y0: i32, y1: i32) -> Self {
        if self.rows.len() > 1 {
            self.rows.retain(|year, _| *year >= y0 && *year <= y1);
        }
        self
    }

    /// Drop rows where `column` is missing.
    pub fn drop_missing(mut self, column: &str) -> Self {
        if let Some(idx) = self.column_index(column) {
            self.rows.retain(|_, row| row[idx].is_some());
        }
        self
    }

    /// Drop columns and rows that hold no value at all.
    pub fn drop_empty(mut self) -> Self {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| self.rows.values().any(|row| row[i].is_some()))
            .collect();
        self.columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        for row in self.rows.values_mut() {
            *row = keep.iter().map(|&i| row[i]).collect();
        }
        self.rows.retain(|_, row| row.iter().any(Option::is_some));
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn parse_csv(path: &Path) -> Result<Self, WorkflowError> {
        let text = fs::read_to_string(path).map_err(|e| WorkflowError::io_context(path, "read", e))?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| WorkflowError::Serialization(format!("Empty table {:?}", path)))?;
        let columns: Vec<String> = split_record(header).into_iter().skip(1).collect();

        let mut rows = BTreeMap::new();
        for line in lines {
            let fields = split_record(line);
            let year: i32 = fields[0].parse().map_err(|_| {
                WorkflowError::Serialization(format!("Invalid year {:?} in {:?}", fields[0], path))
            })?;
            let values = (0..columns.len())
                .map(|i| fields.get(i + 1).and_then(|v| parse_value(v)))
                .collect();
            rows.insert(year, values);
        }
        Ok(Self { columns, rows })
    }
}

/// Reference mass-balance profile: columns are altitudes (m)
#[derive(Debug, Clone, PartialEq)]
pub struct MassBalanceProfile {
    pub altitudes: Vec<f64>,
    pub table: YearTable,
}

impl MassBalanceProfile {
    pub(crate) fn from_table(table: YearTable) -> Result<Self, WorkflowError> {
        let altitudes = table
            .columns
            .iter()
            .map(|c| {
                c.parse::<f64>()
                    .map_err(|_| WorkflowError::Serialization(format!("Invalid profile altitude {:?}", c)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { altitudes, table })
    }
}

/// Handle on a reference data directory
#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    root: PathBuf,
    /// Column name -> (entity id -> measurement id)
    links: HashMap<String, HashMap<String, u32>>,
}

impl ReferenceCatalog {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, WorkflowError> {
        let root = root.as_ref().to_path_buf();
        let links_path = root.join("links.csv");
        let text = fs::read_to_string(&links_path)
            .map_err(|e| WorkflowError::io_context(&links_path, "read", e))?;

        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = split_record(lines.next().unwrap_or(""));
        let wgms_col = header.iter().position(|h| h == "WGMS_ID").ok_or_else(|| {
            WorkflowError::Serialization(format!("{:?} has no WGMS_ID column", links_path))
        })?;

        let mut links: HashMap<String, HashMap<String, u32>> = HashMap::new();
        for line in lines {
            let fields = split_record(line);
            let Some(wgms_id) = fields.get(wgms_col).and_then(|v| v.parse::<u32>().ok()) else {
                continue;
            };
            for (i, name) in header.iter().enumerate() {
                if i == wgms_col {
                    continue;
                }
                if let Some(id) = fields.get(i).filter(|v| !v.is_empty()) {
                    links.entry(name.clone()).or_default().insert(id.clone(), wgms_id);
                }
            }
        }
        Ok(Self { root, links })
    }

    /// Measurement id linked to `id`, looked up in the column of its inventory version.
    pub fn wgms_id(&self, id: &EntityId) -> Result<u32, WorkflowError> {
        let major = id.version().chars().next().unwrap_or('6');
        let column = format!("RGI{}0_ID", major);
        self.links
            .get(&column)
            .and_then(|m| m.get(id.as_str()))
            .copied()
            .ok_or_else(|| WorkflowError::NotAReferenceEntity(id.to_string()))
    }

    pub fn is_reference(&self, id: &EntityId) -> bool {
        self.wgms_id(id).is_ok()
    }

    pub fn load_mb_series(&self, wgms_id: u32) -> Result<YearTable, WorkflowError> {
        YearTable::parse_csv(&self.root.join("mbdata").join(format!("mbdata_WGMS-{:05}.csv", wgms_id)))
    }

    /// `None` if this glacier has no profile measurements.
    pub fn load_mb_profile(&self, wgms_id: u32) -> Result<Option<MassBalanceProfile>, WorkflowError> {
        let path = self
            .root
            .join("mb_profiles")
            .join(format!("profile_WGMS-{:05}.csv", wgms_id));
        if !path.exists() {
            return Ok(None);
        }
        MassBalanceProfile::from_table(YearTable::parse_csv(&path)?).map(Some)
    }
}

fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
