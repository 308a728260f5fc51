//! Check-in dataset store
//!
//! Loads the tab-separated check-in table once and keeps a few indices over it.
//! Nothing mutates a [`Dataset`] after construction, so it can be shared
//! behind an `Arc` by any number of readers.

use chrono::DateTime;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::{
    error::{EngineError, EngineResult},
    models::{CheckIn, Coordinates, UserProfile},
};

/// Number of columns in every row of the source file
const COLUMN_COUNT: usize = 8;

/// Timestamp layout used by the source file, e.g. `Tue Apr 03 18:00:09 +0000 2012`
const UTC_TIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Immutable, indexed collection of check-ins
#[derive(Debug, Default)]
pub struct Dataset {
    rows: Vec<CheckIn>,
    by_user: BTreeMap<u32, Vec<usize>>,
    by_category_id: HashMap<String, Vec<usize>>,
    by_category_name: BTreeMap<String, Vec<usize>>,
    category_names: HashMap<String, String>,
}

impl Dataset {
    /// Loads a dataset from a tab-separated file without header row
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            EngineError::DataLoad(format!("cannot open {}: {}", path.display(), e))
        })?;

        let dataset = Self::from_reader(file)?;

        tracing::info!(
            path = %path.display(),
            rows = dataset.len(),
            users = dataset.by_user.len(),
            categories = dataset.by_category_name.len(),
            "Loaded check-in dataset"
        );

        Ok(dataset)
    }

    /// Parses check-in rows from any reader
    ///
    /// Invalid UTF-8 bytes are dropped. Any other defect in a row fails the
    /// whole load with the offending line number.
    pub fn from_reader<R: Read>(reader: R) -> EngineResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (index, record) in reader.byte_records().enumerate() {
            let record =
                record.map_err(|e| EngineError::DataLoad(format!("read error: {}", e)))?;
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 1);

            if record.len() == 1 && record.get(0).is_some_and(|f| f.trim_ascii().is_empty()) {
                continue;
            }

            let fields: Vec<String> = record.iter().map(decode_skipping_invalid).collect();
            rows.push(parse_row(&fields, line)?);
        }

        Ok(Self::from_rows(rows))
    }

    /// Builds the indices over already-parsed rows
    pub fn from_rows(rows: Vec<CheckIn>) -> Self {
        let mut by_user: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        let mut by_category_id: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_category_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut category_names: HashMap<String, String> = HashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            by_user.entry(row.user_id).or_default().push(idx);
            by_category_id
                .entry(row.category_id.clone())
                .or_default()
                .push(idx);
            by_category_name
                .entry(row.category_name.clone())
                .or_default()
                .push(idx);

            let name = category_names
                .entry(row.category_id.clone())
                .or_insert_with(|| row.category_name.clone());
            if *name != row.category_name {
                tracing::warn!(
                    category_id = %row.category_id,
                    kept = %name,
                    ignored = %row.category_name,
                    "Category id maps to more than one name"
                );
            }
        }

        Self {
            rows,
            by_user,
            by_category_id,
            by_category_name,
            category_names,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in file order
    pub fn rows(&self) -> &[CheckIn] {
        &self.rows
    }

    /// Rows matching `predicate`, in file order
    pub fn query<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a CheckIn> + 'a
    where
        F: Fn(&CheckIn) -> bool + 'a,
    {
        self.rows.iter().filter(move |row| predicate(row))
    }

    /// Visit counts grouped by (user, category name)
    pub fn user_category_counts(&self) -> BTreeMap<(u32, String), usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts
                .entry((row.user_id, row.category_name.clone()))
                .or_insert(0) += 1;
        }
        counts
    }

    /// Visit counts grouped by (category name, user)
    pub fn category_user_counts(&self) -> BTreeMap<String, BTreeMap<u32, usize>> {
        self.by_category_name
            .iter()
            .map(|(name, indices)| {
                let mut per_user = BTreeMap::new();
                for &idx in indices {
                    *per_user.entry(self.rows[idx].user_id).or_insert(0) += 1;
                }
                (name.clone(), per_user)
            })
            .collect()
    }

    /// Visit counts of one user keyed by category id
    pub fn category_id_counts_for_user(&self, user_id: u32) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in self.rows_by_user(user_id) {
            *counts.entry(row.category_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn rows_by_category_id<'a>(
        &'a self,
        category_id: &str,
    ) -> impl Iterator<Item = &'a CheckIn> + 'a {
        self.indexed_rows(self.by_category_id.get(category_id))
    }

    pub fn rows_by_category_name<'a>(
        &'a self,
        category_name: &str,
    ) -> impl Iterator<Item = &'a CheckIn> + 'a {
        self.indexed_rows(self.by_category_name.get(category_name))
    }

    pub fn rows_by_user(&self, user_id: u32) -> impl Iterator<Item = &CheckIn> + '_ {
        self.indexed_rows(self.by_user.get(&user_id))
    }

    fn indexed_rows<'a>(
        &'a self,
        indices: Option<&'a Vec<usize>>,
    ) -> impl Iterator<Item = &'a CheckIn> + 'a {
        indices
            .into_iter()
            .flatten()
            .map(move |&idx| &self.rows[idx])
    }

    pub fn category_name(&self, category_id: &str) -> Option<&str> {
        self.category_names.get(category_id).map(String::as_str)
    }

    pub fn has_category(&self, category_name: &str) -> bool {
        self.by_category_name.contains_key(category_name)
    }

    /// Distinct user ids, ascending
    pub fn user_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_user.keys().copied()
    }

    /// Smallest and largest user id present
    pub fn user_id_range(&self) -> Option<(u32, u32)> {
        let first = self.by_user.keys().next()?;
        let last = self.by_user.keys().next_back()?;
        Some((*first, *last))
    }

    /// Distinct category names, lexicographic
    pub fn category_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.by_category_name.keys().map(String::as_str)
    }

    /// Category names ordered by check-in count (descending), then by name
    pub fn category_names_by_popularity(&self) -> Vec<&str> {
        let mut names: Vec<(&str, usize)> = self
            .by_category_name
            .iter()
            .map(|(name, indices)| (name.as_str(), indices.len()))
            .collect();
        names.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        names.into_iter().map(|(name, _)| name).collect()
    }

    /// Category visit counts of one user; `None` if the user never checked in
    pub fn user_profile(&self, user_id: u32) -> Option<UserProfile> {
        let indices = self.by_user.get(&user_id)?;
        let mut category_counts = BTreeMap::new();
        for &idx in indices {
            *category_counts
                .entry(self.rows[idx].category_name.clone())
                .or_insert(0) += 1;
        }
        Some(UserProfile {
            user_id,
            category_counts,
        })
    }

    /// Profiles of every user, ascending by id
    pub fn user_profiles(&self) -> Vec<UserProfile> {
        self.user_ids()
            .filter_map(|user_id| self.user_profile(user_id))
            .collect()
    }

    /// Venue ids the user has checked into at least once
    pub fn venues_visited_by(&self, user_id: u32) -> HashSet<&str> {
        self.rows_by_user(user_id)
            .map(|row| row.venue_id.as_str())
            .collect()
    }
}

fn parse_row(fields: &[String], line: u64) -> EngineResult<CheckIn> {
    if fields.len() != COLUMN_COUNT {
        return Err(EngineError::DataLoad(format!(
            "line {}: expected {} columns, found {}",
            line,
            COLUMN_COUNT,
            fields.len()
        )));
    }

    let field = |idx: usize| fields[idx].trim();
    let invalid = |column: &str, value: &str| {
        EngineError::DataLoad(format!("line {}: invalid {} '{}'", line, column, value))
    };

    let user_id = field(0)
        .parse::<u32>()
        .map_err(|_| invalid("UserID", field(0)))?;
    let latitude = field(4)
        .parse::<f64>()
        .map_err(|_| invalid("Latitude", field(4)))?;
    let longitude = field(5)
        .parse::<f64>()
        .map_err(|_| invalid("Longitude", field(5)))?;
    let timezone_offset_min = field(6)
        .parse::<i32>()
        .map_err(|_| invalid("TimezoneOffsetInMin", field(6)))?;
    let utc_time = DateTime::parse_from_str(field(7), UTC_TIME_FORMAT)
        .map_err(|_| invalid("UTCTime", field(7)))?;

    if !Coordinates::new(latitude, longitude).is_valid() {
        return Err(EngineError::DataLoad(format!(
            "line {}: coordinates ({}, {}) out of range",
            line, latitude, longitude
        )));
    }

    Ok(CheckIn {
        user_id,
        venue_id: field(1).to_string(),
        category_id: field(2).to_string(),
        category_name: field(3).to_string(),
        latitude,
        longitude,
        timezone_offset_min,
        utc_time,
    })
}

/// Decodes UTF-8, dropping any invalid byte sequences
fn decode_skipping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}
