//! Paired read naming conventions and clone library records
//!
//! Mate reads are recognised purely by identifier: `<base>.<tag>:<library>`,
//! where `tag` names the mate role (for example `X1`/`Y1` or `F`/`R`) and
//! `library` names the clone library that produced the fragment. The library
//! supplies the expected insert length used for distance estimation.

use crate::utils::configuration::AssemblyError;
use ahash::AHashMap;
use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref MATE_NAME: Regex =
        Regex::new(r"^(.*)\.(X1|Y1|F|R|1|2|x1|y1|f|r|a|b|A|B):(.*)$").unwrap();
}

/// Role of a read within its pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadOrientation {
    Forward,
    Reverse,
}

/// Parsed `<base>.<tag>:<library>` read identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MateName {
    pub base: String,
    pub tag: String,
    pub library: String,
}

impl MateName {
    /// Parse a read identifier; `None` when it does not follow the convention
    pub fn parse(read_id: &str) -> Option<Self> {
        let captures = MATE_NAME.captures(read_id)?;
        Some(Self {
            base: captures.get(1)?.as_str().to_string(),
            tag: captures.get(2)?.as_str().to_string(),
            library: captures.get(3)?.as_str().to_string(),
        })
    }

    pub fn orientation(&self) -> ReadOrientation {
        match self.tag.as_str() {
            "X1" | "F" | "1" | "x1" | "f" | "a" | "A" => ReadOrientation::Forward,
            _ => ReadOrientation::Reverse,
        }
    }

    /// Tag carried by the other read of the pair
    pub fn mate_tag(&self) -> &'static str {
        match self.tag.as_str() {
            "X1" => "Y1",
            "Y1" => "X1",
            "F" => "R",
            "R" => "F",
            "1" => "2",
            "2" => "1",
            "x1" => "y1",
            "y1" => "x1",
            "f" => "r",
            "r" => "f",
            "a" => "b",
            "b" => "a",
            "A" => "B",
            _ => "A",
        }
    }

    /// Full identifier of the mate read
    pub fn mate_id(&self) -> String {
        format!("{}.{}:{}", self.base, self.mate_tag(), self.library)
    }
}

impl fmt::Display for MateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.base, self.tag, self.library)
    }
}

/// Expected insert size of a paired read library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneLibraryRecord {
    pub name: String,
    pub mean: f64,
    pub standard_deviation: f64,
}

impl CloneLibraryRecord {
    pub fn new(name: impl Into<String>, mean: f64, standard_deviation: f64) -> Self {
        Self {
            name: name.into(),
            mean,
            standard_deviation,
        }
    }
}

/// Library lookup handed to the scaffold phase; read-only once built
#[derive(Debug, Clone, Default)]
pub struct CloneLibrary {
    libraries: AHashMap<String, CloneLibraryRecord>,
}

impl CloneLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the common Sanger-era libraries
    pub fn with_builtin_libraries() -> Self {
        let mut library = Self::new();
        library.add(CloneLibraryRecord::new("0.5K", 500.0, 20.0));
        library.add(CloneLibraryRecord::new("2K", 2000.0, 100.0));
        library
    }

    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = CloneLibraryRecord>,
    {
        let mut library = Self::new();
        for record in records {
            library.try_add(record)?;
        }
        Ok(library)
    }

    /// Insert or replace a record
    pub fn add(&mut self, record: CloneLibraryRecord) {
        self.libraries.insert(record.name.clone(), record);
    }

    /// Insert a record after validating its numbers
    pub fn try_add(&mut self, record: CloneLibraryRecord) -> Result<()> {
        if record.name.is_empty() {
            return Err(anyhow!("Clone library name must not be empty"));
        }
        if !record.mean.is_finite() || !record.standard_deviation.is_finite() {
            return Err(anyhow!(
                "Clone library {} has a non-finite insert size",
                record.name
            ));
        }
        if record.standard_deviation < 0.0 {
            return Err(anyhow!(
                "Clone library {} has a negative standard deviation",
                record.name
            ));
        }
        self.add(record);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CloneLibraryRecord> {
        self.libraries.get(name)
    }

    /// Like [`get`](Self::get) but reports a missing library as an error
    pub fn require(&self, name: &str) -> std::result::Result<&CloneLibraryRecord, AssemblyError> {
        self.libraries
            .get(name)
            .ok_or_else(|| AssemblyError::UnknownLibrary {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}
