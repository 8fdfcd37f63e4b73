//! Builder API for song layouts.

use crate::branch::{BranchSpec, ExcursionSpec, SongLayout};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Name-based layout builder.
///
/// Errors are deferred to [`LayoutBuilder::build`], so declarations chain.
#[derive(Debug, Default)]
pub struct LayoutBuilder {
    home: Option<BranchSpec>,
    excursions: Vec<ExcursionSpec>,
}

impl LayoutBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the home branch. A second call replaces the first.
    pub fn home(mut self, name: &str, total_bars: u32) -> Self {
        self.home = Some(BranchSpec {
            name: name.to_string(),
            total_bars,
        });
        self
    }

    /// Declare an excursion entered from home bar `entry_bar` that returns to
    /// home bar `resume_bar` when forced home.
    pub fn excursion(mut self, name: &str, total_bars: u32, entry_bar: u32, resume_bar: u32) -> Self {
        self.excursions.push(ExcursionSpec {
            branch: BranchSpec {
                name: name.to_string(),
                total_bars,
            },
            entry_bar,
            resume_bar,
        });
        self
    }

    /// Validate and build the layout.
    pub fn build(self) -> Result<SongLayout, ConfigError> {
        let home = self.home.ok_or(ConfigError::MissingHomeBranch)?;
        if home.total_bars == 0 {
            return Err(ConfigError::ZeroBars(home.name));
        }

        let mut names = HashSet::new();
        names.insert(home.name.clone());
        for (i, e) in self.excursions.iter().enumerate() {
            let name = &e.branch.name;
            if !names.insert(name.clone()) {
                return Err(ConfigError::DuplicateBranch(name.clone()));
            }
            if e.branch.total_bars == 0 {
                return Err(ConfigError::ZeroBars(name.clone()));
            }
            if e.entry_bar == 0 || e.entry_bar > home.total_bars {
                return Err(ConfigError::EntryBarOutOfRange {
                    branch: name.clone(),
                    bar: e.entry_bar,
                    home_bars: home.total_bars,
                });
            }
            if e.resume_bar == 0 || e.resume_bar > home.total_bars {
                return Err(ConfigError::ResumeBarOutOfRange {
                    branch: name.clone(),
                    bar: e.resume_bar,
                    home_bars: home.total_bars,
                });
            }
            if let Some(prev) = self.excursions[..i].iter().find(|p| p.entry_bar == e.entry_bar) {
                return Err(ConfigError::DuplicateEntryBar {
                    bar: e.entry_bar,
                    existing: prev.branch.name.clone(),
                });
            }
        }

        Ok(SongLayout {
            home,
            excursions: self.excursions,
        })
    }
}
