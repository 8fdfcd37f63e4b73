//! Branch module: closed set of branches that make up one song.

#![warn(missing_docs)]

use std::fmt;

/// Index of an excursion branch inside its [`SongLayout`].
///
/// Only a layout hands these out, so every id a caller holds refers to a
/// declared branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExcursionId(usize);

impl ExcursionId {
    /// Position in declaration order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of a branch: the home branch or one of the excursions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BranchId {
    /// The branch bar numbering returns to.
    Home,
    /// A branch entered from a designated home bar.
    Excursion(ExcursionId),
}

impl BranchId {
    /// True for [`BranchId::Home`].
    pub fn is_home(self) -> bool {
        matches!(self, BranchId::Home)
    }
}

/// Name and length of a branch.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSpec {
    /// Unique name, also the directory holding its audio.
    pub name: String,
    /// Number of bars in the original recording.
    pub total_bars: u32,
}

/// An excursion branch and where it joins the home branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcursionSpec {
    /// Name and length.
    pub branch: BranchSpec,
    /// Home bar that may switch into this branch.
    pub entry_bar: u32,
    /// Home bar playback continues from after a forced return.
    pub resume_bar: u32,
}

/// Validated branch topology: one home branch plus any number of excursions.
///
/// Built through [`crate::builder::LayoutBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct SongLayout {
    pub(crate) home: BranchSpec,
    pub(crate) excursions: Vec<ExcursionSpec>,
}

impl SongLayout {
    /// The home branch.
    pub fn home(&self) -> &BranchSpec {
        &self.home
    }

    /// Excursions in declaration order.
    pub fn excursions(&self) -> &[ExcursionSpec] {
        &self.excursions
    }

    /// Ids of all excursions in declaration order.
    pub fn excursion_ids(&self) -> impl Iterator<Item = ExcursionId> {
        (0..self.excursions.len()).map(ExcursionId)
    }

    /// Every branch, home first.
    pub fn branch_ids(&self) -> impl Iterator<Item = BranchId> + '_ {
        std::iter::once(BranchId::Home).chain(self.excursion_ids().map(BranchId::Excursion))
    }

    /// Excursion details.
    pub fn excursion(&self, id: ExcursionId) -> &ExcursionSpec {
        &self.excursions[id.0]
    }

    /// Name and length of a branch.
    pub fn spec(&self, id: BranchId) -> &BranchSpec {
        match id {
            BranchId::Home => &self.home,
            BranchId::Excursion(x) => &self.excursions[x.0].branch,
        }
    }

    /// Branch name.
    pub fn name(&self, id: BranchId) -> &str {
        &self.spec(id).name
    }

    /// Bar count of a branch.
    pub fn total_bars(&self, id: BranchId) -> u32 {
        self.spec(id).total_bars
    }

    /// The excursion entered from home bar `bar`, if any.
    pub fn excursion_entered_at(&self, bar: u32) -> Option<ExcursionId> {
        self.excursions
            .iter()
            .position(|e| e.entry_bar == bar)
            .map(ExcursionId)
    }

    /// Resolve a branch by name.
    pub fn find(&self, name: &str) -> Option<BranchId> {
        if self.home.name == name {
            return Some(BranchId::Home);
        }
        self.excursions
            .iter()
            .position(|e| e.branch.name == name)
            .map(|i| BranchId::Excursion(ExcursionId(i)))
    }
}

impl fmt::Display for SongLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bars)", self.home.name, self.home.total_bars)?;
        for e in &self.excursions {
            write!(
                f,
                ", {} ({} bars, in at {}, back at {})",
                e.branch.name, e.branch.total_bars, e.entry_bar, e.resume_bar
            )?;
        }
        Ok(())
    }
}

/// One value per branch of a layout, indexed by [`BranchId`].
#[derive(Debug, Clone, PartialEq)]
pub struct BranchMap<T> {
    home: T,
    excursions: Vec<T>,
}

impl<T> BranchMap<T> {
    /// Build a value for every branch of `layout`.
    pub fn from_fn(layout: &SongLayout, mut f: impl FnMut(BranchId) -> T) -> Self {
        Self {
            home: f(BranchId::Home),
            excursions: layout.excursion_ids().map(|x| f(BranchId::Excursion(x))).collect(),
        }
    }

    /// Fallible variant of [`BranchMap::from_fn`].
    pub fn try_from_fn<E>(
        layout: &SongLayout,
        mut f: impl FnMut(BranchId) -> Result<T, E>,
    ) -> Result<Self, E> {
        let home = f(BranchId::Home)?;
        let excursions = layout
            .excursion_ids()
            .map(|x| f(BranchId::Excursion(x)))
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self { home, excursions })
    }

    /// Value for a branch.
    pub fn get(&self, id: BranchId) -> &T {
        match id {
            BranchId::Home => &self.home,
            BranchId::Excursion(x) => &self.excursions[x.0],
        }
    }

    /// Mutable value for a branch.
    pub fn get_mut(&mut self, id: BranchId) -> &mut T {
        match id {
            BranchId::Home => &mut self.home,
            BranchId::Excursion(x) => &mut self.excursions[x.0],
        }
    }

    /// Number of branches, home included.
    pub fn len(&self) -> usize {
        1 + self.excursions.len()
    }

    /// Always false: a map holds at least the home branch.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// All values, home first, paired with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (BranchId, &T)> {
        std::iter::once((BranchId::Home, &self.home)).chain(
            self.excursions
                .iter()
                .enumerate()
                .map(|(i, v)| (BranchId::Excursion(ExcursionId(i)), v)),
        )
    }

    /// Mutable values, home first.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        std::iter::once(&mut self.home).chain(self.excursions.iter_mut())
    }
}
