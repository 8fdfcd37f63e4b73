//! Context module: validate inputs into a self-contained assembly run.

use crate::branch::{BranchId, BranchMap, SongLayout};
use crate::catalog::{Slice, SliceCatalog};
use crate::error::{ConfigError, Result};
use crate::invariant_ppt::{assert_invariant, CATALOG_COLD_START, CONFIG_VALIDATED};
use crate::policy::ReusePolicy;
use crate::source::AudioSource;
use crate::timeline::Timeline;
use std::collections::HashMap;
use std::path::Path;

/// File name of each branch's full recording inside its directory.
pub const ORIGINAL_FILE_NAME: &str = "original.wav";

/// Everything one assembly run reads: layout, timing, policy, recordings and
/// slice catalogs.
///
/// Constructing a context validates all of it, so a sequencer built from one
/// never meets a configuration error mid-run. Catalogs always start cold.
#[derive(Debug, Clone)]
pub struct AssemblyContext {
    pub(crate) layout: SongLayout,
    pub(crate) timeline: Timeline,
    pub(crate) policy: ReusePolicy,
    pub(crate) originals: BranchMap<Vec<f32>>,
    pub(crate) catalogs: BranchMap<SliceCatalog>,
}

impl AssemblyContext {
    /// Validate and bundle inputs keyed by branch id.
    pub fn new(
        layout: SongLayout,
        timeline: Timeline,
        policy: ReusePolicy,
        originals: BranchMap<Vec<f32>>,
        mut catalogs: BranchMap<SliceCatalog>,
    ) -> Result<Self> {
        timeline.validate()?;
        policy.validate()?;

        let expected = 1 + layout.excursions().len();
        for actual in [originals.len(), catalogs.len()] {
            if actual != expected {
                return Err(ConfigError::BranchCountMismatch { expected, actual }.into());
            }
        }
        for (id, recording) in originals.iter() {
            let spec = layout.spec(id);
            // The final bar must hold at least one sample.
            let needed = timeline.sample_offset(spec.total_bars);
            if recording.len() <= needed {
                return Err(ConfigError::RecordingTooShort {
                    branch: spec.name.clone(),
                    needed,
                    actual: recording.len(),
                }
                .into());
            }
        }
        for (id, catalog) in catalogs.iter() {
            let spec = layout.spec(id);
            catalog.validate(&spec.name, spec.total_bars)?;
        }
        assert_invariant(CONFIG_VALIDATED, true, "context inputs validated", Some("AssemblyContext::new"));

        for catalog in catalogs.values_mut() {
            catalog.reset_history();
        }
        assert_invariant(
            CATALOG_COLD_START,
            catalogs.iter().all(|(_, c)| c.is_cold()),
            "catalogs start without play history",
            Some("AssemblyContext::new"),
        );

        tracing::debug!(layout = %layout, sample_rate = timeline.sample_rate, "assembly context ready");
        Ok(Self {
            layout,
            timeline,
            policy,
            originals,
            catalogs,
        })
    }

    /// Validate and bundle inputs keyed by branch name.
    ///
    /// Every branch needs a recording; branches without an entry in `slices`
    /// get an empty catalog.
    pub fn from_named(
        layout: SongLayout,
        timeline: Timeline,
        policy: ReusePolicy,
        mut originals: HashMap<String, Vec<f32>>,
        mut slices: HashMap<String, Vec<Slice>>,
    ) -> Result<Self> {
        for name in originals.keys().chain(slices.keys()) {
            if layout.find(name).is_none() {
                return Err(ConfigError::UnknownBranch(name.clone()).into());
            }
        }
        let recordings = BranchMap::try_from_fn(&layout, |id| {
            let name = layout.name(id);
            originals
                .remove(name)
                .ok_or_else(|| ConfigError::MissingRecording(name.to_string()))
        })?;
        let catalogs = BranchMap::from_fn(&layout, |id| {
            SliceCatalog::from_slices(slices.remove(layout.name(id)).unwrap_or_default())
        });
        Self::new(layout, timeline, policy, recordings, catalogs)
    }

    /// Load `<root>/<branch>/original.wav` and every slice file beside it.
    pub fn load(
        root: &Path,
        layout: SongLayout,
        timeline: Timeline,
        policy: ReusePolicy,
        source: &dyn AudioSource,
    ) -> Result<Self> {
        let originals = BranchMap::try_from_fn(&layout, |id| {
            source.load(&root.join(layout.name(id)).join(ORIGINAL_FILE_NAME))
        })?;
        let catalogs = BranchMap::try_from_fn(&layout, |id| {
            let catalog = SliceCatalog::build(&root.join(layout.name(id)), source)?;
            tracing::info!(branch = layout.name(id), slices = catalog.len(), "catalog built");
            Ok::<_, crate::error::AssemblyError>(catalog)
        })?;
        Self::new(layout, timeline, policy, originals, catalogs)
    }

    pub fn layout(&self) -> &SongLayout {
        &self.layout
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn policy(&self) -> &ReusePolicy {
        &self.policy
    }

    pub fn original(&self, id: BranchId) -> &[f32] {
        self.originals.get(id)
    }

    pub fn catalog(&self, id: BranchId) -> &SliceCatalog {
        self.catalogs.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LayoutBuilder;
    use crate::error::AssemblyError;
    use crate::timeline::Tempo;

    fn timeline() -> Timeline {
        Timeline::new(Tempo { bpm: 120.0, beats_per_bar: 4 }, 100)
    }

    fn layout() -> SongLayout {
        LayoutBuilder::new()
            .home("home", 4)
            .excursion("away", 2, 2, 3)
            .build()
            .unwrap()
    }

    #[test]
    fn named_inputs_resolve_to_branches() {
        let originals = HashMap::from([
            ("home".to_string(), vec![0.0; 800]),
            ("away".to_string(), vec![0.5; 400]),
        ]);
        let slices = HashMap::from([(
            "home".to_string(),
            vec![Slice::new("slice_bar1_bar3.wav", 1, 3, vec![0.1; 400])],
        )]);
        let ctx = AssemblyContext::from_named(layout(), timeline(), ReusePolicy::default(), originals, slices)
            .unwrap();
        assert_eq!(ctx.catalog(BranchId::Home).len(), 1);
        let away = ctx.layout().find("away").unwrap();
        assert!(ctx.catalog(away).is_empty());
        assert_eq!(ctx.original(away).len(), 400);
    }

    #[test]
    fn missing_and_unknown_branches() {
        let originals = HashMap::from([("home".to_string(), vec![0.0; 800])]);
        let err = AssemblyContext::from_named(layout(), timeline(), ReusePolicy::default(), originals, HashMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::InvalidConfiguration(ConfigError::MissingRecording(ref b)) if b == "away"
        ));

        let originals = HashMap::from([
            ("home".to_string(), vec![0.0; 800]),
            ("away".to_string(), vec![0.0; 400]),
            ("elsewhere".to_string(), vec![0.0; 400]),
        ]);
        let err = AssemblyContext::from_named(layout(), timeline(), ReusePolicy::default(), originals, HashMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::InvalidConfiguration(ConfigError::UnknownBranch(_))
        ));
    }

    #[test]
    fn maps_from_another_layout_rejected() {
        let home_only = LayoutBuilder::new().home("home", 4).build().unwrap();
        let originals = BranchMap::from_fn(&home_only, |_| vec![0.0; 800]);
        let catalogs = BranchMap::from_fn(&home_only, |_| SliceCatalog::new());
        let err = AssemblyContext::new(layout(), timeline(), ReusePolicy::default(), originals, catalogs)
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::InvalidConfiguration(ConfigError::BranchCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn short_recording_rejected() {
        // Bar 4 starts at sample 600; a 600-sample recording has no final bar.
        let originals = HashMap::from([
            ("home".to_string(), vec![0.0; 600]),
            ("away".to_string(), vec![0.0; 400]),
        ]);
        let err = AssemblyContext::from_named(layout(), timeline(), ReusePolicy::default(), originals, HashMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::InvalidConfiguration(ConfigError::RecordingTooShort { needed: 600, .. })
        ));
    }
}
