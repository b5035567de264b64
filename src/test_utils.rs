//! Fixtures shared by unit tests.

use crate::error::ScriptError;
use crate::models::{Reduction, ReductionInputs};
use crate::reduction_store::InMemoryReductionRepository;
use crate::script_source::{RemoteScript, RemoteScriptSource};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub(crate) const MARI_TEMPLATE: &str = "from mantid.simpleapi import *\n\
runno = 0\n\
sum_runs = True\n\
ei = None\n\
sam_mass = 1.0\n\
sam_rmm = 1.0\n\
monovan = None\n\
remove_bkg = False\n\
mask_file_link = \"\"\n\
wbvan = 0\n\
# runno = 1 is untouched\n\
print(runno)\n";

pub(crate) const OSIRIS_TEMPLATE: &str = "from mantid.simpleapi import *\n\
input_runs = []\n\
calibration_file_path = \"\"\n\
cycle = \"\"\n\
reflection = \"\"\n\
spectroscopy_reduction = False\n\
diffraction_reduction = False\n\
print(input_runs)\n";

pub(crate) const TEST_TEMPLATE: &str =
    "import os\n# This line is inserted via test\nprint('done')\n";

/// Inputs completing [MARI_TEMPLATE].
pub(crate) fn mari_inputs() -> Value {
    json!({
        "runno": 25581,
        "sum_runs": false,
        "ei": "auto",
        "sam_mass": 0.0,
        "sam_rmm": 0.0,
        "monovan": 0,
        "remove_bkg": true,
        "mask_file_link": "https://example.org/mari_mask2023_1.xml",
        "wbvan": 12345,
    })
}

/// Inputs completing [OSIRIS_TEMPLATE].
pub(crate) fn osiris_inputs() -> Value {
    json!({
        "runno": [25581, 25582],
        "calibration_file_path": "/extras/osiris/osiris_041_RES10.nxs",
        "cycle_string": "cycle_14_1",
        "analyser": "graphite",
        "mode": "diffraction",
    })
}

/// Create a reduction from a JSON object of inputs.
pub(crate) fn reduction(id: i64, inputs: Value) -> Reduction {
    let reduction_inputs: ReductionInputs = match inputs {
        Value::Object(map) => map,
        other => panic!("reduction inputs must be an object, got {}", other),
    };
    Reduction {
        id,
        reduction_inputs,
    }
}

/// Reductions used by the resolver and router tests.
///
/// * 1: complete MARI inputs
/// * 2: complete OSIRIS inputs
/// * 3: no inputs, enough for the test instrument
/// * 4: incomplete MARI inputs
pub(crate) fn reductions() -> InMemoryReductionRepository {
    InMemoryReductionRepository::new([
        reduction(1, mari_inputs()),
        reduction(2, osiris_inputs()),
        reduction(3, json!({})),
        reduction(4, json!({"runno": 1})),
    ])
}

/// In memory [RemoteScriptSource] whose availability can be switched off.
#[derive(Default)]
pub(crate) struct FakeScriptSource {
    /// Versions of each instrument's script, oldest first, keyed by lower case instrument
    scripts: HashMap<String, Vec<RemoteScript>>,
    unavailable: AtomicBool,
    latest_version_unavailable: AtomicBool,
    calls: AtomicUsize,
}

impl FakeScriptSource {
    /// Add a newer version of an instrument's script.
    pub(crate) fn with_script(mut self, instrument: &str, version_id: &str, text: &str) -> Self {
        self.scripts
            .entry(instrument.to_lowercase())
            .or_default()
            .push(RemoteScript {
                text: text.to_string(),
                version_id: version_id.to_string(),
            });
        self
    }

    /// Source holding one version of each fixture template.
    pub(crate) fn with_templates() -> Self {
        Self::default()
            .with_script("mari", "1111", "runno = -1\n")
            .with_script("mari", "2222", MARI_TEMPLATE)
            .with_script("osiris", "3333", OSIRIS_TEMPLATE)
            .with_script("test", "4444", TEST_TEMPLATE)
    }

    /// Make every call fail as though the repository were unreachable.
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make only [RemoteScriptSource::latest_version] fail.
    pub(crate) fn set_latest_version_unavailable(&self, unavailable: bool) {
        self.latest_version_unavailable
            .store(unavailable, Ordering::SeqCst);
    }

    /// Number of calls made to the source.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), ScriptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ScriptError::RemoteUnavailable {
                reason: "fake source is offline".to_string(),
            });
        }
        Ok(())
    }

    fn versions(&self, instrument: &str) -> Result<&Vec<RemoteScript>, ScriptError> {
        self.scripts
            .get(&instrument.to_lowercase())
            .ok_or_else(|| ScriptError::RemoteNotFound {
                path: format!("{}/reduce.py", instrument.to_uppercase()),
            })
    }
}

#[async_trait]
impl RemoteScriptSource for FakeScriptSource {
    async fn fetch_latest(&self, instrument: &str) -> Result<RemoteScript, ScriptError> {
        self.check_available()?;
        let versions = self.versions(instrument)?;
        versions
            .last()
            .cloned()
            .ok_or_else(|| ScriptError::RemoteNotFound {
                path: instrument.to_string(),
            })
    }

    async fn fetch_at_version(
        &self,
        instrument: &str,
        version_id: &str,
    ) -> Result<RemoteScript, ScriptError> {
        self.check_available()?;
        self.versions(instrument)?
            .iter()
            .find(|script| script.version_id == version_id)
            .cloned()
            .ok_or_else(|| ScriptError::RemoteNotFound {
                path: format!("{}/reduce.py@{}", instrument.to_uppercase(), version_id),
            })
    }

    async fn latest_version(&self, instrument: &str) -> Result<String, ScriptError> {
        self.check_available()?;
        if self.latest_version_unavailable.load(Ordering::SeqCst) {
            return Err(ScriptError::RemoteUnavailable {
                reason: "fake commits lookup is offline".to_string(),
            });
        }
        Ok(self.fetch_latest(instrument).await?.version_id)
    }
}
