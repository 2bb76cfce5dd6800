//! Process-scoped state shared by every handler.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::catalog::PlantCatalog;
use crate::inference::{DiagnosisPredictor, WateringPredictor};
use crate::store::LogStore;

// ---

/// "Water now" request waiting for the device to pick it up.
///
/// Lives in memory only and resets on restart. A single flag for all
/// devices; repeated triggers before the acknowledgement collapse into one.
#[derive(Debug, Default)]
pub struct ManualWater {
    pending: AtomicBool,
}

impl ManualWater {
    // ---
    pub fn request(&self) {
        self.pending.store(true, Ordering::Relaxed);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Relaxed)
    }

    /// Device acknowledgement; the only way the flag is cleared.
    pub fn acknowledge(&self) {
        self.pending.store(false, Ordering::Relaxed);
    }
}

#[derive(Clone)]
pub struct AppState {
    // ---
    pub store: Arc<dyn LogStore>,
    pub watering: Arc<WateringPredictor>,
    pub diagnosis: Arc<DiagnosisPredictor>,
    pub catalog: Arc<PlantCatalog>,
    pub manual_water: Arc<ManualWater>,
    pub api_secret: Arc<str>,
    pub max_upload_bytes: usize,
}
