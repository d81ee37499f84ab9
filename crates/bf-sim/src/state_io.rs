//! Opaque initial-condition records.
//!
//! A record is the element name plus its scalar state fields; callers
//! persist them however they like. Restoring matches strictly by name
//! and preserves every bit of the stored scalars.

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::network::Network;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub element: String,
    pub values: Vec<(String, f64)>,
}

impl Network {
    /// Snapshot the state of every storage element.
    pub fn save_states(&self) -> Vec<StateRecord> {
        self.elements()
            .iter()
            .filter_map(|e| {
                e.state_record().map(|values| StateRecord {
                    element: e.name().to_string(),
                    values,
                })
            })
            .collect()
    }

    /// Restore previously saved states. A record naming an unknown
    /// element is refused outright.
    pub fn load_states(&mut self, records: &[StateRecord]) -> SimResult<()> {
        for record in records {
            let element = self
                .elements_mut()
                .iter_mut()
                .find(|e| e.name() == record.element)
                .ok_or_else(|| SimError::UnknownElement {
                    name: record.element.clone(),
                })?;
            element.apply_state_record(&record.values)?;
        }
        Ok(())
    }
}
