use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, Error};

/// Copy of a rider's vehicle taken when a bid is placed. Later edits to the
/// vehicle itself never touch bids that already carry a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub model: String,
    pub number: String,
    pub year: i32,
    pub total_passengers: u32,
    pub category: String,
    pub city_id: Uuid,
    pub sub_area_id: Uuid,
}

impl VehicleSnapshot {
    pub fn validate(&self) -> Result<(), Error> {
        if self.model.trim().is_empty()
            || self.number.trim().is_empty()
            || self.category.trim().is_empty()
        {
            return Err(invalid_input_error("vehicle model, number and category are required"));
        }

        if self.total_passengers == 0 {
            return Err(invalid_input_error("vehicle must carry at least one passenger"));
        }

        Ok(())
    }
}
