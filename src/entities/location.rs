use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A pickup or destination point, referencing the city and sub-area
/// reference data by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city_id: Uuid,
    pub sub_area_id: Uuid,
    pub address: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn validate(&self) -> Result<(), Error> {
        if self.address.trim().is_empty() {
            return Err(invalid_input_error("address is required"));
        }

        if let Some(coordinates) = &self.coordinates {
            if !(-90.0..=90.0).contains(&coordinates.latitude)
                || !(-180.0..=180.0).contains(&coordinates.longitude)
            {
                return Err(invalid_input_error("coordinates out of range"));
            }
        }

        Ok(())
    }
}

#[test]
fn location_requires_address() {
    let location = Location {
        city_id: Uuid::new_v4(),
        sub_area_id: Uuid::new_v4(),
        address: "  ".into(),
        coordinates: None,
    };

    assert!(location.validate().unwrap_err().is_validation());
}

#[test]
fn location_rejects_bad_coordinates() {
    let location = Location {
        city_id: Uuid::new_v4(),
        sub_area_id: Uuid::new_v4(),
        address: "42 Galle Road".into(),
        coordinates: Some(Coordinates {
            latitude: 91.0,
            longitude: 79.8,
        }),
    };

    assert!(location.validate().is_err());
}
