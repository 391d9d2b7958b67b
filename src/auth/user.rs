use std::str::FromStr;

use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{invalid_input_error, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Hotel,
    Broker,
    Ride,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Broker => "broker",
            Self::Ride => "ride",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hotel" => Ok(Self::Hotel),
            "broker" => Ok(Self::Broker),
            "ride" | "rider" => Ok(Self::Ride),
            _ => Err(invalid_input_error(format!("unknown role '{}'", s))),
        }
    }
}

/// An authenticated actor, as vouched for by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
    pub is_admin: bool,
}

impl User {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self {
            id,
            role,
            is_admin: false,
        }
    }

    pub fn new_admin_user() -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Hotel,
            is_admin: true,
        }
    }

    pub fn is_rider(&self) -> bool {
        self.role == Role::Ride
    }
}

impl PolarClass for User {
    fn get_polar_class_builder() -> oso::ClassBuilder<User> {
        oso::Class::builder()
            .name("User")
            .add_attribute_getter("id", |recv: &User| recv.id.to_string())
            .add_attribute_getter("role", |recv: &User| recv.role.name().to_string())
            .add_attribute_getter("is_admin", |recv: &User| recv.is_admin)
    }

    fn get_polar_class() -> oso::Class {
        let builder = User::get_polar_class_builder();
        builder.build()
    }
}
