//! Client device identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The user-chosen identifier of a client device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of device, for display on the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// A desktop computer.
    Desktop,
    /// A laptop.
    Laptop,
    /// A phone or tablet.
    Mobile,
    /// A headless server.
    Server,
    /// Anything else.
    #[default]
    Other,
}

impl DeviceType {
    /// Returns the wire name of the device type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Laptop => "laptop",
            DeviceType::Mobile => "mobile",
            DeviceType::Server => "server",
            DeviceType::Other => "other",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "desktop" => Some(DeviceType::Desktop),
            "laptop" => Some(DeviceType::Laptop),
            "mobile" => Some(DeviceType::Mobile),
            "server" => Some(DeviceType::Server),
            "other" => Some(DeviceType::Other),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_type_names_roundtrip() {
        for ty in [
            DeviceType::Desktop,
            DeviceType::Laptop,
            DeviceType::Mobile,
            DeviceType::Server,
            DeviceType::Other,
        ] {
            assert_eq!(DeviceType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(DeviceType::parse("fridge"), None);
    }

    #[test]
    fn device_id_is_transparent_in_json() {
        let id = DeviceId::new("phone-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"phone-7\"");
    }
}
