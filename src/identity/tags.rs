use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

/// The class of a device, as understood by the firmware's trust model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    RaspberryPi = 1,
    Phone = 2,
    Laptop = 3,
    Desktop = 4,
    Server = 5,
}

impl DeviceClass {
    /// Returns the integer value carried inside certificates.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Returns the symbol the firmware header defines for this class.
    pub fn symbol(self) -> &'static str {
        match self {
            DeviceClass::RaspberryPi => "DEVICE_CLASS_RASPBERRY_PI",
            DeviceClass::Phone => "DEVICE_CLASS_PHONE",
            DeviceClass::Laptop => "DEVICE_CLASS_LAPTOP",
            DeviceClass::Desktop => "DEVICE_CLASS_DESKTOP",
            DeviceClass::Server => "DEVICE_CLASS_SERVER",
        }
    }
}

impl TryFrom<u8> for DeviceClass {
    type Error = u8;

    fn try_from(value: u8) -> Result<DeviceClass, u8> {
        match value {
            1 => Ok(DeviceClass::RaspberryPi),
            2 => Ok(DeviceClass::Phone),
            3 => Ok(DeviceClass::Laptop),
            4 => Ok(DeviceClass::Desktop),
            5 => Ok(DeviceClass::Server),
            other => Err(other),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Compact metadata embedded in a certificate.
///
/// Serialized as an array whose i-th element is the value of the i-th tag.
/// New tags are appended at the end so the encoding of existing ones never
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<u8>", try_from = "Vec<u8>")]
pub struct StereotypeTags {
    pub device_class: DeviceClass,
}

impl StereotypeTags {
    pub fn new(device_class: DeviceClass) -> StereotypeTags {
        StereotypeTags { device_class }
    }
}

impl From<StereotypeTags> for Vec<u8> {
    fn from(tags: StereotypeTags) -> Vec<u8> {
        vec![tags.device_class.value()]
    }
}

impl TryFrom<Vec<u8>> for StereotypeTags {
    type Error = String;

    fn try_from(values: Vec<u8>) -> Result<StereotypeTags, String> {
        match values.as_slice() {
            [class] => DeviceClass::try_from(*class)
                .map(StereotypeTags::new)
                .map_err(|v| format!("unknown device class {}", v)),
            _ => Err(format!(
                "expected 1 stereotype tag, found {}",
                values.len()
            )),
        }
    }
}
