//! Emergency phone numbers.

use serde::Serialize;

/// A phone line to call in an emergency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmergencyResource {
    /// Name of the service.
    pub name: &'static str,
    /// When to call it.
    pub description: &'static str,
    /// Number to dial.
    pub phone: &'static str,
}

impl EmergencyResource {
    /// A `tel:` link for the number.
    #[must_use]
    pub fn tel_uri(&self) -> String {
        format!("tel:{}", self.phone)
    }
}

/// The built-in resource list.
pub const EMERGENCY_RESOURCES: &[EmergencyResource] = &[
    EmergencyResource {
        name: "Campus Security",
        description: "For on-campus emergencies and assistance.",
        phone: "123-456-7890",
    },
    EmergencyResource {
        name: "Local Police Department",
        description: "For off-campus or serious emergencies.",
        phone: "911",
    },
    EmergencyResource {
        name: "Women's Safety Helpline",
        description: "Confidential support and resources.",
        phone: "234-567-8901",
    },
    EmergencyResource {
        name: "Mental Health Crisis Line",
        description: "24/7 support for mental health emergencies.",
        phone: "345-678-9012",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources() {
        assert_eq!(EMERGENCY_RESOURCES.len(), 4);
        assert_eq!(EMERGENCY_RESOURCES[1].tel_uri(), "tel:911");
        assert!(EMERGENCY_RESOURCES
            .iter()
            .all(|r| !r.description.is_empty()));
    }
}
