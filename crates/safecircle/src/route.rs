//! Safe-route insights form.
//!
//! Collects a route description plus incident reports and turns them into a
//! [`RouteRiskRequest`] for the advisory gateway.

use serde::{Deserialize, Serialize};

use safecircle_ai::RouteRiskRequest;

use crate::error::{Error, Result};

/// Minimum length of a route description.
pub const MIN_ROUTE_DESCRIPTION_LEN: usize = 10;

/// Campus security reports used when none are supplied.
pub const DEFAULT_CAMPUS_SECURITY_REPORTS: &str = "Recent incidents: a few noise complaints, \
one instance of petty theft near the dorms on the east side of campus.";

/// Police blotter data used when none is supplied.
pub const DEFAULT_POLICE_BLOTTER_DATA: &str = "General area reports: traffic violation on Main \
St, public intoxication arrest 2 miles from campus.";

/// Describe a walk between two places.
#[must_use]
pub fn describe_route(from: &str, to: &str) -> String {
    format!("Walking from {} to {} on campus.", from.trim(), to.trim())
}

/// Input to a route risk assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteInsightsForm {
    /// The route to assess.
    pub route_description: String,
    /// Campus security reports.
    pub campus_security_reports: String,
    /// Police blotter data.
    pub police_blotter_data: String,
}

impl Default for RouteInsightsForm {
    fn default() -> Self {
        Self {
            route_description: String::new(),
            campus_security_reports: DEFAULT_CAMPUS_SECURITY_REPORTS.to_string(),
            police_blotter_data: DEFAULT_POLICE_BLOTTER_DATA.to_string(),
        }
    }
}

impl RouteInsightsForm {
    /// A form for the given route with the default reports.
    pub fn for_route(route_description: impl Into<String>) -> Self {
        Self {
            route_description: route_description.into(),
            ..Self::default()
        }
    }

    /// A form for a walk between two places.
    #[must_use]
    pub fn between(from: &str, to: &str) -> Self {
        Self::for_route(describe_route(from, to))
    }

    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.route_description.trim().chars().count() < MIN_ROUTE_DESCRIPTION_LEN {
            return Err(Error::validation(
                "route description",
                "please provide a more detailed route description",
            ));
        }
        if self.campus_security_reports.trim().is_empty() {
            return Err(Error::validation(
                "campus security reports",
                "please provide campus security reports",
            ));
        }
        if self.police_blotter_data.trim().is_empty() {
            return Err(Error::validation(
                "police blotter data",
                "please provide police blotter data",
            ));
        }
        Ok(())
    }

    /// Validate and convert into a gateway request.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the form is incomplete.
    pub fn into_request(self) -> Result<RouteRiskRequest> {
        self.validate()?;
        Ok(RouteRiskRequest {
            route_description: self.route_description,
            campus_security_reports: self.campus_security_reports,
            police_blotter_data: self.police_blotter_data,
        })
    }
}
