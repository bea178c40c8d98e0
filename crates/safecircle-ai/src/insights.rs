//! Route risk assessment.
//!
//! The model is asked for JSON matching a three-field schema. Anything that
//! does not parse into [`RiskAssessment`] exactly is an error; nothing is
//! defaulted.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::GenerateRequest;
use crate::error::{GatewayError, Result};
use crate::gateway::AdvisoryGateway;

/// Overall risk of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low risk.
    Low,
    /// Medium risk.
    Medium,
    /// High risk.
    High,
}

impl RiskLevel {
    /// All levels, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Input to [`AdvisoryGateway::assess_route`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRiskRequest {
    /// Description of the route the user intends to take.
    pub route_description: String,
    /// Recent campus security incident reports.
    pub campus_security_reports: String,
    /// Recent police blotter data for the area.
    pub police_blotter_data: String,
}

/// Structured risk assessment for a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RiskAssessment {
    /// The overall risk level of the route.
    pub risk_level: RiskLevel,
    /// Summary of the factors contributing to the risk level.
    pub risk_factors: String,
    /// Recommendations to improve the user's safety.
    pub recommendations: String,
}

/// Response schema sent with every assessment request.
#[must_use]
pub fn risk_assessment_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "riskLevel": {
                "type": "STRING",
                "enum": ["low", "medium", "high"],
                "description": "The overall risk level of the route."
            },
            "riskFactors": {
                "type": "STRING",
                "description": "A summary of the factors contributing to the risk level."
            },
            "recommendations": {
                "type": "STRING",
                "description": "Recommendations for the user to improve their safety."
            }
        },
        "required": ["riskLevel", "riskFactors", "recommendations"],
        "propertyOrdering": ["riskLevel", "riskFactors", "recommendations"]
    })
}

/// Render the assessment prompt.
#[must_use]
pub fn render_prompt(request: &RouteRiskRequest) -> String {
    format!(
        "You are an AI assistant that analyzes safety data and provides risk assessments for routes.

Given the following information, assess the risk level of the route and provide recommendations to the user.

Route Description: {}
Campus Security Reports: {}
Police Blotter Data: {}

Consider factors such as the time of day, lighting conditions, reported incidents, and any other relevant information.

Provide a risk assessment with a risk level (low, medium, or high), a summary of the risk factors, and recommendations for the user to improve their safety.

Respond with a single JSON object with the fields riskLevel, riskFactors and recommendations.",
        request.route_description, request.campus_security_reports, request.police_blotter_data
    )
}

/// Parse model text into an assessment.
///
/// Tolerates a surrounding Markdown code fence, nothing else.
///
/// # Errors
///
/// Returns [`GatewayError::MalformedOutput`] if the text is not exactly the
/// three-field object.
pub fn parse_assessment(text: &str) -> Result<RiskAssessment> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map_or(trimmed, str::trim);

    serde_json::from_str(body).map_err(|e| GatewayError::malformed(format!("risk assessment: {e}")))
}

impl AdvisoryGateway {
    /// Assess the risk of a route from free-text reports.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails or the model output does not
    /// conform to the assessment schema.
    pub async fn assess_route(&self, request: &RouteRiskRequest) -> Result<RiskAssessment> {
        let generate =
            GenerateRequest::text(render_prompt(request)).with_json_schema(risk_assessment_schema());

        debug!("Requesting route risk assessment");
        let response = self.backend.generate(generate).await?;

        let Some(text) = response.text else {
            warn!("Model returned no text for risk assessment");
            return Err(GatewayError::malformed("model returned no output"));
        };

        let assessment = parse_assessment(&text)?;
        debug!(risk_level = %assessment.risk_level, "Route assessed");
        Ok(assessment)
    }
}
