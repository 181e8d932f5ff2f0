//! Payload shapes the synthesis step must produce, plus the sanitize
//! pass that runs before anything is persisted.
//!
//! Parsing is deliberately tolerant: every field is optional and
//! unknown fields are ignored, so a model that omits or adds keys
//! still yields a usable payload. `sanitized` then normalizes the
//! values and drops anything malformed rather than failing the run.

use serde::{Deserialize, Serialize};
use url::Url;

/// Deal participation for one investor, as reported by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestorShare {
    pub name: String,
    /// This investor's share of the deal amount, USD.
    #[serde(default)]
    pub amount: Option<f64>,
    /// This investor's share of the equity, percent.
    #[serde(default)]
    pub equity_percent: Option<f64>,
    #[serde(default)]
    pub is_lead: bool,
}

/// Structured deal facts for one product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductEnrichment {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// One of "funded", "no_deal", "fell_through", "unknown".
    #[serde(default)]
    pub deal_status: Option<String>,
    #[serde(default)]
    pub deal_amount: Option<f64>,
    #[serde(default)]
    pub deal_equity: Option<f64>,
    #[serde(default)]
    pub investors: Vec<InvestorShare>,
}

/// Structured biography facts for one investor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestorProfile {
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub firm: Option<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

impl ProductEnrichment {
    /// Normalize the payload into values safe to persist.
    ///
    /// Text fields are trimmed and emptied to `None`, the website must
    /// be an http(s) URL, the deal status is folded into the known
    /// vocabulary, and out-of-range numbers are dropped. Investor
    /// shares with blank names are removed entirely.
    pub fn sanitized(self) -> Self {
        let investors = self
            .investors
            .into_iter()
            .filter_map(InvestorShare::sanitized)
            .collect();

        Self {
            description: non_empty(self.description.as_deref()),
            category: non_empty(self.category.as_deref()),
            website: self.website.as_deref().and_then(sanitize_website),
            deal_status: self.deal_status.as_deref().and_then(normalize_deal_status),
            deal_amount: self.deal_amount.filter(|a| a.is_finite() && *a > 0.0),
            deal_equity: self
                .deal_equity
                .filter(|e| e.is_finite() && (0.0..=100.0).contains(e)),
            investors,
        }
    }
}

impl InvestorShare {
    /// Clean one share, or drop it when the name is blank.
    pub fn sanitized(self) -> Option<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            amount: self.amount.filter(|a| a.is_finite() && *a > 0.0),
            equity_percent: self
                .equity_percent
                .filter(|e| e.is_finite() && (0.0..=100.0).contains(e)),
            is_lead: self.is_lead,
        })
    }
}

impl InvestorProfile {
    /// Collapse the structured profile into the single bio paragraph
    /// the `investors` table stores.
    pub fn composed_bio(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();

        if let Some(bio) = non_empty(self.bio.as_deref()) {
            parts.push(ensure_period(bio));
        }
        if let Some(firm) = non_empty(self.firm.as_deref()) {
            parts.push(format!("Affiliated with {firm}."));
        }
        let areas: Vec<&str> = self
            .focus_areas
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect();
        if !areas.is_empty() {
            parts.push(format!("Typically invests in {}.", areas.join(", ")));
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn ensure_period(mut text: String) -> String {
    if !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    text
}

/// Validate a website value. Bare domains get an https scheme before
/// parsing; anything that is not http(s) afterwards is dropped.
fn sanitize_website(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let url = Url::parse(&candidate).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Fold free-form status text into the stored vocabulary.
fn normalize_deal_status(raw: &str) -> Option<String> {
    let folded = raw
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_");
    if folded.is_empty() {
        return None;
    }
    let status = match folded.as_str() {
        "funded" | "deal" | "closed" | "deal_closed" => "funded",
        "no_deal" | "none" | "rejected" => "no_deal",
        "fell_through" | "deal_fell_through" | "not_completed" => "fell_through",
        _ => "unknown",
    };
    Some(status.to_string())
}
