//! Search queries and generation prompts for the two enrichment flows.

use dealboard_shared::{Investor, Product};

/// System prompt for product deal extraction.
pub const PRODUCT_SYSTEM: &str = r#"You are a research assistant extracting Shark Tank deal facts from web search results.

Produce a JSON object with exactly this shape:
{
  "description": "one or two sentences describing the product, or null",
  "category": "short category label like food, fitness, tech, or null",
  "website": "official company website URL, or null",
  "deal_status": "funded" | "no_deal" | "fell_through" | "unknown",
  "deal_amount": final agreed investment in USD as a number, or null,
  "deal_equity": final agreed equity as a percentage number, or null,
  "investors": [
    {
      "name": "investor's full name",
      "amount": this investor's share of the amount in USD, or null,
      "equity_percent": this investor's share of the equity, or null,
      "is_lead": true if this investor led the deal
    }
  ]
}

Rules:
- Use only facts present in the provided context. Never invent values.
- deal_amount and deal_equity are the final on-air agreement, not the entrepreneur's ask.
- Equity values are plain percentages: 10 means 10%.
- If the deal later fell apart after airing, use "fell_through".
- List every investor who joined the deal. Use an empty array when there was no deal.
- Use null for anything the context does not establish.

Respond with ONLY the JSON object. No markdown, no explanation."#;

/// System prompt for investor biography extraction.
pub const INVESTOR_SYSTEM: &str = r#"You are a research assistant summarizing a Shark Tank investor from web search results.

Produce a JSON object with exactly this shape:
{
  "bio": "two or three sentences on who they are and how they made their name, or null",
  "firm": "the fund or company they invest through, or null",
  "focus_areas": ["short labels for the sectors they favor"]
}

Rules:
- Use only facts present in the provided context. Never invent values.
- Keep the bio factual and free of promotional language.
- Use null or an empty array for anything the context does not establish.

Respond with ONLY the JSON object. No markdown, no explanation."#;

pub struct ProductPrompt;

impl ProductPrompt {
    /// Search query for a product. Kept stable so repeat runs hash to
    /// the same cache row.
    pub fn query(product: &Product) -> String {
        let mut query = format!("\"{}\" Shark Tank", product.name);
        if let Some(season) = product.season {
            query.push_str(&format!(" season {season}"));
        }
        query.push_str(" deal outcome investors update");
        query
    }

    /// User prompt carrying the subject line and combined context.
    pub fn build(product: &Product, context: &str) -> String {
        let mut prompt = String::with_capacity(context.len() + 256);
        prompt.push_str(&format!("Subject: {}", product.name));
        match (product.season, product.episode) {
            (Some(season), Some(episode)) => {
                prompt.push_str(&format!(" (season {season}, episode {episode})"));
            }
            (Some(season), None) => prompt.push_str(&format!(" (season {season})")),
            _ => {}
        }
        prompt.push_str("\n\nSearch context:\n");
        prompt.push_str(context);
        prompt
    }
}

pub struct InvestorPrompt;

impl InvestorPrompt {
    pub fn query(investor: &Investor) -> String {
        format!(
            "\"{}\" Shark Tank investor biography background investments",
            investor.name
        )
    }

    pub fn build(investor: &Investor, context: &str) -> String {
        let mut prompt = String::with_capacity(context.len() + 128);
        prompt.push_str(&format!("Subject: {}", investor.name));
        prompt.push_str("\n\nSearch context:\n");
        prompt.push_str(context);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dealboard_shared::new_id;

    use super::*;

    fn product(name: &str, season: Option<i64>, episode: Option<i64>) -> Product {
        Product {
            id: new_id(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            season,
            episode,
            description: None,
            category: None,
            website: None,
            ask_amount: None,
            ask_equity: None,
            deal_amount: None,
            deal_equity: None,
            deal_status: None,
            enriched_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn product_query_embeds_name_and_season() {
        let query = ProductPrompt::query(&product("Scrub Daddy", Some(4), Some(7)));
        assert_eq!(
            query,
            "\"Scrub Daddy\" Shark Tank season 4 deal outcome investors update"
        );
    }

    #[test]
    fn product_query_without_season_stays_well_formed() {
        let query = ProductPrompt::query(&product("Scrub Daddy", None, None));
        assert_eq!(query, "\"Scrub Daddy\" Shark Tank deal outcome investors update");
    }

    #[test]
    fn product_prompt_carries_subject_and_context() {
        let prompt = ProductPrompt::build(
            &product("Scrub Daddy", Some(4), Some(7)),
            "Scrub Daddy closed a deal with Lori Greiner.",
        );
        assert!(prompt.starts_with("Subject: Scrub Daddy (season 4, episode 7)"));
        assert!(prompt.contains("Search context:\nScrub Daddy closed a deal"));
    }

    #[test]
    fn system_prompts_demand_bare_json() {
        for system in [PRODUCT_SYSTEM, INVESTOR_SYSTEM] {
            assert!(system.contains("Respond with ONLY the JSON object."));
        }
    }
}
