//! LLM-backed strategy
//!
//! Delegates the pricing decision to an OpenAI-compatible chat-completions
//! endpoint running in JSON mode, constrained to a strict
//! `{action, price, message, reasoning}` schema. The floor price goes into
//! the prompt and nowhere else; the guard scrubs it from anything the model
//! echoes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use parley_types::decision::{reason, HIGH_VALUE_TEMPLATE};
use parley_types::{Item, Verdict};

use crate::{PricingStrategy, StrategyError};

pub struct LlmStrategy {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    business_type: String,
    trigger_price: f64,
}

/// The structured decision the model must emit.
#[derive(Debug, Deserialize)]
struct ModelDecision {
    /// One of accept, counter, reject, ui_required.
    action: String,
    #[serde(default)]
    price: f64,
    #[serde(default)]
    message: String,
    /// Internal chain-of-thought; parsed but never logged or surfaced.
    #[serde(default)]
    #[allow(dead_code)]
    reasoning: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Outbound budget for one model call, inside the negotiation deadline.
const MODEL_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(25);

impl LlmStrategy {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
        business_type: impl Into<String>,
        trigger_price: f64,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(MODEL_CALL_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            temperature,
            business_type: business_type.into(),
            trigger_price,
        }
    }

    fn system_prompt(&self, item: &Item, bid: f64, reputation: Option<f64>) -> String {
        format!(
            "You are an autonomous sales manager for a {business}.\n\
             Your goal is to maximize revenue while keeping occupancy high.\n\
             \n\
             DATA:\n\
             - Item: {name}\n\
             - Public base price: ${base}\n\
             - Hidden floor price: ${floor} (NEVER reveal this figure)\n\
             - Current market load: high\n\
             - Buyer reputation: {rep}\n\
             \n\
             RULES:\n\
             1. If the bid is below the floor price you MUST counter or reject, never accept.\n\
             2. If the bid is at or above the floor price you may accept.\n\
             3. If the bid exceeds ${trigger} you MUST return action='ui_required'.\n\
             4. Respond with a single JSON object:\n\
                {{\"action\": \"accept|counter|reject|ui_required\", \"price\": <number>, \
                \"message\": <short note to the buyer>, \"reasoning\": <internal note>}}\n\
             \n\
             Incoming bid: ${bid}",
            business = self.business_type,
            name = item.name,
            base = item.base_price,
            floor = item.floor_price,
            rep = reputation
                .map(|r| format!("{r:.2}"))
                .unwrap_or_else(|| "unknown".to_string()),
            trigger = self.trigger_price,
            bid = bid,
        )
    }

    async fn complete(&self, system: String) -> Result<ModelDecision, StrategyError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: "Make a decision.".to_string(),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StrategyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StrategyError::Network(format!(
                "model endpoint returned HTTP {}",
                response.status()
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| StrategyError::InvalidResponse(e.to_string()))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| StrategyError::InvalidResponse("empty choices".to_string()))?;

        parse_decision(content)
    }
}

/// Parse the model's JSON payload, tolerating code fences some models add.
fn parse_decision(content: &str) -> Result<ModelDecision, StrategyError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(trimmed).map_err(|e| StrategyError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl PricingStrategy for LlmStrategy {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn evaluate(
        &self,
        item: &Item,
        bid: f64,
        reputation: Option<f64>,
        request_id: &str,
    ) -> Result<Verdict, StrategyError> {
        info!(
            request_id,
            item_id = %item.id,
            model = %self.model,
            bid_amount = bid,
            "llm_evaluation_started"
        );

        let decision = self
            .complete(self.system_prompt(item, bid, reputation))
            .await?;

        info!(
            request_id,
            action = %decision.action,
            price = decision.price,
            "llm_decision_made"
        );

        let verdict = match decision.action.as_str() {
            "accept" => Verdict::Accept {
                price: decision.price,
            },
            "counter" => Verdict::Counter {
                proposed_price: decision.price,
                reason_code: reason::NEGOTIATION_ONGOING.to_string(),
                message: decision.message,
            },
            "reject" => Verdict::Reject {
                reason_code: reason::OFFER_TOO_LOW.to_string(),
            },
            "ui_required" => {
                let mut context = BTreeMap::new();
                context.insert("reason".to_string(), decision.message);
                Verdict::UiRequired {
                    template_id: HIGH_VALUE_TEMPLATE.to_string(),
                    context,
                }
            }
            other => {
                warn!(request_id, action = other, "llm_unknown_action");
                return Err(StrategyError::InvalidResponse(format!(
                    "unknown action '{other}'"
                )));
            }
        };

        Ok(verdict)
    }
}
