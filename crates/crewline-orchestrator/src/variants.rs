//! Fan-out of one prompt into several competing responses.
//!
//! Each variant runs the same prompt under a different framing template, on
//! the configured model or spread across several providers. The caller picks
//! a winner with [`Orchestrator::select_variant`].

use crate::engine::Orchestrator;
use chrono::{DateTime, Utc};
use crewline_agent::{CompletionOptions, LlmProvider, ModelConfig, Usage};
use crewline_core::{CrewlineError, CrewlineResult, Message};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityMode {
    /// Every variant uses the orchestrator's configured model.
    #[default]
    SameProvider,
    /// Variants rotate across the supplied providers.
    MultiProvider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRequest {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default = "default_variant_count")]
    pub variant_count: usize,
    #[serde(default)]
    pub diversity: DiversityMode,
}

fn default_variant_count() -> usize {
    VARIANT_TEMPLATES.len()
}

impl VariantRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            variant_count: default_variant_count(),
            diversity: DiversityMode::SameProvider,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.variant_count = count;
        self
    }

    pub fn with_diversity(mut self, diversity: DiversityMode) -> Self {
        self.diversity = diversity;
        self
    }
}

/// A framing applied on top of the caller's system prompt.
#[derive(Debug)]
pub struct VariantTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    framing: &'static str,
}

impl VariantTemplate {
    pub fn system_prompt(&self, base: Option<&str>) -> String {
        match base {
            Some(base) if !base.trim().is_empty() => format!("{base}\n\n{}", self.framing),
            _ => self.framing.to_string(),
        }
    }
}

/// Framing templates, in the order variants are generated.
pub static VARIANT_TEMPLATES: [VariantTemplate; 4] = [
    VariantTemplate {
        key: "minimal",
        name: "Minimal",
        description: "The smallest solution that fully answers the request",
        framing: "Answer with the most concise solution that fully satisfies the request. \
                  Leave out optional features and abstractions.",
    },
    VariantTemplate {
        key: "comprehensive",
        name: "Comprehensive",
        description: "A thorough solution covering edge cases and error handling",
        framing: "Answer with a thorough solution. Cover edge cases, error handling and \
                  the reasoning behind each decision.",
    },
    VariantTemplate {
        key: "creative",
        name: "Creative",
        description: "An unconventional take on the problem",
        framing: "Explore an unconventional approach. Prefer a novel design over the \
                  obvious one when it brings a concrete benefit.",
    },
    VariantTemplate {
        key: "pragmatic",
        name: "Pragmatic",
        description: "A balanced, maintainable production answer",
        framing: "Balance simplicity against completeness. Favour well-known patterns \
                  that a team can maintain.",
    },
];

/// One generated response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    /// Key of the framing template that produced it.
    pub template: String,
    pub name: String,
    pub description: String,
    pub content: String,
    pub provider: LlmProvider,
    pub model: String,
    pub usage: Usage,
    pub cost_usd: f64,
    pub duration_ms: u64,
}

/// All variants produced for one request, plus the caller's pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub request_id: Uuid,
    pub prompt: String,
    pub variants: Vec<Variant>,
    pub selected_variant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl VariantResult {
    pub fn selected(&self) -> Option<&Variant> {
        let id = self.selected_variant_id?;
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn total_cost_usd(&self) -> f64 {
        self.variants.iter().map(|v| v.cost_usd).sum()
    }
}

impl Orchestrator {
    /// Generate up to four variants of `request.prompt` in parallel.
    ///
    /// The count is clamped to `1..=4`. In multi-provider mode variants rotate
    /// over `available_providers`; with fewer than two providers every
    /// variant uses the configured model instead. Either all variants are
    /// generated and stored, or the first failure is returned and nothing is
    /// stored.
    pub async fn generate_variants(
        &self,
        request: VariantRequest,
        available_providers: &[ModelConfig],
    ) -> CrewlineResult<VariantResult> {
        let count = request.variant_count.clamp(1, VARIANT_TEMPLATES.len());
        let providers: Vec<ModelConfig> = match request.diversity {
            DiversityMode::MultiProvider if available_providers.len() >= 2 => {
                available_providers.to_vec()
            }
            DiversityMode::MultiProvider => {
                debug!(
                    providers = available_providers.len(),
                    "Fewer than two providers, using the configured model for every variant"
                );
                vec![self.config.model.clone()]
            }
            DiversityMode::SameProvider => vec![self.config.model.clone()],
        };

        let request_id = Uuid::new_v4();
        info!(request_id = %request_id, variants = count, providers = providers.len(), "Generating variants");

        let handles: Vec<_> = VARIANT_TEMPLATES
            .iter()
            .take(count)
            .zip(providers.iter().cycle())
            .map(|(template, config)| {
                let backend = (self.backends)(config);
                let config = config.clone();
                let messages = vec![Message::user(request.prompt.clone())];
                let options = CompletionOptions::from_config(&config)
                    .with_system_prompt(template.system_prompt(request.system_prompt.as_deref()));

                tokio::spawn(async move {
                    let started = Instant::now();
                    let response = backend.complete(&messages, &options).await?;
                    Ok::<_, CrewlineError>(Variant {
                        id: Uuid::new_v4(),
                        template: template.key.to_string(),
                        name: template.name.to_string(),
                        description: template.description.to_string(),
                        cost_usd: config.cost(&response.usage),
                        content: response.content,
                        provider: config.provider,
                        model: response.model,
                        usage: response.usage,
                        duration_ms: started.elapsed().as_millis() as u64,
                    })
                })
            })
            .collect();

        let mut variants = Vec::with_capacity(count);
        for joined in join_all(handles).await {
            let variant = joined
                .map_err(|e| CrewlineError::Llm(format!("variant task aborted: {e}")))?
                .inspect_err(|e| warn!(request_id = %request_id, error = %e, "Variant generation failed"))?;
            variants.push(variant);
        }

        let result = VariantResult {
            request_id,
            prompt: request.prompt,
            variants,
            selected_variant_id: None,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .variants
            .insert(request_id, result.clone());
        info!(request_id = %request_id, cost_usd = result.total_cost_usd(), "Variants generated");
        Ok(result)
    }

    /// Record `variant_id` as the chosen variant, replacing any earlier choice.
    ///
    /// Returns false when the request is unknown or the variant does not
    /// belong to it; the previous selection then stays in place.
    pub fn select_variant(&self, request_id: Uuid, variant_id: Uuid) -> bool {
        let mut state = self.state.write();
        let Some(result) = state.variants.get_mut(&request_id) else {
            debug!(request_id = %request_id, "Selection ignored, unknown variant request");
            return false;
        };
        if !result.variants.iter().any(|v| v.id == variant_id) {
            warn!(request_id = %request_id, variant_id = %variant_id, "Selection ignored, variant not in request");
            return false;
        }
        result.selected_variant_id = Some(variant_id);
        true
    }

    pub fn get_variant_result(&self, request_id: Uuid) -> Option<VariantResult> {
        self.state.read().variants.get(&request_id).cloned()
    }

    pub fn selected_variant(&self, request_id: Uuid) -> Option<Variant> {
        self.state
            .read()
            .variants
            .get(&request_id)
            .and_then(|r| r.selected().cloned())
    }
}
