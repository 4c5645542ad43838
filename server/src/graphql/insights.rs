use async_graphql::{Context, Enum, Object, ResultExt, SimpleObject};
use platform_api::{ApiError, ApiResult};
use platform_authz::{Permission, UsageMetric};
use products_crm::{PromptKind, parse_tags};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{authorize, data, record_usage};

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsightKind {
    Insights,
    Search,
    Summary,
    EmailDraft,
    Tags,
}

impl From<InsightKind> for PromptKind {
    fn from(kind: InsightKind) -> Self {
        match kind {
            InsightKind::Insights => PromptKind::Insights,
            InsightKind::Search => PromptKind::Search,
            InsightKind::Summary => PromptKind::Summary,
            InsightKind::EmailDraft => PromptKind::EmailDraft,
            InsightKind::Tags => PromptKind::Tags,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct InsightPayload {
    pub kind: InsightKind,
    pub text: String,
    /// Filled for `TAGS` requests only.
    pub tags: Vec<String>,
}

#[derive(Default)]
pub struct InsightMutation;

#[Object]
impl InsightMutation {
    #[instrument(name = "graphql.generate_insight", skip(self, ctx, context))]
    async fn generate_insight(
        &self,
        ctx: &Context<'_>,
        org_id: Uuid,
        kind: InsightKind,
        context: String,
    ) -> async_graphql::Result<InsightPayload> {
        generate(ctx, org_id, kind, &context).await.extend()
    }
}

async fn generate(
    ctx: &Context<'_>,
    org_id: Uuid,
    kind: InsightKind,
    context: &str,
) -> ApiResult<InsightPayload> {
    authorize(ctx, org_id, Permission::UseInsights).await?;
    let data = data(ctx)?;
    let prompt_kind = PromptKind::from(kind);
    let prompt = prompt_kind.render(context);
    let text = match data.generator.generate(&prompt).await {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, kind = prompt_kind.as_str(), "text generation failed");
            return Err(ApiError::insights_unavailable());
        }
    };
    if let Err(err) = record_usage(&data.db, org_id, UsageMetric::AiRequests).await {
        warn!(error = %err, organization_id = %org_id, "ai usage not recorded");
    }
    let tags = if prompt_kind == PromptKind::Tags {
        parse_tags(&text)
    } else {
        Vec::new()
    };
    Ok(InsightPayload { kind, text, tags })
}
