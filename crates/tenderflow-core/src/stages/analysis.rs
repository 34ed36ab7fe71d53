use super::{Stage, StageContext, StageOutcome, StageParams, commit, narrate};
use crate::error::StageError;
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use tenderflow_protocol::{RecordKind, SessionId, StagePayload, TenderAnalysis};

const STAGE: RecordKind = RecordKind::TenderAnalysis;

/// Turns raw tender text into structured requirements.
#[derive(Debug, Default, Clone, Copy)]
pub struct TenderAnalysisStage;

impl TenderAnalysisStage {
    async fn document_text(ctx: &StageContext, params: &StageParams) -> Result<String, StageError> {
        let mut parts = Vec::new();
        if !params.document_paths.is_empty() {
            let extracted = ctx
                .documents
                .extract(&params.document_paths)
                .await
                .map_err(|err| StageError::Document {
                    stage: STAGE,
                    message: err.to_string(),
                })?;
            parts.push(extracted);
        }
        if let Some(text) = &params.document_text {
            parts.push(text.clone());
        }
        if parts.is_empty() {
            return Err(StageError::MissingInput {
                stage: STAGE,
                detail: "provide document text or at least one document path".to_string(),
            });
        }
        let text = parts.join("\n\n");
        if text.trim().is_empty() {
            return Err(StageError::MissingInput {
                stage: STAGE,
                detail: "tender document is empty".to_string(),
            });
        }
        Ok(text)
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl Stage for TenderAnalysisStage {
    fn kind(&self) -> RecordKind {
        STAGE
    }

    async fn run(
        &self,
        ctx: &StageContext,
        session_id: SessionId,
        params: &StageParams,
    ) -> Result<StageOutcome, StageError> {
        let text = Self::document_text(ctx, params).await?;
        let report = ctx.extractor.extract(&text);
        let document_excerpt = excerpt(&text, ctx.config.analysis.excerpt_chars);

        let mut context = vec![format!(
            "Functional requirements: {}",
            report.requirements.functional_requirements.len()
        )];
        context.extend(report.missing_information.iter().cloned());
        context.push(document_excerpt.clone());
        let analyst_notes = narrate(
            ctx,
            STAGE,
            "Summarize the client's needs and list the clarifications to request.",
            context.join("\n"),
        )
        .await?;

        let analysis = TenderAnalysis {
            document_excerpt,
            source_paths: params
                .document_paths
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            confidence_score: report.confidence(),
            requirements: report.requirements,
            missing_information: report.missing_information,
            structure_analysis: report.structure,
            analyst_notes,
            analyzed_at: Utc::now(),
        };
        info!(
            "tender analyzed (session_id={}, requirements={}, missing={}, confidence={:.2})",
            session_id,
            analysis.requirements.total_items(),
            analysis.missing_information.len(),
            analysis.confidence_score
        );
        let record = commit(ctx, session_id, STAGE, StagePayload::TenderAnalysis(analysis)).await?;
        Ok(StageOutcome::record(STAGE, record))
    }
}
