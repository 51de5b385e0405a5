//! Prompt composition. Pure and deterministic: same inputs, byte-identical
//! output. No storage or network access happens here — the composer only
//! formats what the caller passes in.

use serde::{Deserialize, Serialize};

use crate::models::{EvidenceDocument, OfficeTemplate};

pub const PLAN_SYSTEM_PROMPT: &str = r#"You are a clinical decision-support assistant for licensed therapists. You draft treatment-plan recommendations for a therapist to review, edit and approve. You do NOT make final clinical decisions.

RULES:
1. Ground recommendations in the evidence excerpts provided; cite each source you rely on.
2. Flag any recommendation that goes beyond the provided evidence as clinical judgment required.
3. Use precise, professional clinical language.
4. Goals must be SMART: specific, measurable, achievable, relevant, time-bound.
5. Produce every requested output section, in order, even if brief."#;

/// Case fields the caller chooses to expose to the composer. The composer
/// performs no lookups of its own, so nothing beyond these fields reaches
/// the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub presenting_problem: String,
    pub session_narrative: String,
    pub diagnosis: Option<String>,
    pub modality_preference: Option<String>,
}

/// Assemble the full prompt: case summary, labeled evidence, matching
/// office template, then the requested output sections in fixed order.
pub fn compose(
    case: &CaseSummary,
    patient_category: &str,
    evidence: &[EvidenceDocument],
    templates: &[OfficeTemplate],
) -> String {
    let mut prompt = String::new();

    prompt.push_str("<CASE_SUMMARY>\n");
    prompt.push_str(&format!("Clinical category: {patient_category}\n"));
    prompt.push_str(&format!("Presenting problem: {}\n", case.presenting_problem));
    prompt.push_str(&format!("Session narrative: {}\n", case.session_narrative));
    if let Some(diagnosis) = &case.diagnosis {
        prompt.push_str(&format!("Working diagnosis: {diagnosis}\n"));
    }
    if let Some(modality) = &case.modality_preference {
        prompt.push_str(&format!("Modality preference: {modality}\n"));
    }
    prompt.push_str("</CASE_SUMMARY>\n\n");

    prompt.push_str("<CLINICAL_EVIDENCE>\n");
    if evidence.is_empty() {
        prompt.push_str(
            "No matching evidence was retrieved. Base recommendations on \
             general practice standards and say so explicitly.\n",
        );
    } else {
        for (i, doc) in evidence.iter().enumerate() {
            let date = doc
                .publication_date
                .map(|d| format!(", {d}"))
                .unwrap_or_default();
            prompt.push_str(&format!(
                "[{n}] {title} (Source: {source}{date})\n{content}\n",
                n = i + 1,
                title = doc.title,
                source = doc.source,
                content = doc.content,
            ));
        }
    }
    prompt.push_str("</CLINICAL_EVIDENCE>\n\n");

    if let Some(template) = select_template(templates, patient_category) {
        prompt.push_str("<OFFICE_TEMPLATE>\n");
        prompt.push_str(&template.interventions);
        prompt.push_str("\n</OFFICE_TEMPLATE>\n\n");
    }

    prompt.push_str(
        "Draft treatment-plan recommendations with the following sections, in order:\n\
         1. Diagnosis\n\
         2. Interventions\n\
         3. Goals (SMART format)\n\
         4. Modality\n\
         5. Session frequency and duration\n\
         6. Expected outcomes\n\
         7. References (cite the numbered evidence above)\n",
    );

    prompt
}

/// The template used for a category: office-wide templates are preferred
/// over private ones; among several candidates the most recently updated
/// wins.
pub fn select_template<'a>(
    templates: &'a [OfficeTemplate],
    category: &str,
) -> Option<&'a OfficeTemplate> {
    let matching = templates.iter().filter(|t| t.category == category);

    let (office_wide, private): (Vec<_>, Vec<_>) = matching.partition(|t| t.is_office_wide);
    let pool = if office_wide.is_empty() {
        private
    } else {
        office_wide
    };

    pool.into_iter().max_by_key(|t| t.updated_at)
}
