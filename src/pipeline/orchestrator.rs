//! Per-request orchestration of the drafting state machine:
//! `Requested → Authorized → EvidenceRetrieved → PromptComposed →
//! Generated → Persisted`, failing into `Denied`, `RetrievalFailed` or
//! `GenerationFailed` from the corresponding step.
//!
//! The final persist runs as one SQLite transaction: the plan update and
//! the generation provenance record commit together or not at all, so no
//! failure path leaves a partial write behind.

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use super::embedding::EmbeddingModel;
use super::generate::PlanGenerator;
use super::prompt::compose;
use super::retrieval::retrieve;
use super::types::{DraftOutcome, DraftRequest, DraftStage};
use super::DraftError;
use crate::db::{repository, DatabaseError};
use crate::guard::{authorize_and_audit, AccessVerdict, AuditSink, GuardError};
use crate::models::enums::{AuditAction, ResourceType};
use crate::models::GenerationRecord;

/// Drafting pipeline over explicit collaborators. Each `draft` call is
/// independent and request-scoped; concurrent requests share nothing but
/// the store and the audit log.
pub struct DraftPipeline<'a, G: PlanGenerator, E: EmbeddingModel, S: AuditSink> {
    generator: &'a G,
    embedder: &'a E,
    sink: &'a S,
    conn: &'a Connection,
}

impl<'a, G: PlanGenerator, E: EmbeddingModel, S: AuditSink> DraftPipeline<'a, G, E, S> {
    pub fn new(generator: &'a G, embedder: &'a E, sink: &'a S, conn: &'a Connection) -> Self {
        Self {
            generator,
            embedder,
            sink,
            conn,
        }
    }

    /// Run the full state machine for one request. No step retries
    /// automatically; a failed stage is reported through
    /// [`DraftError::stage`] so the caller can decide what to resubmit.
    pub fn draft(&self, request: &DraftRequest) -> Result<DraftOutcome, DraftError> {
        let now = chrono::Local::now().naive_local();
        self.transition(request, DraftStage::Requested);

        // Authorized: the plan write and the patient read are both guarded,
        // each with its own audit entry.
        self.guard(
            request,
            ResourceType::TreatmentPlan,
            &request.plan_id,
            AuditAction::Update,
            now,
        )?;
        self.guard(
            request,
            ResourceType::Patient,
            &request.patient_id,
            AuditAction::View,
            now,
        )?;

        let patient = repository::get_patient(self.conn, &request.patient_id)?
            .ok_or(DraftError::Denied(crate::guard::DenyReason::NotFound))?;
        let plan = repository::get_treatment_plan(self.conn, &request.plan_id)?
            .ok_or(DraftError::Denied(crate::guard::DenyReason::NotFound))?;
        if plan.patient_id != request.patient_id {
            return Err(DraftError::Denied(crate::guard::DenyReason::NotOwner));
        }
        self.transition(request, DraftStage::Authorized);

        // EvidenceRetrieved: an empty result is a valid empty-context case,
        // not a failure.
        let evidence = retrieve(
            &request.query,
            &patient.category,
            request.top_k,
            self.embedder,
            self.conn,
        )?;
        self.transition(request, DraftStage::EvidenceRetrieved);

        // PromptComposed
        let templates =
            repository::templates_for_category(self.conn, &patient.category, &request.therapist_id)?;
        let prompt = compose(&request.case, &patient.category, &evidence, &templates);
        let prompt_sha256 = sha256_hex(&prompt);
        self.transition(request, DraftStage::PromptComposed);

        // Generated: the timeout in the request config bounds the call.
        let recommendations = self.generator.generate(&prompt, &request.config)?;
        self.transition(request, DraftStage::Generated);

        // Persisted: plan update and provenance record in one transaction.
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(DatabaseError::from)?;
        repository::set_ai_recommendations(&tx, &request.plan_id, &recommendations)?;
        self.sink.record_generation(&GenerationRecord {
            therapist_id: request.therapist_id,
            patient_id: request.patient_id,
            prompt_sha256: prompt_sha256.clone(),
            timestamp: now,
        })?;
        tx.commit().map_err(DatabaseError::from)?;
        self.transition(request, DraftStage::Persisted);

        Ok(DraftOutcome {
            plan_id: request.plan_id,
            recommendations,
            evidence_used: evidence.iter().map(|d| d.id).collect(),
            prompt_sha256,
        })
    }

    fn guard(
        &self,
        request: &DraftRequest,
        resource_type: ResourceType,
        resource_id: &uuid::Uuid,
        action: AuditAction,
        now: chrono::NaiveDateTime,
    ) -> Result<(), DraftError> {
        let verdict = authorize_and_audit(
            self.conn,
            self.sink,
            &request.therapist_id,
            resource_type,
            resource_id,
            action,
            request.ip_address.as_deref(),
            now,
        )
        .map_err(|e| match e {
            GuardError::Database(db) => DraftError::Database(db),
            GuardError::Audit(audit) => DraftError::Audit(audit),
        })?;

        match verdict {
            AccessVerdict::Allow => Ok(()),
            AccessVerdict::Deny(reason) => Err(DraftError::Denied(reason)),
        }
    }

    fn transition(&self, request: &DraftRequest, stage: DraftStage) {
        tracing::debug!(
            plan = %request.plan_id,
            stage = stage.as_str(),
            "draft state transition"
        );
    }
}

fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EMBEDDING_DIM;
    use crate::db::repository::{
        audit_entries_for_therapist, generation_records_for_patient, get_treatment_plan,
        insert_evidence_document, insert_patient, insert_therapist, insert_treatment_plan,
        set_ai_recommendations,
    };
    use crate::db::sqlite::open_memory_database;
    use crate::guard::{AuditWriteError, SqliteAuditSink};
    use crate::models::enums::{EvidenceType, PlanStatus};
    use crate::models::{AuditEvent, EvidenceDocument, Patient, Therapist, TreatmentPlan};
    use crate::pipeline::embedding::EmbeddingError;
    use crate::pipeline::generate::GenerationFailure;
    use crate::pipeline::prompt::CaseSummary;
    use crate::pipeline::types::GenerationConfig;
    use uuid::Uuid;

    struct MockEmbedder;

    impl EmbeddingModel for MockEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(padded(&[1.0, 0.0]))
        }
        fn dimension(&self) -> usize {
            EMBEDDING_DIM
        }
    }

    enum MockGenerator {
        Ok(String),
        Fail(fn() -> GenerationFailure),
    }

    impl PlanGenerator for MockGenerator {
        fn generate(
            &self,
            _prompt: &str,
            config: &GenerationConfig,
        ) -> Result<String, GenerationFailure> {
            match self {
                Self::Ok(text) => Ok(text.clone()),
                Self::Fail(make) => {
                    let failure = make();
                    if let GenerationFailure::Timeout(_) = failure {
                        return Err(GenerationFailure::Timeout(config.timeout));
                    }
                    Err(failure)
                }
            }
        }
    }

    fn padded(lead: &[f32]) -> Vec<f32> {
        let mut v = lead.to_vec();
        v.resize(EMBEDDING_DIM, 0.0);
        v
    }

    struct Fixture {
        conn: Connection,
        therapist_id: Uuid,
        patient_id: Uuid,
        plan_id: Uuid,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let therapist_id = Uuid::new_v4();
        insert_therapist(
            &conn,
            &Therapist {
                id: therapist_id,
                email: format!("{therapist_id}@office.example"),
                credentials: "LMFT".into(),
                created_at: chrono::Local::now().naive_local(),
            },
        )
        .unwrap();
        let patient_id = Uuid::new_v4();
        insert_patient(
            &conn,
            &Patient {
                id: patient_id,
                therapist_id,
                category: "anxiety".into(),
                first_name: "Ana".into(),
                last_name: "Silva".into(),
                date_of_birth: None,
            },
        )
        .unwrap();
        let plan_id = Uuid::new_v4();
        insert_treatment_plan(
            &conn,
            &TreatmentPlan {
                id: plan_id,
                patient_id,
                therapist_id,
                diagnosis: "F41.0 Panic disorder".into(),
                goals: "Reduce panic frequency".into(),
                interventions: "CBT".into(),
                modality: "individual".into(),
                ai_generated_recommendations: None,
                status: PlanStatus::Active,
                updated_at: chrono::Local::now().naive_local(),
            },
        )
        .unwrap();
        Fixture {
            conn,
            therapist_id,
            patient_id,
            plan_id,
        }
    }

    fn seed_evidence(conn: &Connection, category: &str, lead: &[f32]) {
        insert_evidence_document(
            conn,
            &EvidenceDocument {
                id: Uuid::new_v4(),
                doc_type: EvidenceType::Guideline,
                category: category.into(),
                title: "Panic disorder guideline".into(),
                content: "Interoceptive exposure is first-line.".into(),
                embedding: padded(lead),
                source: "APA 2024".into(),
                publication_date: None,
            },
        )
        .unwrap();
    }

    fn request(f: &Fixture) -> DraftRequest {
        DraftRequest::new(
            f.therapist_id,
            f.patient_id,
            f.plan_id,
            "panic attacks",
            CaseSummary {
                presenting_problem: "Panic attacks at work".into(),
                session_narrative: "Two episodes this week.".into(),
                diagnosis: Some("F41.0".into()),
                modality_preference: None,
            },
        )
    }

    #[test]
    fn successful_draft_persists_recommendations_and_provenance() {
        let f = fixture();
        seed_evidence(&f.conn, "anxiety", &[1.0, 0.0]);
        let generator = MockGenerator::Ok("1. Diagnosis: F41.0\n2. Interventions: CBT".into());
        let embedder = MockEmbedder;
        let sink = SqliteAuditSink::new(&f.conn);
        let pipeline = DraftPipeline::new(&generator, &embedder, &sink, &f.conn);

        let outcome = pipeline.draft(&request(&f)).unwrap();

        assert_eq!(outcome.plan_id, f.plan_id);
        assert_eq!(outcome.evidence_used.len(), 1);
        assert_eq!(outcome.prompt_sha256.len(), 64);

        // Written verbatim
        let plan = get_treatment_plan(&f.conn, &f.plan_id).unwrap().unwrap();
        assert_eq!(
            plan.ai_generated_recommendations.as_deref(),
            Some(outcome.recommendations.as_str())
        );

        // Provenance: hash only, never raw text
        let records = generation_records_for_patient(&f.conn, &f.patient_id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].prompt_sha256, outcome.prompt_sha256);

        // One audit entry per guarded operation (plan update + patient view)
        let entries = audit_entries_for_therapist(&f.conn, &f.therapist_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.outcome == "allow"));
    }

    #[test]
    fn generation_timeout_leaves_plan_untouched() {
        let f = fixture();
        seed_evidence(&f.conn, "anxiety", &[1.0, 0.0]);
        set_ai_recommendations(&f.conn, &f.plan_id, "previous draft").unwrap();

        let generator = MockGenerator::Fail(|| {
            GenerationFailure::Timeout(std::time::Duration::from_secs(60))
        });
        let embedder = MockEmbedder;
        let sink = SqliteAuditSink::new(&f.conn);
        let pipeline = DraftPipeline::new(&generator, &embedder, &sink, &f.conn);

        let err = pipeline.draft(&request(&f)).unwrap_err();
        assert_eq!(err.stage(), "generation");
        assert!(matches!(
            err,
            DraftError::Generation(GenerationFailure::Timeout(_))
        ));

        // Exactly as it was before the call
        let plan = get_treatment_plan(&f.conn, &f.plan_id).unwrap().unwrap();
        assert_eq!(
            plan.ai_generated_recommendations.as_deref(),
            Some("previous draft")
        );
        assert!(generation_records_for_patient(&f.conn, &f.patient_id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn cross_therapist_draft_denied_and_audited() {
        let f = fixture();
        let intruder = Uuid::new_v4();
        insert_therapist(
            &f.conn,
            &Therapist {
                id: intruder,
                email: format!("{intruder}@office.example"),
                credentials: "LPC".into(),
                created_at: chrono::Local::now().naive_local(),
            },
        )
        .unwrap();

        let generator = MockGenerator::Ok("draft".into());
        let embedder = MockEmbedder;
        let sink = SqliteAuditSink::new(&f.conn);
        let pipeline = DraftPipeline::new(&generator, &embedder, &sink, &f.conn);

        let mut req = request(&f);
        req.therapist_id = intruder;

        let err = pipeline.draft(&req).unwrap_err();
        assert_eq!(err.stage(), "authorization");
        assert!(matches!(
            err,
            DraftError::Denied(crate::guard::DenyReason::NotOwner)
        ));

        // The denied attempt is attributable
        let entries = audit_entries_for_therapist(&f.conn, &intruder).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, "deny:not-owner");

        let plan = get_treatment_plan(&f.conn, &f.plan_id).unwrap().unwrap();
        assert!(plan.ai_generated_recommendations.is_none());
    }

    #[test]
    fn empty_evidence_store_still_drafts() {
        let f = fixture();
        let generator = MockGenerator::Ok("General-practice draft".into());
        let embedder = MockEmbedder;
        let sink = SqliteAuditSink::new(&f.conn);
        let pipeline = DraftPipeline::new(&generator, &embedder, &sink, &f.conn);

        let outcome = pipeline.draft(&request(&f)).unwrap();
        assert!(outcome.evidence_used.is_empty());
        assert_eq!(outcome.recommendations, "General-practice draft");
    }

    #[test]
    fn embedding_outage_is_retrieval_failure() {
        struct DownEmbedder;
        impl EmbeddingModel for DownEmbedder {
            fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
                Err(EmbeddingError("connection refused".into()))
            }
            fn dimension(&self) -> usize {
                EMBEDDING_DIM
            }
        }

        let f = fixture();
        let generator = MockGenerator::Ok("draft".into());
        let embedder = DownEmbedder;
        let sink = SqliteAuditSink::new(&f.conn);
        let pipeline = DraftPipeline::new(&generator, &embedder, &sink, &f.conn);

        let err = pipeline.draft(&request(&f)).unwrap_err();
        assert_eq!(err.stage(), "retrieval");

        let plan = get_treatment_plan(&f.conn, &f.plan_id).unwrap().unwrap();
        assert!(plan.ai_generated_recommendations.is_none());
    }

    #[test]
    fn provenance_write_failure_rolls_back_the_draft() {
        struct NoProvenanceSink;
        impl AuditSink for NoProvenanceSink {
            fn record(&self, _event: &AuditEvent) -> Result<(), AuditWriteError> {
                Ok(())
            }
            fn record_generation(
                &self,
                _record: &GenerationRecord,
            ) -> Result<(), AuditWriteError> {
                Err(AuditWriteError("generation log unavailable".into()))
            }
        }

        let f = fixture();
        seed_evidence(&f.conn, "anxiety", &[1.0, 0.0]);
        let generator = MockGenerator::Ok("draft text".into());
        let embedder = MockEmbedder;
        let sink = NoProvenanceSink;
        let pipeline = DraftPipeline::new(&generator, &embedder, &sink, &f.conn);

        let err = pipeline.draft(&request(&f)).unwrap_err();
        assert_eq!(err.stage(), "audit");

        // The transaction rolled back: no half-persisted draft
        let plan = get_treatment_plan(&f.conn, &f.plan_id).unwrap().unwrap();
        assert!(plan.ai_generated_recommendations.is_none());
    }

    #[test]
    fn plan_for_different_patient_is_denied() {
        let f = fixture();
        let other_patient = Uuid::new_v4();
        insert_patient(
            &f.conn,
            &Patient {
                id: other_patient,
                therapist_id: f.therapist_id,
                category: "anxiety".into(),
                first_name: "Ben".into(),
                last_name: "Okafor".into(),
                date_of_birth: None,
            },
        )
        .unwrap();

        let generator = MockGenerator::Ok("draft".into());
        let embedder = MockEmbedder;
        let sink = SqliteAuditSink::new(&f.conn);
        let pipeline = DraftPipeline::new(&generator, &embedder, &sink, &f.conn);

        let mut req = request(&f);
        req.patient_id = other_patient;

        let err = pipeline.draft(&req).unwrap_err();
        assert!(matches!(err, DraftError::Denied(_)));
    }

    #[test]
    fn prompt_hash_is_stable_for_identical_inputs() {
        assert_eq!(sha256_hex("abc"), sha256_hex("abc"));
        assert_ne!(sha256_hex("abc"), sha256_hex("abd"));
        assert_eq!(sha256_hex("abc").len(), 64);
    }
}
