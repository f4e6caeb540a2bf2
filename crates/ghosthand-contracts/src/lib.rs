//! # ghosthand-contracts
//!
//! Shared types for the Ghosthand orchestration core: the closed action
//! schema, plans, step results, run records, per-call context, and the
//! error taxonomy.
//!
//! All crates in the workspace import from here. No orchestration logic
//! lives in this crate: only data definitions, the static schema table,
//! and construction-time validation.

pub mod action;
pub mod context;
pub mod error;
pub mod execution;
pub mod plan;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use action::{is_privileged, schema_for, Action, ActionKind, Parameters};
    use context::{CancelToken, IdentityStatus};
    use error::GhosthandError;
    use execution::{RunId, RunStatus, StepResult};
    use plan::Plan;

    fn params(value: serde_json::Value) -> Parameters {
        serde_json::from_value(value).unwrap()
    }

    // ── Action schema ────────────────────────────────────────────────────────

    #[test]
    fn every_kind_round_trips_through_its_wire_name() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
            assert_eq!(kind.schema().kind, kind);
        }
    }

    #[test]
    fn schema_lookup_rejects_unknown_kind() {
        match schema_for("launch-rocket") {
            Err(GhosthandError::UnknownActionKind { kind }) => assert_eq!(kind, "launch-rocket"),
            other => panic!("expected UnknownActionKind, got {:?}", other),
        }
        assert!(is_privileged("launch-rocket").is_err());
    }

    #[test]
    fn communications_and_input_kinds_are_privileged() {
        assert!(is_privileged("send-email").unwrap());
        assert!(is_privileged("send-webhook").unwrap());
        assert!(is_privileged("type-text").unwrap());
        assert!(is_privileged("click-ui-element").unwrap());
        assert!(!is_privileged("locate-file").unwrap());
        assert!(!is_privileged("ocr-read").unwrap());
    }

    #[test]
    fn send_email_requires_to_and_subject() {
        let names: Vec<&str> = ActionKind::SendEmail.schema().required().map(|p| p.name).collect();
        assert_eq!(names, vec!["to", "subject"]);
    }

    // ── Action construction ──────────────────────────────────────────────────

    #[test]
    fn valid_action_is_constructed_with_derived_privilege() {
        let action = Action::new(
            ActionKind::SendEmail,
            params(json!({ "to": "bob@example.com", "subject": "hi" })),
        )
        .unwrap();
        assert!(action.is_privileged());
        assert_eq!(action.kind(), ActionKind::SendEmail);
    }

    #[test]
    fn unknown_kind_is_rejected_at_construction() {
        let err = Action::parse("format-disk", Parameters::new()).unwrap_err();
        assert!(matches!(err, GhosthandError::UnknownActionKind { .. }));
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let err = Action::new(
            ActionKind::SendEmail,
            params(json!({ "to": "bob@example.com" })),
        )
        .unwrap_err();
        match err {
            GhosthandError::InvalidParameters { kind, reason } => {
                assert_eq!(kind, "send-email");
                assert!(reason.contains("subject"), "reason: {reason}");
            }
            other => panic!("expected InvalidParameters, got {:?}", other),
        }
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let err = Action::new(
            ActionKind::Speak,
            params(json!({ "text": "hello", "volume": 11 })),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown parameter 'volume'"));
    }

    #[test]
    fn wrongly_typed_parameter_is_rejected() {
        let err = Action::new(
            ActionKind::ClickUiElement,
            params(json!({ "x": "ten", "y": 4 })),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be of type integer"));
    }

    #[test]
    fn optional_parameters_are_accepted() {
        let action = Action::new(
            ActionKind::RedactImage,
            params(json!({ "target": "shot.png", "terms": ["Alice", "Bob"] })),
        )
        .unwrap();
        assert_eq!(action.parameters().len(), 2);
    }

    #[test]
    fn deserialization_validates_and_ignores_wire_privilege_flag() {
        let raw = json!({
            "kind": "send-webhook",
            "parameters": { "url": "https://x", "message": "m" },
            "is_privileged": false
        });
        let action: Action = serde_json::from_value(raw).unwrap();
        assert!(action.is_privileged());

        let bad = json!({ "kind": "send-webhook", "parameters": { "url": "https://x" } });
        assert!(serde_json::from_value::<Action>(bad).is_err());
    }

    // ── Plan ─────────────────────────────────────────────────────────────────

    #[test]
    fn empty_plan_is_rejected() {
        assert_eq!(Plan::new(vec![]).unwrap_err(), GhosthandError::EmptyPlan);
        assert!(serde_json::from_str::<Plan>("[]").is_err());
    }

    #[test]
    fn plan_text_round_trips() {
        let plan = Plan::new(vec![
            Action::new(
                ActionKind::LocateFile,
                params(json!({ "pattern": "screenshot" })),
            )
            .unwrap(),
            Action::new(
                ActionKind::SendEmail,
                params(json!({ "to": "bob@example.com", "subject": "Latest screenshot" })),
            )
            .unwrap(),
        ])
        .unwrap();

        let text = plan.to_text().unwrap();
        let decoded: Plan = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, plan);
    }

    // ── RunStatus ────────────────────────────────────────────────────────────

    #[test]
    fn run_status_aggregation() {
        let ok = StepResult::success("done");
        let bad = StepResult::failure("boom");
        let skip = StepResult::skipped("privileged action blocked");

        assert_eq!(RunStatus::from_results(&[ok.clone(), ok.clone()], false), RunStatus::Success);
        assert_eq!(RunStatus::from_results(&[ok.clone(), bad.clone()], false), RunStatus::Partial);
        assert_eq!(RunStatus::from_results(&[ok, skip.clone()], false), RunStatus::Partial);
        assert_eq!(RunStatus::from_results(&[bad.clone(), bad], false), RunStatus::Failed);
        assert_eq!(RunStatus::from_results(&[skip.clone(), skip], true), RunStatus::Success);
    }

    // ── Context ──────────────────────────────────────────────────────────────

    #[test]
    fn identity_is_bound_to_one_user() {
        let identity = IdentityStatus::Verified {
            user: "william".to_string(),
        };
        assert!(identity.is_verified_for("william"));
        assert!(!identity.is_verified_for("mallory"));
        assert!(!IdentityStatus::Unverified.is_verified_for("william"));
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn run_ids_are_unique() {
        let ids: std::collections::HashSet<RunId> = (0..100).map(|_| RunId::new()).collect();
        assert_eq!(ids.len(), 100);
    }

    // ── Error display ────────────────────────────────────────────────────────

    #[test]
    fn error_messages_carry_context() {
        let err = GhosthandError::NoExecutorRegistered {
            kind: "speak".to_string(),
        };
        assert!(err.to_string().contains("speak"));

        let err = GhosthandError::store("disk full");
        assert!(err.to_string().contains("history store unavailable"));
        assert!(err.to_string().contains("disk full"));
    }
}
