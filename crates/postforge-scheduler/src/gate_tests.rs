    use super::*;

    fn external(kind: &str, authenticated: bool) -> SourceDescriptor {
        SourceDescriptor::external(Some(kind.to_string()), authenticated)
    }

    #[test]
    fn test_source_tokens() {
        for source in TriggerSource::ALL {
            assert_eq!(source.as_str().parse::<TriggerSource>().unwrap(), source);
        }
        assert!("cron".parse::<TriggerSource>().is_err());
        assert_eq!(
            serde_json::to_value(TriggerSource::Webhook).unwrap(),
            serde_json::json!("webhook")
        );
    }

    #[test]
    fn test_internal_scheduler_admitted() {
        let gate = TriggerGate::permissive();
        let source = gate.check(&TriggerRequest::internal(1)).unwrap();
        assert_eq!(source, TriggerSource::Scheduler);
    }

    #[test]
    fn test_missing_kind_denied() {
        let gate = TriggerGate::permissive();
        let err = gate
            .classify(&SourceDescriptor::external(None, true))
            .unwrap_err();
        assert!(err.reason.contains("missing"));
        assert!(err.descriptor.kind.is_none());
    }

    #[test]
    fn test_unrecognized_kind_denied() {
        let gate = TriggerGate::permissive();
        let err = gate.classify(&external("cli", true)).unwrap_err();
        assert!(err.reason.contains("unrecognized"));
        assert_eq!(err.descriptor.kind.as_deref(), Some("cli"));
    }

    #[test]
    fn test_allow_list_enforced() {
        let gate = TriggerGate::new([TriggerSource::Scheduler, TriggerSource::Interactive]);
        assert!(!gate.allows(TriggerSource::Webhook));

        let err = gate.classify(&external("webhook", true)).unwrap_err();
        assert!(err.reason.contains("not allowed"));
        assert!(gate.classify(&external("interactive", true)).is_ok());
    }

    #[test]
    fn test_external_scheduler_denied() {
        let gate = TriggerGate::permissive();
        let err = gate.classify(&external("scheduler", true)).unwrap_err();
        assert!(err.reason.contains("external"));
    }

    #[test]
    fn test_unauthenticated_external_denied() {
        let gate = TriggerGate::permissive();
        assert!(gate.classify(&external("interactive", false)).is_err());
        assert!(gate.classify(&external("webhook", false)).is_err());
        assert_eq!(
            gate.classify(&external("webhook", true)).unwrap(),
            TriggerSource::Webhook
        );
    }

    #[test]
    fn test_suspension_blocks_external_only() {
        let gate = TriggerGate::permissive();
        gate.suspend();
        assert!(gate.is_suspended());

        let err = gate.classify(&external("interactive", true)).unwrap_err();
        assert!(err.reason.contains("suspended"));
        assert!(gate.check(&TriggerRequest::internal(1)).is_ok());

        gate.resume();
        assert!(!gate.is_suspended());
        assert!(gate.classify(&external("interactive", true)).is_ok());
    }

    #[test]
    fn test_from_names() {
        let gate = TriggerGate::from_names(&["scheduler".to_string(), " webhook ".to_string()])
            .unwrap();
        assert!(gate.allows(TriggerSource::Scheduler));
        assert!(gate.allows(TriggerSource::Webhook));
        assert!(!gate.allows(TriggerSource::Interactive));

        let err = TriggerGate::from_names(&["admin".to_string()]).err().unwrap();
        assert!(matches!(err, SchedulerError::Config(_)));
    }

    #[test]
    fn test_empty_allow_list_denies_everything() {
        let gate = TriggerGate::new([]);
        assert!(gate.check(&TriggerRequest::internal(1)).is_err());
    }

    #[test]
    fn test_denials_are_counted() {
        let gate = TriggerGate::permissive();
        let _ = gate.classify(&external("nope", true));
        let _ = gate.classify(&SourceDescriptor::external(None, false));
        let _ = gate.classify(&external("interactive", true));
        assert_eq!(gate.denied_count(), 2);
    }

    #[test]
    fn test_descriptor_display() {
        let text = SourceDescriptor::external(None, false).to_string();
        assert_eq!(text, "kind=<none> origin=external authenticated=false");
    }

    #[test]
    fn test_request_constructors() {
        let fire = TriggerRequest::internal(4);
        assert_eq!(fire.job_id, 4);
        assert_eq!(fire.descriptor, SourceDescriptor::internal());

        let manual = TriggerRequest::new(9, external("webhook", true));
        assert_eq!(manual.job_id, 9);
        assert_eq!(manual.descriptor.origin, Origin::External);
        assert_eq!(manual.descriptor.kind.as_deref(), Some("webhook"));
    }
