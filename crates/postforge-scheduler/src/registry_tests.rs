    use super::*;
    use crate::schedule::ScheduleExpression;
    use crate::timer::callback;

    fn noop() -> TimerCallback {
        callback(|| async {})
    }

    fn daily(time: &str) -> CompiledSchedule {
        ScheduleExpression::daily(time, "UTC").compile().unwrap()
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let registry = CronRegistry::new();
        registry.register(1, daily("23:59"), noop()).await.unwrap();
        registry.register(2, daily("08:00"), noop()).await.unwrap();

        let active = registry.list_active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[&1], "daily 23:59 UTC");
        assert_eq!(active[&2], "daily 08:00 UTC");
        assert_eq!(registry.active_count(), 2);
        assert!(registry.is_armed(1));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let registry = CronRegistry::new();
        registry.register(1, daily("23:59"), noop()).await.unwrap();

        let err = registry.register(1, daily("10:00"), noop()).await.unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateRegistration(1)));
        assert_eq!(registry.list_active()[&1], "daily 23:59 UTC");
    }

    #[tokio::test]
    async fn test_replace_is_idempotent() {
        let registry = CronRegistry::new();
        registry.replace(1, daily("23:59"), noop()).await;
        registry.replace(1, daily("23:59"), noop()).await;
        registry.replace(1, daily("06:00"), noop()).await;

        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.list_active()[&1], "daily 06:00 UTC");
    }

    #[tokio::test]
    async fn test_unregister() {
        let registry = CronRegistry::new();
        registry.register(1, daily("23:59"), noop()).await.unwrap();

        assert!(registry.unregister(1).await);
        assert!(!registry.unregister(1).await);
        assert!(!registry.unregister(42).await);
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_slots_are_pruned() {
        let registry = CronRegistry::new();
        registry.register(1, daily("23:59"), noop()).await.unwrap();
        assert_eq!(registry.slot_count(), 1);

        registry.unregister(1).await;
        assert_eq!(registry.slot_count(), 0);

        // Probing an unknown id leaves nothing behind.
        assert!(!registry.slot(7).await.is_armed());
        assert_eq!(registry.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_slot_guard_operations() {
        let registry = CronRegistry::new();
        {
            let mut slot = registry.slot(5).await;
            assert_eq!(slot.id(), 5);
            assert!(!slot.is_armed());
            slot.arm(daily("12:00"), noop()).unwrap();
            assert!(slot.is_armed());
            assert!(slot.arm(daily("13:00"), noop()).is_err());
            assert!(slot.replace(daily("13:00"), noop()));
        }
        assert_eq!(registry.list_active()[&5], "daily 13:00 UTC");

        {
            let mut slot = registry.slot(5).await;
            assert!(slot.disarm());
            assert!(!slot.disarm());
        }
        assert!(registry.list_active().is_empty());
    }

    #[tokio::test]
    async fn test_stop_all() {
        let registry = CronRegistry::new();
        for id in [3, 1, 2] {
            registry.register(id, daily("23:59"), noop()).await.unwrap();
        }

        let stopped = registry.stop_all().await;
        assert_eq!(stopped, vec![1, 2, 3]);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.slot_count(), 0);
        assert!(registry.stop_all().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replace_leaves_single_timer() {
        let registry = Arc::new(CronRegistry::new());

        let mut tasks = Vec::new();
        for minute in 0..20u32 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let time = format!("10:{:02}", minute);
                registry.replace(9, daily(&time), noop()).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(registry.active_count(), 1);
        assert!(registry.is_armed(9));
        assert_eq!(registry.slot_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_arm_disarm_never_duplicates() {
        let registry = Arc::new(CronRegistry::new());

        let mut tasks = Vec::new();
        for i in 0..40 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    let _ = registry.register(1, daily("23:59"), noop()).await;
                } else {
                    registry.unregister(1).await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(registry.active_count() <= 1);
        assert_eq!(registry.is_armed(1), registry.slot_count() == 1);
    }

    #[tokio::test]
    async fn test_unrelated_ids_do_not_block() {
        let registry = CronRegistry::new();
        let held = registry.slot(1).await;

        let other = tokio::time::timeout(std::time::Duration::from_secs(1), registry.slot(2)).await;
        assert!(other.is_ok());
        drop(other);
        drop(held);
    }
