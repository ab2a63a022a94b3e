    use super::*;
    use crate::schedule::{presets, ScheduleExpression};
    use std::sync::atomic::AtomicUsize;

    fn counting_callback() -> (TimerCallback, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let cb = callback(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (cb, hits)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_on_schedule() {
        let (cb, hits) = counting_callback();
        let schedule = presets::every_second().compile().unwrap();
        let handle = TimerHandle::spawn(1, schedule, cb);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        tokio::task::yield_now().await;

        assert!(handle.fire_count() >= 2);
        assert!(hits.load(Ordering::SeqCst) >= 2);
        assert!(!handle.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_timer() {
        let (cb, hits) = counting_callback();
        let schedule = presets::every_second().compile().unwrap();
        let handle = TimerHandle::spawn(2, schedule, cb);

        handle.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handle_reports_descriptor() {
        let (cb, _) = counting_callback();
        let schedule = ScheduleExpression::daily("23:59", "UTC").compile().unwrap();
        let handle = TimerHandle::spawn(3, schedule, cb);

        assert_eq!(handle.job_id(), 3);
        assert_eq!(handle.descriptor(), "daily 23:59 UTC");
        assert_eq!(handle.fire_count(), 0);
        assert!(handle.armed_at() <= Utc::now());
    }
