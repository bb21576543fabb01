
    use super::*;
    use crate::job::JobDetail;
    use crate::test_support::*;
    use crate::trigger::Trigger;
    use chrono::Duration;

    async fn state_of(store: &JobStore, name: &str) -> Option<TriggerState> {
        store
            .state_index()
            .current_state(&TriggerKey::named(name))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_pause_and_resume_trigger() {
        let h = Harness::new();
        let store = h.store();
        let job = job("j");
        store.store_job(&job, false).await.unwrap();
        store.store_trigger(&repeating("t", &job, t0()), false).await.unwrap();

        store.pause_trigger(&TriggerKey::named("t")).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::Paused));

        store.resume_trigger(&TriggerKey::named("t")).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::Waiting));
    }

    #[tokio::test]
    async fn test_pause_unknown_and_completed_triggers() {
        let h = Harness::new();
        let store = h.store();
        let job = job("j");
        store.store_job(&job, false).await.unwrap();
        let trigger = repeating("t", &job, t0());
        store.store_trigger(&trigger, false).await.unwrap();
        store
            .state_index()
            .set_state(&trigger.key, TriggerState::Completed, -1.0)
            .await
            .unwrap();

        store.pause_trigger(&TriggerKey::named("ghost")).await.unwrap();
        store.pause_trigger(&trigger.key).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::Completed));

        // resume only acts on paused triggers
        store.resume_trigger(&trigger.key).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::Completed));
    }

    #[tokio::test]
    async fn test_pause_blocked_trigger_and_resume() {
        let h = Harness::new();
        let store = h.store();
        let job = exclusive_job("j");
        store.store_job(&job, false).await.unwrap();
        store.leases().block_job(&job.key).await.unwrap();
        store.store_trigger(&repeating("t", &job, t0()), false).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::Blocked));

        store.pause_trigger(&TriggerKey::named("t")).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::PausedBlocked));

        store.resume_trigger(&TriggerKey::named("t")).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::Blocked));

        store.leases().unblock_job(&job.key).await.unwrap();
        store.pause_trigger(&TriggerKey::named("t")).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::PausedBlocked));
    }

    #[tokio::test]
    async fn test_pause_triggers_group() {
        let h = Harness::new();
        let store = h.store();
        let job = job("j");
        store.store_job(&job, false).await.unwrap();
        for (name, group) in [("a", "etl"), ("b", "etl"), ("c", "mail")] {
            let trigger = Trigger::simple(
                TriggerKey::new(name, group),
                job.key.clone(),
                t0(),
                Duration::minutes(1),
                5,
            );
            store.store_trigger(&trigger, false).await.unwrap();
        }

        let groups = store.pause_triggers(&GroupMatcher::contains("t")).await.unwrap();
        assert_eq!(groups, vec!["etl"]);
        assert!(store.is_trigger_group_paused("etl").await.unwrap());
        assert!(!store.is_trigger_group_paused("mail").await.unwrap());
        assert_eq!(store.get_paused_trigger_groups().await.unwrap(), vec!["etl"]);

        let index = store.state_index();
        let key = |name: &str, group: &str| TriggerKey::new(name, group);
        assert!(index.is_in(&key("a", "etl"), TriggerState::Paused).await.unwrap());
        assert!(index.is_in(&key("b", "etl"), TriggerState::Paused).await.unwrap());
        assert!(index.is_in(&key("c", "mail"), TriggerState::Waiting).await.unwrap());

        store.resume_triggers(&GroupMatcher::equals("etl")).await.unwrap();
        assert!(index.is_in(&key("a", "etl"), TriggerState::Waiting).await.unwrap());
        assert!(store.get_paused_trigger_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pause_equals_marks_empty_group() {
        let h = Harness::new();
        let store = h.store();

        let groups = store
            .pause_triggers(&GroupMatcher::equals("later"))
            .await
            .unwrap();
        assert_eq!(groups, vec!["later"]);
        assert!(store.is_trigger_group_paused("later").await.unwrap());

        let resumed = store
            .resume_triggers(&GroupMatcher::starts_with("lat"))
            .await
            .unwrap();
        assert_eq!(resumed, vec!["later"]);
        assert!(!store.is_trigger_group_paused("later").await.unwrap());
    }

    #[tokio::test]
    async fn test_group_resume_reflects_block_during_pause() {
        let h = Harness::new();
        let store = h.store();
        let job = exclusive_job("j");
        store.store_job(&job, false).await.unwrap();
        store.store_trigger(&repeating("a", &job, t0()), false).await.unwrap();
        store.store_trigger(&repeating("b", &job, t0()), false).await.unwrap();

        store
            .pause_triggers(&GroupMatcher::equals("DEFAULT"))
            .await
            .unwrap();
        store.leases().block_job(&job.key).await.unwrap();
        store
            .resume_triggers(&GroupMatcher::equals("DEFAULT"))
            .await
            .unwrap();

        assert_eq!(state_of(&store, "a").await, Some(TriggerState::Blocked));
        assert_eq!(state_of(&store, "b").await, Some(TriggerState::Blocked));
    }

    #[tokio::test]
    async fn test_pause_and_resume_jobs() {
        let h = Harness::new();
        let store = h.store();
        let etl = JobDetail::new(JobKey::new("load", "etl"), "test::Job");
        let mail = JobDetail::new(JobKey::new("send", "mail"), "test::Job");
        store.store_job(&etl, false).await.unwrap();
        store.store_job(&mail, false).await.unwrap();
        store.store_trigger(&repeating("e", &etl, t0()), false).await.unwrap();
        store.store_trigger(&repeating("m", &mail, t0()), false).await.unwrap();

        let groups = store.pause_jobs(&GroupMatcher::equals("etl")).await.unwrap();
        assert_eq!(groups, vec!["etl"]);
        assert!(store.is_job_group_paused("etl").await.unwrap());
        assert_eq!(state_of(&store, "e").await, Some(TriggerState::Paused));
        assert_eq!(state_of(&store, "m").await, Some(TriggerState::Waiting));

        store.resume_jobs(&GroupMatcher::Anything).await.unwrap();
        assert!(store.get_paused_job_groups().await.unwrap().is_empty());
        assert_eq!(state_of(&store, "e").await, Some(TriggerState::Waiting));
    }

    #[tokio::test]
    async fn test_pause_and_resume_single_job() {
        let h = Harness::new();
        let store = h.store();
        let job = job("j");
        store.store_job(&job, false).await.unwrap();
        store.store_trigger(&repeating("a", &job, t0()), false).await.unwrap();
        store.store_trigger(&repeating("b", &job, t0()), false).await.unwrap();

        store.pause_job(&job.key).await.unwrap();
        assert_eq!(state_of(&store, "a").await, Some(TriggerState::Paused));
        assert_eq!(state_of(&store, "b").await, Some(TriggerState::Paused));
        assert!(!store.is_job_group_paused("DEFAULT").await.unwrap());

        store.resume_job(&job.key).await.unwrap();
        assert_eq!(state_of(&store, "a").await, Some(TriggerState::Waiting));
        assert_eq!(state_of(&store, "b").await, Some(TriggerState::Waiting));
    }

    #[tokio::test]
    async fn test_pause_all_and_resume_all() {
        let h = Harness::new();
        let store = h.store();
        let job = job("j");
        store.store_job(&job, false).await.unwrap();
        store.store_trigger(&repeating("a", &job, t0()), false).await.unwrap();
        store.pause_jobs(&GroupMatcher::equals("DEFAULT")).await.unwrap();

        store.pause_all().await.unwrap();
        assert_eq!(store.get_paused_trigger_groups().await.unwrap(), vec!["DEFAULT"]);

        store.resume_all().await.unwrap();
        assert!(store.get_paused_trigger_groups().await.unwrap().is_empty());
        assert!(store.get_paused_job_groups().await.unwrap().is_empty());
        assert_eq!(state_of(&store, "a").await, Some(TriggerState::Waiting));
    }

    #[tokio::test]
    async fn test_resume_applies_misfire() {
        let h = Harness::new();
        let store = h.store();
        let job = job("j");
        store.store_job(&job, false).await.unwrap();
        store.store_trigger(&repeating("t", &job, t0()), false).await.unwrap();
        store.pause_trigger(&TriggerKey::named("t")).await.unwrap();

        h.advance(Duration::minutes(25));
        store.resume_trigger(&TriggerKey::named("t")).await.unwrap();

        let trigger = store
            .retrieve_trigger(&TriggerKey::named("t"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.next_fire_time, Some(t0() + Duration::minutes(30)));
        assert_eq!(
            store
                .state_index()
                .score_of(&trigger.key, TriggerState::Waiting)
                .await
                .unwrap(),
            Some((t0() + Duration::minutes(30)).timestamp_millis() as f64)
        );
        assert_eq!(h.signaler.misfired(), vec!["DEFAULT.t".to_string()]);
    }

    #[tokio::test]
    async fn test_resume_trigger_without_fire_time_clears_state() {
        let h = Harness::new();
        let store = h.store();
        let job = job("j");
        store.store_job(&job, false).await.unwrap();
        let mut trigger = one_shot("t", &job, t0());
        trigger.next_fire_time = None;
        store.store_trigger(&trigger, false).await.unwrap();
        store.pause_trigger(&trigger.key).await.unwrap();
        assert_eq!(state_of(&store, "t").await, Some(TriggerState::Paused));

        store.resume_trigger(&trigger.key).await.unwrap();
        assert_eq!(state_of(&store, "t").await, None);
    }
