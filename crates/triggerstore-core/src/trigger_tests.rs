
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn every_minute(repeat_count: i32) -> Trigger {
        Trigger::simple(
            TriggerKey::named("t"),
            JobKey::named("j"),
            t0(),
            Duration::minutes(1),
            repeat_count,
        )
    }

    #[test]
    fn test_misfire_instruction_codes() {
        for instruction in [
            MisfireInstruction::IgnoreMisfirePolicy,
            MisfireInstruction::Smart,
            MisfireInstruction::FireNow,
            MisfireInstruction::DoNothing,
        ] {
            assert_eq!(MisfireInstruction::from_code(instruction.code()), Some(instruction));
        }
        assert_eq!(MisfireInstruction::IgnoreMisfirePolicy.code(), -1);
        assert_eq!(MisfireInstruction::from_code(7), None);
    }

    #[test]
    fn test_simple_trigger_starts_at_start_time() {
        let trigger = every_minute(3);
        assert_eq!(trigger.next_fire_time, Some(t0()));
        assert_eq!(trigger.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn test_triggered_advances() {
        let mut trigger = every_minute(1);
        trigger.triggered(None).unwrap();
        assert_eq!(trigger.previous_fire_time, Some(t0()));
        assert_eq!(trigger.next_fire_time, Some(t0() + Duration::minutes(1)));

        trigger.triggered(None).unwrap();
        assert_eq!(trigger.next_fire_time, None);
        assert!(!trigger.may_fire_again());
        match &trigger.schedule {
            TriggerSchedule::Simple(s) => assert_eq!(s.times_triggered, 2),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_end_time_stops_schedule() {
        let trigger = every_minute(crate::schedule::REPEAT_INDEFINITELY).with_end_time(t0() + Duration::seconds(90));
        assert_eq!(
            trigger.fire_time_after(t0(), None).unwrap(),
            Some(t0() + Duration::minutes(1))
        );
        assert_eq!(
            trigger
                .fire_time_after(t0() + Duration::minutes(1), None)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_calendar_skips_excluded_days() {
        let trigger = Trigger::simple(
            TriggerKey::named("daily"),
            JobKey::named("j"),
            t0(),
            Duration::days(1),
            crate::schedule::REPEAT_INDEFINITELY,
        );
        let calendar = Calendar::holidays([
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ]);
        let next = trigger.fire_time_after(t0(), Some(&calendar)).unwrap();
        assert_eq!(next, Some(t0() + Duration::days(3)));
    }

    #[test]
    fn test_compute_first_fire_time_cron() {
        let mut trigger = Trigger::cron(
            TriggerKey::named("c"),
            JobKey::named("j"),
            "0 30 * * * *",
            t0(),
        );
        assert_eq!(trigger.next_fire_time, None);
        let first = trigger.compute_first_fire_time(None).unwrap();
        assert_eq!(first, Some(t0() + Duration::minutes(30)));
        assert_eq!(trigger.next_fire_time, first);
    }

    #[test]
    fn test_is_misfired() {
        let trigger = every_minute(crate::schedule::REPEAT_INDEFINITELY);
        let now = t0() + Duration::seconds(61);
        assert!(trigger.is_misfired(now, 60_000));
        assert!(!trigger.is_misfired(now, 120_000));

        let ignoring = trigger.with_misfire_instruction(MisfireInstruction::IgnoreMisfirePolicy);
        assert!(!ignoring.is_misfired(now, 0));
    }

    #[test]
    fn test_is_misfired_with_unbounded_threshold() {
        let trigger = every_minute(crate::schedule::REPEAT_INDEFINITELY);
        let now = t0() + Duration::days(365);
        assert!(!trigger.is_misfired(now, i64::MAX));
    }

    #[test]
    fn test_update_after_misfire_smart_simple_skips_to_next() {
        let mut trigger = every_minute(crate::schedule::REPEAT_INDEFINITELY);
        let now = t0() + Duration::seconds(150);
        trigger.update_after_misfire(None, now).unwrap();
        assert_eq!(trigger.next_fire_time, Some(t0() + Duration::minutes(3)));
    }

    #[test]
    fn test_update_after_misfire_smart_one_shot_fires_now() {
        let mut trigger = every_minute(0);
        let now = t0() + Duration::minutes(10);
        trigger.update_after_misfire(None, now).unwrap();
        assert_eq!(trigger.next_fire_time, Some(now));
    }

    #[test]
    fn test_update_after_misfire_fire_now_and_ignore() {
        let now = t0() + Duration::minutes(10);
        let mut fire_now = every_minute(crate::schedule::REPEAT_INDEFINITELY)
            .with_misfire_instruction(MisfireInstruction::FireNow);
        fire_now.update_after_misfire(None, now).unwrap();
        assert_eq!(fire_now.next_fire_time, Some(now));

        let mut ignore = every_minute(crate::schedule::REPEAT_INDEFINITELY)
            .with_misfire_instruction(MisfireInstruction::IgnoreMisfirePolicy);
        ignore.update_after_misfire(None, now).unwrap();
        assert_eq!(ignore.next_fire_time, Some(t0()));
    }

    #[test]
    fn test_update_after_misfire_past_end_time() {
        let mut trigger = every_minute(0)
            .with_end_time(t0() + Duration::minutes(1))
            .with_misfire_instruction(MisfireInstruction::FireNow);
        trigger
            .update_after_misfire(None, t0() + Duration::minutes(5))
            .unwrap();
        assert_eq!(trigger.next_fire_time, None);
    }

    #[test]
    fn test_update_with_calendar() {
        let mut trigger = Trigger::simple(
            TriggerKey::named("daily"),
            JobKey::named("j"),
            t0(),
            Duration::days(1),
            crate::schedule::REPEAT_INDEFINITELY,
        );
        let calendar = Calendar::holidays([NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()]);
        trigger
            .update_with_calendar(Some(&calendar), t0() - Duration::hours(1), 60_000)
            .unwrap();
        assert_eq!(trigger.next_fire_time, Some(t0() + Duration::days(1)));
    }

    #[test]
    fn test_update_with_calendar_skips_misfired_times() {
        let mut trigger = every_minute(crate::schedule::REPEAT_INDEFINITELY);
        let now = t0() + Duration::minutes(10) + Duration::seconds(30);
        trigger.update_with_calendar(None, now, 60_000).unwrap();
        assert_eq!(trigger.next_fire_time, Some(t0() + Duration::minutes(11)));
    }

    #[test]
    fn test_update_with_calendar_unbounded_threshold_keeps_schedule() {
        let mut trigger = every_minute(crate::schedule::REPEAT_INDEFINITELY);
        let now = t0() + Duration::days(30);
        trigger.update_with_calendar(None, now, i64::MAX).unwrap();
        assert_eq!(trigger.next_fire_time, Some(t0()));
    }
